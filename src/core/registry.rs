use crate::core::dataset::{DatasetSource, StagingPolicy};
use crate::core::download::filename_from_url;
use crate::error::{DatasetError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use url::Url;

const RELEASES: &str = "https://github.com/apacha/OMR-Datasets/releases/download/datasets";

/// Built-in datasets: name, archive filename, description, staging policy.
const BUILTIN_DATASETS: &[(&str, &str, &str, StagingPolicy)] = &[
    (
        "homus",
        "HOMUS-2.0.zip",
        "Handwritten Online Musical Symbols",
        StagingPolicy::Staged,
    ),
    (
        "rebelo1",
        "Rebelo-Music-Symbol-Dataset1.zip",
        "Rebelo music symbol dataset, part 1",
        StagingPolicy::Staged,
    ),
    (
        "rebelo2",
        "Rebelo-Music-Symbol-Dataset2.zip",
        "Rebelo music symbol dataset, part 2",
        StagingPolicy::Staged,
    ),
    (
        "printed",
        "Printed-Music-Symbols-Dataset.zip",
        "Printed music symbols",
        StagingPolicy::Staged,
    ),
    (
        "fornes",
        "Fornes-Music-Symbols.zip",
        "Fornes handwritten music symbols",
        StagingPolicy::Staged,
    ),
    (
        "audiveris",
        "Audiveris-Dataset.zip",
        "Audiveris OMR dataset",
        StagingPolicy::Staged,
    ),
    (
        "openomr",
        "OpenOMR-Dataset.zip",
        "OpenOMR symbol images",
        StagingPolicy::Staged,
    ),
    (
        "muscima-pp",
        "MUSCIMA-pp_v2.0.zip",
        "MUSCIMA++ handwritten notation graph",
        StagingPolicy::Direct,
    ),
];

/// A dataset defined by a fixed URL and archive filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveDataset {
    pub name: String,
    pub url: String,
    /// Defaults to the last segment of `url` when left empty.
    #[serde(default)]
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub staging: StagingPolicy,
}

impl ArchiveDataset {
    pub fn new(name: &str, url: &str, filename: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            filename: filename.to_string(),
            description: None,
            staging: StagingPolicy::default(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_staging(mut self, staging: StagingPolicy) -> Self {
        self.staging = staging;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(DatasetError::registry_error("Dataset name is required"));
        }

        Url::parse(&self.url).map_err(|e| {
            DatasetError::registry_error(format!("Dataset '{}' has an invalid URL: {e}", self.name))
        })?;

        if matches!(self.filename.as_str(), "" | "." | "..")
            || self.filename.contains(['/', '\\'])
        {
            return Err(DatasetError::registry_error(format!(
                "Dataset '{}' needs a plain archive filename, got '{}'",
                self.name, self.filename
            )));
        }

        Ok(())
    }
}

impl DatasetSource for ArchiveDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn download_url(&self) -> &str {
        &self.url
    }

    fn archive_filename(&self) -> &str {
        &self.filename
    }

    fn staging(&self) -> StagingPolicy {
        self.staging
    }
}

/// Known datasets, looked up by case-insensitive name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default, rename = "dataset")]
    datasets: Vec<ArchiveDataset>,
}

impl Registry {
    pub fn builtin() -> Self {
        let datasets = BUILTIN_DATASETS
            .iter()
            .map(|(name, filename, description, staging)| {
                ArchiveDataset::new(name, &format!("{RELEASES}/{filename}"), filename)
                    .with_description(description)
                    .with_staging(*staging)
            })
            .collect();

        Self { datasets }
    }

    /// Load a registry from a TOML file of `[[dataset]]` tables
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DatasetError::registry_error(format!(
                "Registry file not found: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut registry: Registry =
            toml::from_str(content).map_err(|e| DatasetError::registry_error(e.to_string()))?;

        for dataset in &mut registry.datasets {
            if dataset.filename.is_empty() {
                if let Ok(url) = Url::parse(&dataset.url) {
                    dataset.filename = filename_from_url(&url);
                }
            }
        }

        registry.validate()?;
        Ok(registry)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| DatasetError::registry_error(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        for (i, dataset) in self.datasets.iter().enumerate() {
            dataset.validate()?;

            if self.datasets[..i]
                .iter()
                .any(|other| other.name.eq_ignore_ascii_case(&dataset.name))
            {
                return Err(DatasetError::registry_error(format!(
                    "Dataset '{}' is defined twice",
                    dataset.name
                )));
            }
        }
        Ok(())
    }

    /// Entries of `overrides` replace same-named entries and new ones are appended.
    pub fn with_overrides(mut self, overrides: Registry) -> Self {
        for dataset in overrides.datasets {
            match self
                .datasets
                .iter_mut()
                .find(|d| d.name.eq_ignore_ascii_case(&dataset.name))
            {
                Some(existing) => *existing = dataset,
                None => self.datasets.push(dataset),
            }
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&ArchiveDataset> {
        self.datasets
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }

    pub fn find(&self, name: &str) -> Result<&ArchiveDataset> {
        self.get(name).ok_or_else(|| DatasetError::DatasetNotFound {
            name: name.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArchiveDataset> {
        self.datasets.iter()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}
