pub mod clean;
pub mod download;
pub mod extract;
pub mod fetch;
pub mod list;
