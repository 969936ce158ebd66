pub mod console;
pub mod fs;
