pub mod config_file;
pub mod runtime;

pub use runtime::Analyzer;
