pub mod error;
pub mod state;

pub use error::{AudioError, ConfigError, StartError, UpdateError};
pub use state::{AnalyzerState, InvalidTransition, StateManager};
