pub mod config;
pub mod error;
pub mod row;

pub use config::AnalysisConfig;
pub use error::{RoasError, RoasResult};
