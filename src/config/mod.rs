//! Configuration module for sdlma

mod settings;

pub use settings::{AnalysisSettings, ConfigError, SettingsBuilder};
