// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod schema;
mod layer;
mod env;
mod loader;

pub use schema::*;
pub use layer::{
    ConfigLayer, DocumentLayer, ModelLayer, PathsLayer, PromptsLayer, UserLayer, WhisperLayer,
};
pub use env::{env_layer, env_layer_with};
pub use loader::{load, load_files};

/// Error raised while reading a configuration source that is not a file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {key} has invalid value {value:?}")]
    InvalidEnv { key: String, value: String },
}
