// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;
use std::str::FromStr;

use crate::{ConfigError, ConfigLayer};

/// Build the environment layer from the process environment.
pub fn env_layer() -> Result<ConfigLayer, ConfigError> {
    env_layer_with(|key| std::env::var(key).ok())
}

/// Build the environment layer from an arbitrary lookup function.
///
/// Empty values are treated as unset so `PARLEY_X=` can be used to fall back
/// to lower layers from a shell.
pub fn env_layer_with<F>(lookup: F) -> Result<ConfigLayer, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let mut layer = ConfigLayer::default();

    layer.paths.data_dir = get("PARLEY_DATA_PATH").map(PathBuf::from);
    layer.paths.vault_dir = get("PARLEY_VAULT").map(PathBuf::from);
    layer.user.label = get("PARLEY_DEFAULT_USER");
    layer.document.separator = get("PARLEY_SEPARATOR");
    layer.prompts.core = get("PARLEY_CORE_PROMPT");
    layer.prompts.meta = get("PARLEY_META_PROMPT");

    layer.model.label = get("PARLEY_NAME_LABEL");
    layer.model.config = get("PARLEY_CONFIG_FILE");
    layer.model.name = get("PARLEY_DEFAULT_MODEL");
    layer.model.provider = get("PARLEY_PROVIDER");
    layer.model.base_url = get("PARLEY_BASE_URL");
    layer.model.temperature = parsed(&get, "PARLEY_TEMPERATURE")?;
    layer.model.top_p = parsed(&get, "PARLEY_TOP_P")?;
    layer.model.frequency_penalty = parsed(&get, "PARLEY_FREQ_PENALTY")?;
    layer.model.presence_penalty = parsed(&get, "PARLEY_PRES_PENALTY")?;
    layer.model.context_window = parsed(&get, "PARLEY_CONTEXT_WINDOW")?;

    layer.whisper.input = get("PARLEY_WHISPER_INPUT");
    layer.whisper.model = get("PARLEY_WHISPER_MODEL");
    layer.whisper.base_url = get("PARLEY_WHISPER_BASE_URL");
    layer.whisper.language = get("PARLEY_WHISPER_LANGUAGE");
    layer.whisper.config = get("PARLEY_WHISPER_CONFIG");
    layer.whisper.live_suffix = get("PARLEY_WHISPER_LIVE_SUFFIX");
    layer.whisper.read_suffix = get("PARLEY_WHISPER_READ_SUFFIX");
    layer.whisper.temperature = parsed(&get, "PARLEY_WHISPER_TEMPERATURE")?;
    layer.whisper.echo_output = flag(&get, "PARLEY_WHISPER_ECHO_OUTPUT")?;
    layer.whisper.delete_file = flag(&get, "PARLEY_WHISPER_DELETE_FILE")?;

    Ok(layer)
}

fn parsed<T, G>(get: &G, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { key: key.to_string(), value: raw }),
    }
}

fn flag<G>(get: &G, key: &str) -> Result<Option<bool>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(None),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidEnv { key: key.to_string(), value: raw }),
        },
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
