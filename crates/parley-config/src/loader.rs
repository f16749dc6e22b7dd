use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::{env_layer, Config};

/// Ordered list of config file locations searched from lowest to highest priority.
/// Later files override earlier ones.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. System-wide default
    paths.push(PathBuf::from("/etc/parley/config.toml"));

    // 2. XDG / home
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/parley/config.toml"));
    }
    if let Some(cfg) = dirs::config_dir() {
        paths.push(cfg.join("parley/config.toml"));
    }

    // 3. Workspace-local
    paths.push(PathBuf::from(".parley/config.toml"));
    paths.push(PathBuf::from("parley.toml"));

    paths
}

/// Load configuration from the TOML settings files and the environment.
///
/// The `extra` argument may provide an explicit path (e.g. `--config` CLI
/// flag); it is merged after the discovered files.  Document-level layers are
/// applied later by the pipeline.
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = load_files(extra)?;
    let env = env_layer().context("reading PARLEY_* environment")?;
    config.apply(&env);
    Ok(config)
}

/// Load only the TOML settings files, without the environment layer.
pub fn load_files(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = toml::Value::Table(toml::map::Map::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            merge_toml(&mut merged, read_toml(&path)?);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        merge_toml(&mut merged, read_toml(p)?);
    }

    let config: Config = merged.try_into().context("invalid configuration")?;
    Ok(config)
}

fn read_toml(path: &Path) -> anyhow::Result<toml::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Deep-merge `src` into `dst`; src wins on scalar conflicts.
fn merge_toml(dst: &mut toml::Value, src: toml::Value) {
    match (dst, src) {
        (toml::Value::Table(d), toml::Value::Table(s)) => {
            for (k, v) in s {
                let entry = d.entry(k).or_insert(toml::Value::Table(toml::map::Map::new()));
                merge_toml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn val(s: &str) -> toml::Value {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn merge_scalar_src_wins() {
        let mut dst = val("x = 1");
        merge_toml(&mut dst, val("x = 2"));
        assert_eq!(dst["x"].as_integer(), Some(2));
    }

    #[test]
    fn merge_nested_tables_keeps_siblings() {
        let mut dst = val("[whisper]\nmodel = \"whisper-1\"\nlanguage = \"en\"");
        merge_toml(&mut dst, val("[whisper]\nlanguage = \"sv\""));
        assert_eq!(dst["whisper"]["model"].as_str(), Some("whisper-1"));
        assert_eq!(dst["whisper"]["language"].as_str(), Some("sv"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = load_files(Some(Path::new("/tmp/parley_nonexistent_config_xyz.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn explicit_file_overrides_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[model]\nname = \"gpt-4o\"\nlabel = \"Gladdis\"\n[document]\nseparator = \"___\"").unwrap();
        let cfg = load_files(Some(f.path())).unwrap();
        assert_eq!(cfg.model.name, "gpt-4o");
        assert_eq!(cfg.model.label, "Gladdis");
        assert_eq!(cfg.document.separator, "___");
        assert_eq!(cfg.user.label, "User");
    }

    #[test]
    fn wrongly_typed_value_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[model]\ntemperature = \"hot\"").unwrap();
        assert!(load_files(Some(f.path())).is_err());
    }
}
