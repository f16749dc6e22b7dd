//! Model catalog: static context-window metadata for known model families.

use serde::{Deserialize, Serialize};

/// Context window assumed for models the catalog does not know.
pub const DEFAULT_CONTEXT_WINDOW: u32 = 4096;

/// Metadata for a model family.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelCatalogEntry {
    /// Prefix matched against the model name (e.g. "gpt-4o")
    pub prefix: String,
    /// Total context window in tokens (input + output)
    pub context_window: u32,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    models: Vec<ModelCatalogEntry>,
}

/// Return all entries from the bundled static catalog, in match order.
///
/// The bundled file is covered by tests; a malformed file yields an empty
/// catalog and every lookup falls back to [`DEFAULT_CONTEXT_WINDOW`].
pub fn static_catalog() -> Vec<ModelCatalogEntry> {
    let yaml = include_str!("../models.yaml");
    match serde_yaml::from_str::<CatalogFile>(yaml) {
        Ok(catalog) => catalog.models,
        Err(e) => {
            tracing::warn!(error = %e, "bundled models.yaml is invalid");
            Vec::new()
        }
    }
}

/// Find the first catalog entry whose prefix starts `model`.
pub fn lookup(model: &str) -> Option<ModelCatalogEntry> {
    static_catalog()
        .into_iter()
        .find(|e| model.starts_with(e.prefix.as_str()))
}

/// Look up the context window for a model.  Falls back to `default` if not in catalog.
pub fn context_window(model: &str, default: u32) -> u32 {
    lookup(model).map(|e| e.context_window).unwrap_or(default)
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_catalog_is_non_empty() {
        assert!(!static_catalog().is_empty(), "bundled catalog must contain entries");
    }

    #[test]
    fn longer_prefix_wins_over_family_prefix() {
        assert_eq!(context_window("gpt-4o-mini", 0), 128_000);
        assert_eq!(context_window("gpt-4-turbo-preview", 0), 128_000);
        assert_eq!(context_window("gpt-4-0613", 0), 8192);
        assert_eq!(context_window("llama3.1:8b", 0), 128_000);
        assert_eq!(context_window("llama2", 0), 4096);
    }

    #[test]
    fn gpt35_turbo_has_16k_window() {
        assert_eq!(context_window("gpt-3.5-turbo-0125", 0), 16_385);
    }

    #[test]
    fn unknown_model_uses_fallback() {
        assert!(lookup("nonexistent-model-xyz").is_none());
        assert_eq!(context_window("nonexistent-model-xyz", DEFAULT_CONTEXT_WINDOW), 4096);
    }

    #[test]
    fn all_entries_have_non_zero_windows() {
        for entry in static_catalog() {
            assert!(entry.context_window > 0, "{} has zero context_window", entry.prefix);
        }
    }

    #[test]
    fn no_entry_is_shadowed_by_an_earlier_prefix() {
        let entries = static_catalog();
        for (i, later) in entries.iter().enumerate() {
            for earlier in &entries[..i] {
                assert!(
                    !later.prefix.starts_with(earlier.prefix.as_str()),
                    "{} is unreachable behind {}",
                    later.prefix,
                    earlier.prefix
                );
            }
        }
    }
}
