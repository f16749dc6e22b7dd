// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use parley_config::ConfigLayer;
use serde_json::{Map, Value};

use crate::ParseError;

/// Top-level front-matter keys that configure the engine.  Everything else is
/// document metadata and is forwarded to the model.
pub const CONFIG_KEYS: &[&str] = &["model", "whisper", "user", "document", "prompts"];

/// Parsed YAML front-matter of a document.
///
/// ```markdown
/// ---
/// model:
///   name: gpt-4o
///   config: reviewer
/// project: Apollo
/// ---
///
/// __User:__ Status?
/// ```
///
/// `model`, `whisper`, `user`, `document` and `prompts` become a
/// [`ConfigLayer`]; `project` lands in `metadata`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    pub layer: ConfigLayer,
    pub metadata: Map<String, Value>,
}

/// Split `content` into its raw front-matter YAML and the body that follows.
///
/// Front-matter must open on the very first line with `---` and close with
/// `---` on its own line.  Without both delimiters the whole input is body.
pub fn split_front_matter(content: &str) -> (Option<&str>, &str) {
    let header = if let Some(rest) = content.strip_prefix("---\n") {
        rest
    } else if let Some(rest) = content.strip_prefix("---\r\n") {
        rest
    } else {
        return (None, content);
    };

    // Empty block: the closing delimiter follows immediately.
    for close in ["---\n", "---\r\n"] {
        if let Some(body) = header.strip_prefix(close) {
            return (Some(""), body);
        }
    }
    if header.trim_end() == "---" {
        return (Some(""), "");
    }

    let close_unix = header.find("\n---\n");
    let close_crlf = header.find("\n---\r\n");
    let (yaml_end, body_offset) = match (close_unix, close_crlf) {
        (Some(u), Some(c)) if u <= c => (u, "\n---\n".len()),
        (_, Some(c)) => (c, "\n---\r\n".len()),
        (Some(u), _) => (u, "\n---\n".len()),
        (None, None) => {
            // Closing delimiter on the last line without a newline.
            let trimmed = header.trim_end_matches(|c: char| c == '\r' || c == '\n');
            match trimmed.strip_suffix("\n---") {
                Some(yaml) => return (Some(yaml), ""),
                None => return (None, content),
            }
        }
    };

    (Some(&header[..yaml_end]), &header[yaml_end + body_offset..])
}

/// Parse the front-matter of `content`, returning it with the body.
pub fn parse_document(content: &str) -> Result<(FrontMatter, &str), ParseError> {
    let (yaml, body) = split_front_matter(content);
    let front = match yaml {
        Some(src) => parse_front_matter(src)?,
        None => FrontMatter::default(),
    };
    Ok((front, body))
}

/// Parse raw front-matter YAML.
pub fn parse_front_matter(src: &str) -> Result<FrontMatter, ParseError> {
    if src.trim().is_empty() {
        return Ok(FrontMatter::default());
    }
    let value: serde_yaml::Value =
        serde_yaml::from_str(src).map_err(|e| ParseError::FrontMatter(e.to_string()))?;
    let mapping = match value {
        serde_yaml::Value::Mapping(m) => m,
        serde_yaml::Value::Null => return Ok(FrontMatter::default()),
        _ => return Err(ParseError::FrontMatterShape),
    };

    let mut config = serde_yaml::Mapping::new();
    let mut metadata = Map::new();
    for (key, value) in mapping {
        let Some(name) = key.as_str().map(str::to_string) else {
            return Err(ParseError::FrontMatter(format!("non-string key {key:?}")));
        };
        if CONFIG_KEYS.contains(&name.as_str()) {
            config.insert(serde_yaml::Value::String(name), value);
        } else {
            let json = serde_json::to_value(&value).map_err(|e| ParseError::FrontMatter(e.to_string()))?;
            metadata.insert(name, json);
        }
    }

    let layer = ConfigLayer::from_yaml_value(serde_yaml::Value::Mapping(config))
        .map_err(|e| ParseError::FrontMatter(e.to_string()))?;
    Ok(FrontMatter { layer, metadata })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
