//! Environment-driven knobs for the encoder.

use serde::{Deserialize, Serialize};

/// Storable content form of a repository object.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ObjectFormat {
    #[default]
    Yaml,
    Json,
}

impl std::str::FromStr for ObjectFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown object format: {other} (expect yaml or json)")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageConfig {
    pub format: ObjectFormat,
    /// Upper bound for encoded content, in bytes.
    pub max_bytes: usize,
    /// Upper bound for the number of JSON nodes in a normalized object.
    pub max_nodes: usize,
}

pub const DEFAULT_MAX_BYTES: usize = 1 << 20;
pub const DEFAULT_MAX_NODES: usize = 100_000;

impl Default for StageConfig {
    fn default() -> Self {
        Self { format: ObjectFormat::default(), max_bytes: DEFAULT_MAX_BYTES, max_nodes: DEFAULT_MAX_NODES }
    }
}

impl StageConfig {
    /// Read `SPREAD_OBJECT_FORMAT`, `SPREAD_MAX_OBJECT_BYTES` and `SPREAD_MAX_OBJECT_NODES`.
    /// Unparseable values fall back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let format = get("SPREAD_OBJECT_FORMAT").and_then(|s| s.parse().ok()).unwrap_or_default();
        let max_bytes = get("SPREAD_MAX_OBJECT_BYTES")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_BYTES);
        let max_nodes = get("SPREAD_MAX_OBJECT_NODES")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_NODES);
        Self { format, max_bytes, max_nodes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn lookup_overrides_and_falls_back() {
        let env: HashMap<&str, &str> = [
            ("SPREAD_OBJECT_FORMAT", "JSON"),
            ("SPREAD_MAX_OBJECT_BYTES", "2048"),
            ("SPREAD_MAX_OBJECT_NODES", "lots"),
        ]
        .into_iter()
        .collect();
        let cfg = StageConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.format, ObjectFormat::Json);
        assert_eq!(cfg.max_bytes, 2048);
        assert_eq!(cfg.max_nodes, DEFAULT_MAX_NODES);

        let empty = StageConfig::from_lookup(|_| None);
        assert_eq!(empty, StageConfig::default());
        assert_eq!(empty.max_bytes, 1024 * 1024);
    }

    #[test]
    fn format_parse_rejects_unknown() {
        assert_eq!("yml".parse::<ObjectFormat>(), Ok(ObjectFormat::Yaml));
        assert!("toml".parse::<ObjectFormat>().is_err());
    }
}
