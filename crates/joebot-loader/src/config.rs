use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct LoaderConfig {
    pub store: LoaderStoreConfig,
    pub import: ImportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoaderStoreConfig {
    /// Path to the jobs database. Parent directories are created.
    pub sqlite_path: String,
}

impl Default for LoaderStoreConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "data/jobs.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImportConfig {
    /// Directory scanned for `*.json`, `*.jsonl` and `*.xlsx`/`*.xls` exports.
    pub data_dir: String,
    /// Rows between progress log lines.
    pub batch_size: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            data_dir: "data/raw".to_string(),
            batch_size: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_example_config() {
        let toml_str = r#"
[store]
sqlite_path = "/tmp/jobs.db"

[import]
data_dir = "/data/joe"
batch_size = 100
"#;
        let config: LoaderConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.store.sqlite_path, "/tmp/jobs.db");
        assert_eq!(config.import.data_dir, "/data/joe");
        assert_eq!(config.import.batch_size, 100);
    }

    #[test]
    fn deserialize_minimal_config() {
        let config: LoaderConfig = toml::from_str("[import]\ndata_dir = \"exports\"\n").unwrap();
        assert_eq!(config.store.sqlite_path, "data/jobs.db");
        assert_eq!(config.import.data_dir, "exports");
        assert_eq!(config.import.batch_size, 500);
    }

    #[test]
    fn roundtrip_config() {
        let config = LoaderConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: LoaderConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }
}
