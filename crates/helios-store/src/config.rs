use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

fn default_database_path() -> String {
    "helios.db".to_string()
}

/// Store configuration, loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file. Relative paths resolve against the working
    /// directory of the embedding service.
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Tenant this store instance is scoped to. Records carrying another
    /// tenant id are rejected at write time.
    pub tenant_id: String,
}

impl StoreConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read store config {}", path.display()))?;
        let config: StoreConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse store config {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_minimal_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("store.yaml");
        fs::write(&path, "tenant_id: tenant_1\n").expect("write config");

        let config = StoreConfig::load(&path).expect("load config");
        assert_eq!(config.tenant_id, "tenant_1");
        assert_eq!(config.database_path, "helios.db");
    }

    #[test]
    fn load_full_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("store.yaml");
        fs::write(
            &path,
            "database_path: /var/lib/helios/support.db\ntenant_id: acme\n",
        )
        .expect("write config");

        let config = StoreConfig::load(&path).expect("load config");
        assert_eq!(config.database_path, "/var/lib/helios/support.db");
        assert_eq!(config.tenant_id, "acme");
    }

    #[test]
    fn missing_file_reports_path() {
        let err = StoreConfig::load("/nonexistent/store.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/store.yaml"));
    }
}
