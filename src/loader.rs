//! Suite document loader.
//!
//! Loads the suite list and the optional `nixtest.yaml` defaults from disk.

use crate::config::{CONFIG_FILENAME, FileConfig};
use crate::schema::SuiteSpec;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Error type for loading operations.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Failed to read the file.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid TOML in {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// TOML has no top-level arrays, so suites live under `[[suites]]`.
#[derive(Deserialize)]
struct TomlDocument {
    #[serde(default)]
    suites: Vec<SuiteSpec>,
}

/// Load a suite document.
///
/// `.yaml`/`.yml` and `.toml` are parsed by extension; anything else,
/// including extensionless build outputs, is parsed as JSON.
pub fn load_suites(path: &Path) -> Result<Vec<SuiteSpec>, LoadError> {
    let contents = read(path)?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match ext {
        "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(|source| LoadError::Yaml {
            path: path.to_path_buf(),
            source,
        }),
        "toml" => toml::from_str::<TomlDocument>(&contents)
            .map(|doc| doc.suites)
            .map_err(|source| LoadError::Toml {
                path: path.to_path_buf(),
                source,
            }),
        _ => serde_json::from_str(&contents).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Load `nixtest.yaml` from a directory.
///
/// Returns `None` if the file doesn't exist, `Err` if it exists but is invalid.
pub fn load_file_config(dir: &Path) -> Result<Option<FileConfig>, LoadError> {
    let config_path = dir.join(CONFIG_FILENAME);

    if !config_path.exists() {
        return Ok(None);
    }

    let contents = read(&config_path)?;
    let config = serde_yaml::from_str(&contents).map_err(|source| LoadError::Yaml {
        path: config_path,
        source,
    })?;
    Ok(Some(config))
}

fn read(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}
