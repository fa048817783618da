use crate::login::{hash_access_code, is_access_code_hash};
use std::path::PathBuf;
use thiserror::Error;

/// Uploads larger than this are refused before they reach a handler
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("either ACCESS_CODE or ACCESS_CODE_HASH must be set")]
    MissingAccessCode,

    #[error("{name} has an invalid value '{value}'")]
    InvalidValue { name: &'static str, value: String },

    #[error("could not hash the access code: {0}")]
    Hash(String),
}

/// Server configuration
///
/// Read from the environment by [`Config::from_env`]:
///
/// | Variable           | Default          |
/// |--------------------|------------------|
/// | `HOST`             | `0.0.0.0`        |
/// | `PORT`             | `5001`           |
/// | `ACCESS_CODE`      | (required unless `ACCESS_CODE_HASH` is set) |
/// | `ACCESS_CODE_HASH` | argon2 PHC string |
/// | `UPLOAD_FOLDER`    | `uploads`        |
/// | `OUTPUT_FOLDER`    | `output`         |
/// | `INVENTORY_FILE`   | `inventory.xlsx` |
/// | `SPLIT_KEYWORD`    | `artist`         |
/// | `ENABLE_PIVOT`     | `false`          |
/// | `MAX_UPLOAD_BYTES` | 10 MB            |
#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,

    /// Argon2 hash of the shared access code; the plain code is never kept
    pub access_code_hash: String,

    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub inventory_file: PathBuf,
    pub split_keyword: String,
    pub enable_pivot: bool,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Defaults plus the given access code
    pub fn with_access_code(code: &str) -> Result<Self, ConfigError> {
        Ok(Config {
            access_code_hash: hash_access_code(code).map_err(ConfigError::Hash)?,
            ..Self::defaults()
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let access_code_hash = match (var("ACCESS_CODE_HASH"), var("ACCESS_CODE")) {
            (Some(hash), _) => {
                if !is_access_code_hash(&hash) {
                    return Err(ConfigError::InvalidValue {
                        name: "ACCESS_CODE_HASH",
                        value: hash,
                    });
                }
                hash
            }
            (None, Some(code)) => hash_access_code(&code).map_err(ConfigError::Hash)?,
            (None, None) => return Err(ConfigError::MissingAccessCode),
        };

        let mut config = Config {
            access_code_hash,
            ..Self::defaults()
        };

        if let Some(host) = var("HOST") {
            config.host = host;
        }
        if let Some(port) = var("PORT") {
            config.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: "PORT",
                value: port.clone(),
            })?;
        }
        if let Some(dir) = var("UPLOAD_FOLDER") {
            config.upload_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("OUTPUT_FOLDER") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(file) = var("INVENTORY_FILE") {
            config.inventory_file = PathBuf::from(file);
        }
        if let Some(keyword) = var("SPLIT_KEYWORD") {
            config.split_keyword = keyword.trim().to_string();
        }
        if let Some(flag) = var("ENABLE_PIVOT") {
            config.enable_pivot = parse_bool(&flag).ok_or(ConfigError::InvalidValue {
                name: "ENABLE_PIVOT",
                value: flag.clone(),
            })?;
        }
        if let Some(limit) = var("MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = limit
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidValue {
                    name: "MAX_UPLOAD_BYTES",
                    value: limit.clone(),
                })?;
        }

        Ok(config)
    }

    fn defaults() -> Self {
        Config {
            host: "0.0.0.0".to_string(),
            port: 5001,
            access_code_hash: String::new(),
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("output"),
            inventory_file: PathBuf::from("inventory.xlsx"),
            split_keyword: "artist".to_string(),
            enable_pivot: false,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Create the upload and output folders
    pub fn prepare_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.upload_dir)?;
        std::fs::create_dir_all(&self.output_dir)?;
        if let Some(parent) = self.inventory_file.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::login::verify_access_code;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&[("ACCESS_CODE", "letmein")])).unwrap();
        assert_eq!(config.port, 5001);
        assert_eq!(config.split_keyword, "artist");
        assert!(!config.enable_pivot);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert!(verify_access_code("letmein", &config.access_code_hash));
        assert!(!config.access_code_hash.contains("letmein"));
    }

    #[test]
    fn overrides_apply() {
        let config = Config::from_lookup(lookup(&[
            ("ACCESS_CODE", "x"),
            ("PORT", "8080"),
            ("ENABLE_PIVOT", "yes"),
            ("SPLIT_KEYWORD", " performer "),
            ("OUTPUT_FOLDER", "/tmp/out"),
        ]))
        .unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(config.enable_pivot);
        assert_eq!(config.split_keyword, "performer");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn access_code_is_required() {
        let err = Config::from_lookup(lookup(&[("PORT", "80")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingAccessCode));
    }

    #[test]
    fn bad_values_are_reported() {
        let err =
            Config::from_lookup(lookup(&[("ACCESS_CODE", "x"), ("PORT", "http")])).unwrap_err();
        assert_eq!(err.to_string(), "PORT has an invalid value 'http'");

        let err = Config::from_lookup(lookup(&[("ACCESS_CODE_HASH", "plaintext")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "ACCESS_CODE_HASH", .. }));
    }

    #[test]
    fn prehashed_code_is_used_as_is() {
        let hash = hash_access_code("secret").unwrap();
        let config = Config::from_lookup(lookup(&[("ACCESS_CODE_HASH", hash.as_str())])).unwrap();
        assert_eq!(config.access_code_hash, hash);
    }
}
