//! Configuration system
//!
//! Two layers live here: the [`Config`] trait, which loads any serde struct
//! from `.toml` or `.ron`, and the flat `key=value` settings file read once at
//! startup to locate the shader, asset and font directories.

mod settings;

use std::path::Path;

pub use serde::{Serialize, Deserialize};
pub use settings::{EngineSettings, FlatSettings, SettingsLocator, SETTINGS_FILE_NAME};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        match extension(path) {
            Some("toml") => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            Some("ron") => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Load configuration from file, falling back to defaults when it is absent
    fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_from_file(path)
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match extension(path) {
            Some("toml") => toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?,
            Some("ron") => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A required settings key was not present
    #[error("Missing settings key '{key}' in {file}")]
    MissingKey {
        /// Key that was looked up
        key: String,
        /// Settings file that was searched
        file: String,
    },

    /// The executable directory could not be determined
    #[error("Cannot resolve executable directory: {0}")]
    ExecutableDir(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    impl Config for Sample {}

    fn temp_path(file: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("tav_config_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(file)
    }

    #[test]
    fn test_toml_and_ron_round_trip() {
        let sample = Sample { name: "plane".into(), count: 3 };
        for file in ["sample.toml", "sample.ron"] {
            let path = temp_path(file);
            sample.save_to_file(&path).unwrap();
            assert_eq!(Sample::load_from_file(&path).unwrap(), sample);
        }
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let fallback = Sample::load_or_default(temp_path("missing.ini")).unwrap();
        assert_eq!(fallback, Sample::default());

        let path = temp_path("present.ini");
        std::fs::write(&path, "name=x").unwrap();
        assert!(matches!(Sample::load_from_file(&path), Err(ConfigError::UnsupportedFormat(_))));
    }
}
