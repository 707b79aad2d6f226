//! Flat `key=value` settings file
//!
//! The file lives next to the executable and is read once at startup. Every
//! directory it names is resolved against the same root as the file itself.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};

/// File name looked up next to the executable
pub const SETTINGS_FILE_NAME: &str = "settings.txt";

/// Parsed `key=value` pairs
#[derive(Debug, Clone, Default)]
pub struct FlatSettings {
    source: String,
    values: HashMap<String, String>,
}

impl FlatSettings {
    /// Parse settings text
    ///
    /// Blank lines and lines starting with `#` are skipped; lines without `=`
    /// are logged and ignored. Later duplicates win.
    pub fn parse(contents: &str, source: impl Into<String>) -> Self {
        let source = source.into();
        let mut values = HashMap::new();

        for (line_num, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once('=') {
                Some((key, value)) => {
                    values.insert(key.trim().to_string(), value.trim().to_string());
                }
                None => log::warn!("{}:{}: ignoring line without '='", source, line_num + 1),
            }
        }

        Self { source, values }
    }

    /// Read and parse a settings file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            log::error!("Failed to read settings file {}: {}", path.display(), e);
            ConfigError::Io(e)
        })?;
        Ok(Self::parse(&contents, path.display().to_string()))
    }

    /// Look up a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Look up a key that must be present
    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key).ok_or_else(|| {
            log::error!("Settings file {} is missing key '{}'", self.source, key);
            ConfigError::MissingKey { key: key.to_string(), file: self.source.clone() }
        })
    }
}

/// Resolves the settings file and the root its relative paths hang off
#[derive(Debug, Clone)]
pub struct SettingsLocator {
    root: PathBuf,
}

impl SettingsLocator {
    /// Locate settings next to the running executable
    pub fn from_executable() -> Result<Self, ConfigError> {
        let exe = std::env::current_exe().map_err(|e| ConfigError::ExecutableDir(e.to_string()))?;
        let root = exe
            .parent()
            .ok_or_else(|| ConfigError::ExecutableDir(exe.display().to_string()))?
            .to_path_buf();
        Ok(Self { root })
    }

    /// Locate settings under an explicit root directory
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE_NAME)
    }

    /// Read the settings file and resolve its directories
    pub fn load(&self) -> Result<EngineSettings, ConfigError> {
        let flat = FlatSettings::load(&self.settings_file())?;
        EngineSettings::from_flat(&flat, &self.root)
    }
}

/// Directory layout read at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Directory holding shader sources
    pub shader_dir: PathBuf,
    /// Directory holding textures and models
    pub asset_dir: PathBuf,
    /// Directory holding fonts
    pub font_dir: PathBuf,
    /// Default font file name inside `font_dir`
    pub default_font: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            shader_dir: PathBuf::from("shaders"),
            asset_dir: PathBuf::from("assets"),
            font_dir: PathBuf::from("fonts"),
            default_font: "Roboto-Regular.ttf".to_string(),
        }
    }
}

impl Config for EngineSettings {}

impl EngineSettings {
    /// Keys every settings file must provide
    pub const REQUIRED_KEYS: [&'static str; 4] = ["shaderDir", "assetDir", "fontDir", "defaultFont"];

    /// Build settings from parsed pairs, resolving directories against `root`
    pub fn from_flat(flat: &FlatSettings, root: &Path) -> Result<Self, ConfigError> {
        Ok(Self {
            shader_dir: root.join(flat.require("shaderDir")?),
            asset_dir: root.join(flat.require("assetDir")?),
            font_dir: root.join(flat.require("fontDir")?),
            default_font: flat.require("defaultFont")?.to_string(),
        })
    }

    /// Resolve a file inside the asset directory
    pub fn asset_path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.asset_dir.join(name)
    }

    /// Resolve a file inside the shader directory
    pub fn shader_path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.shader_dir.join(name)
    }

    /// Full path of the default font
    pub fn font_path(&self) -> PathBuf {
        self.font_dir.join(&self.default_font)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# engine layout
shaderDir = res/shaders
assetDir=res/assets
fontDir=res/fonts
defaultFont=Roboto.ttf
";

    #[test]
    fn test_parse_flat_settings() {
        let flat = FlatSettings::parse(SAMPLE, "inline");
        assert_eq!(flat.get("shaderDir"), Some("res/shaders"));
        assert_eq!(flat.get("defaultFont"), Some("Roboto.ttf"));
        assert_eq!(flat.get("missing"), None);
    }

    #[test]
    fn test_settings_resolve_against_root() {
        let flat = FlatSettings::parse(SAMPLE, "inline");
        let settings = EngineSettings::from_flat(&flat, Path::new("/opt/game")).unwrap();
        assert_eq!(settings.shader_path("shader.vert"), PathBuf::from("/opt/game/res/shaders/shader.vert"));
        assert_eq!(settings.font_path(), PathBuf::from("/opt/game/res/fonts/Roboto.ttf"));
    }

    #[test]
    fn test_missing_key_is_fatal() {
        let flat = FlatSettings::parse("shaderDir=a\nassetDir=b\nfontDir=c\n", "inline");
        match EngineSettings::from_flat(&flat, Path::new(".")) {
            Err(ConfigError::MissingKey { key, .. }) => assert_eq!(key, "defaultFont"),
            other => panic!("expected missing key, got {other:?}"),
        }
    }

    #[test]
    fn test_locator_reads_file_from_root() {
        let root = std::env::temp_dir().join(format!("tav_settings_{}", std::process::id()));
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join(SETTINGS_FILE_NAME), SAMPLE).unwrap();

        let settings = SettingsLocator::with_root(&root).load().unwrap();
        assert_eq!(settings.asset_dir, root.join("res/assets"));
    }

    #[test]
    fn test_locator_missing_file_is_io_error() {
        let locator = SettingsLocator::with_root("/definitely/not/here");
        assert!(matches!(locator.load(), Err(ConfigError::Io(_))));
    }
}
