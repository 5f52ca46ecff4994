//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\mp3-tidy\config.toml
//! - macOS: ~/Library/Application Support/mp3-tidy/config.toml
//! - Linux: ~/.config/mp3-tidy/config.toml
//!
//! The `--config` flag points at any other file. Every section is
//! optional; missing keys fall back to the defaults below.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where files come from and go to
    pub paths: PathsConfig,

    /// External repair tool
    pub tools: ToolsConfig,

    /// Text normalization rules
    pub text: TextConfig,

    /// Cover art handling
    pub images: ImagesConfig,

    /// Tag output formats
    pub tags: TagsConfig,
}

/// Directory and file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Folder with incoming mp3s
    pub base_dir: PathBuf,

    /// Folder receiving cleaned files; albums get subdirectories
    pub dest_dir: PathBuf,

    /// The editable changes document
    pub changes_file: PathBuf,

    /// Quarantine for unreadable files (subdirectory of base_dir)
    pub broken_dir: String,

    /// Quarantine for albums in other audio formats (subdirectory of base_dir)
    pub not_mp3_dir: String,

    /// Editor command for reviewing the changes document (empty = no review)
    pub editor: String,

    /// Upper bound on how long the editor may run
    pub editor_timeout_secs: u64,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::new(),
            dest_dir: PathBuf::new(),
            changes_file: PathBuf::new(),
            broken_dir: ".broken".to_string(),
            not_mp3_dir: ".not-mp3".to_string(),
            editor: String::new(),
            editor_timeout_secs: 3600,
        }
    }
}

impl PathsConfig {
    pub fn broken_path(&self) -> PathBuf {
        self.base_dir.join(&self.broken_dir)
    }

    pub fn not_mp3_path(&self) -> PathBuf {
        self.base_dir.join(&self.not_mp3_dir)
    }

    /// Whether a top-level directory name is one of the quarantines.
    pub fn is_quarantine(&self, name: &str) -> bool {
        name == self.broken_dir || name == self.not_mp3_dir
    }
}

/// Validator/repair tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Run the validator over every mp3 before extraction
    pub enable_validator: bool,

    /// Validator executable (invoked as `<program> -f -nb <file>`)
    pub validator_program: String,

    /// Time budget for each external tool call
    pub tool_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enable_validator: true,
            validator_program: "mp3val".to_string(),
            tool_timeout_secs: 60,
        }
    }
}

impl ToolsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// Text correction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    /// Part-of-speech aware title casing instead of capitalizing every word
    pub linguistic_casing: bool,

    /// Convert Roman numerals in titles to Arabic numerals
    pub roman_to_arabic: bool,

    /// Pattern detecting featured artists in artist and title tags
    pub feature_pattern: String,

    /// Append " EP" to short albums
    pub ep_detection: bool,

    /// Albums shorter than this many seconds count as EPs
    pub ep_max_length_secs: u64,

    pub delete: DeleteRules,

    pub replace: ReplaceRules,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            linguistic_casing: true,
            roman_to_arabic: true,
            feature_pattern: r" ?[\[\( ]f(ea|)t[^ ]*\.? ".to_string(),
            ep_detection: true,
            ep_max_length_secs: 1800,
            delete: DeleteRules::default(),
            replace: ReplaceRules::default(),
        }
    }
}

/// Annotations removed outright
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteRules {
    pub bonus_track: bool,
    pub explicit: bool,
    pub lp: bool,
    pub original_mix: bool,
    pub produced_by: bool,
}

impl Default for DeleteRules {
    fn default() -> Self {
        Self {
            bonus_track: true,
            explicit: true,
            lp: true,
            original_mix: true,
            produced_by: true,
        }
    }
}

/// Replacement text per annotation; an empty string disables the rule.
///
/// `\1` refers to the words captured in front of the keyword.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaceRules {
    pub edit: String,
    pub extended: String,
    pub extended_mix: String,
    pub instrumental: String,
    pub live: String,
    pub ost: String,
    pub soundtrack: String,
    pub cover: String,
    pub mix: String,
    pub remix: String,
    pub remix_bracketed: String,
    pub remix_named: String,
    pub reprise: String,
    pub version: String,
}

impl Default for ReplaceRules {
    fn default() -> Self {
        Self {
            edit: " (edit)".to_string(),
            extended: " (extended)".to_string(),
            extended_mix: " (extended mix)".to_string(),
            instrumental: " (instrumental)".to_string(),
            live: " (live)".to_string(),
            ost: " OST".to_string(),
            soundtrack: " OST".to_string(),
            cover: r"(\1 cover)".to_string(),
            mix: r" (\1 mix)".to_string(),
            remix: "remix".to_string(),
            remix_bracketed: " (remix)".to_string(),
            remix_named: r" (\1 remix)".to_string(),
            reprise: "reprise".to_string(),
            version: r" (\1 version)".to_string(),
        }
    }
}

/// Cover art settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    /// Images smaller than this are deleted (0 keeps everything)
    pub min_size_bytes: u64,

    /// Convert png to jpg and recompress uncompressed jpgs
    pub reencode: bool,

    /// jpegoptim quality ceiling
    pub jpeg_quality: u8,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            min_size_bytes: 15360,
            reencode: true,
            jpeg_quality: 95,
        }
    }
}

/// Which tag formats are written at commit time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TagsConfig {
    pub write_id3v1: bool,
    pub write_id3v2: bool,
    /// "2.3" or "2.4"
    pub id3v2_version: String,
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            write_id3v1: true,
            write_id3v2: true,
            id3v2_version: "2.4".to_string(),
        }
    }
}

impl Config {
    /// Reject missing or contradictory settings before anything is touched.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("paths.base_dir", &self.paths.base_dir),
            ("paths.dest_dir", &self.paths.dest_dir),
            ("paths.changes_file", &self.paths.changes_file),
        ];
        for (name, path) in required {
            if path.as_os_str().is_empty() {
                return Err(Error::config(format!("{name} must be set")));
            }
        }

        if self.paths.broken_dir.is_empty() || self.paths.not_mp3_dir.is_empty() {
            return Err(Error::config("quarantine directory names must be set"));
        }
        if self.paths.broken_dir == self.paths.not_mp3_dir {
            return Err(Error::config(
                "paths.broken_dir and paths.not_mp3_dir must differ",
            ));
        }

        if self.text.feature_pattern.is_empty() {
            return Err(Error::config("text.feature_pattern must be set"));
        }
        Regex::new(&self.text.feature_pattern)
            .map_err(|e| Error::config(format!("text.feature_pattern is invalid: {e}")))?;

        if !self.tags.write_id3v1 && !self.tags.write_id3v2 {
            return Err(Error::config(
                "at least one of tags.write_id3v1 / tags.write_id3v2 must be enabled",
            ));
        }
        if !matches!(self.tags.id3v2_version.as_str(), "2.3" | "2.4") {
            return Err(Error::config(format!(
                "tags.id3v2_version must be \"2.3\" or \"2.4\", got \"{}\"",
                self.tags.id3v2_version
            )));
        }
        if self.images.jpeg_quality == 0 || self.images.jpeg_quality > 100 {
            return Err(Error::config("images.jpeg_quality must be within 1..=100"));
        }

        Ok(())
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mp3-tidy"))
}

/// Get the full path to the default config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from `path`, or from the default location.
///
/// Unlike a GUI setting store, a batch run must not guess: a file that is
/// present but unreadable or unparsable is a configuration error.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_path()
            .ok_or_else(|| Error::config("could not determine config directory"))?,
    };

    if !path.exists() {
        return Err(Error::config(format!(
            "no config file at {}; create one with `mp3-tidy init-config`",
            path.display()
        )));
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| Error::config(format!("failed to parse {}: {e}", path.display())))?;
    tracing::info!("Loaded config from {:?}", path);
    Ok(config)
}

/// Save configuration to disk, creating the parent directory.
pub fn save(config: &Config, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let contents = toml::to_string_pretty(config)
        .map_err(|e| Error::config(format!("failed to serialize config: {e}")))?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents)?;
    std::fs::rename(&temp_path, path)?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
