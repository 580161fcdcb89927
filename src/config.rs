use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// GitHub caps `per_page` at 100
pub const MAX_PER_PAGE: u32 = 100;

/// What to do with a review comment that cannot be normalized
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidCommentPolicy {
    /// Leave it out of the report and list it separately
    #[default]
    Skip,
    /// Fail the whole run
    Abort,
}

/// Fetch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Review comments requested per page (1-100)
    pub per_page: u32,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            per_page: MAX_PER_PAGE,
        }
    }
}

/// Report settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Print the PR diff after the comment threads
    pub show_diff: bool,

    /// Skip or abort on comments that cannot be anchored
    pub on_invalid_comment: InvalidCommentPolicy,
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchSettings,

    #[serde(default)]
    pub report: ReportSettings,
}

impl Config {
    /// Get the config file path (~/.config/rethread/config.toml)
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("rethread").join("config.toml"))
    }

    /// Load configuration from the default location, or return defaults if it is absent or broken
    pub fn load() -> Self {
        let path = match Self::config_path() {
            Some(p) => p,
            None => return Self::default(),
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
                Self::default()
            }
        }
    }

    /// Load configuration from an explicit path; the file must exist and parse
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.fetch.per_page == 0 || self.fetch.per_page > MAX_PER_PAGE {
            return Err(anyhow!(
                "fetch.per_page must be between 1 and {}, got {}",
                MAX_PER_PAGE,
                self.fetch.per_page
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.fetch.per_page, 100);
        assert!(!config.report.show_diff);
        assert_eq!(config.report.on_invalid_comment, InvalidCommentPolicy::Skip);
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[fetch]
per_page = 30

[report]
show_diff = true
on_invalid_comment = "abort"
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.fetch.per_page, 30);
        assert!(config.report.show_diff);
        assert_eq!(config.report.on_invalid_comment, InvalidCommentPolicy::Abort);
    }

    #[test]
    fn test_parse_toml_partial() {
        // Should use defaults for missing fields
        let toml_str = r#"
[report]
show_diff = true
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.fetch.per_page, 100);
        assert!(config.report.show_diff);
        assert_eq!(config.report.on_invalid_comment, InvalidCommentPolicy::Skip);
    }

    #[test]
    fn test_parse_toml_unknown_policy() {
        let toml_str = r#"
[report]
on_invalid_comment = "explode"
"#;
        assert!(toml::from_str::<Config>(toml_str).is_err());
    }

    #[test]
    fn test_validate_per_page() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.fetch.per_page = 0;
        assert!(config.validate().is_err());

        config.fetch.per_page = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[fetch]\nper_page = 50\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.fetch.per_page, 50);

        fs::write(&path, "[fetch]\nper_page = 500\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        assert!(Config::load_from(&path).is_err());
    }
}
