use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 150;
pub const DEFAULT_HISTORY_WINDOW: usize = 4;

/// Names of the request templates configured in the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateNames {
    pub start_query: String,
    pub start_draft: String,
    pub start_summarize: String,
    pub task_status: String,
    pub ticket_conversations: String,
    pub product_types: String,
    pub rating: String,
}

impl Default for TemplateNames {
    fn default() -> Self {
        Self {
            start_query: "startQuery".to_string(),
            start_draft: "startDraftReply".to_string(),
            start_summarize: "startSummarize".to_string(),
            task_status: "getTaskStatus".to_string(),
            ticket_conversations: "getTicketConversations".to_string(),
            product_types: "getProductTypes".to_string(),
            rating: "postRating".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    pub poll_interval_ms: u64,
    /// How many of the most recent chat turns accompany a query.
    pub history_window: usize,
    pub templates: TemplateNames,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            history_window: DEFAULT_HISTORY_WINDOW,
            templates: TemplateNames::default(),
        }
    }
}

impl DeskConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents).map_err(|err| match err {
            Error::Configuration(msg) => {
                Error::Configuration(format!("{msg} ({})", path.display()))
            }
            other => other,
        })
    }

    /// Load the config from an explicit path, or the first discovered file.
    /// Falls back to defaults when nothing exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match ConfigPaths::resolve(explicit) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading desk-assist config");
                Self::from_path(&path)
            }
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::Configuration(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Standard config locations.
///
/// - Project-level: ./.desk-assist/config.toml
/// - User-level: OS-specific config dir
pub struct ConfigPaths;

impl ConfigPaths {
    pub fn project_config() -> PathBuf {
        PathBuf::from(".desk-assist").join("config.toml")
    }

    pub fn user_config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "desk-assist").map(|d| d.config_dir().to_path_buf())
    }

    pub fn user_data_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "desk-assist").map(|d| d.data_dir().to_path_buf())
    }

    /// Project config first, then user config.
    pub fn discover() -> Vec<PathBuf> {
        let mut paths = vec![Self::project_config()];
        if let Some(dir) = Self::user_config_dir() {
            paths.push(dir.join("config.toml"));
        }
        paths
    }

    /// The config file to read: `explicit` if given, otherwise the first
    /// discovered file that exists.
    pub fn resolve(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        Self::discover().into_iter().find(|path| path.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_reference_behavior() {
        let config = DeskConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(150));
        assert_eq!(config.history_window, 4);
        assert_eq!(config.templates.task_status, "getTaskStatus");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = DeskConfig::from_toml_str(
            r#"
poll_interval_ms = 500

[templates]
start_query = "askAssistant"
"#,
        )
        .unwrap();

        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.history_window, DEFAULT_HISTORY_WINDOW);
        assert_eq!(config.templates.start_query, "askAssistant");
        assert_eq!(config.templates.start_draft, "startDraftReply");
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = DeskConfig::from_toml_str("poll_interval_ms = 0").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn explicit_path_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "history_window = 2").unwrap();

        let config = DeskConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.history_window, 2);
    }

    #[test]
    fn unparsable_file_names_the_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "history_window = \"many\"").unwrap();

        let err = DeskConfig::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn project_config_is_discovered_first() {
        let paths = ConfigPaths::discover();
        assert_eq!(paths[0], PathBuf::from(".desk-assist/config.toml"));
    }
}
