use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use dotenvy::dotenv;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use desk_assist_core::config::{ConfigPaths, DeskConfig, TemplateNames};

pub fn load_env() -> eyre::Result<()> {
    dotenv().ok();
    Ok(())
}

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_API_KEY_ENV: &str = "DESK_ASSIST_API_KEY";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

/// Where a request template is served. `{name}` segments in `path` are
/// filled from the template's context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRoute {
    pub method: HttpMethod,
    pub path: String,
}

impl TemplateRoute {
    fn new(method: HttpMethod, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
        }
    }
}

/// The `[backend]` table of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    /// Routes that replace or extend the built-in ones, keyed by template.
    pub routes: BTreeMap<String, TemplateRoute>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            routes: BTreeMap::new(),
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    /// The configured route for `template`, falling back to the built-in
    /// route of whichever request `template` names in `names`.
    pub fn route(&self, template: &str, names: &TemplateNames) -> Option<TemplateRoute> {
        if let Some(route) = self.routes.get(template) {
            return Some(route.clone());
        }
        let builtin = [
            (&names.start_query, HttpMethod::Post, "/query/start"),
            (&names.start_draft, HttpMethod::Post, "/draft-reply/start"),
            (&names.start_summarize, HttpMethod::Post, "/summarize/start"),
            (&names.task_status, HttpMethod::Get, "/tasks/{task_id}"),
            (
                &names.ticket_conversations,
                HttpMethod::Get,
                "/tickets/{ticket_id}/conversations",
            ),
            (&names.product_types, HttpMethod::Get, "/product-types"),
            (&names.rating, HttpMethod::Post, "/ratings"),
        ];
        builtin
            .into_iter()
            .find(|(name, _, _)| name.as_str() == template)
            .map(|(_, method, path)| TemplateRoute::new(method, path))
    }
}

#[derive(Deserialize, Default)]
struct BackendSection {
    #[serde(default)]
    backend: BackendConfig,
}

/// Everything the command-line client reads from the config file.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub desk: DeskConfig,
    pub backend: BackendConfig,
}

impl CliConfig {
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let desk = DeskConfig::load(explicit)?;
        let backend = match ConfigPaths::resolve(explicit) {
            Some(path) => Self::backend_from_path(&path)?,
            None => BackendConfig::default(),
        };
        if backend.base_url.trim().is_empty() {
            return Err(Error::Config("backend.base_url must not be empty".to_string()));
        }
        Ok(Self { desk, backend })
    }

    fn backend_from_path(path: &Path) -> Result<BackendConfig> {
        let contents = std::fs::read_to_string(path)?;
        let section: BackendSection = toml::from_str(&contents)?;
        Ok(section.backend)
    }
}
