//! A [`HostSdk`] for running outside a helpdesk: templates become HTTP calls
//! to the assistant backend, the ticket comes from a JSON file and
//! notifications and editor insertions are written to the terminal.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cli::config::{BackendConfig, HttpMethod, TemplateRoute};
use crate::error::Result;
use desk_assist_core::config::TemplateNames;
use desk_assist_core::host::{
    EditorInsert, HostError, HostSdk, NotifyKind, TemplateRequest, TicketData,
};

/// The contents of a `--ticket` file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketSnapshot {
    pub ticket: TicketData,
    /// Served in place of the conversations template when present.
    #[serde(default)]
    pub conversations: Option<Value>,
}

impl TicketSnapshot {
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

pub struct HttpHost {
    client: reqwest::Client,
    backend: BackendConfig,
    api_key: Option<String>,
    snapshot: Option<TicketSnapshot>,
    templates: TemplateNames,
    editor_out: Option<PathBuf>,
    editor_lock: Mutex<()>,
}

impl HttpHost {
    pub fn new(backend: BackendConfig, templates: TemplateNames) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(backend.timeout())
            .build()?;
        Ok(Self {
            client,
            api_key: backend.api_key(),
            backend,
            snapshot: None,
            templates,
            editor_out: None,
            editor_lock: Mutex::new(()),
        })
    }

    pub fn with_ticket(mut self, snapshot: TicketSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn with_editor_out(mut self, path: PathBuf) -> Self {
        self.editor_out = Some(path);
        self
    }

    fn url(&self, route: &TemplateRoute, request: &TemplateRequest) -> Result<String, HostError> {
        let path = expand_path(&route.path, request)?;
        Ok(format!("{}{}", self.backend.base_url.trim_end_matches('/'), path))
    }

    fn write_editor(&self, insert: &EditorInsert) -> std::io::Result<()> {
        let _guard = self
            .editor_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let label = if insert.as_note { "note" } else { "reply" };
        match &self.editor_out {
            Some(path) => {
                let mut file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                writeln!(file, "<!-- {label} -->\n{}", insert.text)
            }
            None => {
                let mut stdout = std::io::stdout();
                writeln!(stdout, "\n--- {label} inserted ---\n{}", insert.text)
            }
        }
    }
}

/// Fill `{name}` segments of `path` from the request context.
pub fn expand_path(path: &str, request: &TemplateRequest) -> Result<String, HostError> {
    let mut expanded = String::with_capacity(path.len());
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let name = &rest[start + 1..start + len];
        let value = request
            .context_str(name)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| HostError::message(format!("Missing '{name}' for request path {path}")))?;
        expanded.push_str(&rest[..start]);
        expanded.push_str(&value);
        rest = &rest[start + len + 1..];
    }
    expanded.push_str(rest);
    Ok(expanded)
}

#[async_trait]
impl HostSdk for HttpHost {
    async fn invoke_template(
        &self,
        template: &str,
        request: TemplateRequest,
    ) -> Result<Value, HostError> {
        if template == self.templates.ticket_conversations
            && let Some(conversations) = self.snapshot.as_ref().and_then(|s| s.conversations.clone())
        {
            debug!(template, "Serving conversations from ticket file");
            return Ok(conversations);
        }

        let route = self
            .backend
            .route(template, &self.templates)
            .ok_or_else(|| HostError::message(format!("No backend route for template '{template}'")))?;
        let url = self.url(&route, &request)?;
        debug!(template, %url, method = ?route.method, "Invoking template");

        let mut builder = match route.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
        };
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|err| {
            warn!(template, error = %err, "Request failed");
            HostError::message(err.to_string())
        })?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| HostError::message(err.to_string()))?;

        if !status.is_success() {
            warn!(template, status = status.as_u16(), "Backend returned an error");
            return Err(HostError::with_response(status.as_u16(), text));
        }
        // The body is handed over undecoded, like a helpdesk host does.
        Ok(Value::String(text))
    }

    async fn ticket(&self) -> Result<TicketData, HostError> {
        self.snapshot
            .as_ref()
            .map(|s| s.ticket.clone())
            .ok_or_else(|| HostError::message("No ticket is open; pass --ticket <file>"))
    }

    async fn notify(&self, kind: NotifyKind, message: &str) -> Result<(), HostError> {
        let mut stderr = std::io::stderr();
        writeln!(stderr, "[{kind}] {message}").map_err(|err| HostError::message(err.to_string()))
    }

    async fn set_editor_value(&self, insert: EditorInsert) -> Result<(), HostError> {
        self.write_editor(&insert)
            .map_err(|err| HostError::message(format!("Could not write to editor: {err}")))
    }
}
