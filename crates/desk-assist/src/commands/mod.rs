use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use eyre::Result;

use crate::cli::config::CliConfig;
use crate::host::{HttpHost, TicketSnapshot};
use desk_assist_core::config::DeskConfig;
use desk_assist_core::flows::FlowServices;
use desk_assist_core::host::HostSdk;

pub mod ask;
pub mod products;
pub mod rate;
pub mod reply;

#[async_trait]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}

/// What every command runs against: the loaded config and the host.
#[derive(Clone)]
pub struct DeskApp {
    pub config: DeskConfig,
    pub host: Arc<dyn HostSdk>,
}

impl DeskApp {
    pub fn new(config: DeskConfig, host: Arc<dyn HostSdk>) -> Self {
        Self { config, host }
    }

    /// Build the HTTP-backed app from the config file and CLI options.
    pub fn connect(
        config: CliConfig,
        ticket: Option<&std::path::Path>,
        editor_out: Option<PathBuf>,
    ) -> crate::error::Result<Self> {
        let mut host = HttpHost::new(config.backend, config.desk.templates.clone())?;
        if let Some(path) = ticket {
            host = host.with_ticket(TicketSnapshot::from_path(path)?);
        }
        if let Some(path) = editor_out {
            host = host.with_editor_out(path);
        }
        Ok(Self::new(config.desk, Arc::new(host)))
    }

    pub fn services(&self) -> FlowServices {
        FlowServices::new(self.host.clone(), &self.config)
    }
}
