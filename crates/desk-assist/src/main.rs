use clap::Parser;
use eyre::Result;

use desk_assist::cli::config::{CliConfig, load_env};
use desk_assist::cli::{Cli, Commands};
use desk_assist::commands::{
    Command, DeskApp, ask::AskCommand, products::ProductsCommand, rate::RateCommand,
    reply::ReplyCommand,
};
use desk_assist_core::view::ReplyTask;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    // Install color-eyre for better error reports
    color_eyre::install()?;

    let cli = Cli::parse();

    // Load .env file if it exists
    load_env()?;

    // Initialize tracing (level configured via RUST_LOG env var)
    desk_assist_core::utils::tracing::init_tracing(cli.log_dir.as_deref())?;

    let config = CliConfig::load(cli.config.as_deref())?;
    debug!(
        base_url = %config.backend.base_url,
        poll_interval_ms = config.desk.poll_interval_ms,
        "Loaded configuration"
    );
    let has_ticket = cli.ticket.is_some();
    let app = DeskApp::connect(config, cli.ticket.as_deref(), cli.editor_out.clone())?;

    let command: Box<dyn Command> = match cli.command {
        Commands::Ask {
            query,
            products,
            with_ticket,
            auto_product,
        } => Box::new(AskCommand {
            app,
            query,
            products,
            with_ticket,
            auto_product,
        }),
        Commands::Draft { accept } => Box::new(ReplyCommand {
            app,
            task: ReplyTask::Draft,
            insert: accept,
        }),
        Commands::Summarize { insert } => Box::new(ReplyCommand {
            app,
            task: ReplyTask::Summary,
            insert,
        }),
        Commands::Products => Box::new(ProductsCommand {
            app,
            mark_ticket: has_ticket,
        }),
        Commands::Rate {
            conversation_id,
            rating,
            source_tickets,
        } => Box::new(RateCommand {
            app,
            conversation_id,
            rating,
            source_tickets,
        }),
    };

    command.execute().await
}
