use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Ask the support assistant questions, and draft or summarize ticket replies.
#[derive(Parser)]
#[command(version, about, long_about = None, author)]
pub struct Cli {
    /// Path to the config file (defaults to ./.desk-assist/config.toml, then the user config dir)
    #[arg(long, env = "DESK_ASSIST_CONFIG")]
    pub config: Option<PathBuf>,

    /// JSON file with the open ticket: `{ "ticket": {...}, "conversations": [...] }`
    #[arg(long, env = "DESK_ASSIST_TICKET")]
    pub ticket: Option<PathBuf>,

    /// Write editor insertions (accepted drafts, summary notes) to this file instead of stdout
    #[arg(long, value_name = "PATH")]
    pub editor_out: Option<PathBuf>,

    /// Directory for log files (defaults to the user data dir)
    #[arg(long, hide = true)]
    pub log_dir: Option<PathBuf>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Ask a question. Without a question, read one per line from stdin.
    Ask {
        /// The question to ask
        query: Option<String>,
        /// Restrict the search to a product area (repeatable)
        #[arg(long = "product", value_name = "NAME")]
        products: Vec<String>,
        /// Send the open ticket's conversation along with the question
        #[arg(long)]
        with_ticket: bool,
        /// Add the ticket's own product area when it is in the catalog
        #[arg(long, requires = "with_ticket")]
        auto_product: bool,
    },
    /// Draft a reply to the open ticket
    Draft {
        /// Insert the finished draft into the reply editor
        #[arg(long)]
        accept: bool,
    },
    /// Summarize the open ticket
    Summarize {
        /// Add the finished summary to the ticket as a private note
        #[arg(long)]
        insert: bool,
    },
    /// List the product areas a question can be restricted to
    Products,
    /// Rate an answer from 1 (very poor) to 5 (excellent)
    Rate {
        /// Conversation id printed with the answer
        conversation_id: String,
        /// Rating between 1 and 5
        #[arg(value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: u8,
        /// Source ticket ids printed with the answer (repeatable)
        #[arg(long = "source-ticket", value_name = "ID")]
        source_tickets: Vec<String>,
    },
}
