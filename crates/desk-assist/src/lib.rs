pub mod cli;
pub mod commands;
pub mod error;
pub mod host;
pub mod terminal;

pub use desk_assist_core::{config, flows, view};
