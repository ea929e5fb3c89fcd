// Core desk-assist functionality without any rendering surface

pub mod catalog;
pub mod config;
pub mod context;
pub mod conversation;
pub mod editor;
pub mod error;
pub mod error_message;
pub mod flows;
pub mod history;
pub mod host;
pub mod rating;
pub mod response;
pub mod task;
pub mod test_utils;
pub mod utils;
pub mod view;

pub use error::{Error, Result};
