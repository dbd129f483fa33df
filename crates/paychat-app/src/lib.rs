//! Terminal front end for paychat.

pub mod app;
pub mod cli;

pub use cli::{Cli, Commands};
