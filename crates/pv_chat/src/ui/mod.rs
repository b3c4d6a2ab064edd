pub mod backend;
pub mod terminal;
pub mod terminal_tui;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UIError {
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("The terminal UI needs an interactive terminal; use `pv-chat ask` instead")]
    NotATerminal,
}
