pub mod app;
pub mod input;
pub mod message;
pub mod renderer;

pub use app::TerminalTuiApp;
