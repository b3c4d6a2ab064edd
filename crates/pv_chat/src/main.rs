mod cli;
mod conversation;
mod formatting;
mod logging;
mod reasoning;
mod settings;
mod ui;

#[cfg(test)]
mod conversation_tests;
#[cfg(test)]
mod test_utils;

use crate::cli::{Args, Mode};
use crate::ui::terminal::run_ask;
use crate::ui::terminal_tui::TerminalTuiApp;
use anyhow::{Context, Result};
use llm::{APIRecorder, ChatClient, PlaybackState};
use tracing::info;

fn create_client(args: &Args, endpoint: String) -> Result<ChatClient> {
    if let Some(path) = &args.playback {
        let playback = PlaybackState::from_file(path, args.fast_playback)
            .with_context(|| format!("Failed to load recording {}", path.display()))?;
        if playback.session_count() == 0 {
            anyhow::bail!("Recording file contains no sessions");
        }
        info!(
            "Playing back {} recorded sessions from {}",
            playback.session_count(),
            path.display()
        );
        return Ok(ChatClient::from_playback(playback));
    }

    match &args.record {
        Some(path) => {
            info!("Recording responses to {}", path.display());
            Ok(ChatClient::new_with_recorder(endpoint, APIRecorder::new(path)))
        }
        None => Ok(ChatClient::new(endpoint)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match &args.mode {
        Some(Mode::Ask { .. }) => logging::setup_logging(args.verbose),
        None => logging::setup_logging_for_terminal_ui(args.verbose),
    }

    let settings = settings::get_settings();
    let endpoint = settings::resolve_endpoint(args.endpoint.as_deref(), settings);
    let client = create_client(&args, endpoint).context("Failed to initialize chat client")?;

    match &args.mode {
        Some(Mode::Ask { question }) => run_ask(client, question, settings.stall_timeout()).await,
        None => {
            TerminalTuiApp::new(client, settings.stall_timeout())
                .run()
                .await
        }
    }
}
