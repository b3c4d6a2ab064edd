use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum Mode {
    /// Stream a single answer to stdout and exit
    Ask {
        /// Question to send
        question: String,
    },
}

/// Chat with the PV-curve assistant
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub mode: Option<Mode>,

    /// Streaming chat endpoint (overrides PV_CHAT_ENDPOINT and the settings file)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Enable verbose logging (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Record streamed responses to a file
    #[arg(long, conflicts_with = "playback")]
    pub record: Option<PathBuf>,

    /// Play back recorded responses from a file instead of contacting the endpoint
    #[arg(long)]
    pub playback: Option<PathBuf>,

    /// Fast playback mode - ignore chunk timing when playing recordings
    #[arg(long)]
    pub fast_playback: bool,
}

impl Args {
    pub fn parse() -> Self {
        <Args as Parser>::parse()
    }
}
