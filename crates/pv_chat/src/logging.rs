use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;

/// Log to stderr, keeping stdout free for streamed answers
pub fn setup_logging(verbose_level: u8) {
    setup_logging_with_file(verbose_level, None);
}

pub fn setup_logging_for_terminal_ui(verbose_level: u8) {
    // The terminal UI owns the screen, so logs go to a file
    let log_file_path = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("pv-chat")
        .join("terminal-ui.log");

    if let Some(parent) = log_file_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    setup_logging_with_file(verbose_level, Some(log_file_path));
}

fn filter_for(verbose_level: u8) -> &'static str {
    match verbose_level {
        0 => "warn,pv_chat=info,llm=info",
        1 => "info,pv_chat=debug,llm=debug",
        _ => "debug,pv_chat=trace,llm=trace",
    }
}

fn setup_logging_with_file(verbose_level: u8, log_file: Option<PathBuf>) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::from_default_env()
    } else {
        tracing_subscriber::EnvFilter::new(filter_for(verbose_level))
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_level(true);

    let Some(path) = log_file else {
        subscriber.with_writer(io::stderr).init();
        return;
    };

    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => {
            subscriber
                .with_writer(move || -> Box<dyn io::Write + Send> {
                    match file.try_clone() {
                        Ok(handle) => Box::new(handle),
                        Err(_) => Box::new(io::sink()),
                    }
                })
                .init();
        }
        Err(e) => {
            // Writing to stderr would draw over the terminal UI
            eprintln!("Warning: Could not open log file {path:?}, logging disabled: {e}");
            subscriber.with_writer(io::sink).init();
        }
    }
}
