use super::input::{InputManager, KeyEventResult};
use super::renderer::{ProductionTerminalRenderer, ViewState};
use crate::conversation::Conversation;
use crate::ui::backend::{apply_update, spawn_request, update_channel};
use crate::ui::UIError;
use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use futures::StreamExt;
use llm::ChatClient;
use std::io::{self, IsTerminal};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Spinner refresh interval
const TICK_RATE: Duration = Duration::from_millis(100);

/// Raw mode and the alternate screen, restored on drop even when the loop fails
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self, UIError> {
        if !io::stdout().is_terminal() {
            return Err(UIError::NotATerminal);
        }
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = execute!(io::stdout(), LeaveAlternateScreen) {
            warn!("Failed to leave alternate screen: {}", e);
        }
        if let Err(e) = disable_raw_mode() {
            warn!("Failed to disable raw mode: {}", e);
        }
    }
}

pub struct TerminalTuiApp {
    client: ChatClient,
    stall_timeout: Option<Duration>,
}

impl TerminalTuiApp {
    pub fn new(client: ChatClient, stall_timeout: Option<Duration>) -> Self {
        Self {
            client,
            stall_timeout,
        }
    }

    pub async fn run(self) -> Result<()> {
        let _guard = TerminalGuard::enter()?;
        let mut renderer = ProductionTerminalRenderer::new()?;

        let mut conversation = Conversation::new();
        let mut view = ViewState::default();
        let mut input = InputManager::new();

        let (updates_tx, mut updates_rx) = update_channel();
        let mut events = EventStream::new();
        let mut ticker = tokio::time::interval(TICK_RATE);

        match self.client.endpoint() {
            Some(endpoint) => info!("Terminal UI started against {}", endpoint),
            None => info!("Terminal UI started in playback mode"),
        }

        loop {
            renderer.render(&conversation, &mut view, &input)?;

            tokio::select! {
                maybe_event = events.next() => {
                    let event = match maybe_event {
                        Some(Ok(event)) => event,
                        Some(Err(e)) => return Err(UIError::from(e).into()),
                        None => break,
                    };
                    let Event::Key(key) = event else {
                        // Resize and focus changes only need the redraw at the top of the loop
                        continue;
                    };
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }

                    match input.handle_key_event(key) {
                        KeyEventResult::Quit => break,
                        KeyEventResult::Submit(text) => {
                            if let Some(request) = conversation.submit(&text) {
                                input.clear();
                                view.scroll_offset = 0;
                                spawn_request(
                                    self.client.clone(),
                                    request,
                                    self.stall_timeout,
                                    updates_tx.clone(),
                                );
                            }
                        }
                        KeyEventResult::NewChat => {
                            conversation.new_chat();
                            view.reset();
                        }
                        KeyEventResult::ToggleReasoning => {
                            if let Some(index) = view.toggle_target(&conversation) {
                                conversation.toggle_reasoning(index);
                            }
                        }
                        KeyEventResult::SelectNext => view.select(&conversation, true),
                        KeyEventResult::SelectPrevious => view.select(&conversation, false),
                        KeyEventResult::ScrollUp => view.scroll_up(),
                        KeyEventResult::ScrollDown => view.scroll_down(),
                        KeyEventResult::Continue => {}
                    }
                }
                Some((id, update)) = updates_rx.recv() => {
                    if !apply_update(&mut conversation, id, update) {
                        debug!(
                            "Update for request {} had no effect (in flight: {:?})",
                            id,
                            conversation.in_flight_id()
                        );
                    }
                }
                _ = ticker.tick() => {}
            }
        }

        // Leave no request running behind the closed UI
        conversation.new_chat();
        debug!("Terminal UI shutting down");
        Ok(())
    }
}
