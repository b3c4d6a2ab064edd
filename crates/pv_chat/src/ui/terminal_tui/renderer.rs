use super::input::InputManager;
use super::message::{message_lines, MessageView};
use crate::conversation::{Conversation, Role};
use crate::reasoning::{classify, ParseCache};
use crate::ui::UIError;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::Position,
    prelude::*,
    widgets::{Block, Borders, Paragraph, Wrap},
    Terminal,
};
use std::io;
use std::time::Instant;

const SPINNER: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Lines moved per PageUp/PageDown
const SCROLL_STEP: u16 = 5;

/// UI-local view state that is not part of the conversation
#[derive(Debug, Default)]
pub struct ViewState {
    /// Message whose reasoning panel keyboard toggles act on
    pub selected: Option<usize>,
    /// Lines scrolled up from the bottom of the transcript
    pub scroll_offset: u16,
}

impl ViewState {
    /// Move the selection to the next (or previous) message with a reasoning panel
    pub fn select(&mut self, conversation: &Conversation, forward: bool) {
        let candidates = reasoning_targets(conversation);
        if candidates.is_empty() {
            self.selected = None;
            return;
        }
        let position = self
            .selected
            .and_then(|selected| candidates.iter().position(|index| *index == selected));
        let next = match (position, forward) {
            (None, true) => 0,
            (None, false) => candidates.len() - 1,
            (Some(position), true) => (position + 1) % candidates.len(),
            (Some(position), false) => (position + candidates.len() - 1) % candidates.len(),
        };
        self.selected = Some(candidates[next]);
    }

    /// Message a reasoning toggle should act on: the selection, else the latest candidate
    pub fn toggle_target(&self, conversation: &Conversation) -> Option<usize> {
        let candidates = reasoning_targets(conversation);
        match self.selected {
            Some(selected) if candidates.contains(&selected) => Some(selected),
            _ => candidates.last().copied(),
        }
    }

    pub fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(SCROLL_STEP);
    }

    pub fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(SCROLL_STEP);
    }

    pub fn reset(&mut self) {
        self.selected = None;
        self.scroll_offset = 0;
    }
}

/// Assistant messages that currently have reasoning to disclose
fn reasoning_targets(conversation: &Conversation) -> Vec<usize> {
    conversation
        .messages()
        .iter()
        .enumerate()
        .filter(|(_, message)| {
            message.role() == Role::Assistant && classify(message.raw_text()).thinking.is_some()
        })
        .map(|(index, _)| index)
        .collect()
}

/// Handles the terminal display and rendering using ratatui
pub struct TerminalRenderer<B: Backend> {
    pub terminal: Terminal<B>,
    /// One classification memo per message position
    caches: Vec<ParseCache>,
    started: Instant,
}

/// Type alias for the production terminal renderer
pub type ProductionTerminalRenderer = TerminalRenderer<CrosstermBackend<io::Stdout>>;

impl<B: Backend> TerminalRenderer<B> {
    pub fn with_terminal(terminal: Terminal<B>) -> Self {
        Self {
            terminal,
            caches: Vec::new(),
            started: Instant::now(),
        }
    }

    fn spinner_frame(&self) -> char {
        let index = (self.started.elapsed().as_millis() / 100) as usize % SPINNER.len();
        SPINNER[index]
    }

    /// Draw the transcript, status line and input box
    pub fn render(
        &mut self,
        conversation: &Conversation,
        view: &mut ViewState,
        input: &InputManager,
    ) -> Result<(), UIError> {
        let messages = conversation.messages();
        self.caches.resize_with(messages.len(), ParseCache::default);
        let spinner = self.spinner_frame();

        let mut lines = Vec::new();
        for (index, (message, cache)) in messages.iter().zip(self.caches.iter_mut()).enumerate() {
            let parsed = cache.get(message.raw_text(), message.is_streaming());
            let message_view = MessageView {
                expanded: conversation.is_expanded(index),
                selected: view.selected == Some(index),
                spinner: message.is_streaming().then_some(spinner),
            };
            lines.extend(message_lines(message, parsed, message_view));
        }

        let status = if conversation.is_streaming() {
            format!("{spinner} Streaming answer  Ctrl+N new chat")
        } else if messages.is_empty() {
            "Ask about PV curves, voltage stability or loadability".to_string()
        } else {
            "Tab select reasoning  Ctrl+R show/hide  PgUp/PgDn scroll".to_string()
        };

        self.terminal.draw(|f| {
            let [transcript_area, status_area, input_area] = Layout::vertical([
                Constraint::Min(1),
                Constraint::Length(1),
                Constraint::Length(3),
            ])
            .areas(f.area());

            let transcript = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });
            let total = transcript.line_count(transcript_area.width) as u16;
            let max_scroll = total.saturating_sub(transcript_area.height);
            view.scroll_offset = view.scroll_offset.min(max_scroll);
            let top = max_scroll - view.scroll_offset;
            f.render_widget(transcript.scroll((top, 0)), transcript_area);

            f.render_widget(
                Paragraph::new(status).style(Style::default().fg(Color::DarkGray)),
                status_area,
            );

            Self::render_input_area(f, input_area, input);
        })?;

        Ok(())
    }

    fn render_input_area(f: &mut Frame, area: Rect, input: &InputManager) {
        let input_block = Block::default()
            .borders(Borders::ALL)
            .title("Question (Enter=send, Ctrl+C=quit)");
        let inner_area = input_block.inner(area);

        // Keep the cursor visible by scrolling long input horizontally
        let width = inner_area.width.max(1) as usize;
        let skip = input.cursor().saturating_sub(width - 1);
        let visible: String = input.content().chars().skip(skip).take(width).collect();

        f.render_widget(Paragraph::new(visible).block(input_block), area);
        f.set_cursor_position(Position::new(
            inner_area.x + (input.cursor() - skip) as u16,
            inner_area.y,
        ));
    }
}

impl ProductionTerminalRenderer {
    pub fn new() -> Result<Self, UIError> {
        let backend = CrosstermBackend::new(io::stdout());
        Ok(Self::with_terminal(Terminal::new(backend)?))
    }
}
