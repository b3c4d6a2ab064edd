use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// What the app should do in response to a key press
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEventResult {
    Continue,
    Quit,
    /// Enter was pressed with this input content
    Submit(String),
    NewChat,
    ToggleReasoning,
    SelectPrevious,
    SelectNext,
    ScrollUp,
    ScrollDown,
}

/// Single-line input buffer with a character cursor
#[derive(Debug, Default)]
pub struct InputManager {
    content: String,
    /// Cursor position in characters
    cursor: usize,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_key_event(&mut self, key_event: KeyEvent) -> KeyEventResult {
        let control = key_event.modifiers.contains(KeyModifiers::CONTROL);
        match key_event.code {
            KeyCode::Char('c') if control => KeyEventResult::Quit,
            KeyCode::Char('n') if control => KeyEventResult::NewChat,
            KeyCode::Char('r') if control => KeyEventResult::ToggleReasoning,
            KeyCode::Enter => KeyEventResult::Submit(self.content.clone()),
            KeyCode::Tab => KeyEventResult::SelectNext,
            KeyCode::BackTab => KeyEventResult::SelectPrevious,
            KeyCode::PageUp => KeyEventResult::ScrollUp,
            KeyCode::PageDown => KeyEventResult::ScrollDown,
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    let at = self.byte_offset(self.cursor);
                    self.content.remove(at);
                }
                KeyEventResult::Continue
            }
            KeyCode::Delete => {
                if self.cursor < self.char_count() {
                    let at = self.byte_offset(self.cursor);
                    self.content.remove(at);
                }
                KeyEventResult::Continue
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                KeyEventResult::Continue
            }
            KeyCode::Right => {
                self.cursor = (self.cursor + 1).min(self.char_count());
                KeyEventResult::Continue
            }
            KeyCode::Home => {
                self.cursor = 0;
                KeyEventResult::Continue
            }
            KeyCode::End => {
                self.cursor = self.char_count();
                KeyEventResult::Continue
            }
            KeyCode::Char(ch) if !control => {
                let at = self.byte_offset(self.cursor);
                self.content.insert(at, ch);
                self.cursor += 1;
                KeyEventResult::Continue
            }
            _ => KeyEventResult::Continue,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.cursor = 0;
    }

    fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    fn byte_offset(&self, char_index: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_index)
            .map(|(offset, _)| offset)
            .unwrap_or(self.content.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState};

    fn create_key_event(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn type_text(input: &mut InputManager, text: &str) {
        for ch in text.chars() {
            input.handle_key_event(create_key_event(KeyCode::Char(ch), KeyModifiers::NONE));
        }
    }

    #[test]
    fn test_input_manager_basic_operations() {
        let mut input = InputManager::new();
        assert_eq!(input.content(), "");

        type_text(&mut input, "hi");
        assert_eq!(input.content(), "hi");
        assert_eq!(input.cursor(), 2);

        let result = input.handle_key_event(create_key_event(KeyCode::Enter, KeyModifiers::NONE));
        assert_eq!(result, KeyEventResult::Submit("hi".to_string()));

        // The app decides whether the submission was accepted before clearing
        assert_eq!(input.content(), "hi");
        input.clear();
        assert_eq!(input.content(), "");
        assert_eq!(input.cursor(), 0);
    }

    #[test]
    fn test_control_shortcuts() {
        let mut input = InputManager::new();
        let cases = [
            ('c', KeyEventResult::Quit),
            ('n', KeyEventResult::NewChat),
            ('r', KeyEventResult::ToggleReasoning),
        ];
        for (ch, expected) in cases {
            let result =
                input.handle_key_event(create_key_event(KeyCode::Char(ch), KeyModifiers::CONTROL));
            assert_eq!(result, expected);
        }
        assert_eq!(input.content(), "");
    }

    #[test]
    fn test_navigation_keys() {
        let mut input = InputManager::new();
        assert_eq!(
            input.handle_key_event(create_key_event(KeyCode::Tab, KeyModifiers::NONE)),
            KeyEventResult::SelectNext
        );
        assert_eq!(
            input.handle_key_event(create_key_event(KeyCode::BackTab, KeyModifiers::SHIFT)),
            KeyEventResult::SelectPrevious
        );
        assert_eq!(
            input.handle_key_event(create_key_event(KeyCode::PageUp, KeyModifiers::NONE)),
            KeyEventResult::ScrollUp
        );
    }

    #[test]
    fn test_cursor_editing_with_multibyte_text() {
        let mut input = InputManager::new();
        type_text(&mut input, "ΔV=0");

        input.handle_key_event(create_key_event(KeyCode::Left, KeyModifiers::NONE));
        input.handle_key_event(create_key_event(KeyCode::Left, KeyModifiers::NONE));
        input.handle_key_event(create_key_event(KeyCode::Backspace, KeyModifiers::NONE));
        assert_eq!(input.content(), "Δ=0");

        input.handle_key_event(create_key_event(KeyCode::Home, KeyModifiers::NONE));
        input.handle_key_event(create_key_event(KeyCode::Delete, KeyModifiers::NONE));
        assert_eq!(input.content(), "=0");

        type_text(&mut input, "λ");
        input.handle_key_event(create_key_event(KeyCode::End, KeyModifiers::NONE));
        type_text(&mut input, "!");
        assert_eq!(input.content(), "λ=0!");
        assert_eq!(input.cursor(), 4);
    }
}
