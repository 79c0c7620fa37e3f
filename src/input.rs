use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// A key press as the session engine sees it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Backspace,
    Delete,
    Enter,
    /// Navigation, function and modifier keys
    Other,
}

impl Key {
    /// Key presses that count towards the keystroke metric: a single
    /// printable character (space included), Backspace, Delete and Enter.
    pub fn is_meaningful(&self) -> bool {
        match self {
            Key::Char(c) => !c.is_control(),
            Key::Backspace | Key::Delete | Key::Enter => true,
            Key::Other => false,
        }
    }
}

impl From<&KeyEvent> for Key {
    fn from(event: &KeyEvent) -> Self {
        if event
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
        {
            return Key::Other;
        }
        match event.code {
            KeyCode::Char(c) => Key::Char(c),
            KeyCode::Backspace => Key::Backspace,
            KeyCode::Delete => Key::Delete,
            KeyCode::Enter => Key::Enter,
            _ => Key::Other,
        }
    }
}

/// Change applied to the typed text, with text-area semantics: the caret
/// always sits at the end of the input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Edit {
    Insert(char),
    DeleteBackward,
    /// Remove the last word and the whitespace after it
    DeleteWord,
    ReplaceAll(String),
}

impl Edit {
    /// Edit produced by a key press, if any.
    pub fn from_key(event: &KeyEvent) -> Option<Edit> {
        let ctrl = event.modifiers.contains(KeyModifiers::CONTROL);
        match event.code {
            KeyCode::Backspace if ctrl => Some(Edit::DeleteWord),
            KeyCode::Char('w') if ctrl => Some(Edit::DeleteWord),
            KeyCode::Char(_) if ctrl || event.modifiers.contains(KeyModifiers::ALT) => None,
            KeyCode::Char(c) => Some(Edit::Insert(c)),
            KeyCode::Enter => Some(Edit::Insert('\n')),
            KeyCode::Backspace => Some(Edit::DeleteBackward),
            _ => None,
        }
    }

    pub fn apply(&self, current: &str) -> String {
        match self {
            Edit::Insert(c) => {
                let mut next = current.to_string();
                next.push(*c);
                next
            }
            Edit::DeleteBackward => {
                let mut next = current.to_string();
                next.pop();
                next
            }
            Edit::DeleteWord => {
                let kept = current.trim_end();
                kept.char_indices()
                    .rev()
                    .find(|(_, c)| c.is_whitespace())
                    .map(|(idx, c)| kept[..idx + c.len_utf8()].to_string())
                    .unwrap_or_default()
            }
            Edit::ReplaceAll(text) => text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn meaningful_keys() {
        assert!(Key::Char('a').is_meaningful());
        assert!(Key::Char(' ').is_meaningful());
        assert!(Key::Backspace.is_meaningful());
        assert!(Key::Delete.is_meaningful());
        assert!(Key::Enter.is_meaningful());
        assert!(!Key::Other.is_meaningful());
        assert!(!Key::Char('\u{7}').is_meaningful());
    }

    #[test]
    fn navigation_and_chords_are_not_meaningful() {
        assert_eq!(Key::from(&key(KeyCode::Left)), Key::Other);
        assert_eq!(Key::from(&key(KeyCode::Tab)), Key::Other);
        assert_eq!(Key::from(&key(KeyCode::Home)), Key::Other);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(Key::from(&ctrl_c), Key::Other);
        let shifted = KeyEvent::new(KeyCode::Char('A'), KeyModifiers::SHIFT);
        assert_eq!(Key::from(&shifted), Key::Char('A'));
    }

    #[test]
    fn edits_from_keys() {
        assert_eq!(Edit::from_key(&key(KeyCode::Char('x'))), Some(Edit::Insert('x')));
        assert_eq!(Edit::from_key(&key(KeyCode::Enter)), Some(Edit::Insert('\n')));
        assert_eq!(Edit::from_key(&key(KeyCode::Backspace)), Some(Edit::DeleteBackward));
        assert_eq!(Edit::from_key(&key(KeyCode::Delete)), None);
        assert_eq!(Edit::from_key(&key(KeyCode::Left)), None);
        let ctrl_w = KeyEvent::new(KeyCode::Char('w'), KeyModifiers::CONTROL);
        assert_eq!(Edit::from_key(&ctrl_w), Some(Edit::DeleteWord));
    }

    #[test]
    fn apply_insert_and_delete() {
        assert_eq!(Edit::Insert('t').apply("ca"), "cat");
        assert_eq!(Edit::DeleteBackward.apply("cat"), "ca");
        assert_eq!(Edit::DeleteBackward.apply(""), "");
        assert_eq!(Edit::ReplaceAll("dog".into()).apply("cat"), "dog");
    }

    #[test]
    fn apply_delete_word() {
        assert_eq!(Edit::DeleteWord.apply("the quick bro"), "the quick ");
        assert_eq!(Edit::DeleteWord.apply("the quick "), "the ");
        assert_eq!(Edit::DeleteWord.apply("single"), "");
        assert_eq!(Edit::DeleteWord.apply(""), "");
    }
}
