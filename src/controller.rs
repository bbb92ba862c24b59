use std::time::Duration;

use ratatui::crossterm::event::{self, Event, KeyCode};
use tracing::trace;

use crate::domain::{AppConfig, Message, TabError};
use crate::model::Model;

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &AppConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, TabError> {
        if event::poll(Duration::from_millis(self.event_poll_time))?
            && let Event::Key(key) = event::read()?
            && key.kind == event::KeyEventKind::Press
        {
            // An open prompt consumes keys verbatim.
            if model.raw_keyevents() {
                return Ok(Some(Message::RawKey(key)));
            }
            return Ok(self.handle_key(key));
        }
        Ok(None)
    }

    fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Left | KeyCode::Char('h') => Some(Message::MoveColumnLeft),
            KeyCode::Right | KeyCode::Char('l') => Some(Message::MoveColumnRight),
            KeyCode::Up | KeyCode::Char('k') => Some(Message::MoveRowUp),
            KeyCode::Down | KeyCode::Char('j') => Some(Message::MoveRowDown),
            KeyCode::Enter | KeyCode::Char('s') => Some(Message::ActivateColumn),
            KeyCode::Char('f') => Some(Message::CycleFilterColumn),
            KeyCode::Char('/') => Some(Message::Search),
            KeyCode::Char('g') => Some(Message::JumpToPage),
            KeyCode::Char('p') | KeyCode::PageUp => Some(Message::PrevPage),
            KeyCode::Char('n') | KeyCode::PageDown => Some(Message::NextPage),
            KeyCode::Char('y') => Some(Message::CopyRow),
            KeyCode::Char('Y') => Some(Message::CopyCell),
            KeyCode::Char('?') => Some(Message::Help),
            KeyCode::Esc => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
