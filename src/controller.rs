use std::time::Duration;
use tracing::trace;

use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent};

use crate::config::AdminConfig;
use crate::domain::{AdminError, Message};
use crate::model::Model;
use crate::navigation::ViewId;

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &AdminConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, AdminError> {
        if !event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                if model.raw_keyevents() {
                    return Ok(Some(Message::RawKey(key)));
                }
                Ok(self.handle_key(key))
            }
            Event::Resize(width, height) => Ok(Some(Message::Resize(width as usize, height as usize))),
            _ => Ok(None),
        }
    }

    fn handle_key(&self, key: KeyEvent) -> Option<Message> {
        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Char('?') => Some(Message::Help),
            KeyCode::Esc => Some(Message::Exit),
            KeyCode::Enter | KeyCode::Char(' ') => Some(Message::Enter),
            KeyCode::Char('y') => Some(Message::Confirm),
            KeyCode::Char(c @ '1'..='4') => {
                let idx = c as usize - '1' as usize;
                ViewId::ALL.get(idx).copied().map(Message::SelectView)
            }
            KeyCode::Tab => Some(Message::NextView),
            KeyCode::BackTab => Some(Message::PreviousView),
            KeyCode::Char('r') => Some(Message::Refresh),
            KeyCode::Char('j') | KeyCode::Down => Some(Message::MoveDown),
            KeyCode::Char('k') | KeyCode::Up => Some(Message::MoveUp),
            KeyCode::Char('h') | KeyCode::Left => Some(Message::MoveLeft),
            KeyCode::Char('l') | KeyCode::Right => Some(Message::MoveRight),
            KeyCode::Char('n') | KeyCode::PageDown => Some(Message::NextPage),
            KeyCode::Char('p') | KeyCode::PageUp => Some(Message::PreviousPage),
            KeyCode::Char('g') | KeyCode::Home => Some(Message::FirstPage),
            KeyCode::Char('G') | KeyCode::End => Some(Message::LastPage),
            KeyCode::Char('s') => Some(Message::SortAscending),
            KeyCode::Char('S') => Some(Message::SortDescending),
            KeyCode::Char('L') => Some(Message::CyclePageLength),
            KeyCode::Char('d') => Some(Message::Delete),
            KeyCode::Char('u') => Some(Message::Upload),
            KeyCode::Char('a') => Some(Message::New),
            KeyCode::Char('e') => Some(Message::Edit),
            KeyCode::Char(':') => Some(Message::EnterCommand),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
