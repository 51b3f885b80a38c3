use std::fmt;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::domain::AdminError;

/// The mutually exclusive top level screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewId {
    Logs,
    Scans,
    Ead,
    Archives,
}

impl ViewId {
    pub const ALL: [ViewId; 4] = [ViewId::Logs, ViewId::Scans, ViewId::Ead, ViewId::Archives];

    /// Label shown on the navigation tab. Also the name accepted by `view <label>`.
    pub fn label(self) -> &'static str {
        match self {
            ViewId::Logs => "Logs",
            ViewId::Scans => "Scans",
            ViewId::Ead => "EAD",
            ViewId::Archives => "Archives",
        }
    }

    pub fn from_label(label: &str) -> Option<ViewId> {
        ViewId::ALL.into_iter().find(|v| v.label() == label)
    }

    pub fn position(self) -> usize {
        ViewId::ALL
            .iter()
            .position(|&v| v == self)
            .unwrap_or_default()
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ViewId {
    type Err = AdminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViewId::from_label(s.trim()).ok_or_else(|| AdminError::InvalidView(s.to_string()))
    }
}

/// Change notification emitted by every accepted selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub from: Option<ViewId>,
    pub to: ViewId,
}

impl Transition {
    pub fn is_refresh(&self) -> bool {
        self.from == Some(self.to)
    }
}

/// Holds the one current view. Every selection, including re-selecting
/// the current view, yields exactly one `Transition`.
#[derive(Debug, Default)]
pub struct Navigation {
    current: Option<ViewId>,
    transitions: u64,
}

impl Navigation {
    pub fn current(&self) -> Option<ViewId> {
        self.current
    }

    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    pub fn select(&mut self, view: ViewId) -> Transition {
        let transition = Transition {
            from: self.current,
            to: view,
        };
        self.current = Some(view);
        self.transitions += 1;
        debug!("Navigation {:?} -> {}", transition.from, view);
        transition
    }

    /// Selection by tab label; unknown labels leave the state untouched.
    pub fn select_label(&mut self, label: &str) -> Option<Transition> {
        match ViewId::from_label(label) {
            Some(view) => Some(self.select(view)),
            None => {
                trace!("Ignoring unknown view '{label}'");
                None
            }
        }
    }

    pub fn next(&mut self) -> Transition {
        let idx = self.current.map(|v| v.position() + 1).unwrap_or(0);
        self.select(ViewId::ALL[idx % ViewId::ALL.len()])
    }

    pub fn previous(&mut self) -> Transition {
        let len = ViewId::ALL.len();
        let idx = self.current.map(|v| v.position() + len - 1).unwrap_or(0);
        self.select(ViewId::ALL[idx % len])
    }

    /// Re-runs the handler of the current view, if any.
    pub fn refresh(&mut self) -> Option<Transition> {
        self.current.map(|v| self.select(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unset() {
        let nav = Navigation::default();
        assert_eq!(nav.current(), None);
        assert_eq!(nav.transitions(), 0);
    }

    #[test]
    fn reselecting_emits_a_transition() {
        let mut nav = Navigation::default();
        nav.select(ViewId::Scans);
        let t = nav.select(ViewId::Scans);
        assert!(t.is_refresh());
        assert_eq!(nav.transitions(), 2);
    }

    #[test]
    fn unknown_label_is_ignored() {
        let mut nav = Navigation::default();
        nav.select(ViewId::Logs);
        assert!(nav.select_label("Reports").is_none());
        assert_eq!(nav.current(), Some(ViewId::Logs));
        assert_eq!(nav.transitions(), 1);
    }

    #[test]
    fn labels_match_tabs() {
        assert_eq!(ViewId::from_label("EAD"), Some(ViewId::Ead));
        assert_eq!(ViewId::from_label("ead"), None);
        assert!("Archives".parse::<ViewId>().is_ok());
        assert!("Nope".parse::<ViewId>().is_err());
    }

    #[test]
    fn next_and_previous_wrap() {
        let mut nav = Navigation::default();
        nav.select(ViewId::Archives);
        assert_eq!(nav.next().to, ViewId::Logs);
        assert_eq!(nav.previous().to, ViewId::Archives);
    }
}
