use ratatui::crossterm::event::{KeyCode, KeyEvent};
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::backend::{ApiCall, ApiFailure};
use crate::grid::{Column, ListResponse};
use crate::inputter::Inputter;
use crate::table::{cell_text, next_echo};

pub type ArchiveRecord = Map<String, Value>;

/// Editable archive fields, in form order.
pub const ARCHIVE_FIELDS: [&str; 5] = [
    "archive",
    "archive_description",
    "country_code",
    "institution",
    "institution_description",
];

pub const ARCHIVE_COLUMNS: [Column; 5] = [
    Column::new("ID", "id"),
    Column::new("Country", "country_code"),
    Column::new("Institution", "institution"),
    Column::new("Archive", "archive"),
    Column::new("Description", "archive_description"),
];

/// Shared create/edit form. An `original_id` turns the submission into an update.
#[derive(Debug, Clone)]
pub struct ArchiveForm {
    pub fields: Vec<(&'static str, Inputter)>,
    pub original_id: Option<String>,
    pub focus: usize,
    pub error: Option<String>,
}

impl ArchiveForm {
    pub fn blank() -> Self {
        Self {
            fields: ARCHIVE_FIELDS
                .iter()
                .map(|&name| (name, Inputter::default()))
                .collect(),
            original_id: None,
            focus: 0,
            error: None,
        }
    }

    pub fn populated(record: &ArchiveRecord) -> Self {
        let mut form = Self::blank();
        for (name, input) in form.fields.iter_mut() {
            if let Some(value) = record.get(*name) {
                input.set(&cell_text(value));
            }
        }
        form.original_id = record.get("id").map(cell_text).filter(|id| !id.is_empty());
        form
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, input)| input.value())
    }

    pub fn next_field(&mut self) {
        self.focus = (self.focus + 1) % self.fields.len();
    }

    pub fn previous_field(&mut self) {
        self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
    }

    pub fn submission(&self) -> ApiCall {
        ApiCall::SaveArchive {
            id: self.original_id.clone(),
            fields: self
                .fields
                .iter()
                .map(|(name, input)| (name.to_string(), input.value().to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ArchiveModal {
    Edit(ArchiveForm),
    ConfirmDelete { id: String, error: Option<String> },
}

#[derive(Debug, PartialEq)]
pub enum FormKey {
    Edited,
    Submit,
    Cancel,
}

/// List, selection and modal create/edit/delete of archives.
#[derive(Debug, Default)]
pub struct ArchiveWorkflow {
    items: Vec<ArchiveRecord>,
    curser_row: usize,
    selected_row: Option<usize>,
    selected: Option<ArchiveRecord>,
    loading: bool,
    list_error: Option<String>,
    modal: Option<ArchiveModal>,
    close_after_refresh: bool,
    list_echo: u64,
    submitting: bool,
}

impl ArchiveWorkflow {
    /// Only the reply to the latest list call is rendered.
    pub fn activate(&mut self) -> ApiCall {
        self.loading = true;
        self.list_echo = next_echo();
        ApiCall::ListArchives {
            echo: self.list_echo,
        }
    }

    pub fn items(&self) -> &[ArchiveRecord] {
        &self.items
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn list_error(&self) -> Option<&str> {
        self.list_error.as_deref()
    }

    pub fn curser_row(&self) -> usize {
        self.curser_row
    }

    pub fn selected_row(&self) -> Option<usize> {
        self.selected_row
    }

    pub fn selected(&self) -> Option<&ArchiveRecord> {
        self.selected.as_ref()
    }

    pub fn modal(&self) -> Option<&ArchiveModal> {
        self.modal.as_ref()
    }

    /// Edit and delete are only available with a selected row.
    pub fn actions_enabled(&self) -> bool {
        self.selected.is_some()
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        self.items
            .iter()
            .map(|record| {
                ARCHIVE_COLUMNS
                    .iter()
                    .map(|c| record.get(c.field).map(cell_text).unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    /// Every re-render drops the selection. Returns false for a superseded reply.
    pub fn on_list_reply(&mut self, echo: u64, outcome: Result<Value, ApiFailure>) -> bool {
        if echo != self.list_echo {
            debug!("Discarding stale archive list (echo {echo} != {})", self.list_echo);
            return false;
        }
        self.loading = false;
        self.selected = None;
        self.selected_row = None;
        let parsed = outcome.and_then(|value| {
            serde_json::from_value::<ListResponse>(value)
                .map_err(|e| ApiFailure::Transport(format!("unexpected list response: {e}")))
        });
        match parsed {
            Ok(list) => {
                debug!("Loaded {} archives", list.results.len());
                self.items = list.results;
                self.list_error = None;
                self.curser_row = self.curser_row.min(self.items.len().saturating_sub(1));
            }
            Err(failure) => {
                warn!("Loading archives failed: {failure}");
                self.items.clear();
                self.curser_row = 0;
                self.list_error = Some(failure.describe("\n"));
            }
        }
        if self.close_after_refresh {
            self.close_after_refresh = false;
            self.modal = None;
        }
        true
    }

    pub fn move_up(&mut self) {
        self.curser_row = self.curser_row.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.curser_row + 1 < self.items.len() {
            self.curser_row += 1;
        }
    }

    /// Selecting a row replaces any earlier selection.
    pub fn select_current(&mut self) {
        if let Some(record) = self.items.get(self.curser_row) {
            trace!("Selected archive row {}", self.curser_row);
            self.selected = Some(record.clone());
            self.selected_row = Some(self.curser_row);
        }
    }

    pub fn open_new(&mut self) {
        self.modal = Some(ArchiveModal::Edit(ArchiveForm::blank()));
    }

    pub fn open_edit(&mut self) -> bool {
        match &self.selected {
            Some(record) => {
                self.modal = Some(ArchiveModal::Edit(ArchiveForm::populated(record)));
                true
            }
            None => false,
        }
    }

    pub fn open_delete(&mut self) -> bool {
        let id = self
            .selected
            .as_ref()
            .and_then(|record| record.get(ARCHIVE_COLUMNS[0].field))
            .map(cell_text);
        match id {
            Some(id) => {
                self.modal = Some(ArchiveModal::ConfirmDelete { id, error: None });
                true
            }
            None => false,
        }
    }

    pub fn cancel(&mut self) {
        self.modal = None;
        self.close_after_refresh = false;
        self.submitting = false;
    }

    pub fn submitting(&self) -> bool {
        self.submitting
    }

    pub fn form_mut(&mut self) -> Option<&mut ArchiveForm> {
        match &mut self.modal {
            Some(ArchiveModal::Edit(form)) => Some(form),
            _ => None,
        }
    }

    pub fn handle_form_key(&mut self, key: KeyEvent) -> FormKey {
        let Some(form) = self.form_mut() else {
            return FormKey::Cancel;
        };
        match key.code {
            KeyCode::Esc => FormKey::Cancel,
            KeyCode::Enter => FormKey::Submit,
            KeyCode::Tab | KeyCode::Down => {
                form.next_field();
                FormKey::Edited
            }
            KeyCode::BackTab | KeyCode::Up => {
                form.previous_field();
                FormKey::Edited
            }
            _ => {
                let focus = form.focus;
                if let Some((_, input)) = form.fields.get_mut(focus) {
                    input.read(key);
                }
                FormKey::Edited
            }
        }
    }

    /// The call for the open modal: save for the form, delete for the confirmation.
    /// Nothing is sent while an earlier submission is unanswered.
    pub fn submit(&mut self) -> Option<ApiCall> {
        if self.submitting {
            trace!("Archive mutation in flight, ignoring submit");
            return None;
        }
        let call = match &self.modal {
            Some(ArchiveModal::Edit(form)) => form.submission(),
            Some(ArchiveModal::ConfirmDelete { id, .. }) => ApiCall::DeleteArchive { id: id.clone() },
            None => return None,
        };
        self.submitting = true;
        Some(call)
    }

    /// A successful mutation refetches the list and closes the modal once it
    /// arrived. A failure keeps the modal open with the backend's messages.
    pub fn on_mutation_reply(&mut self, outcome: Result<Value, ApiFailure>) -> Option<ApiCall> {
        self.submitting = false;
        match outcome {
            Ok(_) => {
                self.close_after_refresh = true;
                Some(self.activate())
            }
            Err(failure) => {
                let text = failure.describe("\n");
                match &mut self.modal {
                    Some(ArchiveModal::Edit(form)) => form.error = Some(text),
                    Some(ArchiveModal::ConfirmDelete { error, .. }) => *error = Some(text),
                    None => warn!("Archive mutation failed without open modal: {text}"),
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyModifiers;
    use serde_json::json;

    fn listing() -> Value {
        json!({
            "total_results": 2,
            "results": [
                {"id": 7, "archive": "K.66a", "country_code": "ID", "institution": "ID-ANRI",
                 "archive_description": "Hoge Regering", "institution_description": "Arsip Nasional"},
                {"id": 9, "archive": "1.04.02", "country_code": "NL", "institution": "NL-HaNA"}
            ]
        })
    }

    fn loaded() -> ArchiveWorkflow {
        let mut wf = ArchiveWorkflow::default();
        let echo = list_echo(wf.activate());
        assert!(wf.on_list_reply(echo, Ok(listing())));
        wf
    }

    fn list_echo(call: ApiCall) -> u64 {
        match call {
            ApiCall::ListArchives { echo } => echo,
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[test]
    fn selection_enables_actions_and_replaces_previous() {
        let mut wf = loaded();
        assert!(!wf.actions_enabled());
        assert!(!wf.open_edit());
        wf.select_current();
        wf.move_down();
        wf.select_current();
        assert_eq!(wf.selected_row(), Some(1));
        assert_eq!(wf.selected().and_then(|r| r.get("id")), Some(&json!(9)));
    }

    #[test]
    fn rerender_clears_selection() {
        let mut wf = loaded();
        wf.select_current();
        let echo = list_echo(wf.activate());
        wf.on_list_reply(echo, Ok(listing()));
        assert!(wf.selected().is_none());
        assert!(!wf.actions_enabled());
    }

    #[test]
    fn edit_prefills_and_updates() {
        let mut wf = loaded();
        wf.select_current();
        assert!(wf.open_edit());
        let form = wf.form_mut().unwrap();
        assert_eq!(form.value("institution"), Some("ID-ANRI"));
        assert_eq!(form.original_id.as_deref(), Some("7"));
        match wf.submit() {
            Some(ApiCall::SaveArchive { id, fields }) => {
                assert_eq!(id.as_deref(), Some("7"));
                assert_eq!(fields.len(), ARCHIVE_FIELDS.len());
                assert!(fields.iter().all(|(k, _)| k != "id" && k != "original_id"));
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[test]
    fn new_form_creates() {
        let mut wf = loaded();
        wf.open_new();
        wf.handle_form_key(KeyEvent::new(KeyCode::Char('X'), KeyModifiers::SHIFT));
        wf.handle_form_key(KeyEvent::new(KeyCode::Tab, KeyModifiers::NONE));
        wf.handle_form_key(KeyEvent::new(KeyCode::Char('y'), KeyModifiers::NONE));
        assert_eq!(
            wf.handle_form_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)),
            FormKey::Submit
        );
        match wf.submit() {
            Some(ApiCall::SaveArchive { id: None, fields }) => {
                assert_eq!(fields[0], ("archive".to_string(), "X".to_string()));
                assert_eq!(fields[1], ("archive_description".to_string(), "y".to_string()));
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[test]
    fn delete_success_refetches_then_closes() {
        let mut wf = loaded();
        wf.select_current();
        assert!(wf.open_delete());
        assert_eq!(wf.submit(), Some(ApiCall::DeleteArchive { id: "7".into() }));
        let echo = list_echo(wf.on_mutation_reply(Ok(Value::Null)).unwrap());
        assert!(wf.modal().is_some());
        wf.on_list_reply(echo, Ok(listing()));
        assert!(wf.modal().is_none());
    }

    #[test]
    fn repeated_submit_waits_for_the_reply() {
        let mut wf = loaded();
        wf.select_current();
        wf.open_delete();
        assert!(wf.submit().is_some());
        assert!(wf.submit().is_none());
        assert!(wf.submitting());
        let failure = ApiFailure::Rejected {
            status: 400,
            body: r#"{"errors":[{"description":"in use"}]}"#.into(),
        };
        wf.on_mutation_reply(Err(failure));
        assert_eq!(wf.submit(), Some(ApiCall::DeleteArchive { id: "7".into() }));
    }

    #[test]
    fn superseded_list_reply_is_ignored() {
        let mut wf = loaded();
        let first = list_echo(wf.activate());
        let second = list_echo(wf.activate());
        let empty = json!({"total_results": 0, "results": []});
        assert!(!wf.on_list_reply(first, Ok(empty)));
        assert!(wf.loading());
        assert!(wf.on_list_reply(second, Ok(listing())));
        assert_eq!(wf.items().len(), 2);
    }

    #[test]
    fn delete_failure_keeps_modal_open() {
        let mut wf = loaded();
        wf.select_current();
        wf.open_delete();
        let failure = ApiFailure::Rejected {
            status: 400,
            body: r#"{"errors":[{"description":"in use"}]}"#.into(),
        };
        assert!(wf.on_mutation_reply(Err(failure)).is_none());
        match wf.modal() {
            Some(ArchiveModal::ConfirmDelete { error, .. }) => {
                assert_eq!(error.as_deref(), Some("in use"))
            }
            other => panic!("unexpected modal {other:?}"),
        }
    }

    #[test]
    fn save_failure_with_html_body_shows_raw_text() {
        let mut wf = loaded();
        wf.open_new();
        let failure = ApiFailure::Rejected {
            status: 500,
            body: "Internal Server Error".into(),
        };
        wf.on_mutation_reply(Err(failure));
        assert_eq!(
            wf.form_mut().and_then(|f| f.error.clone()).as_deref(),
            Some("Internal Server Error")
        );
    }

    #[test]
    fn rows_follow_column_order() {
        let wf = loaded();
        assert_eq!(wf.rows()[1], vec!["9", "NL", "NL-HaNA", "1.04.02", ""]);
    }
}
