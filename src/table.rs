use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

pub const PAGE_LENGTHS: [usize; 4] = [10, 25, 50, 100];

// Echo tokens are unique for the whole process so a grid that was torn down
// and mounted again never accepts a reply meant for its predecessor.
static NEXT_ECHO: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_echo() -> u64 {
    NEXT_ECHO.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortSpec {
    pub column: usize,
    pub direction: SortDirection,
}

/// What the table asks its data source for, once per page fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRequest {
    pub start: usize,
    pub length: usize,
    pub echo: u64,
    pub sort: Option<SortSpec>,
}

/// What the table expects back from its data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridEnvelope {
    #[serde(rename = "iTotalRecords")]
    pub total_records: usize,
    #[serde(rename = "iTotalDisplayRecords")]
    pub total_display_records: usize,
    #[serde(rename = "sEcho")]
    pub echo: u64,
    #[serde(rename = "aaData")]
    pub data: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReloadMode {
    /// Keep the current page.
    Standing,
    /// Back to the first page.
    FirstPage,
}

/// Paged table driven by a remote data source. The table keeps paging and
/// sort state, issues `GridRequest`s and only accepts the reply to the most
/// recent one.
#[derive(Debug)]
pub struct GridTable {
    headers: Vec<String>,
    start: usize,
    page_length: usize,
    sort: Option<SortSpec>,
    pending_echo: Option<u64>,
    latest_echo: u64,
    rows: Vec<Vec<Value>>,
    total: usize,
    error: Option<String>,
    curser_row: usize,
    curser_column: usize,
}

impl GridTable {
    pub fn new(headers: Vec<String>, page_length: usize) -> Self {
        Self {
            headers,
            start: 0,
            page_length: page_length.max(1),
            sort: None,
            pending_echo: None,
            latest_echo: 0,
            rows: Vec::new(),
            total: 0,
            error: None,
            curser_row: 0,
            curser_column: 0,
        }
    }

    pub fn draw(&mut self, mode: ReloadMode) -> GridRequest {
        if mode == ReloadMode::FirstPage {
            self.start = 0;
        }
        let echo = next_echo();
        self.latest_echo = echo;
        self.pending_echo = Some(echo);
        trace!(
            "Draw: start {}, length {}, sort {:?}, echo {}",
            self.start, self.page_length, self.sort, echo
        );
        GridRequest {
            start: self.start,
            length: self.page_length,
            echo,
            sort: self.sort,
        }
    }

    /// Returns false for a reply that was superseded by a newer request.
    pub fn accept(&mut self, envelope: GridEnvelope) -> bool {
        if envelope.echo != self.latest_echo {
            debug!(
                "Discarding stale page (echo {} != {})",
                envelope.echo, self.latest_echo
            );
            return false;
        }
        self.pending_echo = None;
        self.error = None;
        self.total = envelope.total_display_records;
        self.rows = envelope.data;
        self.curser_row = self.curser_row.min(self.rows.len().saturating_sub(1));
        true
    }

    pub fn fail(&mut self, echo: u64, message: String) -> bool {
        if echo != self.latest_echo {
            return false;
        }
        self.pending_echo = None;
        self.rows.clear();
        self.curser_row = 0;
        self.error = Some(message);
        true
    }

    pub fn next_page(&mut self) -> bool {
        if self.start + self.page_length < self.total {
            self.start += self.page_length;
            return true;
        }
        false
    }

    pub fn previous_page(&mut self) -> bool {
        if self.start > 0 {
            self.start = self.start.saturating_sub(self.page_length);
            return true;
        }
        false
    }

    pub fn first_page(&mut self) -> bool {
        let moved = self.start != 0;
        self.start = 0;
        moved
    }

    pub fn last_page(&mut self) -> bool {
        if self.total == 0 {
            return false;
        }
        let last = (self.total - 1) / self.page_length * self.page_length;
        let moved = last != self.start;
        self.start = last;
        moved
    }

    /// Sorts by the column under the cursor; a new order starts at page one.
    pub fn sort_current_column(&mut self, direction: SortDirection) {
        self.sort = Some(SortSpec {
            column: self.curser_column,
            direction,
        });
        self.start = 0;
    }

    pub fn cycle_page_length(&mut self) {
        let idx = PAGE_LENGTHS
            .iter()
            .position(|&l| l == self.page_length)
            .map(|i| (i + 1) % PAGE_LENGTHS.len())
            .unwrap_or(0);
        self.page_length = PAGE_LENGTHS[idx];
        self.start = 0;
    }

    pub fn set_page_length(&mut self, length: usize) {
        self.page_length = length.max(1);
        self.start = 0;
    }

    pub fn move_up(&mut self) {
        self.curser_row = self.curser_row.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.curser_row + 1 < self.rows.len() {
            self.curser_row += 1;
        }
    }

    pub fn move_left(&mut self) {
        self.curser_column = self.curser_column.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.curser_column + 1 < self.headers.len() {
            self.curser_column += 1;
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn page_length(&self) -> usize {
        self.page_length
    }

    pub fn sort(&self) -> Option<SortSpec> {
        self.sort
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn processing(&self) -> bool {
        self.pending_echo.is_some()
    }

    pub fn curser_row(&self) -> usize {
        self.curser_row
    }

    pub fn curser_column(&self) -> usize {
        self.curser_column
    }

    /// Text of a rendered cell.
    pub fn cell_text(&self, row: usize, column: usize) -> Option<String> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(cell_text)
    }

    pub fn info(&self) -> String {
        if self.rows.is_empty() {
            return format!("Showing 0 to 0 of {} entries", self.total);
        }
        format!(
            "Showing {} to {} of {} entries",
            self.start + 1,
            self.start + self.rows.len(),
            self.total
        )
    }
}

pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.replace("\r\n", " ↵ ").replace('\n', " ↵ "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> GridTable {
        GridTable::new(vec!["ID".into(), "Position".into()], 10)
    }

    fn envelope(echo: u64, total: usize, rows: usize) -> GridEnvelope {
        GridEnvelope {
            total_records: total,
            total_display_records: total,
            echo,
            data: (0..rows).map(|i| vec![json!(i), json!("x")]).collect(),
        }
    }

    #[test]
    fn late_reply_does_not_overwrite_newer_page() {
        let mut t = table();
        let first = t.draw(ReloadMode::FirstPage);
        let second = t.draw(ReloadMode::Standing);
        assert!(t.accept(envelope(second.echo, 30, 10)));
        assert!(!t.accept(envelope(first.echo, 99, 1)));
        assert_eq!(t.total(), 30);
        assert_eq!(t.rows().len(), 10);
        assert!(!t.processing());
    }

    #[test]
    fn paging_is_bounded_by_total() {
        let mut t = table();
        let req = t.draw(ReloadMode::FirstPage);
        t.accept(envelope(req.echo, 25, 10));
        assert!(t.next_page());
        assert!(t.next_page());
        assert!(!t.next_page());
        assert_eq!(t.start(), 20);
        assert!(t.first_page());
        assert!(t.last_page());
        assert_eq!(t.start(), 20);
    }

    #[test]
    fn first_page_reload_resets_offset() {
        let mut t = table();
        let req = t.draw(ReloadMode::FirstPage);
        t.accept(envelope(req.echo, 40, 10));
        t.next_page();
        assert_eq!(t.draw(ReloadMode::Standing).start, 10);
        assert_eq!(t.draw(ReloadMode::FirstPage).start, 0);
    }

    #[test]
    fn sorting_uses_cursor_column_and_restarts() {
        let mut t = table();
        let req = t.draw(ReloadMode::FirstPage);
        t.accept(envelope(req.echo, 40, 10));
        t.next_page();
        t.move_right();
        t.sort_current_column(SortDirection::Descending);
        let req = t.draw(ReloadMode::Standing);
        assert_eq!(req.start, 0);
        assert_eq!(
            req.sort,
            Some(SortSpec {
                column: 1,
                direction: SortDirection::Descending
            })
        );
    }

    #[test]
    fn failure_shows_error_page() {
        let mut t = table();
        let req = t.draw(ReloadMode::FirstPage);
        assert!(t.fail(req.echo, "connection refused".into()));
        assert_eq!(t.error(), Some("connection refused"));
        assert!(t.rows().is_empty());
    }

    #[test]
    fn page_length_cycles() {
        let mut t = table();
        t.cycle_page_length();
        assert_eq!(t.page_length(), 25);
        t.set_page_length(100);
        t.cycle_page_length();
        assert_eq!(t.page_length(), 10);
    }

    #[test]
    fn info_line() {
        let mut t = table();
        assert_eq!(t.info(), "Showing 0 to 0 of 0 entries");
        let req = t.draw(ReloadMode::FirstPage);
        t.accept(envelope(req.echo, 57, 10));
        assert_eq!(t.info(), "Showing 1 to 10 of 57 entries");
    }

    #[test]
    fn cells_render_as_text() {
        assert_eq!(cell_text(&Value::Null), "");
        assert_eq!(cell_text(&json!(7)), "7");
        assert_eq!(cell_text(&json!("a\nb")), "a ↵ b");
    }
}
