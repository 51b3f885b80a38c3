use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::backend::{ApiCall, ApiFailure};
use crate::navigation::ViewId;
use crate::table::{GridEnvelope, GridRequest, GridTable, ReloadMode, SortDirection};

/// One displayed column: header label and the backend field it reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    pub label: &'static str,
    pub field: &'static str,
}

impl Column {
    pub const fn new(label: &'static str, field: &'static str) -> Self {
        Self { label, field }
    }
}

/// What a list endpoint can honour. Nothing is sent that the endpoint lacks.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Capabilities {
    pub supports_paging: bool,
    pub supports_descending_sort: bool,
}

/// Backend list envelope, paged or not.
#[derive(Debug, Default, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub total_results: usize,
    #[serde(default)]
    pub results: Vec<Map<String, Value>>,
}

/// Translates a table request into the backend's query parameters.
pub fn build_query(
    caps: Capabilities,
    columns: &[Column],
    request: &GridRequest,
) -> Vec<(String, String)> {
    if !caps.supports_paging {
        return Vec::new();
    }
    let mut query = vec![
        ("start".to_string(), request.start.to_string()),
        ("limit".to_string(), request.length.to_string()),
    ];
    if let Some(sort) = request.sort {
        match columns.get(sort.column) {
            Some(column) => {
                let order_by = if caps.supports_descending_sort
                    && sort.direction == SortDirection::Descending
                {
                    format!("-{}", column.field)
                } else {
                    column.field.to_string()
                };
                query.push(("order_by".to_string(), order_by));
            }
            None => warn!("Sort column {} out of range, not sorting", sort.column),
        }
    }
    query
}

/// Normalizes a backend list into the table envelope. Each row has one cell
/// per column, in column order; absent fields become null cells.
pub fn remap(columns: &[Column], echo: u64, response: ListResponse) -> GridEnvelope {
    let data = response
        .results
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|c| record.get(c.field).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();
    GridEnvelope {
        total_records: response.total_results,
        total_display_records: response.total_results,
        echo,
        data,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowAction {
    pub row: usize,
    pub target: String,
}

/// Runs after every accepted redraw; the result replaces the grid's row actions.
pub type AfterLoad = fn(&GridTable) -> Vec<RowAction>;

/// A table wired to one backend list endpoint.
pub struct RemoteGrid {
    view: ViewId,
    url: &'static str,
    columns: &'static [Column],
    caps: Capabilities,
    after_load: Option<AfterLoad>,
    row_actions: Vec<RowAction>,
    pub table: GridTable,
}

impl RemoteGrid {
    pub fn new(
        view: ViewId,
        url: &'static str,
        columns: &'static [Column],
        caps: Capabilities,
        page_length: usize,
    ) -> Self {
        let headers = columns.iter().map(|c| c.label.to_string()).collect();
        Self {
            view,
            url,
            columns,
            caps,
            after_load: None,
            row_actions: Vec::new(),
            table: GridTable::new(headers, page_length),
        }
    }

    pub fn with_after_load(mut self, hook: AfterLoad) -> Self {
        self.after_load = Some(hook);
        self
    }

    pub fn view(&self) -> ViewId {
        self.view
    }

    pub fn url(&self) -> &str {
        self.url
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    pub fn row_actions(&self) -> &[RowAction] {
        &self.row_actions
    }

    pub fn action_for_row(&self, row: usize) -> Option<&RowAction> {
        self.row_actions.iter().find(|a| a.row == row)
    }

    /// Asks the table for a page and turns it into a backend call.
    pub fn reload(&mut self, mode: ReloadMode) -> ApiCall {
        let request = self.table.draw(mode);
        ApiCall::FetchPage {
            view: self.view,
            url: self.url.to_string(),
            query: build_query(self.caps, self.columns, &request),
            echo: request.echo,
        }
    }

    /// Feeds a completed fetch back. Returns whether the table changed.
    pub fn receive(&mut self, echo: u64, outcome: Result<Value, ApiFailure>) -> bool {
        let parsed = outcome.and_then(|value| {
            serde_json::from_value::<ListResponse>(value)
                .map_err(|e| ApiFailure::Transport(format!("unexpected list response: {e}")))
        });
        match parsed {
            Ok(response) => {
                let envelope = remap(self.columns, echo, response);
                if !self.table.accept(envelope) {
                    return false;
                }
                self.row_actions = self
                    .after_load
                    .map(|hook| hook(&self.table))
                    .unwrap_or_default();
                true
            }
            Err(failure) => {
                debug!("{} fetch failed: {failure}", self.url);
                let changed = self.table.fail(echo, failure.describe("\n"));
                if changed {
                    self.row_actions.clear();
                }
                changed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::SortSpec;
    use serde_json::json;

    const SCAN_COLUMNS: [Column; 4] = [
        Column::new("ID", "number"),
        Column::new("Position", "sequenceNumber"),
        Column::new("Archive Id", "archive_id"),
        Column::new("Archive File", "archiveFile"),
    ];

    const PAGED: Capabilities = Capabilities {
        supports_paging: true,
        supports_descending_sort: false,
    };
    const PAGED_DESC: Capabilities = Capabilities {
        supports_paging: true,
        supports_descending_sort: true,
    };

    fn request(start: usize, length: usize, sort: Option<SortSpec>) -> GridRequest {
        GridRequest {
            start,
            length,
            echo: 3,
            sort,
        }
    }

    fn pairs(q: &[(String, String)]) -> Vec<(&str, &str)> {
        q.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
    }

    #[test]
    fn descending_sort_on_scans_is_prefixed() {
        let sort = Some(SortSpec {
            column: 1,
            direction: SortDirection::Descending,
        });
        let q = build_query(PAGED_DESC, &SCAN_COLUMNS, &request(20, 10, sort));
        assert_eq!(
            pairs(&q),
            vec![("start", "20"), ("limit", "10"), ("order_by", "-sequenceNumber")]
        );
    }

    #[test]
    fn ascending_sort_has_no_prefix() {
        let sort = Some(SortSpec {
            column: 0,
            direction: SortDirection::Ascending,
        });
        let q = build_query(PAGED_DESC, &SCAN_COLUMNS, &request(0, 25, sort));
        assert_eq!(
            pairs(&q),
            vec![("start", "0"), ("limit", "25"), ("order_by", "number")]
        );
    }

    #[test]
    fn descending_sort_elsewhere_is_never_prefixed() {
        let sort = Some(SortSpec {
            column: 1,
            direction: SortDirection::Descending,
        });
        let q = build_query(PAGED, &SCAN_COLUMNS, &request(0, 10, sort));
        assert_eq!(q[2], ("order_by".to_string(), "sequenceNumber".to_string()));
    }

    #[test]
    fn unpaged_endpoint_gets_no_parameters() {
        let sort = Some(SortSpec {
            column: 1,
            direction: SortDirection::Descending,
        });
        let q = build_query(Capabilities::default(), &SCAN_COLUMNS, &request(0, 10, sort));
        assert!(q.is_empty());
    }

    #[test]
    fn out_of_range_sort_column_is_dropped() {
        let sort = Some(SortSpec {
            column: 9,
            direction: SortDirection::Ascending,
        });
        let q = build_query(PAGED, &SCAN_COLUMNS, &request(0, 10, sort));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn remap_orders_cells_by_column() {
        let columns = [Column::new("status", "status"), Column::new("EAD id", "ead_id")];
        let response: ListResponse = serde_json::from_value(json!({
            "total_results": 3,
            "results": [{"ead_id": "A1", "status": "ok"}]
        }))
        .unwrap();
        let envelope = remap(&columns, 5, response);
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "iTotalRecords": 3,
                "iTotalDisplayRecords": 3,
                "sEcho": 5,
                "aaData": [["ok", "A1"]]
            })
        );
    }

    #[test]
    fn missing_fields_become_empty_cells() {
        let response: ListResponse = serde_json::from_value(json!({
            "total_results": 2,
            "results": [{"number": 1}, {"archiveFile": "x", "extra": true}]
        }))
        .unwrap();
        let envelope = remap(&SCAN_COLUMNS, 1, response);
        assert!(envelope.data.iter().all(|row| row.len() == SCAN_COLUMNS.len()));
        assert_eq!(envelope.data[0][0], json!(1));
        assert_eq!(envelope.data[0][3], Value::Null);
        assert_eq!(envelope.data[1][3], json!("x"));
    }

    fn last_cell_actions(table: &GridTable) -> Vec<RowAction> {
        (0..table.rows().len())
            .filter_map(|row| {
                table.cell_text(row, 1).map(|target| RowAction { row, target })
            })
            .collect()
    }

    static TWO: [Column; 2] = [Column::new("status", "status"), Column::new("EAD id", "ead_id")];

    #[test]
    fn receive_runs_after_load_hook_for_current_reply() {
        let mut grid = RemoteGrid::new(ViewId::Ead, "/ead", &TWO, Capabilities::default(), 10)
            .with_after_load(last_cell_actions);
        let echo = match grid.reload(ReloadMode::FirstPage) {
            ApiCall::FetchPage { echo, query, .. } => {
                assert!(query.is_empty());
                echo
            }
            other => panic!("unexpected call {other:?}"),
        };
        let body = json!({"total_results": 1, "results": [{"status": "ok", "ead_id": "A1"}]});
        assert!(grid.receive(echo, Ok(body)));
        assert_eq!(
            grid.row_actions(),
            &[RowAction {
                row: 0,
                target: "A1".into()
            }]
        );
    }

    #[test]
    fn receive_drops_superseded_reply() {
        let mut grid = RemoteGrid::new(ViewId::Ead, "/ead", &TWO, Capabilities::default(), 10);
        let old = match grid.reload(ReloadMode::FirstPage) {
            ApiCall::FetchPage { echo, .. } => echo,
            _ => unreachable!(),
        };
        grid.reload(ReloadMode::FirstPage);
        let body = json!({"total_results": 1, "results": [{"status": "ok"}]});
        assert!(!grid.receive(old, Ok(body)));
        assert!(grid.table.processing());
        assert!(!grid.receive(old, Err(ApiFailure::Transport("timeout".into()))));
    }

    #[test]
    fn unexpected_payload_is_an_error_page() {
        let mut grid = RemoteGrid::new(ViewId::Ead, "/ead", &TWO, Capabilities::default(), 10);
        let echo = grid.table.draw(ReloadMode::FirstPage).echo;
        assert!(grid.receive(echo, Ok(json!("nope"))));
        assert!(grid.table.error().is_some());
    }
}
