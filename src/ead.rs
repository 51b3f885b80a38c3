use std::path::PathBuf;

use serde_json::Value;
use tracing::{info, warn};

use crate::backend::{ApiCall, ApiFailure};
use crate::grid::RowAction;
use crate::inputter::Inputter;
use crate::table::GridTable;

/// Re-attached after every redraw: one delete control per row, targeting the
/// id shown in the row's last cell.
pub fn attach_delete_controls(table: &GridTable) -> Vec<RowAction> {
    let last = table.headers().len().saturating_sub(1);
    (0..table.rows().len())
        .filter_map(|row| {
            table
                .cell_text(row, last)
                .filter(|id| !id.is_empty())
                .map(|target| RowAction { row, target })
        })
        .collect()
}

/// Upload form and delete confirmation that sit next to the EAD grid.
#[derive(Debug, Default)]
pub struct EadPanel {
    pub upload_path: Inputter,
    uploading: bool,
    progress: Option<u8>,
    message: Option<String>,
    pending_delete: Option<String>,
}

impl EadPanel {
    /// Submit is disabled until a file is chosen.
    pub fn upload_enabled(&self) -> bool {
        !self.upload_path.is_empty() && !self.uploading
    }

    pub fn uploading(&self) -> bool {
        self.uploading
    }

    pub fn progress(&self) -> Option<u8> {
        self.progress
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn submit_upload(&mut self) -> Option<ApiCall> {
        if !self.upload_enabled() {
            return None;
        }
        let path = PathBuf::from(shellexpand::tilde(self.upload_path.value().trim()).as_ref());
        info!("Uploading EAD {}", path.display());
        self.uploading = true;
        self.progress = Some(0);
        self.message = None;
        Some(ApiCall::UploadEad { path })
    }

    pub fn on_progress(&mut self, sent: u64, total: u64) {
        if total == 0 {
            return;
        }
        let percent = ((sent as f64 * 100.0) / total as f64).round().min(100.0);
        self.progress = Some(percent as u8);
    }

    /// Returns true when the grid has to be reloaded.
    pub fn on_upload_reply(&mut self, outcome: Result<Value, ApiFailure>) -> bool {
        self.uploading = false;
        match outcome {
            Ok(body) => {
                let ead_id = body
                    .get("ead_id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                self.message = Some(format!("Added EAD {ead_id}"));
                self.upload_path.clear();
                true
            }
            Err(failure) => {
                warn!("EAD upload failed: {failure}");
                self.message = Some(failure.describe("\n"));
                false
            }
        }
    }

    /// Remembers the id and returns the confirmation question.
    pub fn request_delete(&mut self, id: &str) -> String {
        self.pending_delete = Some(id.to_string());
        format!("Really delete EAD {id}?")
    }

    pub fn pending_delete(&self) -> Option<&str> {
        self.pending_delete.as_deref()
    }

    pub fn confirm_delete(&mut self) -> Option<ApiCall> {
        self.pending_delete.take().map(|id| ApiCall::DeleteEad { id })
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }
}

/// Outcome of a delete: `Err` carries the text for the alert.
pub fn delete_result(outcome: Result<Value, ApiFailure>) -> Result<(), String> {
    outcome.map(|_| ()).map_err(|failure| failure.describe("\n"))
}
