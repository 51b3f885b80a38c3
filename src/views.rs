use tracing::debug;

use crate::archives::ArchiveWorkflow;
use crate::backend::ApiCall;
use crate::ead::{EadPanel, attach_delete_controls};
use crate::grid::{Capabilities, Column, RemoteGrid};
use crate::navigation::ViewId;
use crate::table::ReloadMode;

pub static LOG_COLUMNS: [Column; 5] = [
    Column::new("Date", "date"),
    Column::new("Message", "message"),
    Column::new("Type", "object_type"),
    Column::new("ID", "object_id"),
    Column::new("User", "user"),
];

pub static SCAN_COLUMNS: [Column; 4] = [
    Column::new("ID", "number"),
    Column::new("Position", "sequenceNumber"),
    Column::new("Archive Id", "archive_id"),
    Column::new("Archive File", "archiveFile"),
];

// The id has to stay the last column, the delete controls read it from there.
pub static EAD_COLUMNS: [Column; 2] = [Column::new("status", "status"), Column::new("EAD id", "ead_id")];

pub const LOG_CAPABILITIES: Capabilities = Capabilities {
    supports_paging: true,
    supports_descending_sort: false,
};

pub const SCAN_CAPABILITIES: Capabilities = Capabilities {
    supports_paging: true,
    supports_descending_sort: true,
};

pub const EAD_CAPABILITIES: Capabilities = Capabilities {
    supports_paging: false,
    supports_descending_sort: false,
};

pub struct GridView {
    pub grid: RemoteGrid,
    pub ead: Option<EadPanel>,
}

/// Content of the shared body area. Only a navigation transition replaces it.
#[derive(Default)]
pub enum Mounted {
    #[default]
    Empty,
    Grid(GridView),
    Archives(ArchiveWorkflow),
}

impl Mounted {
    pub fn view(&self) -> Option<ViewId> {
        match self {
            Mounted::Empty => None,
            Mounted::Grid(g) => Some(g.grid.view()),
            Mounted::Archives(_) => Some(ViewId::Archives),
        }
    }

    pub fn grid_view_mut(&mut self) -> Option<&mut GridView> {
        match self {
            Mounted::Grid(g) => Some(g),
            _ => None,
        }
    }

    pub fn archives_mut(&mut self) -> Option<&mut ArchiveWorkflow> {
        match self {
            Mounted::Archives(a) => Some(a),
            _ => None,
        }
    }

    pub fn ead_mut(&mut self) -> Option<&mut EadPanel> {
        self.grid_view_mut().and_then(|g| g.ead.as_mut())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MountContext {
    pub page_length: usize,
}

/// Builds the view's content and the calls that populate it.
pub type MountFn = fn(&MountContext) -> (Mounted, Vec<ApiCall>);

pub struct ViewHandler {
    pub view: ViewId,
    pub mount: MountFn,
}

pub static HANDLERS: [ViewHandler; 4] = [
    ViewHandler {
        view: ViewId::Logs,
        mount: mount_logs,
    },
    ViewHandler {
        view: ViewId::Scans,
        mount: mount_scans,
    },
    ViewHandler {
        view: ViewId::Ead,
        mount: mount_ead,
    },
    ViewHandler {
        view: ViewId::Archives,
        mount: mount_archives,
    },
];

pub fn handler_for(view: ViewId) -> &'static ViewHandler {
    &HANDLERS[view.position()]
}

fn mount_grid(mut grid: RemoteGrid, ead: Option<EadPanel>) -> (Mounted, Vec<ApiCall>) {
    debug!("Mounting grid for {}", grid.url());
    let call = grid.reload(ReloadMode::FirstPage);
    (Mounted::Grid(GridView { grid, ead }), vec![call])
}

fn mount_logs(ctx: &MountContext) -> (Mounted, Vec<ApiCall>) {
    let grid = RemoteGrid::new(ViewId::Logs, "/log", &LOG_COLUMNS, LOG_CAPABILITIES, ctx.page_length);
    mount_grid(grid, None)
}

fn mount_scans(ctx: &MountContext) -> (Mounted, Vec<ApiCall>) {
    let grid = RemoteGrid::new(
        ViewId::Scans,
        "/scans",
        &SCAN_COLUMNS,
        SCAN_CAPABILITIES,
        ctx.page_length,
    );
    mount_grid(grid, None)
}

fn mount_ead(ctx: &MountContext) -> (Mounted, Vec<ApiCall>) {
    let grid = RemoteGrid::new(ViewId::Ead, "/ead", &EAD_COLUMNS, EAD_CAPABILITIES, ctx.page_length)
        .with_after_load(attach_delete_controls);
    mount_grid(grid, Some(EadPanel::default()))
}

fn mount_archives(_ctx: &MountContext) -> (Mounted, Vec<ApiCall>) {
    let mut workflow = ArchiveWorkflow::default();
    let call = workflow.activate();
    (Mounted::Archives(workflow), vec![call])
}
