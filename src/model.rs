use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, info, trace, warn};

use crate::archives::{ArchiveModal, FormKey};
use crate::backend::{ApiCall, ApiReply};
use crate::config::AdminConfig;
use crate::domain::{AdminError, CMDMode, HELP_TEXT, Message};
use crate::ead;
use crate::inputter::{InputResult, Inputter};
use crate::navigation::{Navigation, Transition, ViewId};
use crate::table::{ReloadMode, SortDirection};
use crate::views::{MountContext, Mounted, handler_for};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    TABLE,
    POPUP,
    CONFIRM,
    FORM,
    CMDINPUT,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub title: String,
    pub message: String,
}

pub struct Model {
    config: AdminConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    navigation: Navigation,
    container: Mounted,
    active_label: Option<&'static str>,
    outbox: Vec<ApiCall>,
    popup: Option<Popup>,
    confirm: Option<String>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    status_message: String,
}

impl Model {
    pub fn init(config: &AdminConfig) -> Self {
        Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            navigation: Navigation::default(),
            container: Mounted::Empty,
            active_label: None,
            outbox: Vec::new(),
            popup: None,
            confirm: None,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            status_message: "Started recadmin!".to_string(),
        }
    }

    /// Leaves the unset state by selecting the configured default view.
    pub fn start(&mut self) {
        self.select_view(self.config.default_view);
    }

    pub fn current_view(&self) -> Option<ViewId> {
        self.navigation.current()
    }

    pub fn transitions(&self) -> u64 {
        self.navigation.transitions()
    }

    pub fn container(&self) -> &Mounted {
        &self.container
    }

    pub fn active_label(&self) -> Option<&'static str> {
        self.active_label
    }

    pub fn modus(&self) -> Modus {
        self.modus
    }

    pub fn popup(&self) -> Option<&Popup> {
        self.popup.as_ref()
    }

    pub fn confirm_text(&self) -> Option<&str> {
        self.confirm.as_deref()
    }

    pub fn cmd_mode(&self) -> Option<CMDMode> {
        self.cmd_mode
    }

    pub fn cmdinput(&self) -> &InputResult {
        &self.last_input
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    /// Text entry modes want every key unmapped.
    pub fn raw_keyevents(&self) -> bool {
        matches!(self.modus, Modus::CMDINPUT | Modus::FORM)
    }

    /// Calls queued since the last drain, in issue order.
    pub fn take_outgoing(&mut self) -> Vec<ApiCall> {
        std::mem::take(&mut self.outbox)
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    // -------------------- Navigation ---------------------- //

    pub fn select_view(&mut self, view: ViewId) {
        let transition = self.navigation.select(view);
        self.on_transition(transition);
    }

    /// Unknown labels change nothing.
    pub fn select_label(&mut self, label: &str) {
        if let Some(transition) = self.navigation.select_label(label) {
            self.on_transition(transition);
        }
    }

    fn on_transition(&mut self, transition: Transition) {
        // Tear down whatever the previous view rendered before mounting the next one.
        self.container = Mounted::Empty;
        self.popup = None;
        self.confirm = None;
        self.cmd_mode = None;
        self.modus = Modus::TABLE;
        self.previous_modus = Modus::TABLE;

        let handler = handler_for(transition.to);
        let ctx = MountContext {
            page_length: self.config.page_length,
        };
        let (mounted, calls) = (handler.mount)(&ctx);
        self.container = mounted;
        self.outbox.extend(calls);
        self.active_label = Some(transition.to.label());
        info!(
            "{} view {}",
            if transition.is_refresh() { "Refreshed" } else { "Switched to" },
            transition.to
        );
        self.set_status_message(format!("Loading {} ...", transition.to));
    }

    // -------------------- Update ---------------------- //

    pub fn update(&mut self, message: Option<Message>) -> Result<(), AdminError> {
        let Some(msg) = message else {
            return Ok(());
        };
        match msg {
            Message::Reply(reply) => {
                self.on_reply(reply);
                return Ok(());
            }
            Message::UploadProgress { sent, total } => {
                if let Some(panel) = self.container.ead_mut() {
                    panel.on_progress(sent, total);
                }
                return Ok(());
            }
            Message::Resize(width, height) => {
                trace!("UI was resized to {width}x{height}");
                return Ok(());
            }
            _ => {}
        }

        match self.modus {
            Modus::TABLE => match msg {
                Message::Quit => self.quit(),
                Message::Help => self.show_popup("Help", HELP_TEXT),
                Message::SelectView(view) => self.select_view(view),
                Message::NextView => {
                    let t = self.navigation.next();
                    self.on_transition(t);
                }
                Message::PreviousView => {
                    let t = self.navigation.previous();
                    self.on_transition(t);
                }
                Message::Refresh => {
                    if let Some(t) = self.navigation.refresh() {
                        self.on_transition(t);
                    }
                }
                Message::MoveUp => self.move_vertical(false),
                Message::MoveDown => self.move_vertical(true),
                Message::MoveLeft => self.with_grid(|g| g.table.move_left()),
                Message::MoveRight => self.with_grid(|g| g.table.move_right()),
                Message::NextPage => self.page(|t| t.next_page()),
                Message::PreviousPage => self.page(|t| t.previous_page()),
                Message::FirstPage => self.page(|t| t.first_page()),
                Message::LastPage => self.page(|t| t.last_page()),
                Message::SortAscending => self.sort(SortDirection::Ascending),
                Message::SortDescending => self.sort(SortDirection::Descending),
                Message::CyclePageLength => self.page(|t| {
                    t.cycle_page_length();
                    true
                }),
                Message::Enter => self.enter(),
                Message::Delete => self.delete(),
                Message::New => self.new_archive(),
                Message::Edit => self.edit_archive(),
                Message::Upload => self.enter_upload(),
                Message::EnterCommand => self.enter_cmd_mode(CMDMode::Raw),
                _ => (),
            },
            Modus::POPUP => match msg {
                Message::Quit => self.quit(),
                Message::Exit | Message::Enter => self.close_popup(),
                _ => (),
            },
            Modus::CONFIRM => match msg {
                Message::Quit => self.quit(),
                Message::Confirm | Message::Enter => self.confirm(),
                Message::Exit => self.cancel_confirm(),
                _ => (),
            },
            Modus::FORM => {
                if let Message::RawKey(key) = msg {
                    self.form_input(key)
                }
            }
            Modus::CMDINPUT => {
                if let Message::RawKey(key) = msg {
                    self.raw_input(key)
                }
            }
        }
        Ok(())
    }

    fn with_grid(&mut self, f: impl FnOnce(&mut crate::grid::RemoteGrid)) {
        if let Some(gv) = self.container.grid_view_mut() {
            f(&mut gv.grid);
        }
    }

    fn move_vertical(&mut self, down: bool) {
        match &mut self.container {
            Mounted::Grid(gv) if down => gv.grid.table.move_down(),
            Mounted::Grid(gv) => gv.grid.table.move_up(),
            Mounted::Archives(wf) if down => wf.move_down(),
            Mounted::Archives(wf) => wf.move_up(),
            Mounted::Empty => {}
        }
    }

    /// Applies a paging change and fetches the resulting page if it moved.
    /// Grids over endpoints without paging keep their single page.
    fn page(&mut self, change: impl FnOnce(&mut crate::table::GridTable) -> bool) {
        let Some(gv) = self.container.grid_view_mut() else {
            return;
        };
        if !gv.grid.capabilities().supports_paging {
            let notice = format!("{} does not page", gv.grid.view());
            self.set_status_message(notice);
            return;
        }
        if change(&mut gv.grid.table) {
            self.outbox.push(gv.grid.reload(ReloadMode::Standing));
        }
    }

    fn sort(&mut self, direction: SortDirection) {
        let Some(gv) = self.container.grid_view_mut() else {
            return;
        };
        if !gv.grid.capabilities().supports_paging {
            let notice = format!("{} does not sort", gv.grid.view());
            self.set_status_message(notice);
            return;
        }
        gv.grid.table.sort_current_column(direction);
        self.outbox.push(gv.grid.reload(ReloadMode::Standing));
    }

    fn enter(&mut self) {
        if let Some(wf) = self.container.archives_mut() {
            wf.select_current();
        }
    }

    fn delete(&mut self) {
        let notice = match &mut self.container {
            Mounted::Grid(gv) => {
                let row = gv.grid.table.curser_row();
                let target = gv.grid.action_for_row(row).map(|a| a.target.clone());
                match (gv.ead.as_mut(), target) {
                    (Some(panel), Some(id)) => {
                        self.confirm = Some(panel.request_delete(&id));
                        self.modus = Modus::CONFIRM;
                        None
                    }
                    (Some(_), None) => Some("No EAD under the cursor"),
                    (None, _) => Some("Nothing to delete here"),
                }
            }
            Mounted::Archives(wf) => {
                if wf.open_delete() {
                    self.modus = Modus::CONFIRM;
                    None
                } else {
                    Some("Select an archive first")
                }
            }
            Mounted::Empty => None,
        };
        if let Some(notice) = notice {
            self.set_status_message(notice);
        }
    }

    fn confirm(&mut self) {
        self.confirm = None;
        match &mut self.container {
            Mounted::Grid(gv) => {
                if let Some(call) = gv.ead.as_mut().and_then(|p| p.confirm_delete()) {
                    self.outbox.push(call);
                }
                self.modus = Modus::TABLE;
            }
            // The modal stays until the backend answered.
            Mounted::Archives(wf) => {
                if let Some(call) = wf.submit() {
                    self.outbox.push(call);
                }
            }
            Mounted::Empty => self.modus = Modus::TABLE,
        }
    }

    fn cancel_confirm(&mut self) {
        self.confirm = None;
        if let Some(panel) = self.container.ead_mut() {
            panel.cancel_delete();
        }
        if let Some(wf) = self.container.archives_mut() {
            wf.cancel();
        }
        self.modus = Modus::TABLE;
    }

    fn new_archive(&mut self) {
        if let Some(wf) = self.container.archives_mut() {
            wf.open_new();
            self.modus = Modus::FORM;
        }
    }

    fn edit_archive(&mut self) {
        if let Some(wf) = self.container.archives_mut() {
            if wf.open_edit() {
                self.modus = Modus::FORM;
            } else {
                self.set_status_message("Select an archive first");
            }
        }
    }

    fn form_input(&mut self, key: KeyEvent) {
        let Some(wf) = self.container.archives_mut() else {
            self.modus = Modus::TABLE;
            return;
        };
        match wf.handle_form_key(key) {
            FormKey::Edited => {}
            FormKey::Submit => {
                if let Some(call) = wf.submit() {
                    debug!("Saving archive via {} {}", call.method(), call.path());
                    self.outbox.push(call);
                }
            }
            FormKey::Cancel => {
                wf.cancel();
                self.modus = Modus::TABLE;
            }
        }
    }

    fn enter_upload(&mut self) {
        match self.container.ead_mut() {
            Some(panel) => {
                panel.upload_path.clear();
                self.last_input = panel.upload_path.get();
                self.cmd_mode = Some(CMDMode::UploadPath);
                self.previous_modus = self.modus;
                self.modus = Modus::CMDINPUT;
            }
            None => self.set_status_message("Uploads are only available in the EAD view"),
        }
    }

    fn show_popup(&mut self, title: &str, message: &str) {
        if self.modus != Modus::POPUP {
            self.previous_modus = self.modus;
        }
        self.modus = Modus::POPUP;
        self.popup = Some(Popup {
            title: title.to_string(),
            message: message.to_string(),
        });
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.popup = None;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::TABLE;
    }

    // -------------------- Command line ---------------------- //

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.input.clear();
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        match self.cmd_mode {
            Some(CMDMode::UploadPath) => {
                let Some(panel) = self.container.ead_mut() else {
                    self.leave_cmd_mode();
                    return;
                };
                self.last_input = panel.upload_path.read(key);
                if self.last_input.finished {
                    let call = if self.last_input.canceled {
                        None
                    } else {
                        panel.submit_upload()
                    };
                    match call {
                        Some(call) => {
                            self.outbox.push(call);
                            self.set_status_message("Uploading ...");
                        }
                        None if !self.last_input.canceled => {
                            self.set_status_message("Choose a file to upload")
                        }
                        None => {}
                    }
                    self.leave_cmd_mode();
                }
            }
            _ => {
                self.last_input = self.input.read(key);
                if self.last_input.finished {
                    let canceled = self.last_input.canceled;
                    let cmd = self.last_input.input.clone();
                    self.leave_cmd_mode();
                    if !canceled {
                        self.handle_cmd_input(cmd.trim());
                    }
                }
            }
        }
    }

    fn leave_cmd_mode(&mut self) {
        self.cmd_mode = None;
        self.modus = Modus::TABLE;
        self.previous_modus = Modus::CMDINPUT;
    }

    fn handle_cmd_input(&mut self, cmd: &str) {
        trace!("Handle cmd input {cmd}");
        let (verb, arg) = cmd.split_once(' ').unwrap_or((cmd, ""));
        match verb {
            "view" => self.select_label(arg.trim()),
            "reload" => {
                if let Some(t) = self.navigation.refresh() {
                    self.on_transition(t);
                }
            }
            "length" => match arg.trim().parse::<usize>() {
                Ok(length) if length > 0 => self.page(|t| {
                    t.set_page_length(length);
                    true
                }),
                _ => self.set_status_message(format!("Invalid page length '{arg}'")),
            },
            "quit" | "q" => self.quit(),
            "" => {}
            other => self.set_status_message(format!("Unknown command '{other}'")),
        }
    }

    // -------------------- Backend completions ---------------------- //

    fn on_reply(&mut self, reply: ApiReply) {
        let ApiReply { call, outcome } = reply;
        match call {
            ApiCall::FetchPage { view, echo, .. } => match self.container.grid_view_mut() {
                Some(gv) if gv.grid.view() == view => {
                    if gv.grid.receive(echo, outcome) {
                        let info = gv.grid.table.info();
                        self.set_status_message(info);
                    }
                }
                _ => debug!("Dropping page for {view}, it is no longer mounted"),
            },
            ApiCall::DeleteEad { id } => match ead::delete_result(outcome) {
                Ok(()) => {
                    info!("Deleted EAD {id}");
                    self.set_status_message(format!("Deleted EAD {id}"));
                    if let Some(gv) = self.container.grid_view_mut()
                        && gv.ead.is_some()
                    {
                        self.outbox.push(gv.grid.reload(ReloadMode::FirstPage));
                    }
                }
                Err(text) => {
                    warn!("Deleting EAD {id} failed: {text}");
                    self.show_popup("Error", &text);
                }
            },
            ApiCall::UploadEad { .. } => match self.container.grid_view_mut() {
                Some(gv) => match gv.ead.as_mut() {
                    Some(panel) => {
                        if panel.on_upload_reply(outcome) {
                            self.outbox.push(gv.grid.reload(ReloadMode::FirstPage));
                        }
                        let text = panel.message().unwrap_or_default().to_string();
                        self.set_status_message(text);
                    }
                    None => debug!("Dropping upload reply, EAD view is gone"),
                },
                None => debug!("Dropping upload reply, EAD view is gone"),
            },
            ApiCall::ListArchives { echo } => match self.container.archives_mut() {
                Some(wf) => {
                    if !wf.on_list_reply(echo, outcome) {
                        return;
                    }
                    let closed = wf.modal().is_none();
                    let loaded = wf.items().len();
                    if closed && matches!(self.modus, Modus::FORM | Modus::CONFIRM) {
                        self.modus = Modus::TABLE;
                    }
                    self.set_status_message(format!("{loaded} archives"));
                }
                None => debug!("Dropping archive list, view is gone"),
            },
            ApiCall::SaveArchive { .. } | ApiCall::DeleteArchive { .. } => {
                match self.container.archives_mut() {
                    Some(wf) => {
                        if let Some(call) = wf.on_mutation_reply(outcome) {
                            self.outbox.push(call);
                        }
                    }
                    None => debug!("Dropping archive mutation reply, view is gone"),
                }
            }
        }
    }

    /// The open archive modal, for rendering.
    pub fn archive_modal(&self) -> Option<&ArchiveModal> {
        match &self.container {
            Mounted::Archives(wf) => wf.modal(),
            _ => None,
        }
    }
}
