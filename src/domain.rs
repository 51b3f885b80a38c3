use std::io::Error;

use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

use crate::backend::ApiReply;
use crate::navigation::ViewId;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("io error: {0}")]
    IoError(#[from] Error),
    #[error("http client error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("config error: {0}")]
    ConfigError(String),
    #[error("unknown view '{0}'")]
    InvalidView(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    Raw,
    UploadPath,
}

#[derive(Debug)]
pub enum Message {
    Quit,
    Help,
    Exit,
    Enter,
    Confirm,
    SelectView(ViewId),
    NextView,
    PreviousView,
    Refresh,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextPage,
    PreviousPage,
    FirstPage,
    LastPage,
    SortAscending,
    SortDescending,
    CyclePageLength,
    Delete,
    New,
    Edit,
    Upload,
    EnterCommand,
    RawKey(KeyEvent),
    Resize(usize, usize),
    Reply(ApiReply),
    UploadProgress { sent: u64, total: u64 },
}

pub const HELP_TEXT: &str = "\
Views
  1 Logs   2 Scans   3 EAD   4 Archives
  Tab / Shift-Tab   next / previous view
  r                 reload the current view

Grid
  j k / Up Down     move row
  h l / Left Right  move column
  n p / PgDn PgUp   next / previous page
  g G               first / last page
  s S               sort ascending / descending
  L                 cycle page length

EAD
  u                 upload an EAD file
  d                 delete the EAD under the cursor

Archives
  Enter / Space     select row
  a e d             new / edit / delete

Other
  :                 command (view <name>, reload, length <n>, quit)
  ?                 this help
  y / Enter         confirm
  Esc               close popup / cancel
  q                 quit";
