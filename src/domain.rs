use std::io::Error;
use std::path::PathBuf;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

/// Rows shown per page unless overridden on the command line.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Columns wider than this are cut off when rendered.
pub const DEFAULT_MAX_COLUMN_WIDTH: usize = 40;

#[derive(Debug)]
pub enum TabError {
    IoError(Error),
    PolarsError(PolarsError),
    JsonError(serde_json::Error),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
}

impl From<Error> for TabError {
    fn from(err: Error) -> Self {
        TabError::IoError(err)
    }
}

impl From<PolarsError> for TabError {
    fn from(err: PolarsError) -> Self {
        TabError::PolarsError(err)
    }
}

impl From<serde_json::Error> for TabError {
    fn from(err: serde_json::Error) -> Self {
        TabError::JsonError(err)
    }
}

#[derive(Debug, Clone, Setters)]
pub struct AppConfig {
    pub page_size: usize,
    pub max_column_width: usize,
    pub event_poll_time: u64,
    /// Sort by lower-cased text only instead of the date/number-aware keys.
    pub plain_sort: bool,
    pub filter_column: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            page_size: DEFAULT_PAGE_SIZE,
            max_column_width: DEFAULT_MAX_COLUMN_WIDTH,
            event_poll_time: 100,
            plain_sort: false,
            filter_column: None,
            log_file: None,
        }
    }
}

/// One user interaction. The controller maps key events to these and the
/// model applies them one at a time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    Quit,
    MoveColumnLeft,
    MoveColumnRight,
    MoveRowUp,
    MoveRowDown,
    ActivateColumn,
    CycleFilterColumn,
    PrevPage,
    NextPage,
    Search,
    JumpToPage,
    CopyCell,
    CopyRow,
    Help,
    Exit,
    RawKey(KeyEvent),
}

/// Which prompt the command line is currently collecting input for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Search,
    PageJump,
}

pub const HELP_TEXT: &str = "tabview key bindings

  Left/Right  h/l   select column
  Up/Down     k/j   select row
  Enter  s          sort by the selected column (toggles asc/desc)
  f                 cycle the filter column
  /                 live search in the filter column
  g                 jump to a page
  p  n              previous / next page (also PgUp/PgDn)
  y  Y              copy row / cell to the clipboard
  ?                 this help
  Esc               close popup or cancel input
  q                 quit
";
