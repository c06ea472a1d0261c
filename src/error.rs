use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::record::OutOfRange;

#[derive(Debug, Error)]
pub enum DeskError {
    #[error("data directory '{}' could not be listed: {source}", path.display())]
    DataDir { path: PathBuf, source: io::Error },
    #[error("config file '{}' is invalid: {reason}", path.display())]
    Config { path: PathBuf, reason: String },
    #[error("roster '{}' could not be read: {reason}", path.display())]
    Roster { path: PathBuf, reason: String },
    #[error("user '{0}' is not on the roster")]
    UnknownUser(String),
    #[error("'{column}' cell is out of range: {source}")]
    Quantity { column: String, source: OutOfRange },
    #[error("'{column}' total for '{key}' overflows")]
    TotalOverflow { key: String, column: String },
    #[error("an invoice number is required")]
    BlankInvoiceNo,
    #[error("report could not be rendered: {0}")]
    Render(#[from] serde_json::Error),
}
