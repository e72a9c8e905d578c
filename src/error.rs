//! Structured error types for xlgrid.
//!
//! Fatal failures are [`GridError`]; problems that a best-effort read can
//! survive are collected as [`Diagnostic`] values next to the bound records.

use serde::Serialize;
use std::fmt;

/// All errors that abort an xlgrid operation.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// The record type cannot be mapped to a grid.
    #[error("Invalid schema: {0}")]
    Schema(String),

    /// The requested sheet does not exist in the backend.
    #[error("Sheet not found: {0}")]
    NotFound(String),

    /// Invalid cell reference.
    #[error("Invalid cell reference: {0}")]
    CellRef(String),

    /// The backend refused an operation.
    #[error("Backend error: {0}")]
    Backend(String),

    /// XML parsing error from quick-xml.
    #[error("XML parsing: {0}")]
    Xml(#[from] quick_xml::Error),

    /// ZIP archive error.
    #[error("ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GridError>;

/// A cell that could not be converted into its record field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindError {
    /// Field path from the record root, e.g. `["title", "main"]`.
    pub path: Vec<String>,
    /// 1-based sheet row the raw value came from.
    pub row: u32,
    /// The offending raw string.
    pub raw: String,
    pub reason: String,
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "path [{}] row {} value [{}]: {}",
            self.path.join("->"),
            self.row,
            self.raw,
            self.reason
        )
    }
}

/// Non-fatal findings of a read session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Diagnostic {
    /// A header cell in the top row whose subtree matches no schema node.
    UnmatchedHeader { x: u32, y: u32, title: String },
    /// A schema leaf that was not located in the sheet; its field keeps its
    /// default value.
    ReconciliationGap { path: Vec<String> },
    /// A single cell failed to bind.
    Bind(BindError),
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnmatchedHeader { x, y, title } => write!(
                f,
                "header [{title}] at {} matches no schema field",
                crate::cell_ref::Coord::new(*x, *y)
            ),
            Self::ReconciliationGap { path } => {
                write!(f, "no column found for [{}]", path.join("->"))
            }
            Self::Bind(err) => write!(f, "bind failed: {err}"),
        }
    }
}
