//! xlgrid - nested records as spreadsheets with merged hierarchical headers
//!
//! Declares record types once and uses them in both directions:
//! - Renders a slice of records as a sheet whose header block mirrors the
//!   record nesting, composite fields spanning their leaves with merged cells
//! - Reads such a sheet back, even after columns or whole column groups were
//!   reordered, as long as the header hierarchy is intact
//! - Reports unknown headers, missing columns and unparsable cells as
//!   diagnostics instead of failing the read
//!
//! # Usage
//!
//! ```
//! use xlgrid::{Reader, Renderer, Workbook};
//!
//! xlgrid::record! {
//!     #[derive(Debug, Default, Clone, PartialEq)]
//!     pub struct Names {
//!         #[grid("col:English")]
//!         pub english: String,
//!         #[grid("col:French")]
//!         pub french: String,
//!     }
//! }
//!
//! xlgrid::record! {
//!     #[derive(Debug, Default, Clone, PartialEq)]
//!     pub struct Book {
//!         #[grid("col:Title")]
//!         pub title: Names,
//!         #[grid("col:Pages")]
//!         pub pages: u32,
//!     }
//! }
//!
//! let books = vec![Book {
//!     title: Names { english: "The Stranger".into(), french: "L'Étranger".into() },
//!     pages: 123,
//! }];
//!
//! let mut workbook = Workbook::new();
//! Renderer::<Book>::new("Books")?.render(&mut workbook, &books)?;
//!
//! let outcome = Reader::<Book>::new()?.read(&workbook, "Books")?;
//! assert_eq!(outcome.records, books);
//! assert!(outcome.diagnostics.is_empty());
//! # Ok::<(), xlgrid::GridError>(())
//! ```

pub mod backend;
pub mod bind;
pub mod cell_ref;
pub mod error;
pub mod grid;
pub mod layout;
pub mod reconcile;
pub mod record;
pub mod render;
pub mod schema;
pub mod xlsx;

pub use backend::{Backend, CellStyle, Sheet, Workbook};
pub use bind::{bind, ReadOptions, ReadOutcome, Reader};
pub use cell_ref::Coord;
pub use error::{BindError, Diagnostic, GridError, Result};
pub use grid::{CellGrid, CellId, CellValue};
pub use layout::LayoutBox;
pub use reconcile::{find_nodes_by_tag, full_match, reconcile, Reconciliation};
pub use record::{Kind, Record, Value};
pub use render::Renderer;
pub use schema::{Node, NodeId, SchemaTree};

/// Render `records` into a fresh single-sheet workbook and return it as
/// XLSX bytes.
///
/// # Errors
/// Returns an error if the record type has no valid schema or the package
/// cannot be written.
pub fn write_xlsx<T: Record>(sheet: &str, records: &[T]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    Renderer::<T>::new(sheet)?.render(&mut workbook, records)?;
    xlsx::write(&workbook)
}

/// Read records of type `T` from `sheet` of an XLSX file.
///
/// # Errors
/// Returns an error if the bytes are not a readable XLSX package, the sheet
/// does not exist or the record type has no valid schema. Per-cell problems
/// are returned as diagnostics instead.
pub fn read_xlsx<T: Record>(data: &[u8], sheet: &str) -> Result<ReadOutcome<T>> {
    let workbook = xlsx::read(data)?;
    Reader::<T>::new()?.read(&workbook, sheet)
}
