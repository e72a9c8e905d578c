//! Record binding: turn reconciled columns back into typed records.

use std::marker::PhantomData;

use serde::Serialize;

use crate::backend::Backend;
use crate::error::{BindError, Diagnostic, Result};
use crate::grid::CellGrid;
use crate::reconcile::{reconcile, Reconciliation};
use crate::record::{assign_at, Kind, Record, Value};
use crate::schema::SchemaTree;

/// Records read from a sheet, plus everything that went wrong on the way.
#[derive(Debug, Clone, Serialize)]
pub struct ReadOutcome<T> {
    /// One record per data row, in row order.
    pub records: Vec<T>,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> ReadOutcome<T> {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// A leaf that was located in the sheet.
struct BoundColumn {
    path: Vec<String>,
    kind: Kind,
    column: u32,
}

/// Bind rows `start..=end` of `grid` into records of type `T`.
///
/// Absent and empty cells leave the field at its default. A cell that fails
/// to parse or to fit its field also leaves the default and is reported as
/// [`Diagnostic::Bind`].
#[must_use]
pub fn bind<T: Record>(
    tree: &SchemaTree,
    reconciliation: &Reconciliation,
    grid: &CellGrid,
    start: u32,
    end: u32,
) -> ReadOutcome<T> {
    let columns: Vec<BoundColumn> = tree
        .leaves()
        .into_iter()
        .filter_map(|leaf| {
            Some(BoundColumn {
                column: reconciliation.column(leaf)?,
                kind: tree.node(leaf).kind?,
                path: tree.paths(leaf),
            })
        })
        .collect();

    let mut records = Vec::new();
    let mut diagnostics = Vec::new();

    for row in start.max(1)..=end {
        let mut record = T::default();
        for bound in &columns {
            let Some(raw) = grid.raw_at(bound.column, row) else {
                continue;
            };
            if raw.is_empty() {
                continue;
            }

            let result = Value::parse(bound.kind, raw)
                .and_then(|value| assign_at(&mut record, &bound.path, bound.kind, value));
            if let Err(err) = result {
                let error = BindError {
                    path: bound.path.clone(),
                    row,
                    raw: raw.to_string(),
                    reason: err.to_string(),
                };
                log::warn!("{error}");
                diagnostics.push(Diagnostic::Bind(error));
            }
        }
        records.push(record);
    }

    log::debug!(
        "bound {} records from {} columns, {} failures",
        records.len(),
        columns.len(),
        diagnostics.len()
    );
    ReadOutcome {
        records,
        diagnostics,
    }
}

/// Options for [`Reader::read`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Inclusive 1-based row window to bind. `None` binds from the first row
    /// below the header block to the last row of the sheet.
    pub data_rows: Option<(u32, u32)>,
}

/// Reads records of type `T` from backend sheets.
///
/// The schema tree is built once and reused for every read.
#[derive(Debug)]
pub struct Reader<T: Record> {
    tree: SchemaTree,
    options: ReadOptions,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> Reader<T> {
    pub fn new() -> Result<Self> {
        Self::with_options(ReadOptions::default())
    }

    pub fn with_options(options: ReadOptions) -> Result<Self> {
        Ok(Self {
            tree: SchemaTree::build::<T>()?,
            options,
            _record: PhantomData,
        })
    }

    #[must_use]
    pub fn tree(&self) -> &SchemaTree {
        &self.tree
    }

    #[must_use]
    pub fn options(&self) -> ReadOptions {
        self.options
    }

    /// Load `sheet`, match its headers and bind its data rows.
    pub fn read<B: Backend + ?Sized>(&self, backend: &B, sheet: &str) -> Result<ReadOutcome<T>> {
        let grid = CellGrid::load(backend, sheet)?;
        let reconciliation = reconcile(&self.tree, &grid);

        let (start, end) = self
            .options
            .data_rows
            .unwrap_or((self.tree.data_row_start(), grid.max_row()));
        let outcome = bind::<T>(&self.tree, &reconciliation, &grid, start, end);

        let mut diagnostics = reconciliation.into_diagnostics();
        diagnostics.extend(outcome.diagnostics);
        Ok(ReadOutcome {
            records: outcome.records,
            diagnostics,
        })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::backend::Workbook;
    use crate::cell_ref::Coord;
    use crate::error::GridError;

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq, Serialize)]
        struct Span {
            #[grid("col:From")]
            from: u16,
            #[grid("col:To")]
            to: i32,
        }
    }

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq, Serialize)]
        struct Row {
            #[grid("col:Name")]
            name: String,
            #[grid("col:Span")]
            span: Span,
            #[grid("col:Ratio")]
            ratio: f64,
        }
    }

    /// Header block for `Row` plus the given data rows (one string per leaf).
    fn workbook(rows: &[[&str; 4]]) -> Workbook {
        let mut book = Workbook::new();
        book.create_sheet("S").unwrap();
        let header = [(1, 1, "Name"), (2, 1, "Span"), (4, 1, "Ratio"), (2, 2, "From"), (3, 2, "To")];
        for (x, y, text) in header {
            book.set_cell("S", Coord::new(x, y), &Value::Str(text.into()))
                .unwrap();
        }
        book.merge("S", Coord::new(1, 1), Coord::new(1, 2)).unwrap();
        book.merge("S", Coord::new(2, 1), Coord::new(3, 1)).unwrap();
        book.merge("S", Coord::new(4, 1), Coord::new(4, 2)).unwrap();
        for (y, row) in (3..).zip(rows) {
            for (x, text) in (1..).zip(row) {
                if !text.is_empty() {
                    book.set_cell("S", Coord::new(x, y), &Value::Str((*text).into()))
                        .unwrap();
                }
            }
        }
        book
    }

    #[test]
    fn reads_typed_records() {
        let book = workbook(&[["a", "1", "-2", "0.5"], ["b", "65535", "7", "3"]]);
        let outcome = Reader::<Row>::new().unwrap().read(&book, "S").unwrap();
        assert!(outcome.is_clean(), "{:?}", outcome.diagnostics);
        assert_eq!(
            outcome.records,
            vec![
                Row {
                    name: "a".into(),
                    span: Span { from: 1, to: -2 },
                    ratio: 0.5,
                },
                Row {
                    name: "b".into(),
                    span: Span { from: 65535, to: 7 },
                    ratio: 3.0,
                },
            ]
        );
    }

    #[test]
    fn empty_cells_keep_defaults_without_diagnostics() {
        let book = workbook(&[["", "", "4", ""]]);
        let outcome = Reader::<Row>::new().unwrap().read(&book, "S").unwrap();
        assert!(outcome.is_clean());
        assert_eq!(
            outcome.records,
            vec![Row {
                span: Span { from: 0, to: 4 },
                ..Row::default()
            }]
        );
    }

    #[test]
    fn bad_cells_become_diagnostics() {
        let book = workbook(&[["a", "-1", "x", "1e400"], ["b", "70000", "2", "1.5"]]);
        let outcome = Reader::<Row>::new().unwrap().read(&book, "S").unwrap();

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].name, "a");
        assert_eq!(outcome.records[0].span, Span::default());
        assert_eq!(outcome.records[1].span.to, 2);

        let failures: Vec<_> = outcome
            .diagnostics
            .iter()
            .filter_map(|d| match d {
                Diagnostic::Bind(err) => Some((err.path.join("."), err.row, err.raw.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(
            failures,
            vec![
                ("span.from".to_string(), 3, "-1"),
                ("span.to".to_string(), 3, "x"),
                ("span.from".to_string(), 4, "70000"),
            ]
        );
        // "1e400" parses to infinity, which an f64 field accepts.
        assert!(outcome.records[0].ratio.is_infinite());
    }

    #[test]
    fn row_window_limits_binding() {
        let book = workbook(&[["a", "", "", ""], ["b", "", "", ""], ["c", "", "", ""]]);
        let reader = Reader::<Row>::with_options(ReadOptions {
            data_rows: Some((4, 5)),
        })
        .unwrap();
        let names: Vec<_> = reader
            .read(&book, "S")
            .unwrap()
            .records
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn missing_sheet_is_fatal() {
        let err = Reader::<Row>::new()
            .unwrap()
            .read(&Workbook::new(), "S")
            .unwrap_err();
        assert!(matches!(err, GridError::NotFound(_)));
    }

    #[test]
    fn outcome_serializes() {
        let book = workbook(&[["a", "1", "oops", "2"]]);
        let outcome = Reader::<Row>::new().unwrap().read(&book, "S").unwrap();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["records"][0]["span"]["from"], 1);
        assert_eq!(json["diagnostics"][0]["type"], "bind");
        assert_eq!(json["diagnostics"][0]["raw"], "oops");
    }
}
