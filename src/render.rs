//! Grid renderer: header block plus one data row per record.

use std::marker::PhantomData;

use crate::backend::{Backend, CellStyle};
use crate::cell_ref::Coord;
use crate::error::Result;
use crate::layout::LayoutBox;
use crate::record::{value_at, Record, Value};
use crate::schema::SchemaTree;

/// Writes records of type `T` to a named sheet.
///
/// ```
/// use xlgrid::{Renderer, Workbook};
///
/// xlgrid::record! {
///     #[derive(Debug, Default)]
///     pub struct Title {
///         #[grid("col:Main")]
///         pub main: String,
///         #[grid("col:Sub")]
///         pub sub: String,
///     }
/// }
///
/// xlgrid::record! {
///     #[derive(Debug, Default)]
///     pub struct Book {
///         #[grid("col:Title")]
///         pub title: Title,
///         #[grid("col:Remark")]
///         pub remark: String,
///     }
/// }
///
/// let mut book = Workbook::new();
/// let renderer = Renderer::<Book>::new("Books")?;
/// renderer.render(&mut book, &[Book::default()])?;
/// assert_eq!(book.sheet("Books").map(|s| s.merges().len()), Some(2));
/// # Ok::<(), xlgrid::GridError>(())
/// ```
#[derive(Debug)]
pub struct Renderer<T: Record> {
    tree: SchemaTree,
    sheet: String,
    _record: PhantomData<fn(&T)>,
}

impl<T: Record> Renderer<T> {
    pub fn new(sheet: impl Into<String>) -> Result<Self> {
        Ok(Self {
            tree: SchemaTree::build::<T>()?,
            sheet: sheet.into(),
            _record: PhantomData,
        })
    }

    #[must_use]
    pub fn tree(&self) -> &SchemaTree {
        &self.tree
    }

    #[must_use]
    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    /// Leaf boxes in column order with one value per record filled in.
    #[must_use]
    pub fn columns(&self, records: &[T]) -> Vec<LayoutBox> {
        self.tree
            .metas()
            .iter()
            .filter(|meta| self.tree.node(meta.node).is_leaf())
            .map(|meta| LayoutBox {
                values: records
                    .iter()
                    .map(|record| value_at(record, &meta.paths))
                    .collect(),
                ..meta.clone()
            })
            .collect()
    }

    /// Create the sheet and write the header block followed by the records.
    pub fn render<B: Backend + ?Sized>(&self, backend: &mut B, records: &[T]) -> Result<()> {
        let sheet = self.sheet.as_str();
        backend.create_sheet(sheet)?;

        let metas = self.tree.metas();
        for meta in metas {
            let start = Coord::new(meta.start_x, meta.start_y);
            let end = Coord::new(meta.end_x, meta.end_y);
            if meta.is_merged() {
                backend.merge(sheet, start, end)?;
            }
            backend.set_cell(sheet, start, &Value::Str(meta.title.clone()))?;
            backend.set_style(sheet, start, end, CellStyle::Header)?;
        }

        let first_row = self.tree.data_row_start();
        for column in self.columns(records) {
            for (row, value) in (first_row..).zip(&column.values) {
                let Some(value) = value else {
                    continue;
                };
                let at = Coord::new(column.start_x, row);
                backend.set_cell(sheet, at, value)?;
                backend.set_style(sheet, at, at, CellStyle::Body)?;
            }
        }

        log::debug!(
            "rendered sheet [{}]: {} header boxes, {} records",
            sheet,
            metas.len(),
            records.len()
        );
        Ok(())
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
    use crate::error::GridError;

    crate::record! {
        #[derive(Debug, Default, Clone)]
        struct Heading {
            #[grid("col:Main")]
            main: String,
            #[grid("col:Sub")]
            sub: String,
        }
    }

    crate::record! {
        #[derive(Debug, Default, Clone)]
        struct Simple {
            #[grid("col:Title")]
            title: Heading,
            #[grid("col:Remark")]
            remark: String,
            #[grid("col:Count")]
            count: u32,
        }
    }

    fn records() -> Vec<Simple> {
        vec![
            Simple {
                title: Heading {
                    main: "m1".into(),
                    sub: "s1".into(),
                },
                remark: "r1".into(),
                count: 1,
            },
            Simple {
                title: Heading {
                    main: "m2".into(),
                    sub: "s2".into(),
                },
                remark: "r2".into(),
                count: 2,
            },
        ]
    }

    #[test]
    fn columns_flatten_values_per_leaf() {
        let renderer = Renderer::<Simple>::new("S").unwrap();
        let columns = renderer.columns(&records());
        let titles: Vec<_> = columns.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Main", "Sub", "Remark", "Count"]);
        assert_eq!(
            columns[1].values,
            vec![Some(Value::Str("s1".into())), Some(Value::Str("s2".into()))]
        );
        assert_eq!(
            columns[3].values,
            vec![Some(Value::Uint(1)), Some(Value::Uint(2))]
        );
        assert_eq!(columns[3].start_x, 4);
    }

    #[test]
    fn writes_headers_merges_and_rows() {
        let mut book = Workbook::new();
        Renderer::<Simple>::new("S")
            .unwrap()
            .render(&mut book, &records())
            .unwrap();

        let sheet = book.sheet("S").unwrap();
        assert_eq!(
            sheet.merges(),
            &[
                (Coord::new(1, 1), Coord::new(2, 1)),
                (Coord::new(3, 1), Coord::new(3, 2)),
                (Coord::new(4, 1), Coord::new(4, 2)),
            ]
        );
        assert_eq!(
            book.rows("S").unwrap(),
            vec![
                vec!["Title", "", "Remark", "Count"],
                vec!["Main", "Sub"],
                vec!["m1", "s1", "r1", "1"],
                vec!["m2", "s2", "r2", "2"],
            ]
        );
        assert_eq!(sheet.style(Coord::new(2, 1)), Some(CellStyle::Header));
        assert_eq!(sheet.style(Coord::new(3, 2)), Some(CellStyle::Header));
        assert_eq!(sheet.style(Coord::new(4, 4)), Some(CellStyle::Body));
        assert_eq!(sheet.style(Coord::new(1, 5)), None);
    }

    #[test]
    fn no_records_writes_only_headers() {
        let mut book = Workbook::new();
        let renderer = Renderer::<Simple>::new("S").unwrap();
        renderer.render(&mut book, &[]).unwrap();
        assert_eq!(book.sheet("S").unwrap().max_row(), 2);
    }

    #[test]
    fn backend_errors_propagate() {
        let mut book = Workbook::new();
        let renderer = Renderer::<Simple>::new("S").unwrap();
        renderer.render(&mut book, &records()).unwrap();
        // Rendering twice would overlap the existing header merges.
        let err = renderer.render(&mut book, &records()).unwrap_err();
        assert!(matches!(err, GridError::Backend(_)));
    }
}
