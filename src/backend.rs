//! Spreadsheet storage contract and an in-memory implementation.
//!
//! The renderer writes through [`Backend`] and the grid reader loads through
//! it, so any storage with named sheets, string cells and rectangular merges
//! can be plugged in. [`Workbook`] keeps everything in memory and is what the
//! [`xlsx`](crate::xlsx) codec reads into and writes from.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::cell_ref::{format_range, Coord};
use crate::error::{GridError, Result};
use crate::record::Value;

/// Visual role of a cell range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CellStyle {
    Header,
    Body,
}

/// Storage the renderer and grid reader talk to.
///
/// Coordinates are 1-based. Reads of a missing sheet fail with
/// [`GridError::NotFound`].
pub trait Backend {
    fn has_sheet(&self, sheet: &str) -> bool;

    /// All rows from row 1 to the last non-empty row. Each row lists its
    /// cells from column 1 up to the last present one; gaps are empty strings.
    fn rows(&self, sheet: &str) -> Result<Vec<Vec<String>>>;

    /// Merged regions as inclusive `(top_left, bottom_right)` pairs.
    fn merge_ranges(&self, sheet: &str) -> Result<Vec<(Coord, Coord)>>;

    /// Create the sheet if it does not exist yet.
    fn create_sheet(&mut self, sheet: &str) -> Result<()>;

    fn set_cell(&mut self, sheet: &str, at: Coord, value: &Value) -> Result<()>;

    /// Merge the rectangle spanned by `start` and `end`.
    fn merge(&mut self, sheet: &str, start: Coord, end: Coord) -> Result<()>;

    fn set_style(&mut self, sheet: &str, start: Coord, end: Coord, style: CellStyle)
        -> Result<()>;
}

/// One worksheet of a [`Workbook`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    name: String,
    /// Keyed by `(row, col)` so iteration is in reading order.
    cells: BTreeMap<(u32, u32), Value>,
    merges: Vec<(Coord, Coord)>,
    styles: BTreeMap<(u32, u32), CellStyle>,
}

fn normalize(start: Coord, end: Coord) -> (Coord, Coord) {
    (
        Coord::new(start.x.min(end.x), start.y.min(end.y)),
        Coord::new(start.x.max(end.x), start.y.max(end.y)),
    )
}

fn check_coord(at: Coord) -> Result<()> {
    if at.x == 0 || at.y == 0 {
        return Err(GridError::CellRef(format!(
            "coordinates are 1-based, got column {} row {}",
            at.x, at.y
        )));
    }
    Ok(())
}

fn overlaps(a: (Coord, Coord), b: (Coord, Coord)) -> bool {
    a.0.x <= b.1.x && b.0.x <= a.1.x && a.0.y <= b.1.y && b.0.y <= a.1.y
}

impl Sheet {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn cell(&self, at: Coord) -> Option<&Value> {
        self.cells.get(&(at.y, at.x))
    }

    /// Present cells in reading order.
    pub fn cells(&self) -> impl Iterator<Item = (Coord, &Value)> {
        self.cells
            .iter()
            .map(|(&(y, x), value)| (Coord::new(x, y), value))
    }

    pub fn set_value(&mut self, at: Coord, value: Value) -> Result<()> {
        check_coord(at)?;
        self.cells.insert((at.y, at.x), value);
        Ok(())
    }

    #[must_use]
    pub fn merges(&self) -> &[(Coord, Coord)] {
        &self.merges
    }

    /// Record a merged region. Single cells are ignored; a region that
    /// overlaps an existing one is refused.
    pub fn add_merge(&mut self, start: Coord, end: Coord) -> Result<()> {
        check_coord(start)?;
        check_coord(end)?;
        let range = normalize(start, end);
        if range.0 == range.1 {
            return Ok(());
        }
        if let Some(existing) = self.merges.iter().find(|&&m| overlaps(m, range)) {
            return Err(GridError::Backend(format!(
                "merge {} overlaps {} on sheet [{}]",
                format_range(range.0, range.1),
                format_range(existing.0, existing.1),
                self.name
            )));
        }
        self.merges.push(range);
        Ok(())
    }

    #[must_use]
    pub fn style(&self, at: Coord) -> Option<CellStyle> {
        self.styles.get(&(at.y, at.x)).copied()
    }

    /// Styled cells in reading order.
    pub fn styles(&self) -> impl Iterator<Item = (Coord, CellStyle)> + '_ {
        self.styles
            .iter()
            .map(|(&(y, x), &style)| (Coord::new(x, y), style))
    }

    pub fn apply_style(&mut self, start: Coord, end: Coord, style: CellStyle) -> Result<()> {
        check_coord(start)?;
        check_coord(end)?;
        let (top_left, bottom_right) = normalize(start, end);
        for y in top_left.y..=bottom_right.y {
            for x in top_left.x..=bottom_right.x {
                self.styles.insert((y, x), style);
            }
        }
        Ok(())
    }

    /// Last row holding a value, 0 for an empty sheet.
    #[must_use]
    pub fn max_row(&self) -> u32 {
        self.cells.keys().next_back().map_or(0, |&(y, _)| y)
    }

    /// Rightmost column holding a value, 0 for an empty sheet.
    #[must_use]
    pub fn max_col(&self) -> u32 {
        self.cells.keys().map(|&(_, x)| x).max().unwrap_or(0)
    }

    /// Cell strings row by row, in the shape [`Backend::rows`] returns.
    #[must_use]
    pub fn rows(&self) -> Vec<Vec<String>> {
        let mut rows: Vec<Vec<String>> = Vec::new();
        for (&(y, x), value) in &self.cells {
            let row_index = (y - 1) as usize;
            if rows.len() <= row_index {
                rows.resize_with(row_index + 1, Vec::new);
            }
            if let Some(row) = rows.get_mut(row_index) {
                let col_index = (x - 1) as usize;
                if row.len() <= col_index {
                    row.resize(col_index + 1, String::new());
                }
                if let Some(slot) = row.get_mut(col_index) {
                    *slot = value.to_string();
                }
            }
        }
        rows
    }
}

/// An in-memory workbook: an ordered list of named sheets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    #[must_use]
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(Sheet::name).collect()
    }

    #[must_use]
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    /// Append a sheet, replacing any sheet with the same name.
    pub fn push_sheet(&mut self, sheet: Sheet) {
        if let Some(existing) = self.sheet_mut(&sheet.name) {
            *existing = sheet;
        } else {
            self.sheets.push(sheet);
        }
    }

    fn existing(&self, name: &str) -> Result<&Sheet> {
        self.sheet(name)
            .ok_or_else(|| GridError::NotFound(name.to_string()))
    }

    fn existing_mut(&mut self, name: &str) -> Result<&mut Sheet> {
        self.sheet_mut(name)
            .ok_or_else(|| GridError::NotFound(name.to_string()))
    }
}

impl Backend for Workbook {
    fn has_sheet(&self, sheet: &str) -> bool {
        self.sheet(sheet).is_some()
    }

    fn rows(&self, sheet: &str) -> Result<Vec<Vec<String>>> {
        Ok(self.existing(sheet)?.rows())
    }

    fn merge_ranges(&self, sheet: &str) -> Result<Vec<(Coord, Coord)>> {
        Ok(self.existing(sheet)?.merges().to_vec())
    }

    fn create_sheet(&mut self, sheet: &str) -> Result<()> {
        if sheet.is_empty() {
            return Err(GridError::Backend("sheet name must not be empty".to_string()));
        }
        if !self.has_sheet(sheet) {
            self.sheets.push(Sheet::new(sheet));
        }
        Ok(())
    }

    fn set_cell(&mut self, sheet: &str, at: Coord, value: &Value) -> Result<()> {
        self.existing_mut(sheet)?.set_value(at, value.clone())
    }

    fn merge(&mut self, sheet: &str, start: Coord, end: Coord) -> Result<()> {
        self.existing_mut(sheet)?.add_merge(start, end)
    }

    fn set_style(
        &mut self,
        sheet: &str,
        start: Coord,
        end: Coord,
        style: CellStyle,
    ) -> Result<()> {
        self.existing_mut(sheet)?.apply_style(start, end, style)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn c(x: u32, y: u32) -> Coord {
        Coord::new(x, y)
    }

    #[test]
    fn missing_sheet_is_not_found() {
        let book = Workbook::new();
        assert!(!book.has_sheet("Data"));
        assert!(matches!(book.rows("Data"), Err(GridError::NotFound(ref s)) if s == "Data"));
        assert!(matches!(
            book.merge_ranges("Data"),
            Err(GridError::NotFound(_))
        ));
    }

    #[test]
    fn create_sheet_is_idempotent() {
        let mut book = Workbook::new();
        book.create_sheet("Data").unwrap();
        book.set_cell("Data", c(1, 1), &Value::Str("kept".into()))
            .unwrap();
        book.create_sheet("Data").unwrap();
        assert_eq!(book.sheet_names(), vec!["Data"]);
        assert_eq!(
            book.sheet("Data").unwrap().cell(c(1, 1)),
            Some(&Value::Str("kept".into()))
        );
        assert!(book.create_sheet("").is_err());
    }

    #[test]
    fn rows_fill_gaps_with_empty_strings() {
        let mut book = Workbook::new();
        book.create_sheet("S").unwrap();
        book.set_cell("S", c(3, 1), &Value::Int(-2)).unwrap();
        book.set_cell("S", c(1, 3), &Value::Str("a".into())).unwrap();
        book.set_cell("S", c(2, 3), &Value::Float(1.5)).unwrap();

        let rows = book.rows("S").unwrap();
        assert_eq!(
            rows,
            vec![
                vec![String::new(), String::new(), "-2".to_string()],
                vec![],
                vec!["a".to_string(), "1.5".to_string()],
            ]
        );
        let sheet = book.sheet("S").unwrap();
        assert_eq!(sheet.max_row(), 3);
        assert_eq!(sheet.max_col(), 3);
    }

    #[test]
    fn merges_are_normalized_and_may_not_overlap() {
        let mut book = Workbook::new();
        book.create_sheet("S").unwrap();
        book.merge("S", c(3, 2), c(1, 1)).unwrap();
        book.merge("S", c(4, 1), c(4, 1)).unwrap();
        assert_eq!(book.merge_ranges("S").unwrap(), vec![(c(1, 1), c(3, 2))]);

        let err = book.merge("S", c(3, 2), c(4, 3)).unwrap_err();
        assert!(matches!(err, GridError::Backend(ref msg) if msg.contains("A1:C2")));
        book.merge("S", c(4, 1), c(5, 2)).unwrap();
        assert_eq!(book.merge_ranges("S").unwrap().len(), 2);
    }

    #[test]
    fn styles_cover_the_range() {
        let mut book = Workbook::new();
        book.create_sheet("S").unwrap();
        book.set_style("S", c(1, 1), c(2, 2), CellStyle::Header)
            .unwrap();
        book.set_style("S", c(2, 2), c(2, 2), CellStyle::Body).unwrap();
        let sheet = book.sheet("S").unwrap();
        assert_eq!(sheet.style(c(1, 2)), Some(CellStyle::Header));
        assert_eq!(sheet.style(c(2, 2)), Some(CellStyle::Body));
        assert_eq!(sheet.style(c(3, 1)), None);
    }

    #[test]
    fn zero_coordinates_are_rejected() {
        let mut book = Workbook::new();
        book.create_sheet("S").unwrap();
        assert!(matches!(
            book.set_cell("S", c(0, 1), &Value::Int(1)),
            Err(GridError::CellRef(_))
        ));
    }
}
