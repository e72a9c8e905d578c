//! Raw cell grid loaded from a backend sheet.
//!
//! Every cell of a merged region except its top-left anchor is an alias of
//! that anchor. Neighbour and parent links skip aliases, which turns the
//! header block into an implicit tree: a header cell's children are the
//! cells directly below its span.

use std::collections::{BTreeMap, HashMap};

use crate::backend::Backend;
use crate::cell_ref::{cells_in_range, Coord};
use crate::error::{GridError, Result};

/// Index of a cell inside its [`CellGrid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(usize);

/// One raw cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellValue {
    pub x: u32,
    pub y: u32,
    pub raw: String,
    /// Anchor of the merge region; `None` for anchors and unmerged cells.
    pub alias: Option<CellId>,
    /// Nearest unaliased cell to the left in the same row.
    pub prev: Option<CellId>,
    /// Nearest unaliased cell to the right in the same row.
    pub next: Option<CellId>,
    /// Cell directly above, resolved to its anchor.
    pub parent: Option<CellId>,
}

impl CellValue {
    #[must_use]
    pub fn coord(&self) -> Coord {
        Coord::new(self.x, self.y)
    }

    #[must_use]
    pub fn is_alias(&self) -> bool {
        self.alias.is_some()
    }
}

/// Cells of one sheet in reading order, indexed by coordinate.
#[derive(Debug, Clone)]
pub struct CellGrid {
    sheet: String,
    cells: Vec<CellValue>,
    index: HashMap<Coord, CellId>,
    /// Unaliased, non-empty cells grouped by parent, left to right.
    children: HashMap<CellId, Vec<CellId>>,
    max_row: u32,
}

fn coord_of(row_idx: usize, col_idx: usize) -> Option<Coord> {
    let x = u32::try_from(col_idx + 1).ok()?;
    let y = u32::try_from(row_idx + 1).ok()?;
    Some(Coord::new(x, y))
}

impl CellGrid {
    /// Load the sheet's cells and merges and link them up.
    pub fn load<B: Backend + ?Sized>(backend: &B, sheet: &str) -> Result<Self> {
        if !backend.has_sheet(sheet) {
            return Err(GridError::NotFound(sheet.to_string()));
        }

        // (row, col) -> (raw, anchor coordinate)
        let mut raw: BTreeMap<(u32, u32), (String, Option<Coord>)> = BTreeMap::new();
        for (row_idx, row) in backend.rows(sheet)?.into_iter().enumerate() {
            for (col_idx, text) in row.into_iter().enumerate() {
                if let Some(at) = coord_of(row_idx, col_idx) {
                    raw.insert((at.y, at.x), (text, None));
                }
            }
        }

        let merges = backend.merge_ranges(sheet)?;
        for &(start, end) in &merges {
            let mut region = cells_in_range(start, end).into_iter();
            let Some(anchor) = region.next() else {
                continue;
            };
            raw.entry((anchor.y, anchor.x)).or_default();
            for at in region {
                raw.entry((at.y, at.x)).or_default().1 = Some(anchor);
            }
        }

        let mut cells = Vec::with_capacity(raw.len());
        let mut index = HashMap::with_capacity(raw.len());
        let mut anchors = Vec::new();
        for ((y, x), (text, anchor)) in raw {
            let id = CellId(cells.len());
            index.insert(Coord::new(x, y), id);
            if let Some(anchor) = anchor {
                anchors.push((id, anchor));
            }
            cells.push(CellValue {
                x,
                y,
                raw: text,
                alias: None,
                prev: None,
                next: None,
                parent: None,
            });
        }

        let mut grid = Self {
            sheet: sheet.to_string(),
            max_row: cells.iter().map(|c| c.y).max().unwrap_or(0),
            cells,
            index,
            children: HashMap::new(),
        };

        for (id, anchor) in anchors {
            let anchor_id = grid.index.get(&anchor).copied();
            if let Some(cell) = grid.cells.get_mut(id.0) {
                cell.alias = anchor_id;
            }
        }
        grid.link();

        log::debug!(
            "loaded sheet [{}]: {} cells, {} merges, {} rows",
            grid.sheet,
            grid.cells.len(),
            merges.len(),
            grid.max_row
        );
        Ok(grid)
    }

    /// Fill in `prev`, `next`, `parent` and the children index.
    fn link(&mut self) {
        let mut links = Vec::with_capacity(self.cells.len());
        for (idx, cell) in self.cells.iter().enumerate() {
            let id = CellId(idx);
            let prev = self.neighbour(cell.coord(), Coord::left);
            let next = self.neighbour(cell.coord(), |c| Some(c.right()));
            let parent = cell
                .coord()
                .above()
                .and_then(|above| self.id_at(above))
                .map(|above| self.anchor_of(above));
            links.push((id, prev, next, parent));
        }

        for (id, prev, next, parent) in links {
            let Some(cell) = self.cells.get_mut(id.0) else {
                continue;
            };
            cell.prev = prev;
            cell.next = next;
            cell.parent = parent;
            if let Some(parent) = parent {
                if cell.alias.is_none() && !cell.raw.is_empty() {
                    self.children.entry(parent).or_default().push(id);
                }
            }
        }
    }

    /// Walk from `from` with `step` to the first unaliased cell, stopping at
    /// the first gap.
    fn neighbour(&self, from: Coord, step: impl Fn(Coord) -> Option<Coord>) -> Option<CellId> {
        let mut at = step(from)?;
        loop {
            let id = self.id_at(at)?;
            if !self.cell(id).is_alias() {
                return Some(id);
            }
            at = step(at)?;
        }
    }

    #[must_use]
    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    /// Borrow a cell.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this grid.
    #[must_use]
    #[allow(clippy::indexing_slicing)]
    pub fn cell(&self, id: CellId) -> &CellValue {
        &self.cells[id.0]
    }

    #[must_use]
    pub fn id_at(&self, at: Coord) -> Option<CellId> {
        self.index.get(&at).copied()
    }

    #[must_use]
    pub fn get(&self, at: Coord) -> Option<&CellValue> {
        self.id_at(at).map(|id| self.cell(id))
    }

    /// Raw text at column `x`, row `y`.
    #[must_use]
    pub fn raw_at(&self, x: u32, y: u32) -> Option<&str> {
        self.get(Coord::new(x, y)).map(|c| c.raw.as_str())
    }

    /// The merge anchor of `id`, or `id` itself.
    #[must_use]
    pub fn anchor_of(&self, id: CellId) -> CellId {
        self.cell(id).alias.unwrap_or(id)
    }

    /// Last row holding a cell, 0 for an empty sheet.
    #[must_use]
    pub fn max_row(&self) -> u32 {
        self.max_row
    }

    /// Unaliased cells of `row`, left to right.
    #[must_use]
    pub fn header_cells(&self, row: u32) -> Vec<CellId> {
        // Reading order keeps each row's cells contiguous and sorted by x.
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.y == row && !c.is_alias())
            .map(|(idx, _)| CellId(idx))
            .collect()
    }

    /// Non-empty, unaliased cells whose parent is `id`, restricted to the
    /// header block `1..=header_rows`.
    #[must_use]
    pub fn children(&self, id: CellId, header_rows: u32) -> Vec<CellId> {
        self.children
            .get(&id)
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|&child| self.cell(child).y <= header_rows)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All cells in reading order.
    pub fn iter(&self) -> impl Iterator<Item = (CellId, &CellValue)> {
        self.cells
            .iter()
            .enumerate()
            .map(|(idx, cell)| (CellId(idx), cell))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
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
    use crate::record::Value;

    /// Two header rows: `Title` over `Main | Sub`, `Remark` merged down.
    fn two_level() -> Workbook {
        let mut book = Workbook::new();
        book.create_sheet("S").unwrap();
        let mut put = |x, y, s: &str| {
            book.set_cell("S", Coord::new(x, y), &Value::Str(s.into()))
                .unwrap();
        };
        put(1, 1, "Title");
        put(3, 1, "Remark");
        put(1, 2, "Main");
        put(2, 2, "Sub");
        put(1, 3, "m");
        put(2, 3, "s");
        put(3, 3, "r");
        book.merge("S", Coord::new(1, 1), Coord::new(2, 1)).unwrap();
        book.merge("S", Coord::new(3, 1), Coord::new(3, 2)).unwrap();
        book
    }

    fn at(grid: &CellGrid, x: u32, y: u32) -> CellId {
        grid.id_at(Coord::new(x, y)).unwrap()
    }

    #[test]
    fn missing_sheet() {
        let err = CellGrid::load(&Workbook::new(), "nope").unwrap_err();
        assert!(matches!(err, GridError::NotFound(ref s) if s == "nope"));
    }

    #[test]
    fn merged_cells_alias_their_anchor() {
        let grid = CellGrid::load(&two_level(), "S").unwrap();
        let title = at(&grid, 1, 1);
        assert_eq!(grid.cell(at(&grid, 2, 1)).alias, Some(title));
        assert_eq!(grid.anchor_of(at(&grid, 2, 1)), title);
        assert_eq!(grid.cell(title).alias, None);
        // C2 was never written; the merge synthesizes it.
        let c2 = grid.get(Coord::new(3, 2)).unwrap();
        assert_eq!(c2.raw, "");
        assert_eq!(c2.alias, Some(at(&grid, 3, 1)));
        assert_eq!(grid.max_row(), 3);
    }

    #[test]
    fn neighbours_skip_aliases() {
        let grid = CellGrid::load(&two_level(), "S").unwrap();
        let title = at(&grid, 1, 1);
        let remark = at(&grid, 3, 1);
        assert_eq!(grid.cell(title).next, Some(remark));
        assert_eq!(grid.cell(remark).prev, Some(title));
        assert_eq!(grid.cell(title).prev, None);
        assert_eq!(grid.header_cells(1), vec![title, remark]);
    }

    #[test]
    fn parents_resolve_through_aliases() {
        let grid = CellGrid::load(&two_level(), "S").unwrap();
        let title = at(&grid, 1, 1);
        let remark = at(&grid, 3, 1);
        assert_eq!(grid.cell(at(&grid, 2, 2)).parent, Some(title));
        assert_eq!(grid.cell(at(&grid, 3, 3)).parent, Some(remark));
        assert_eq!(
            grid.children(title, 2),
            vec![at(&grid, 1, 2), at(&grid, 2, 2)]
        );
        assert!(grid.children(remark, 2).is_empty());
        assert!(grid.children(at(&grid, 1, 2), 2).is_empty());
        assert_eq!(grid.children(at(&grid, 1, 2), 3), vec![at(&grid, 1, 3)]);
    }

    #[test]
    fn raw_lookup() {
        let grid = CellGrid::load(&two_level(), "S").unwrap();
        assert_eq!(grid.raw_at(2, 3), Some("s"));
        assert_eq!(grid.raw_at(9, 9), None);
        assert_eq!(grid.sheet(), "S");
        assert_eq!(grid.len(), 9);
        assert_eq!(grid.iter().count(), grid.len());
    }

    #[test]
    fn empty_cells_are_not_children() {
        let mut book = Workbook::new();
        book.create_sheet("S").unwrap();
        book.set_cell("S", Coord::new(1, 1), &Value::Str("A".into()))
            .unwrap();
        book.set_cell("S", Coord::new(2, 2), &Value::Str("x".into()))
            .unwrap();
        let grid = CellGrid::load(&book, "S").unwrap();
        // A2 exists as an empty gap filler.
        assert_eq!(grid.raw_at(1, 2), Some(""));
        assert!(grid.children(at(&grid, 1, 1), 2).is_empty());
    }
}
