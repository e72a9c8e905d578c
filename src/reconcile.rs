//! Header reconciliation: locate schema columns inside an existing sheet.
//!
//! The header block of a [`CellGrid`] forms an implicit tree (a cell's
//! children are the cells directly below its span). A schema subtree matches
//! a header subtree when levels, titles and child counts agree all the way
//! down, regardless of the order of siblings. Each matched node is bound to
//! the column of its header cell.

use std::collections::{HashMap, HashSet};

use crate::error::Diagnostic;
use crate::grid::{CellGrid, CellId};
use crate::schema::{NodeId, SchemaTree};

/// Where each schema node was found, plus what could not be matched.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    columns: HashMap<NodeId, u32>,
    diagnostics: Vec<Diagnostic>,
}

impl Reconciliation {
    /// The sheet column of a matched node. For a composite this is the
    /// first column of its span.
    #[must_use]
    pub fn column(&self, id: NodeId) -> Option<u32> {
        self.columns.get(&id).copied()
    }

    /// Number of matched nodes.
    #[must_use]
    pub fn matched(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    #[must_use]
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

/// All nodes at `level` titled `title`, in pre-order.
#[must_use]
pub fn find_nodes_by_tag(tree: &SchemaTree, level: u32, title: &str) -> Vec<NodeId> {
    tree.node_ids()
        .into_iter()
        .filter(|&id| {
            let node = tree.node(id);
            node.level == level && node.title == title
        })
        .collect()
}

/// Whether the schema subtree at `node` matches the header subtree at `cell`.
#[must_use]
pub fn full_match(tree: &SchemaTree, grid: &CellGrid, node: NodeId, cell: CellId) -> bool {
    match_subtree(tree, grid, node, cell, &mut Vec::new())
}

/// On success `bindings` gains one `(node, column)` pair per node of the
/// subtree; on failure it is left as it was.
fn match_subtree(
    tree: &SchemaTree,
    grid: &CellGrid,
    node: NodeId,
    cell: CellId,
    bindings: &mut Vec<(NodeId, u32)>,
) -> bool {
    let schema = tree.node(node);
    let header = grid.cell(cell);
    if schema.level != header.y || schema.title != header.raw {
        return false;
    }

    let grid_children = grid.children(cell, tree.header_rows());
    if schema.is_leaf() {
        if !grid_children.is_empty() {
            return false;
        }
        bindings.push((node, header.x));
        return true;
    }
    if grid_children.len() != schema.children.len() {
        return false;
    }

    let mark = bindings.len();
    let mut claimed = vec![false; schema.children.len()];
    for &child_cell in &grid_children {
        let title = &grid.cell(child_cell).raw;
        let mut found = false;
        for (slot, &child) in claimed.iter_mut().zip(&schema.children) {
            if *slot || tree.node(child).title != *title {
                continue;
            }
            if match_subtree(tree, grid, child, child_cell, bindings) {
                *slot = true;
                found = true;
                break;
            }
        }
        if !found {
            bindings.truncate(mark);
            return false;
        }
    }

    bindings.push((node, header.x));
    true
}

/// Match every top-row header against the schema roots.
///
/// Unmatched non-empty headers and leaves left without a column are
/// reported as diagnostics; neither stops the read.
#[must_use]
pub fn reconcile(tree: &SchemaTree, grid: &CellGrid) -> Reconciliation {
    let mut result = Reconciliation::default();
    let mut claimed: HashSet<NodeId> = HashSet::new();

    for cell in grid.header_cells(1) {
        let header = grid.cell(cell);
        let mut bindings = Vec::new();
        let matched = find_nodes_by_tag(tree, 1, &header.raw)
            .into_iter()
            .filter(|root| !claimed.contains(root))
            .find(|&root| match_subtree(tree, grid, root, cell, &mut bindings));

        if let Some(root) = matched {
            claimed.insert(root);
            result.columns.extend(bindings);
        } else if !header.raw.trim().is_empty() {
            log::warn!(
                "header [{}] at {} in sheet [{}] matches no schema field",
                header.raw,
                header.coord(),
                grid.sheet()
            );
            result.diagnostics.push(Diagnostic::UnmatchedHeader {
                x: header.x,
                y: header.y,
                title: header.raw.clone(),
            });
        }
    }

    for leaf in tree.leaves() {
        if !result.columns.contains_key(&leaf) {
            let path = tree.paths(leaf);
            log::warn!("no column found for [{}]", path.join("->"));
            result.diagnostics.push(Diagnostic::ReconciliationGap { path });
        }
    }

    log::debug!(
        "reconciled sheet [{}]: {} of {} nodes matched",
        grid.sheet(),
        result.columns.len(),
        tree.len()
    );
    result
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
    use crate::backend::{Backend, Workbook};
    use crate::cell_ref::Coord;
    use crate::record::Value;

    crate::record! {
        #[derive(Debug, Default)]
        struct Heading {
            #[grid("col:Main")]
            main: String,
            #[grid("col:Sub")]
            sub: String,
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct Simple {
            #[grid("col:Title")]
            title: Heading,
            #[grid("col:Remark")]
            remark: String,
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct Twins {
            #[grid("col:Name")]
            first: String,
            #[grid("col:Name")]
            second: String,
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct Pair {
            #[grid("col:Value")]
            left: String,
            #[grid("col:Value")]
            right: String,
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct One {
            #[grid("col:x")]
            x: String,
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct Two {
            #[grid("col:x")]
            x: String,
            #[grid("col:y")]
            y: String,
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct Points {
            #[grid("col:Point")]
            wide: Two,
            #[grid("col:Point")]
            narrow: One,
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct Nested {
            #[grid("col:Group")]
            group: Pair,
            #[grid("col:Points")]
            points: Points,
        }
    }

    /// Build a sheet from `(x, y, text)` cells and merge ranges.
    fn sheet(cells: &[(u32, u32, &str)], merges: &[((u32, u32), (u32, u32))]) -> CellGrid {
        let mut book = Workbook::new();
        book.create_sheet("S").unwrap();
        for &(x, y, text) in cells {
            book.set_cell("S", Coord::new(x, y), &Value::Str(text.into()))
                .unwrap();
        }
        for &((x0, y0), (x1, y1)) in merges {
            book.merge("S", Coord::new(x0, y0), Coord::new(x1, y1))
                .unwrap();
        }
        CellGrid::load(&book, "S").unwrap()
    }

    fn root(tree: &SchemaTree, title: &str) -> NodeId {
        find_nodes_by_tag(tree, 1, title)[0]
    }

    #[test]
    fn finds_nodes_by_level_and_title() {
        let tree = SchemaTree::build::<Simple>().unwrap();
        assert_eq!(find_nodes_by_tag(&tree, 2, "Main").len(), 1);
        assert!(find_nodes_by_tag(&tree, 1, "Main").is_empty());
        assert_eq!(find_nodes_by_tag(&tree, 1, "Remark").len(), 1);
    }

    #[test]
    fn matches_in_declaration_order() {
        let tree = SchemaTree::build::<Simple>().unwrap();
        let grid = sheet(
            &[(1, 1, "Title"), (3, 1, "Remark"), (1, 2, "Main"), (2, 2, "Sub")],
            &[((1, 1), (2, 1)), ((3, 1), (3, 2))],
        );
        let title_cell = grid.id_at(Coord::new(1, 1)).unwrap();
        assert!(full_match(&tree, &grid, root(&tree, "Title"), title_cell));
        assert!(!full_match(&tree, &grid, root(&tree, "Remark"), title_cell));

        let result = reconcile(&tree, &grid);
        assert!(result.diagnostics().is_empty());
        assert_eq!(result.matched(), tree.len());
        for leaf in tree.leaves() {
            assert_eq!(result.column(leaf), Some(tree.offset_x(leaf)));
        }
    }

    #[test]
    fn tolerates_reordered_siblings() {
        let tree = SchemaTree::build::<Simple>().unwrap();
        // Remark first, then Title with Sub before Main.
        let grid = sheet(
            &[(1, 1, "Remark"), (2, 1, "Title"), (2, 2, "Sub"), (3, 2, "Main")],
            &[((1, 1), (1, 2)), ((2, 1), (3, 1))],
        );
        let result = reconcile(&tree, &grid);
        assert!(result.diagnostics().is_empty());

        let title = root(&tree, "Title");
        let main = tree.find_child_by_title(title, "Main").unwrap();
        let sub = tree.find_child_by_title(title, "Sub").unwrap();
        assert_eq!(result.column(root(&tree, "Remark")), Some(1));
        assert_eq!(result.column(title), Some(2));
        assert_eq!(result.column(sub), Some(2));
        assert_eq!(result.column(main), Some(3));
    }

    #[test]
    fn child_count_mismatch_leaves_a_gap() {
        let tree = SchemaTree::build::<Simple>().unwrap();
        let grid = sheet(
            &[
                (1, 1, "Title"),
                (4, 1, "Remark"),
                (1, 2, "Main"),
                (2, 2, "Sub"),
                (3, 2, "Extra"),
            ],
            &[((1, 1), (3, 1)), ((4, 1), (4, 2))],
        );
        let result = reconcile(&tree, &grid);
        let title = root(&tree, "Title");
        assert_eq!(result.column(title), None);
        assert_eq!(result.column(root(&tree, "Remark")), Some(4));

        let diagnostics = result.diagnostics();
        assert!(diagnostics.contains(&Diagnostic::UnmatchedHeader {
            x: 1,
            y: 1,
            title: "Title".into()
        }));
        let gaps = diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::ReconciliationGap { .. }))
            .count();
        assert_eq!(gaps, 2);
    }

    #[test]
    fn leaf_with_children_does_not_match() {
        let tree = SchemaTree::build::<Simple>().unwrap();
        // Remark is not merged down and has a header below it.
        let grid = sheet(
            &[
                (1, 1, "Title"),
                (3, 1, "Remark"),
                (1, 2, "Main"),
                (2, 2, "Sub"),
                (3, 2, "Oops"),
            ],
            &[((1, 1), (2, 1))],
        );
        let result = reconcile(&tree, &grid);
        assert_eq!(result.column(root(&tree, "Remark")), None);
        assert!(result.column(root(&tree, "Title")).is_some());
    }

    #[test]
    fn unknown_and_blank_headers() {
        let tree = SchemaTree::build::<Simple>().unwrap();
        let grid = sheet(
            &[
                (1, 1, "Title"),
                (3, 1, "Remark"),
                (5, 1, "Notes"),
                (1, 2, "Main"),
                (2, 2, "Sub"),
            ],
            &[((1, 1), (2, 1)), ((3, 1), (3, 2)), ((5, 1), (5, 2))],
        );
        let result = reconcile(&tree, &grid);
        // D1 is an empty gap filler and is not reported.
        assert_eq!(
            result.diagnostics(),
            &[Diagnostic::UnmatchedHeader {
                x: 5,
                y: 1,
                title: "Notes".into()
            }]
        );
    }

    #[test]
    fn duplicate_titles_claim_distinct_nodes() {
        let tree = SchemaTree::build::<Twins>().unwrap();
        let grid = sheet(&[(1, 1, "Name"), (2, 1, "Name")], &[]);
        let result = reconcile(&tree, &grid);
        assert!(result.diagnostics().is_empty());
        let columns: Vec<_> = tree
            .roots()
            .iter()
            .map(|&r| result.column(r).unwrap())
            .collect();
        assert_eq!(columns, vec![1, 2]);
    }

    fn leaf_columns(tree: &SchemaTree, result: &Reconciliation) -> Vec<(String, Option<u32>)> {
        tree.leaves()
            .into_iter()
            .map(|leaf| (tree.paths(leaf).join("."), result.column(leaf)))
            .collect()
    }

    #[test]
    fn nested_duplicate_titles_claim_distinct_children() {
        let tree = SchemaTree::build::<Nested>().unwrap();
        // Points is laid out narrow first, the reverse of the declaration.
        let grid = sheet(
            &[
                (1, 1, "Group"),
                (1, 2, "Value"),
                (2, 2, "Value"),
                (3, 1, "Points"),
                (3, 2, "Point"),
                (3, 3, "x"),
                (4, 2, "Point"),
                (4, 3, "x"),
                (5, 3, "y"),
            ],
            &[
                ((1, 1), (2, 1)),
                ((1, 2), (1, 3)),
                ((2, 2), (2, 3)),
                ((3, 1), (5, 1)),
                ((4, 2), (5, 2)),
            ],
        );

        let result = reconcile(&tree, &grid);
        assert!(result.diagnostics().is_empty());
        assert_eq!(
            leaf_columns(&tree, &result),
            vec![
                ("group.left".to_string(), Some(1)),
                ("group.right".to_string(), Some(2)),
                ("points.wide.x".to_string(), Some(4)),
                ("points.wide.y".to_string(), Some(5)),
                ("points.narrow.x".to_string(), Some(3)),
            ]
        );
    }
}
