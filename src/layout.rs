//! Layout engine: column spans, row spans and absolute grid positions.
//!
//! Columns and rows are 1-based. The header block occupies rows
//! `1..=max_level`; a composite node's header is one row tall and spans the
//! columns of all its leaves, a leaf's header spans down to the last header
//! row so the block stays rectangular.

use serde::Serialize;

use crate::record::Value;
use crate::schema::{NodeId, SchemaTree};

/// Rendering and reading descriptor for one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutBox {
    pub node: NodeId,
    pub title: String,
    pub start_x: u32,
    pub end_x: u32,
    pub start_y: u32,
    pub end_y: u32,
    /// Field names from the root record down to this node.
    pub paths: Vec<String>,
    /// One entry per data row, `None` where the record has no value. Only
    /// filled by the renderer, and only for leaves.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Option<Value>>,
}

impl LayoutBox {
    /// Whether the header cell covers more than one grid cell.
    #[must_use]
    pub fn is_merged(&self) -> bool {
        self.start_x != self.end_x || self.start_y != self.end_y
    }
}

impl SchemaTree {
    /// Number of leaf columns under `id`.
    #[must_use]
    pub fn cols(&self, id: NodeId) -> u32 {
        let node = self.node(id);
        if node.is_leaf() {
            return 1;
        }
        node.children.iter().map(|&child| self.cols(child)).sum()
    }

    /// Rows spanned below and including the node's header row.
    #[must_use]
    pub fn rows(&self, id: NodeId) -> u32 {
        (self.max_level + 1).saturating_sub(self.node(id).level)
    }

    /// Whether the node's header cell merges vertically.
    #[must_use]
    pub fn can_merge_rows(&self, id: NodeId) -> bool {
        self.rows(id) > 1
    }

    fn siblings(&self, id: NodeId) -> &[NodeId] {
        match self.node(id).parent {
            Some(parent) => &self.node(parent).children,
            None => &self.roots,
        }
    }

    /// The sibling with `sibling_index - 1`, if any.
    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let index = self.node(id).sibling_index.checked_sub(1)?;
        self.siblings(id)
            .iter()
            .copied()
            .find(|&s| self.node(s).sibling_index == index)
    }

    /// The sibling with `sibling_index + 1`, if any.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let index = self.node(id).sibling_index + 1;
        self.siblings(id)
            .iter()
            .copied()
            .find(|&s| self.node(s).sibling_index == index)
    }

    /// Absolute 1-based starting column. Computed once per node.
    #[must_use]
    pub fn offset_x(&self, id: NodeId) -> u32 {
        *self.node(id).offset.get_or_init(|| {
            if let Some(prev) = self.prev_sibling(id) {
                self.offset_x(prev) + self.cols(prev)
            } else if let Some(parent) = self.node(id).parent {
                self.offset_x(parent)
            } else {
                1
            }
        })
    }

    /// Field names from the root down to `id`.
    #[must_use]
    pub fn paths(&self, id: NodeId) -> Vec<String> {
        let mut paths = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            let node = self.node(cur);
            paths.push(node.field.clone());
            current = node.parent;
        }
        paths.reverse();
        paths
    }

    /// Number of header rows.
    #[must_use]
    pub fn header_rows(&self) -> u32 {
        self.max_level
    }

    /// First row holding record data.
    #[must_use]
    pub fn data_row_start(&self) -> u32 {
        self.max_level + 1
    }

    /// Leaf nodes in column order.
    #[must_use]
    pub fn leaves(&self) -> Vec<NodeId> {
        self.node_ids()
            .into_iter()
            .filter(|&id| self.node(id).is_leaf())
            .collect()
    }

    /// First child of `id` whose title equals `title`.
    #[must_use]
    pub fn find_child_by_title(&self, id: NodeId, title: &str) -> Option<NodeId> {
        self.node(id)
            .children
            .iter()
            .copied()
            .find(|&child| self.node(child).title == title)
    }

    fn meta(&self, id: NodeId) -> LayoutBox {
        let node = self.node(id);
        let start_x = self.offset_x(id);
        let end_y = if node.is_leaf() {
            self.max_level
        } else {
            node.level
        };
        LayoutBox {
            node: id,
            title: node.title.clone(),
            start_x,
            end_x: start_x + self.cols(id) - 1,
            start_y: node.level,
            end_y,
            paths: self.paths(id),
            values: Vec::new(),
        }
    }

    /// One layout box per node, depth-first pre-order. Computed once.
    #[must_use]
    pub fn metas(&self) -> &[LayoutBox] {
        self.metas.get_or_init(|| {
            self.node_ids()
                .into_iter()
                .map(|id| self.meta(id))
                .collect()
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
    use std::collections::HashSet;

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
        struct Names {
            #[grid("col:English")]
            english: String,
            #[grid("col:Chinese")]
            chinese: String,
            #[grid("col:French")]
            french: String,
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct Pointer {
            #[grid("col:x")]
            x: i64,
            #[grid("col:y")]
            y: i64,
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct Title {
            #[grid("col:Main")]
            main: Names,
            #[grid("col:Sub")]
            sub: Names,
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct Author {
            #[grid("col:First")]
            first: String,
            #[grid("col:Last")]
            last: String,
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct Bookmark {
            #[grid("col:Index")]
            index: i32,
            #[grid("col:Page")]
            page: i32,
            #[grid("col:Start")]
            start: Pointer,
            #[grid("col:End")]
            end: Pointer,
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct Book {
            #[grid("col:Title")]
            title: Title,
            #[grid("col:Author")]
            author: Author,
            #[grid("col:Bookmark")]
            bookmark: Bookmark,
            #[grid("col:Remark")]
            remark: String,
        }
    }

    fn root(tree: &SchemaTree, title: &str) -> NodeId {
        tree.roots()
            .iter()
            .copied()
            .find(|&id| tree.node(id).title == title)
            .unwrap()
    }

    #[test]
    fn two_level_scenario() {
        let tree = SchemaTree::build::<Simple>().unwrap();
        let title = root(&tree, "Title");
        let remark = root(&tree, "Remark");

        assert_eq!(tree.cols(title), 2);
        assert_eq!(tree.cols(remark), 1);
        assert_eq!(tree.offset_x(title), 1);
        assert_eq!(tree.offset_x(remark), 3);
        assert_eq!(tree.header_rows(), 2);
        assert_eq!(tree.data_row_start(), 3);
        assert!(tree.can_merge_rows(remark));
        assert!(!tree.can_merge_rows(tree.node(title).children[0]));

        let metas = tree.metas();
        let remark_box = metas.iter().find(|m| m.node == remark).unwrap();
        assert_eq!(
            (remark_box.start_x, remark_box.start_y, remark_box.end_x, remark_box.end_y),
            (3, 1, 3, 2)
        );
        let title_box = metas.iter().find(|m| m.node == title).unwrap();
        assert_eq!(
            (title_box.start_x, title_box.start_y, title_box.end_x, title_box.end_y),
            (1, 1, 2, 1)
        );
    }

    #[test]
    fn metas_are_pre_order_with_paths() {
        let tree = SchemaTree::build::<Simple>().unwrap();
        let titles: Vec<_> = tree.metas().iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["Title", "Main", "Sub", "Remark"]);
        let paths: Vec<_> = tree.metas().iter().map(|m| m.paths.join(".")).collect();
        assert_eq!(paths, vec!["title", "title.main", "title.sub", "remark"]);
        assert!(std::ptr::eq(tree.metas(), tree.metas()));
    }

    #[test]
    fn cols_are_additive() {
        let tree = SchemaTree::build::<Book>().unwrap();
        for id in tree.node_ids() {
            let node = tree.node(id);
            if !node.is_leaf() {
                let sum: u32 = node.children.iter().map(|&c| tree.cols(c)).sum();
                assert_eq!(tree.cols(id), sum, "node {}", node.title);
            }
        }
        let total: u32 = tree.roots().iter().map(|&r| tree.cols(r)).sum();
        assert_eq!(total, u32::try_from(tree.leaves().len()).unwrap());
        assert_eq!(total, 6 + 2 + 6 + 1);
    }

    #[test]
    fn row_spans() {
        let tree = SchemaTree::build::<Book>().unwrap();
        assert_eq!(tree.max_level(), 3);
        for meta in tree.metas() {
            let node = tree.node(meta.node);
            if node.is_leaf() {
                assert_eq!(tree.rows(meta.node), tree.max_level() - node.level + 1);
                assert_eq!(meta.end_y, tree.max_level());
            } else {
                assert_eq!(meta.end_y, meta.start_y);
            }
            assert_eq!(meta.end_x, meta.start_x + tree.cols(meta.node) - 1);
        }
    }

    #[test]
    fn offsets_are_monotonic_and_leaves_do_not_overlap() {
        let tree = SchemaTree::build::<Book>().unwrap();
        for id in tree.node_ids() {
            if let Some(next) = tree.next_sibling(id) {
                assert_eq!(tree.offset_x(next), tree.offset_x(id) + tree.cols(id));
                assert_eq!(tree.prev_sibling(next), Some(id));
            }
        }

        let columns: Vec<u32> = tree.leaves().iter().map(|&l| tree.offset_x(l)).collect();
        let unique: HashSet<_> = columns.iter().collect();
        assert_eq!(unique.len(), columns.len());
        assert_eq!(columns, (1..=15).collect::<Vec<_>>());
    }

    #[test]
    fn deep_offsets() {
        let tree = SchemaTree::build::<Book>().unwrap();
        let bookmark = root(&tree, "Bookmark");
        let remark = root(&tree, "Remark");
        assert_eq!(tree.offset_x(root(&tree, "Author")), 7);
        assert_eq!(tree.offset_x(bookmark), 9);
        assert_eq!(tree.offset_x(remark), 15);

        let end = tree.find_child_by_title(bookmark, "End").unwrap();
        let end_y = tree.find_child_by_title(end, "y").unwrap();
        assert_eq!(tree.offset_x(end), 13);
        assert_eq!(tree.offset_x(end_y), 14);
        assert_eq!(tree.paths(end_y), vec!["bookmark", "end", "y"]);
        assert_eq!(tree.rows(end_y), 1);
        assert_eq!(tree.rows(remark), 3);
        assert_eq!(tree.rows(tree.find_child_by_title(bookmark, "Page").unwrap()), 2);
    }

    #[test]
    fn siblings_are_found_by_index_not_title() {
        let tree = SchemaTree::build::<Book>().unwrap();
        let title = root(&tree, "Title");
        let main = tree.find_child_by_title(title, "Main").unwrap();
        let sub = tree.find_child_by_title(title, "Sub").unwrap();
        let sub_english = tree.node(sub).children[0];
        // Same title as Main/English, but a different node and column.
        assert_eq!(tree.node(sub_english).title, "English");
        assert_eq!(tree.offset_x(sub_english), 4);
        assert_eq!(tree.next_sibling(main), Some(sub));
        assert_eq!(tree.prev_sibling(main), None);
        assert_eq!(tree.next_sibling(sub), None);
    }
}
