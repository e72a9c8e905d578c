//! Schema tree builder.
//!
//! Turns a record type's field table into a forest of [`Node`]s: one node per
//! mapped field, nested records becoming composite nodes one level deeper.
//! The tree is built in two passes: the recursive build assigns each node its
//! own level, then a single reduction computes the header depth.

use std::cell::OnceCell;

use serde::Serialize;

use crate::error::{GridError, Result};
use crate::layout::LayoutBox;
use crate::record::{FieldDef, FieldShape, Kind, Record};

/// Parsed form of a field annotation such as `"col:Title"` or `"-"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotation {
    /// The whole annotation was the ignore marker `-`.
    pub ignored: bool,
    /// Explicit header title from the `col` key.
    pub title: Option<String>,
}

impl Annotation {
    /// Parse comma-separated `key:value` segments. Only `col` is recognised
    /// and the first occurrence wins; an empty value counts as absent.
    ///
    /// The ignore marker must be exactly `-`, the same literal `record!`
    /// matches on; a padded ` - ` is an ordinary annotation without a title.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw == "-" {
            return Self {
                ignored: true,
                title: None,
            };
        }

        let title = raw
            .split(',')
            .filter_map(|segment| segment.split_once(':'))
            .find(|(key, _)| key.trim() == "col")
            .map(|(_, value)| value)
            .filter(|value| !value.is_empty())
            .map(ToString::to_string);

        Self {
            ignored: false,
            title,
        }
    }
}

/// Index of a node inside its [`SchemaTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub(crate) usize);

/// One schema field or nested group.
#[derive(Debug, Clone)]
pub struct Node {
    /// Header text.
    pub title: String,
    /// Field name used to navigate record values.
    pub field: String,
    /// 1-based nesting depth.
    pub level: u32,
    /// Primitive kind; `None` exactly when the node has children.
    pub kind: Option<Kind>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    /// Position among siblings, in declaration order of mapped fields.
    pub sibling_index: usize,
    pub(crate) offset: OnceCell<u32>,
}

impl Node {
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// The forest of schema nodes for one record type.
///
/// Layout results are memoized inside the tree, so a tree is cheap to query
/// repeatedly but must not be shared across threads.
#[derive(Debug)]
pub struct SchemaTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) roots: Vec<NodeId>,
    pub(crate) max_level: u32,
    pub(crate) metas: OnceCell<Vec<LayoutBox>>,
}

impl SchemaTree {
    /// Build the tree for record type `T`.
    pub fn build<T: Record>() -> Result<Self> {
        Self::from_shape(FieldShape::Record(T::fields))
    }

    /// Build a tree from a type-erased field shape. The root must be a record.
    pub fn from_shape(shape: FieldShape) -> Result<Self> {
        match shape {
            FieldShape::Record(fields) => Self::from_fields(fields()),
            FieldShape::Leaf(_) | FieldShape::Optional | FieldShape::Skipped => Err(
                GridError::Schema("root type must be a record".to_string()),
            ),
        }
    }

    /// Build a tree from the root record's field table.
    pub fn from_fields(fields: Vec<FieldDef>) -> Result<Self> {
        let mut tree = Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            max_level: 0,
            metas: OnceCell::new(),
        };

        tree.roots = tree.parse_fields(fields, None, 1)?;
        if tree.roots.is_empty() {
            return Err(GridError::Schema(
                "root type must be a record with at least one mapped field".to_string(),
            ));
        }

        tree.max_level = tree.nodes.iter().map(|n| n.level).max().unwrap_or(0);

        log::debug!(
            "schema built: {} nodes, {} roots, {} header rows",
            tree.nodes.len(),
            tree.roots.len(),
            tree.max_level
        );

        Ok(tree)
    }

    fn parse_fields(
        &mut self,
        fields: Vec<FieldDef>,
        parent: Option<NodeId>,
        level: u32,
    ) -> Result<Vec<NodeId>> {
        let mut ids = Vec::new();

        for def in fields {
            let annotation = Annotation::parse(def.annotation);
            if annotation.ignored {
                continue;
            }

            let kind = match def.shape {
                FieldShape::Leaf(kind) => Some(kind),
                FieldShape::Record(_) => None,
                FieldShape::Optional => {
                    return Err(GridError::Schema(format!(
                        "disallowed optional field [{}]",
                        def.name
                    )));
                }
                FieldShape::Skipped => continue,
            };

            let id = NodeId(self.nodes.len());
            self.nodes.push(Node {
                title: annotation.title.unwrap_or_else(|| def.name.to_string()),
                field: def.name.to_string(),
                level,
                kind,
                children: Vec::new(),
                parent,
                sibling_index: ids.len(),
                offset: OnceCell::new(),
            });

            if let FieldShape::Record(nested) = def.shape {
                let children = self.parse_fields(nested(), Some(id), level + 1)?;
                if children.is_empty() {
                    return Err(GridError::Schema(format!(
                        "record field [{}] has no mapped fields",
                        def.name
                    )));
                }
                if let Some(node) = self.nodes.get_mut(id.0) {
                    node.children = children;
                }
            }

            ids.push(id);
        }

        Ok(ids)
    }

    /// Root nodes in declaration order.
    #[must_use]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Borrow a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this tree.
    #[must_use]
    #[allow(clippy::indexing_slicing)]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// All node ids in depth-first pre-order.
    #[must_use]
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        out
    }

    /// Number of header rows: the deepest level of any node.
    #[must_use]
    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    /// Number of nodes in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
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
    use crate::record::{Column, RecordAccess};
    use test_case::test_case;

    crate::record! {
        #[derive(Debug, Default)]
        struct Names {
            #[grid("col:English")]
            english: String,
            #[grid("col:Chinese")]
            chinese: String,
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
        struct Book {
            #[grid("col:Book")]
            title: Title,
            #[grid("-")]
            hidden: String,
            pages: u32,
            #[grid("col:Remark")]
            remark: String,
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct WithOptional {
            name: String,
            nickname: Option<String>,
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct Empty {
            #[grid("-")]
            only: String,
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct HoldsEmpty {
            name: String,
            nothing: Empty,
        }
    }

    #[test_case("col:Title", false, Some("Title"))]
    #[test_case("-", true, None)]
    #[test_case(" - ", false, None)]
    #[test_case("", false, None)]
    #[test_case("col:", false, None)]
    #[test_case("width:12,col:Fee (USD)", false, Some("Fee (USD)"))]
    #[test_case("col:First,col:Second", false, Some("First"))]
    #[test_case("col: padded", false, Some(" padded"))]
    #[test_case("unknown", false, None)]
    fn parses_annotations(raw: &str, ignored: bool, title: Option<&str>) {
        let annotation = Annotation::parse(raw);
        assert_eq!(annotation.ignored, ignored);
        assert_eq!(annotation.title.as_deref(), title);
    }

    #[test]
    fn builds_nested_nodes() {
        let tree = SchemaTree::build::<Book>().unwrap();

        let titles: Vec<_> = tree
            .roots()
            .iter()
            .map(|&id| tree.node(id).title.as_str())
            .collect();
        assert_eq!(titles, vec!["Book", "pages", "Remark"]);
        assert_eq!(tree.max_level(), 3);
        assert_eq!(tree.len(), 9);

        let book = tree.node(tree.roots()[0]);
        assert_eq!(book.level, 1);
        assert!(book.kind.is_none());
        assert_eq!(book.children.len(), 2);

        let main = tree.node(book.children[0]);
        assert_eq!(main.title, "Main");
        assert_eq!(main.level, 2);
        assert_eq!(main.parent, Some(tree.roots()[0]));

        let english = tree.node(main.children[0]);
        assert_eq!(english.level, 3);
        assert_eq!(english.kind, Some(Kind::String));
        assert!(english.is_leaf());
    }

    #[test]
    fn ignored_fields_do_not_consume_sibling_indices() {
        let tree = SchemaTree::build::<Book>().unwrap();
        let indices: Vec<_> = tree
            .roots()
            .iter()
            .map(|&id| tree.node(id).sibling_index)
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(tree.node(tree.roots()[1]).kind, Some(Kind::Unsigned));
    }

    #[test]
    fn levels_follow_parents() {
        let tree = SchemaTree::build::<Book>().unwrap();
        for id in tree.node_ids() {
            let node = tree.node(id);
            match node.parent {
                Some(parent) => assert_eq!(node.level, tree.node(parent).level + 1),
                None => assert_eq!(node.level, 1),
            }
            assert_eq!(node.kind.is_some(), node.is_leaf());
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct PaddedMarker {
            #[grid(" - ")]
            kept: String,
            #[grid("-")]
            dropped: String,
        }
    }

    #[test]
    fn only_the_exact_marker_ignores_a_field() {
        let tree = SchemaTree::build::<PaddedMarker>().unwrap();
        let titles: Vec<_> = tree
            .roots()
            .iter()
            .map(|&id| tree.node(id).title.as_str())
            .collect();
        assert_eq!(titles, vec!["kept"]);

        // Schema and accessors agree on which fields exist.
        let record = PaddedMarker::default();
        assert!(record.field("kept").is_some());
        assert!(record.field("dropped").is_none());
    }

    #[test]
    fn rejects_optional_fields() {
        let err = SchemaTree::build::<WithOptional>().unwrap_err();
        assert!(matches!(err, GridError::Schema(ref msg) if msg.contains("optional")));
    }

    #[test]
    fn rejects_non_record_root() {
        let err = SchemaTree::from_shape(<u32 as Column>::shape()).unwrap_err();
        assert!(matches!(err, GridError::Schema(ref msg) if msg.contains("root type")));
    }

    #[test]
    fn rejects_records_without_mapped_fields() {
        assert!(SchemaTree::build::<Empty>().is_err());
        let err = SchemaTree::build::<HoldsEmpty>().unwrap_err();
        assert!(matches!(err, GridError::Schema(ref msg) if msg.contains("nothing")));
    }
}
