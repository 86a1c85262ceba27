//! Property-based invariant tests for grid layout and drag-and-drop.
//!
//! These tests verify structural invariants that must hold for any sequence
//! of drops:
//!
//! 1. **Balanced spans**: every item of a grid spans `column_count / items`.
//! 2. **No degenerate grids**: containers sit at the root and hold 2 to 4
//!    non-empty items.
//! 3. **Content conservation**: a drop moves a paragraph; the multiset of
//!    paragraph texts never changes.
//! 4. **Atomic failure**: a rejected drop leaves the document untouched.
//! 5. **Span table**: `rebalanced_span` succeeds exactly for 1, 2, 3 and 4
//!    items of a 12-column grid.
//! 6. **Closest edge**: the chosen edge is allowed and no allowed edge is
//!    strictly closer.

use kurbo::{Point, Rect};
use manos_block_core::grid::rebalanced_span;
use manos_block_core::{
    ColumnCount, Command, Edge, EdgeSet, Editor, EditorConfig, NodeKey, NodeKind, Tree,
    closest_edge,
};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

fn editor_with_paragraphs(count: usize) -> Editor {
    let mut tree = Tree::new();
    let mut blocks = Vec::with_capacity(count);
    for ix in 0..count {
        let leaf = tree.create(NodeKind::text(format!("p{ix}")));
        blocks.push(
            tree.create_with_children(NodeKind::paragraph(), vec![leaf])
                .unwrap(),
        );
    }
    tree.append(tree.root(), blocks).unwrap();
    Editor::new(tree, EditorConfig::default()).unwrap()
}

fn paragraphs(tree: &Tree) -> Vec<NodeKey> {
    tree.descendants(tree.root())
        .unwrap()
        .into_iter()
        .filter(|key| tree.kind(*key).unwrap().is_paragraph())
        .collect()
}

fn sorted_texts(tree: &Tree) -> Vec<String> {
    let mut texts: Vec<_> = paragraphs(tree)
        .into_iter()
        .map(|key| tree.text_content(key).unwrap())
        .collect();
    texts.sort();
    texts
}

fn assert_grids_balanced(tree: &Tree) {
    for key in tree.descendants(tree.root()).unwrap() {
        let NodeKind::GridContainer { column_count } = tree.kind(key).unwrap() else {
            continue;
        };
        assert_eq!(tree.parent(key).unwrap(), Some(tree.root()));
        let items = tree.children(key).unwrap();
        assert!((2..=4).contains(&items.len()), "grid with {} items", items.len());
        for item in items {
            let NodeKind::GridItem { column_span } = tree.kind(*item).unwrap() else {
                panic!("grid child is not an item");
            };
            assert_eq!(
                column_span.get() * items.len() as u32,
                column_count.get()
            );
            assert!(tree.child_count(*item).unwrap() > 0);
        }
    }
}

fn edge_strategy() -> impl Strategy<Value = Edge> {
    prop::sample::select(Edge::ALL.to_vec())
}

fn edge_set_strategy() -> impl Strategy<Value = EdgeSet> {
    prop::collection::vec(edge_strategy(), 0..4).prop_map(EdgeSet::from_iter)
}

// ── Drops ───────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn random_drops_keep_grids_balanced(
        count in 2usize..7,
        drops in prop::collection::vec((0usize..16, 0usize..16, edge_strategy()), 1..24),
    ) {
        let mut editor = editor_with_paragraphs(count);
        let expected = sorted_texts(editor.tree());

        for (source_ix, target_ix, edge) in drops {
            let blocks = paragraphs(editor.tree());
            let source = blocks[source_ix % blocks.len()];
            let target = blocks[target_ix % blocks.len()];
            let before = editor.tree().clone();

            let allowed = editor.allowed_edges(source, target).unwrap();
            let result = editor.dispatch(&Command::Drop { source, target, edge });

            match result {
                Ok(_) => prop_assert!(source == target || allowed.contains(edge)),
                Err(_) => prop_assert_eq!(editor.tree(), &before),
            }
            editor.tree().validate().unwrap();
            assert_grids_balanced(editor.tree());
            prop_assert_eq!(sorted_texts(editor.tree()), expected.clone());
        }
    }
}

// ── Span table ──────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn rebalanced_span_divides_twelve_columns(items in 0usize..32) {
        match rebalanced_span(ColumnCount::Twelve, items) {
            Ok(span) => {
                prop_assert!((1..=4).contains(&items));
                prop_assert_eq!(span.get() as usize * items, 12);
            }
            Err(err) => {
                prop_assert!(!(1..=4).contains(&items));
                prop_assert!(!err.is_unsupported_shape());
            }
        }
    }
}

// ── Closest edge ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn closest_edge_is_allowed_and_minimal(
        x0 in -500.0f64..500.0,
        y0 in -500.0f64..500.0,
        width in 1.0f64..400.0,
        height in 1.0f64..400.0,
        px in -1000.0f64..1000.0,
        py in -1000.0f64..1000.0,
        allowed in edge_set_strategy(),
    ) {
        let rect = Rect::new(x0, y0, x0 + width, y0 + height);
        let pointer = Point::new(px, py);

        match closest_edge(pointer, rect, allowed) {
            None => prop_assert!(allowed.is_empty()),
            Some(edge) => {
                prop_assert!(allowed.contains(edge));
                let best = edge.distance(pointer, rect);
                for other in allowed.iter() {
                    prop_assert!(best <= other.distance(pointer, rect));
                }
            }
        }
    }
}
