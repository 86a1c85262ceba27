use kurbo::{Point, Rect};
use manos_block_core::{
    ColumnSpan, Command, CommandOutcome, DocumentValue, Edge, EdgeSet, Editor, EditorConfig,
    EngineError, ListType, NodeKey, NodeKind, closest_edge,
};
use serde_json::{Value, json};

fn editor_with(children: Value) -> Editor {
    let value: DocumentValue = serde_json::from_value(json!({
        "document": { "type": "root", "children": children }
    }))
    .unwrap();
    Editor::from_value(value, EditorConfig::default()).unwrap()
}

fn p(text: &str) -> Value {
    json!({ "type": "paragraph", "children": [{ "type": "text", "text": text }] })
}

fn item(span: u32, children: Value) -> Value {
    json!({ "type": "grid-item", "column_span": span, "children": children })
}

fn grid(items: Value) -> Value {
    json!({ "type": "grid-container", "column_count": 12, "children": items })
}

fn li(text: &str) -> Value {
    json!({ "type": "list-item", "children": [{ "type": "text", "text": text }] })
}

fn root_children(editor: &Editor) -> Vec<NodeKey> {
    let tree = editor.tree();
    tree.children(tree.root()).unwrap().to_vec()
}

fn child(editor: &Editor, key: NodeKey, ix: usize) -> NodeKey {
    editor.tree().children(key).unwrap()[ix]
}

fn text(editor: &Editor, key: NodeKey) -> String {
    editor.tree().text_content(key).unwrap()
}

fn drop(editor: &mut Editor, source: NodeKey, target: NodeKey, edge: Edge) -> CommandOutcome {
    editor
        .dispatch(&Command::Drop {
            source,
            target,
            edge,
        })
        .unwrap()
}

fn span_of(editor: &Editor, key: NodeKey) -> u32 {
    let NodeKind::GridItem { column_span } = editor.tree().kind(key).unwrap() else {
        panic!("expected grid item");
    };
    column_span.get()
}

#[test]
fn closest_edge_picks_nearest_allowed_side() {
    let rect = Rect::new(0.0, 0.0, 100.0, 100.0);
    let allowed = EdgeSet::from_iter([Edge::Top, Edge::Left]);
    assert_eq!(
        closest_edge(Point::new(10.0, 50.0), rect, allowed),
        Some(Edge::Left)
    );
    assert_eq!(
        closest_edge(Point::new(10.0, 50.0), rect, EdgeSet::empty()),
        None
    );
}

#[test]
fn drop_on_bottom_reorders_root_paragraphs() {
    let mut editor = editor_with(json!([p("A"), p("B")]));
    let [a, b] = root_children(&editor)[..] else {
        panic!("expected two blocks");
    };

    let allowed = editor.allowed_edges(a, b).unwrap();
    assert!(!allowed.contains(Edge::Top));
    assert!(allowed.contains(Edge::Bottom));

    assert_eq!(drop(&mut editor, a, b, Edge::Bottom), CommandOutcome::Handled);

    let blocks = root_children(&editor);
    assert_eq!(blocks.len(), 2);
    assert_eq!(text(&editor, blocks[0]), "B");
    assert_eq!(text(&editor, blocks[1]), "A");
    for block in blocks {
        assert!(editor.tree().kind(block).unwrap().is_paragraph());
    }
}

#[test]
fn drop_on_right_builds_two_column_grid() {
    let mut editor = editor_with(json!([p("A"), p("B")]));
    let [a, b] = root_children(&editor)[..] else {
        panic!("expected two blocks");
    };

    drop(&mut editor, a, b, Edge::Right);

    let blocks = root_children(&editor);
    assert_eq!(blocks.len(), 1);
    let NodeKind::GridContainer { column_count } = editor.tree().kind(blocks[0]).unwrap() else {
        panic!("expected grid container");
    };
    assert_eq!(column_count.get(), 12);

    let items = editor.tree().children(blocks[0]).unwrap().to_vec();
    assert_eq!(items.len(), 2);
    assert_eq!(span_of(&editor, items[0]), 6);
    assert_eq!(span_of(&editor, items[1]), 6);
    assert_eq!(text(&editor, items[0]), "B");
    assert_eq!(text(&editor, items[1]), "A");
}

#[test]
fn drop_on_left_keeps_source_first() {
    let mut editor = editor_with(json!([p("A"), p("B")]));
    let [a, b] = root_children(&editor)[..] else {
        panic!("expected two blocks");
    };

    drop(&mut editor, a, b, Edge::Left);

    let grid = root_children(&editor)[0];
    assert_eq!(text(&editor, child(&editor, grid, 0)), "A");
    assert_eq!(text(&editor, child(&editor, grid, 1)), "B");
}

#[test]
fn drop_into_grid_item_rebalances_to_three_columns() {
    let mut editor = editor_with(json!([
        grid(json!([item(6, json!([p("X")])), item(6, json!([p("Y")]))])),
        p("Z"),
    ]));
    let [grid_key, z] = root_children(&editor)[..] else {
        panic!("expected grid and paragraph");
    };
    let x = child(&editor, child(&editor, grid_key, 0), 0);

    let allowed = editor.allowed_edges(z, x).unwrap();
    assert!(allowed.contains(Edge::Right));
    assert!(allowed.contains(Edge::Top));

    drop(&mut editor, z, x, Edge::Right);

    assert_eq!(root_children(&editor), vec![grid_key]);
    let items = editor.tree().children(grid_key).unwrap().to_vec();
    assert_eq!(items.len(), 3);
    for item in &items {
        assert_eq!(span_of(&editor, *item), 4);
    }
    let texts: Vec<_> = items.iter().map(|item| text(&editor, *item)).collect();
    assert_eq!(texts, vec!["X", "Z", "Y"]);
    editor.tree().validate().unwrap();
}

#[test]
fn emptied_grid_item_promotes_its_sibling() {
    let mut editor = editor_with(json!([
        grid(json!([item(6, json!([p("X")])), item(6, json!([p("Y")]))])),
        p("Z"),
    ]));
    let [grid_key, z] = root_children(&editor)[..] else {
        panic!("expected grid and paragraph");
    };
    let x = child(&editor, child(&editor, grid_key, 0), 0);

    drop(&mut editor, x, z, Edge::Bottom);

    assert!(!editor.tree().contains(grid_key));
    let texts: Vec<_> = root_children(&editor)
        .iter()
        .map(|key| text(&editor, *key))
        .collect();
    assert_eq!(texts, vec!["Y", "Z", "X"]);
    for key in root_children(&editor) {
        assert!(editor.tree().kind(key).unwrap().is_paragraph());
    }
}

#[test]
fn grid_item_side_edges_skip_the_source_item() {
    let editor = editor_with(json!([grid(json!([
        item(6, json!([p("X")])),
        item(6, json!([p("Y")])),
    ]))]));
    let grid_key = root_children(&editor)[0];
    let x = child(&editor, child(&editor, grid_key, 0), 0);
    let y = child(&editor, child(&editor, grid_key, 1), 0);

    let allowed = editor.allowed_edges(y, x).unwrap();
    assert_eq!(allowed, EdgeSet::from_iter([Edge::Top, Edge::Bottom]));
}

#[test]
fn list_item_leaving_its_list_gets_a_new_list() {
    let mut editor = editor_with(json!([
        { "type": "list", "list_type": "number", "children": [li("one"), li("two")] },
        p("after"),
    ]));
    let [list, after] = root_children(&editor)[..] else {
        panic!("expected list and paragraph");
    };
    let two = child(&editor, list, 1);

    drop(&mut editor, two, after, Edge::Bottom);

    let blocks = root_children(&editor);
    assert_eq!(blocks.len(), 3);
    assert_eq!(text(&editor, blocks[0]), "one");
    let moved = editor.tree().kind(blocks[2]).unwrap();
    assert_eq!(moved.list_type(), Some(ListType::Number));
    assert_eq!(text(&editor, blocks[2]), "two");
}

#[test]
fn paragraph_dropped_between_list_items_becomes_an_item() {
    let mut editor = editor_with(json!([
        { "type": "list", "list_type": "bullet", "children": [li("one"), li("two")] },
        p("loose"),
    ]));
    let [list, loose] = root_children(&editor)[..] else {
        panic!("expected list and paragraph");
    };
    let two = child(&editor, list, 1);

    assert_eq!(editor.allowed_edges(loose, two).unwrap(), EdgeSet::all());
    drop(&mut editor, loose, two, Edge::Top);

    assert_eq!(root_children(&editor), vec![list]);
    let items = editor.tree().children(list).unwrap().to_vec();
    assert_eq!(items.len(), 3);
    assert!(editor.tree().kind(items[1]).unwrap().is_list_item());
    assert_eq!(text(&editor, items[1]), "loose");
}

#[test]
fn side_drop_on_list_item_puts_the_list_in_a_grid() {
    let mut editor = editor_with(json!([
        { "type": "list", "list_type": "bullet", "children": [li("one"), li("two")] },
        p("side"),
    ]));
    let [list, side] = root_children(&editor)[..] else {
        panic!("expected list and paragraph");
    };
    let one = child(&editor, list, 0);

    drop(&mut editor, side, one, Edge::Right);

    let blocks = root_children(&editor);
    assert_eq!(blocks.len(), 1);
    let left = child(&editor, blocks[0], 0);
    let right = child(&editor, blocks[0], 1);
    assert!(editor.tree().kind(child(&editor, left, 0)).unwrap().is_list());
    assert_eq!(editor.tree().child_count(child(&editor, left, 0)).unwrap(), 2);
    assert_eq!(text(&editor, right), "side");
}

#[test]
fn quote_children_only_reorder() {
    let editor = editor_with(json!([
        { "type": "quote", "children": [p("q1"), p("q2")] },
        p("outside"),
    ]));
    let [quote, outside] = root_children(&editor)[..] else {
        panic!("expected quote and paragraph");
    };
    let q2 = child(&editor, quote, 1);
    assert_eq!(
        editor.allowed_edges(outside, q2).unwrap(),
        EdgeSet::from_iter([Edge::Top, Edge::Bottom])
    );
}

#[test]
fn table_cells_are_an_unhandled_context() {
    let mut editor = editor_with(json!([
        p("source"),
        {
            "type": "table",
            "children": [{
                "type": "table-row",
                "children": [{ "type": "table-cell", "children": [{ "type": "text", "text": "cell" }] }]
            }]
        },
    ]));
    let [source, table] = root_children(&editor)[..] else {
        panic!("expected paragraph and table");
    };
    let cell = child(&editor, child(&editor, table, 0), 0);
    let before = editor.tree().clone();

    assert!(matches!(
        editor.allowed_edges(source, cell),
        Err(EngineError::UnhandledDragContext)
    ));
    let err = editor
        .dispatch(&Command::Drop {
            source,
            target: cell,
            edge: Edge::Top,
        })
        .unwrap_err();
    assert!(err.is_unsupported_shape());
    assert_eq!(editor.tree(), &before);
    assert!(!editor.can_undo());
}

#[test]
fn same_key_drop_is_inert() {
    let mut editor = editor_with(json!([p("A"), p("B")]));
    let a = root_children(&editor)[0];
    assert_eq!(drop(&mut editor, a, a, Edge::Left), CommandOutcome::NotHandled);
    assert!(!editor.can_undo());
}

#[test]
fn disallowed_edge_is_rejected_without_mutation() {
    let mut editor = editor_with(json!([p("A"), p("B")]));
    let [a, b] = root_children(&editor)[..] else {
        panic!("expected two blocks");
    };
    let before = editor.tree().clone();

    let err = editor
        .dispatch(&Command::Drop {
            source: a,
            target: b,
            edge: Edge::Top,
        })
        .unwrap_err();
    assert!(err.is_precondition());
    assert_eq!(editor.tree(), &before);

    assert!(!editor.handle(&Command::Drop {
        source: a,
        target: b,
        edge: Edge::Top,
    }));
}

#[test]
fn blocks_are_never_dropped_onto_their_container() {
    let mut editor = editor_with(json!([
        { "type": "quote", "children": [p("A"), p("B")] },
    ]));
    let quote = root_children(&editor)[0];
    let a = child(&editor, quote, 0);
    let before = editor.tree().clone();

    assert_eq!(editor.allowed_edges(a, quote).unwrap(), EdgeSet::empty());
    assert_eq!(editor.allowed_edges(quote, a).unwrap(), EdgeSet::empty());

    let err = editor
        .dispatch(&Command::Drop {
            source: a,
            target: quote,
            edge: Edge::Right,
        })
        .unwrap_err();
    assert!(err.is_precondition());
    assert_eq!(editor.tree(), &before);
    assert!(!editor.can_undo());
}

#[test]
fn drop_at_resolves_the_edge_from_the_pointer() {
    let mut editor = editor_with(json!([p("A"), p("B")]));
    let [a, b] = root_children(&editor)[..] else {
        panic!("expected two blocks");
    };
    let rect = Rect::new(0.0, 0.0, 400.0, 40.0);

    let outcome = editor
        .drop_at(a, b, Point::new(395.0, 20.0), rect)
        .unwrap();
    assert_eq!(outcome, CommandOutcome::Handled);
    let grid = root_children(&editor)[0];
    assert!(editor.tree().kind(grid).unwrap().is_grid_container());
    assert_eq!(text(&editor, child(&editor, grid, 1)), "A");
}

#[test]
fn image_can_be_dragged_beside_a_paragraph() {
    let mut editor = editor_with(json!([
        p("text"),
        { "type": "image", "source": "cat.png", "alt_text": "cat", "width": 320 },
    ]));
    let [text_block, image] = root_children(&editor)[..] else {
        panic!("expected paragraph and image");
    };

    drop(&mut editor, image, text_block, Edge::Left);

    let grid = root_children(&editor)[0];
    let left = child(&editor, child(&editor, grid, 0), 0);
    assert!(editor.tree().kind(left).unwrap().is_image());
    let NodeKind::GridItem { column_span } = editor.tree().kind(child(&editor, grid, 1)).unwrap()
    else {
        panic!("expected grid item");
    };
    assert_eq!(*column_span, ColumnSpan::Six);
}
