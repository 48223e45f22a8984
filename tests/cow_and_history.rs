use opgraph::chronicle::{Chronicle, OperationLog};
use opgraph::cow::CowGraph;
use opgraph::graph::{Graph, GraphError, GraphEvent, MemoryStore, Node, OperationFilter, PropertyValue};
use opgraph::operation::{ArrayOperation, DiffKind, Operation, OperationKind, OperationMatcher};
use opgraph::schema::Schema;
use std::cell::RefCell;
use std::rc::Rc;

fn schema() -> Schema {
    Schema::from_json(
        r#"{
            "indexes": {"by_tag": {"types": ["note"], "property": "tag"}},
            "types": {
                "note": {"properties": {"body": "string", "tag": "string", "refs": ["array", "number"]}}
            }
        }"#,
    )
    .unwrap()
}

fn seeded() -> Graph {
    let mut graph = Graph::new(schema()).unwrap();
    graph.create(Node::new("a", "note").with_property("tag", "x")).unwrap();
    graph.create(Node::new("b", "note").with_property("tag", "y")).unwrap();
    graph
}

fn snapshot(graph: &Graph) -> Vec<Node> {
    graph.nodes().cloned().collect()
}

#[test]
fn test_cow_edits_are_isolated_until_commit() {
    let mut graph = seeded();
    let events = Rc::new(RefCell::new(0));
    let counter = events.clone();
    graph.bind(OperationFilter::All, move |_| {
        *counter.borrow_mut() += 1;
        Ok(())
    });
    let before = snapshot(&graph);

    let changes = {
        let mut cow = CowGraph::new(&graph);
        cow.set(&["a", "tag"], "z").unwrap();
        cow.update(&["a", "refs"], ArrayOperation::insert(0, 1i64)).unwrap();
        cow.delete("b").unwrap();
        cow.create(Node::new("c", "note")).unwrap();

        assert_eq!(cow.get(&["a", "tag"]).unwrap(), Some(PropertyValue::from("z")));
        assert!(!cow.contains("b"));
        assert_eq!(snapshot(cow.base()), before);
        cow.into_changes()
    };

    assert_eq!(snapshot(&graph), before);
    assert_eq!(*events.borrow(), 0);
    assert_eq!(graph.find_in("by_tag", &["x"]).unwrap().len(), 1);

    graph.commit(changes).unwrap();
    assert_eq!(*events.borrow(), 4);
    assert_eq!(graph.get(&["a", "tag"]).unwrap(), Some(PropertyValue::from("z")));
    assert!(!graph.contains("b"));
    assert!(graph.contains("c"));
    assert!(graph.find_in("by_tag", &["x"]).unwrap().is_empty());
    assert_eq!(graph.find_in("by_tag", &["z"]).unwrap()[0].id, "a");
}

#[test]
fn test_undo_redo_restores_node_sets() {
    let mut graph = Graph::new(schema()).unwrap();
    let log = OperationLog::new();
    graph.set_chronicle(log.clone());
    graph.start_recording();

    let mut states = vec![snapshot(&graph)];
    graph.create(Node::new("a", "note")).unwrap();
    states.push(snapshot(&graph));
    graph.update(&["a", "body"], vec![PropertyValue::from("hi")]).unwrap();
    states.push(snapshot(&graph));
    graph
        .apply(Operation::compound(vec![
            Operation::create_node(&Node::new("b", "note").with_property("body", "")),
            Operation::set(vec!["a".into(), "tag".into()], "", "t"),
        ]))
        .unwrap();
    states.push(snapshot(&graph));
    assert_eq!(log.len(), 3);

    for expected in states.iter().rev().skip(1) {
        assert!(log.undo(&mut graph).unwrap());
        assert_eq!(&snapshot(&graph), expected);
    }
    for expected in states.iter().skip(1) {
        assert!(log.redo(&mut graph).unwrap());
        assert_eq!(&snapshot(&graph), expected);
    }
    assert_eq!(log.len(), 3);
}

#[test]
fn test_matcher_filters_listeners() {
    let mut graph = seeded();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    let matcher = OperationMatcher::new()
        .with_kind(OperationKind::Update)
        .with_path(["*", "refs"])
        .with_property_type(DiffKind::Array);
    graph.bind(matcher.into(), move |event: &GraphEvent<'_>| {
        if let Some(op) = event.operation() {
            log.borrow_mut().push(op.path().join("."));
        }
        Ok(())
    });

    graph.update(&["a", "refs"], ArrayOperation::insert(0, 1i64)).unwrap();
    graph.update(&["b", "body"], vec![PropertyValue::from("text")]).unwrap();
    graph.set(&["b", "refs"], vec![PropertyValue::from(2i64)]).unwrap();
    graph.update(&["b", "refs"], ArrayOperation::insert(1, 3i64)).unwrap();

    assert_eq!(*seen.borrow(), vec!["a.refs", "b.refs"]);
}

#[test]
fn test_persistence_mirrors_compound_changes() {
    let store = MemoryStore::new();
    let mut graph = Graph::new(schema()).unwrap();
    graph.set_persistence(store.clone());
    graph.create(Node::new("a", "note").with_property("tag", "x")).unwrap();

    graph
        .apply(Operation::compound(vec![
            Operation::create_node(&Node::new("c", "note").with_property("tag", "x")),
            Operation::set(vec!["a".into(), "tag".into()], "x", "w"),
        ]))
        .unwrap();
    graph.update(&["c", "body"], vec![PropertyValue::from("draft")]).unwrap();

    assert_eq!(store.ids(), vec!["a", "c"]);
    let c = store.document("c").unwrap();
    assert_eq!(c.get_path(&["body"]), Some(&PropertyValue::from("draft")));
    assert_eq!(
        store.document("a").unwrap().get_path(&["tag"]),
        Some(&PropertyValue::from("w"))
    );
}

#[test]
fn test_persistence_failure_keeps_graph_change() {
    // nodes created before the store was attached have no document
    let mut graph = seeded();
    graph.set_persistence(MemoryStore::new());

    let err = graph.set(&["a", "tag"], "w").unwrap_err();
    assert!(matches!(err, GraphError::Persistence(_)));
    assert_eq!(graph.get(&["a", "tag"]).unwrap(), Some(PropertyValue::from("w")));
}

struct FailingChronicle;

impl Chronicle for FailingChronicle {
    fn record(&mut self, _op: &Operation) -> anyhow::Result<String> {
        anyhow::bail!("history store offline")
    }
}

#[test]
fn test_chronicle_failure_surfaces_after_apply() {
    let mut graph = Graph::new(schema()).unwrap();
    graph.set_chronicle(FailingChronicle);
    graph.start_recording();

    let err = graph.create(Node::new("a", "note")).unwrap_err();
    assert!(matches!(err, GraphError::Chronicle(msg) if msg.contains("offline")));
    assert!(graph.contains("a"));
}
