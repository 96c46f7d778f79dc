use manos_block_core::{BlockId, BlockSpec, BlockStore, CursorPosition, Selection};
use manos_block_dnd::{DragConfig, DropOutcome, Placement, Rect, outline, stack_rows};
use manos_block_editor::{
    EditorConfig, EditorSession, Gesture, GestureOutcome, MemoryClipboard, SessionError,
};

const BOUNDS: Rect = Rect {
    x: 0.0,
    y: 0.0,
    width: 800.0,
    height: 1200.0,
};
const CONTENT: Rect = Rect {
    x: 60.0,
    y: 0.0,
    width: 700.0,
    height: 1200.0,
};

fn open(texts: &[&str]) -> (EditorSession, MemoryClipboard) {
    let mut store = BlockStore::default();
    let frame = store.insert(store.root(), 0, BlockSpec::frame()).unwrap();
    for (ix, text) in texts.iter().enumerate() {
        store.insert(frame, ix, BlockSpec::paragraph(*text)).unwrap();
    }
    let clipboard = MemoryClipboard::new();
    let session = EditorSession::new(
        store,
        Box::new(clipboard.clone()),
        EditorConfig::default(),
    );
    (session, clipboard)
}

fn layout(session: &mut EditorSession) {
    let width = session.config().drag.indent_width;
    let rows = stack_rows(&outline(session.store()).unwrap(), CONTENT, 32.0, width);
    session.set_layout(BOUNDS, rows);
}

fn find(store: &BlockStore, text: &str) -> BlockId {
    outline(store)
        .unwrap()
        .into_iter()
        .map(|entry| entry.id)
        .find(|id| store.text(*id).unwrap() == text)
        .unwrap()
}

fn texts(store: &BlockStore) -> Vec<String> {
    outline(store)
        .unwrap()
        .into_iter()
        .map(|entry| store.text(entry.id).unwrap().to_string())
        .collect()
}

fn row(session: &EditorSession, id: BlockId) -> Rect {
    session
        .engine()
        .rows()
        .iter()
        .find(|row| row.id == id)
        .unwrap()
        .rect
}

#[test]
fn attach_is_exclusive() {
    let (mut session, _) = open(&["a"]);
    let sub = session.attach("editor").unwrap();
    assert_eq!(sub.target(), "editor");
    assert!(session.is_attached("editor"));
    assert!(matches!(
        session.attach("other"),
        Err(SessionError::AlreadyAttached)
    ));

    session.detach(sub).unwrap();
    assert!(!session.is_attached("editor"));
    let again = session.attach("other").unwrap();

    // A subscription handed out by another session does not match.
    let (mut stranger, _) = open(&[]);
    let foreign = stranger.attach("x").unwrap();
    assert!(matches!(
        session.detach(foreign),
        Err(SessionError::NotAttached)
    ));
    session.detach(again).unwrap();
}

#[test]
fn gestures_from_other_targets_are_ignored() {
    let (mut session, clipboard) = open(&["a", "b"]);
    let a = find(session.store(), "a");
    let _sub = session.attach("editor").unwrap();
    session.set_selection(Some(Selection::blocks([a])));

    for gesture in [
        Gesture::Copy,
        Gesture::Cut,
        Gesture::DragStart { block: a },
        Gesture::Hover { x: 70.0, y: 10.0 },
    ] {
        assert_eq!(
            session.dispatch("elsewhere", gesture).unwrap(),
            GestureOutcome::Ignored
        );
    }
    assert_eq!(clipboard.write_count(), 0);
    assert_eq!(texts(session.store()), vec!["a", "b"]);
    assert!(!session.engine().state().is_tracking());
}

#[test]
fn retarget_is_refused_mid_drag() {
    let (mut session, _) = open(&["a", "b"]);
    layout(&mut session);
    let a = find(session.store(), "a");
    let mut sub = session.attach("editor").unwrap();

    session
        .dispatch("editor", Gesture::DragStart { block: a })
        .unwrap();
    assert!(matches!(
        session.retarget(&mut sub, "panel"),
        Err(SessionError::DragInFlight)
    ));

    assert_eq!(
        session.dispatch("editor", Gesture::Cancel).unwrap(),
        GestureOutcome::Cancelled
    );
    session.retarget(&mut sub, "panel").unwrap();
    assert_eq!(sub.target(), "panel");
    assert!(session.is_attached("panel"));
    assert_eq!(
        session.dispatch("editor", Gesture::Copy).unwrap(),
        GestureOutcome::Ignored
    );
}

#[test]
fn detach_tears_down_a_drag() {
    let (mut session, _) = open(&["a", "b"]);
    layout(&mut session);
    let a = find(session.store(), "a");
    let sub = session.attach("editor").unwrap();
    session
        .dispatch("editor", Gesture::DragStart { block: a })
        .unwrap();

    session.detach(sub).unwrap();
    assert!(!session.engine().state().is_tracking());
    assert_eq!(texts(session.store()), vec!["a", "b"]);
}

#[test]
fn drag_gestures_reorder_the_document() {
    let (mut session, _) = open(&["123", "456", "789"]);
    layout(&mut session);
    let _sub = session.attach("editor").unwrap();
    let first = find(session.store(), "123");
    let last = row(&session, find(session.store(), "789"));

    assert_eq!(
        session
            .dispatch("editor", Gesture::Hover { x: 70.0, y: 10.0 })
            .unwrap(),
        GestureOutcome::HandleChanged(Some(first))
    );
    assert_eq!(
        session
            .dispatch("editor", Gesture::DragStart { block: first })
            .unwrap(),
        GestureOutcome::DragStarted(first)
    );

    let moved = session
        .dispatch(
            "editor",
            Gesture::PointerMove {
                x: last.x + 4.0,
                y: last.y + last.height * 0.75,
            },
        )
        .unwrap();
    let GestureOutcome::TargetChanged(Some(target)) = moved else {
        panic!("expected a drop target, got {moved:?}");
    };
    assert_eq!(target.placement, Placement::After);

    // Clipboard gestures wait for the drag to finish.
    session.set_selection(Some(Selection::blocks([first])));
    assert_eq!(
        session.dispatch("editor", Gesture::Cut).unwrap(),
        GestureOutcome::Ignored
    );

    let dropped = session.dispatch("editor", Gesture::Drop).unwrap();
    assert!(matches!(
        dropped,
        GestureOutcome::Dropped(DropOutcome::Moved { block, .. }) if block == first
    ));
    assert_eq!(texts(session.store()), vec!["456", "789", "123"]);
    assert_eq!(
        session.dispatch("editor", Gesture::Drop).unwrap(),
        GestureOutcome::Ignored
    );
}

#[test]
fn cut_and_paste_through_the_session() {
    let (mut session, clipboard) = open(&["a", "b", "c"]);
    let _sub = session.attach("editor").unwrap();
    let b = find(session.store(), "b");
    let c = find(session.store(), "c");

    session.set_selection(Some(Selection::blocks([b])));
    let GestureOutcome::Cut(cursor) = session.dispatch("editor", Gesture::Cut).unwrap() else {
        panic!("expected a cut");
    };
    assert_eq!(cursor.host(session.store()).unwrap(), Some(c));
    assert_eq!(session.cursor(), Some(&cursor));
    assert!(session.selection().is_none());
    assert_eq!(texts(session.store()), vec!["a", "c"]);
    assert_eq!(clipboard.write_count(), 1);

    let GestureOutcome::Pasted(outcome) = session.dispatch("editor", Gesture::Paste).unwrap()
    else {
        panic!("expected a paste");
    };
    assert_eq!(texts(session.store()), vec!["a", "b", "c"]);
    assert_eq!(session.cursor(), Some(&outcome.cursor));

    // A second paste lands after the first.
    session.dispatch("editor", Gesture::Paste).unwrap();
    assert_eq!(texts(session.store()), vec!["a", "b", "b", "c"]);
}

#[test]
fn paste_falls_back_to_the_selection() {
    let (mut session, clipboard) = open(&["a", "b"]);
    let _sub = session.attach("editor").unwrap();
    let a = find(session.store(), "a");

    session.set_selection(Some(Selection::blocks([a])));
    assert!(matches!(
        session.dispatch("editor", Gesture::Copy).unwrap(),
        GestureOutcome::Copied(_)
    ));
    assert_eq!(clipboard.write_count(), 1);

    session.dispatch("editor", Gesture::Paste).unwrap();
    assert_eq!(texts(session.store()), vec!["a", "a", "b"]);

    session.set_cursor(None);
    session.set_selection(None);
    assert_eq!(
        session.dispatch("editor", Gesture::Paste).unwrap(),
        GestureOutcome::Ignored
    );
}

#[test]
fn failed_paste_surfaces_the_store_error() {
    let mut store = BlockStore::default();
    let frame = store.insert(store.root(), 0, BlockSpec::frame()).unwrap();
    let code = store.insert(frame, 0, BlockSpec::new("code")).unwrap();
    let clipboard = MemoryClipboard::new();
    clipboard.set_contents(manos_block_editor::ClipboardData::new().with("text/plain", "x"));
    let mut session = EditorSession::new(store, Box::new(clipboard), EditorConfig::default());
    let _sub = session.attach("editor").unwrap();

    session.set_cursor(Some(CursorPosition::end_of(code)));
    let err = session.dispatch("editor", Gesture::Paste).unwrap_err();
    assert!(matches!(err, SessionError::Store(ref e) if e.is_invalid_hierarchy()));
    assert!(session.store().children(code).unwrap().is_empty());
}

#[test]
fn unusable_config_values_fall_back() {
    let store = BlockStore::default();
    let config = EditorConfig {
        drag: DragConfig::default().indent_width(-3.0),
        ..EditorConfig::default()
    };
    let session = EditorSession::new(store, Box::new(MemoryClipboard::new()), config);
    assert_eq!(session.config().drag.indent_width, 26.0);
    assert_eq!(session.config().clipboard.read_preference.len(), 3);
}

#[test]
fn gestures_deserialize_from_tagged_json() {
    let gesture: Gesture =
        serde_json::from_str(r#"{"type":"pointer_move","x":12.5,"y":40}"#).unwrap();
    assert_eq!(gesture, Gesture::PointerMove { x: 12.5, y: 40.0 });
    let gesture: Gesture = serde_json::from_str(r#"{"type":"paste"}"#).unwrap();
    assert_eq!(gesture, Gesture::Paste);
}

#[test]
fn paste_follows_a_new_selection() {
    let (mut session, _) = open(&["a", "b", "c"]);
    let _sub = session.attach("editor").unwrap();
    let a = find(session.store(), "a");
    let c = find(session.store(), "c");

    session.set_selection(Some(Selection::blocks([a])));
    session.dispatch("editor", Gesture::Copy).unwrap();
    session.dispatch("editor", Gesture::Paste).unwrap();
    assert_eq!(texts(session.store()), vec!["a", "a", "b", "c"]);
    assert!(session.cursor().is_some());

    session.set_selection(Some(Selection::blocks([c])));
    assert!(session.cursor().is_none());
    session.dispatch("editor", Gesture::Paste).unwrap();
    assert_eq!(texts(session.store()), vec!["a", "a", "b", "c", "a"]);
}

#[test]
fn moving_blocks_drops_the_stored_cursor() {
    let (mut session, _) = open(&["123", "456", "789"]);
    layout(&mut session);
    let _sub = session.attach("editor").unwrap();
    let first = find(session.store(), "123");
    let last = row(&session, find(session.store(), "789"));

    session.set_cursor(Some(
        CursorPosition::in_block(session.store(), first, Some(1)).unwrap(),
    ));
    session
        .dispatch("editor", Gesture::DragStart { block: first })
        .unwrap();
    session
        .dispatch(
            "editor",
            Gesture::PointerMove {
                x: last.x + 4.0,
                y: last.y + last.height * 0.75,
            },
        )
        .unwrap();
    session.dispatch("editor", Gesture::Drop).unwrap();
    assert_eq!(texts(session.store()), vec!["456", "789", "123"]);
    assert!(session.cursor().is_none());

    session.set_cursor(Some(
        CursorPosition::in_block(session.store(), first, None).unwrap(),
    ));
    session.store_mut();
    assert!(session.cursor().is_none());
}

#[test]
fn stale_references_are_cleared_on_error() {
    let (mut session, clipboard) = open(&["a", "b"]);
    let _sub = session.attach("editor").unwrap();
    let b = find(session.store(), "b");
    clipboard.set_contents(manos_block_editor::ClipboardData::new().with("text/plain", "x"));

    session.set_selection(Some(Selection::blocks([b])));
    session.store_mut().remove(b).unwrap();
    let err = session.dispatch("editor", Gesture::Copy).unwrap_err();
    assert!(matches!(err, SessionError::Store(ref e) if e.is_not_found()));
    assert!(session.selection().is_none());

    session.set_cursor(Some(CursorPosition::end_of(b)));
    let err = session.dispatch("editor", Gesture::Paste).unwrap_err();
    assert!(matches!(err, SessionError::Store(ref e) if e.is_not_found()));
    assert!(session.cursor().is_none());
    assert_eq!(texts(session.store()), vec!["a"]);
}
