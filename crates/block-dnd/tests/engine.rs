use std::cell::RefCell;
use std::rc::Rc;

use manos_block_core::{BlockId, BlockSpec, BlockStore, ChangeSet};
use manos_block_dnd::{
    DragConfig, DragReorderEngine, DragState, DropOutcome, Placement, Rect, outline, stack_rows,
};

const ROW: f32 = 24.0;

fn nested() -> (BlockStore, BlockId) {
    let mut store = BlockStore::default();
    let frame = store.insert(store.root(), 0, BlockSpec::frame()).unwrap();
    store
        .insert(
            frame,
            0,
            BlockSpec::list("C").children([
                BlockSpec::list("D"),
                BlockSpec::list("E").children([BlockSpec::list("F"), BlockSpec::list("G")]),
            ]),
        )
        .unwrap();
    store.insert(frame, 1, BlockSpec::list("H")).unwrap();
    (store, frame)
}

fn engine_for(store: &BlockStore, config: DragConfig) -> DragReorderEngine {
    let bounds = Rect::new(0.0, 0.0, 600.0, 400.0);
    let mut engine = DragReorderEngine::new(config);
    engine.set_layout(
        bounds,
        stack_rows(
            &outline(store).unwrap(),
            Rect::new(40.0, 0.0, 500.0, 400.0),
            ROW,
            config.indent_width,
        ),
    );
    engine
}

fn record(store: &mut BlockStore) -> Rc<RefCell<Vec<ChangeSet>>> {
    let log: Rc<RefCell<Vec<ChangeSet>>> = Rc::default();
    let sink = log.clone();
    store.observe(move |changes| sink.borrow_mut().push(changes.clone()));
    log
}

#[test]
fn dragging_over_own_descendants_never_targets_them() {
    let (mut store, _) = nested();
    let log = record(&mut store);
    let mut engine = engine_for(&store, DragConfig::default());
    let c = store.children(store.children(store.root()).unwrap()[0]).unwrap()[0];
    let subtree = store.subtree_ids(c).unwrap();

    assert!(engine.start(c, &store));
    // Sweep the pointer across every row, far to the right.
    for step in 0..(6 * 4) {
        let y = step as f32 * ROW / 4.0;
        engine.pointer_move(500.0, y, &store);
        if let Some(target) = engine.current_target() {
            assert!(!subtree.contains(&target.parent_id));
        }
    }

    engine.pointer_move(500.0, ROW * 2.5, &store);
    let outcome = engine.drop(&mut store);
    if let DropOutcome::Moved { target, .. } = outcome {
        assert!(!subtree.contains(&target.parent_id));
    }
    store.check_invariants().unwrap();
    assert!(log.borrow().len() <= 1);
}

#[test]
fn drop_issues_exactly_one_move() {
    let (mut store, frame) = nested();
    let log = record(&mut store);
    let mut engine = engine_for(&store, DragConfig::default());
    let h = store.children(frame).unwrap()[1];

    engine.start(h, &store);
    // Below "D", at D's own level.
    engine.pointer_move(66.0 + 2.0, ROW * 1.75, &store);
    let target = *engine.current_target().unwrap();
    assert_eq!(target.placement, Placement::After);
    assert_eq!(target.depth, 1);

    assert!(matches!(engine.drop(&mut store), DropOutcome::Moved { .. }));
    let log = log.borrow();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].ops.len(), 1);
    assert_eq!(log[0].ops[0].block_id(), h);
    assert_eq!(store.position_of(h).unwrap(), Some((target.parent_id, 1)));
}

#[test]
fn rejected_drop_falls_back_to_shallower_depth() -> anyhow::Result<()> {
    let (mut store, frame) = nested();
    let mut engine = engine_for(&store, DragConfig::default());
    let h = store.children(frame)?[1];
    let c = store.children(frame)?[0];
    let e = store.children(c)?[1];
    let g = store.children(e)?[1];

    engine.start(h, &store);
    // Below "G", at G's level: the last child of E.
    engine.pointer_move(92.0 + 2.0, ROW * 4.75, &store);
    let target = *engine.current_target().unwrap();
    assert_eq!((target.parent_id, target.index), (e, 2));

    // The tree changes under the drag, invalidating the index.
    store.remove(g)?;

    let DropOutcome::Moved { target, .. } = engine.drop(&mut store) else {
        panic!("expected the shallower target to be used");
    };
    assert_eq!(target.parent_id, c);
    assert_eq!(store.parent_of(h)?, Some(c));
    assert_eq!(engine.state(), DragState::Dropped);
    Ok(())
}

#[test]
fn indent_width_is_configurable() {
    let (store, frame) = nested();
    let config = DragConfig::default().indent_width(40.0).indent_offset(8.0);
    let mut engine = engine_for(&store, config);
    let h = store.children(frame).unwrap()[1];

    engine.start(h, &store);
    // Below "G" (depth 2, x = 40 + 80), one 40px level to the left.
    engine.pointer_move(120.0 - 40.0 + 2.0, ROW * 4.75, &store);
    let target = *engine.current_target().unwrap();
    assert_eq!(target.depth, 1);
    assert_eq!(target.indicator.x, 40.0 + 40.0 + 8.0);
    assert_eq!(target.indicator.y, ROW * 5.0);
}
