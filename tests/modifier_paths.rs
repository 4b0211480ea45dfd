mod util;
use mesh_materials::prelude::*;
use util::*;

const DECL: &[(&str, &[&str])] = &[("gas", &["air"]), ("metal", &["steel", "copper"])];
const GROUPS: &[(&str, &[u32])] = &[("air", &[0, 1]), ("steel", &[1, 2, 3]), ("copper", &[3])];

fn batch(engine: &mut CompositionEngine, hook: &mut RecordingHook) -> ModifierOutcome {
    let [air, steel, copper] = [0, 1, 2].map(MaterialId::new);
    let mut modifier = engine.modifier();
    modifier
        .add_cells(copper, &cells(&[1, 2]))
        .remove_cells(steel, &cells(&[3]))
        .remove_cells(air, &cells(&[1]))
        .push(ModificationOperation::add(air, cells(&[4])));
    modifier.end_update(&mut [hook as &mut dyn FieldMigrationHook]).unwrap()
}

#[test]
fn incremental_and_recompute_paths_agree() {
    let mut inc = engine_with(DECL, 6, GROUPS, checked().with_incremental(true));
    let mut full = engine_with(DECL, 6, GROUPS, checked().with_incremental(false));
    let mut inc_hook = RecordingHook::default();
    let mut full_hook = RecordingHook::default();

    match batch(&mut inc, &mut inc_hook) {
        ModifierOutcome::Incremental(summaries) => assert_eq!(summaries.len(), 4),
        other => panic!("unexpected {other:?}"),
    }
    assert!(inc_hook.layouts.is_empty());
    assert!(!inc_hook.migrations.is_empty());

    match batch(&mut full, &mut full_hook) {
        ModifierOutcome::Recomputed(layout) => assert_eq!(full_hook.layouts, vec![layout]),
        other => panic!("unexpected {other:?}"),
    }
    assert!(full_hook.migrations.is_empty());

    assert_eq!(inc.ledger(), full.ledger());
    assert_eq!(
        inc.snapshot(SnapshotMode::Classification),
        full.snapshot(SnapshotMode::Classification)
    );
}

#[test]
fn recompute_path_keeps_environment_union() {
    let mut engine = engine_with(DECL, 6, GROUPS, checked().with_incremental(false));
    let steel = MaterialId::new(1);
    let copper = MaterialId::new(2);
    let metal = ComponentRef::Environment(EnvironmentId::new(1));

    let mut modifier = engine.modifier();
    modifier.remove_cells(steel, &cells(&[3]));
    modifier.end_update(&mut []).unwrap();
    // copper still holds cell 3
    assert!(engine.group(metal).unwrap().contains(cid(3)));

    let mut modifier = engine.modifier();
    modifier.remove_cells(copper, &cells(&[3]));
    modifier.end_update(&mut []).unwrap();
    assert!(!engine.group(metal).unwrap().contains(cid(3)));
    assert_eq!(engine.ledger().nb_environments(cid(3)), 0);
}

#[test]
fn recompute_path_checks_preconditions() {
    let mut engine = engine_with(DECL, 6, GROUPS, checked().with_incremental(false));
    let mut modifier = engine.modifier();
    modifier.add_cells(MaterialId::new(1), &cells(&[2]));
    let err = modifier.end_update(&mut []).unwrap_err();
    assert!(matches!(err, MeshMaterialError::CellAlreadyPresent { .. }));
    assert!(!engine.is_poisoned());
}

#[test]
fn rejected_recompute_batch_commits_nothing() {
    let mut engine = engine_with(DECL, 6, GROUPS, checked().with_incremental(false));
    let [steel, copper] = [1, 2].map(MaterialId::new);
    let before = engine.snapshot(SnapshotMode::Classification);
    let stamp = engine.timestamp();

    let mut modifier = engine.modifier();
    modifier
        .add_cells(copper, &cells(&[2]))
        .add_cells(steel, &cells(&[2]));
    let err = modifier.end_update(&mut []).unwrap_err();
    assert!(matches!(err, MeshMaterialError::CellAlreadyPresent { .. }));

    assert!(!engine.is_poisoned());
    assert!(!engine.group(ComponentRef::Material(copper)).unwrap().contains(cid(2)));
    assert_eq!(engine.cells(ComponentRef::Environment(EnvironmentId::new(1))).unwrap().len(), 3);
    assert_eq!(engine.check_coherency(), Ok(()));
    assert_eq!(engine.timestamp(), stamp);
    assert_eq!(engine.snapshot(SnapshotMode::Classification), before);

    // the engine still takes a valid batch
    let mut modifier = engine.modifier();
    modifier.add_cells(copper, &cells(&[2]));
    modifier.end_update(&mut []).unwrap();
    assert!(engine.group(ComponentRef::Material(copper)).unwrap().contains(cid(2)));
    assert_eq!(engine.ledger().nb_materials(cid(2), EnvironmentId::new(1)), 2);
}
