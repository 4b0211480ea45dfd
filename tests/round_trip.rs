mod util;
use mesh_materials::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use util::*;

const DECL: &[(&str, &[&str])] = &[
    ("gas", &["air"]),
    ("metal", &["steel", "copper", "zinc"]),
    ("liquid", &["water", "oil"]),
];
const NB_CELLS: u32 = 40;

fn random_engine(rng: &mut StdRng) -> CompositionEngine {
    let names = ["air", "steel", "copper", "zinc", "water", "oil"];
    let groups: Vec<(&str, Vec<u32>)> = names
        .iter()
        .map(|&n| (n, (0..NB_CELLS).filter(|_| rng.gen_bool(0.3)).collect()))
        .collect();
    let borrowed: Vec<(&str, &[u32])> = groups.iter().map(|(n, c)| (*n, c.as_slice())).collect();
    engine_with(DECL, NB_CELLS as usize, &borrowed, roomy())
}

#[test]
fn add_then_remove_restores_every_storage_index() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..8 {
        let mut engine = random_engine(&mut rng);
        for _ in 0..10 {
            let material = MaterialId::new(rng.gen_range(0..6));
            let group = engine.group(ComponentRef::Material(material)).unwrap();
            let candidates: Vec<CellId> = (0..NB_CELLS)
                .map(cid)
                .filter(|&c| !group.contains(c) && rng.gen_bool(0.5))
                .collect();
            let before = engine.snapshot(SnapshotMode::Exact);
            let ledger_before = engine.ledger().clone();

            let add = ModificationOperation::add(material, candidates);
            engine.apply(&add, &mut []).unwrap();
            assert_ledger_matches_indexers(&engine);
            engine.apply(&add.inverse(), &mut []).unwrap();

            assert_eq!(engine.snapshot(SnapshotMode::Exact), before, "{add}");
            assert_eq!(engine.ledger(), &ledger_before);
        }
    }
}

#[test]
fn remove_then_add_restores_classification() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut engine = random_engine(&mut rng);
    for m in 0..6 {
        let material = MaterialId::new(m);
        let present: Vec<CellId> = engine.cells(ComponentRef::Material(material)).unwrap().to_vec();
        let before = engine.snapshot(SnapshotMode::Classification);
        let remove = ModificationOperation::remove(material, present);
        engine.apply(&remove, &mut []).unwrap();
        assert!(engine.cells(ComponentRef::Material(material)).unwrap().is_empty());
        engine.apply(&remove.inverse(), &mut []).unwrap();
        assert_eq!(engine.snapshot(SnapshotMode::Classification), before);
    }
}
