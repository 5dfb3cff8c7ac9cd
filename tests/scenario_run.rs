use std::fs;

use arborist::{
    components::{Season, Tree},
    engine::{Engine, EngineBuilder},
    scenario::{Scenario, ScenarioLoader},
    systems::{Classification, SpeciesClassifierSystem},
    world::{World, WorldSnapshot},
};
use tempfile::tempdir;

fn grove() -> Scenario {
    ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"))
        .load("scenarios/small_grove.yaml")
        .expect("scenario should load")
}

fn engine_for(scenario: &Scenario, snapshot_dir: &std::path::Path) -> Engine {
    EngineBuilder::new(scenario.engine_settings(snapshot_dir))
        .with_settings(scenario.settings())
        .with_default_systems()
        .build()
}

fn tree_states(world: &World) -> Vec<Tree> {
    world
        .tree_ids()
        .into_iter()
        .filter_map(|id| world.tree(id).copied())
        .collect()
}

#[test]
fn grove_crosses_one_winter() {
    let scenario = grove();
    let mut world = scenario.build_world().expect("world builds");
    let temp = tempdir().expect("tempdir");
    let mut engine = engine_for(&scenario, temp.path());

    let mut mid_winter: Option<WorldSnapshot> = None;
    engine
        .run_with_hook(&mut world, scenario.frames(None), |snapshot| {
            if snapshot.frame == 2_000 {
                mid_winter = Some(snapshot);
            }
        })
        .expect("run succeeds");

    assert_eq!(
        engine.system::<SpeciesClassifierSystem>().and_then(|s| s.result()),
        Some(Classification {
            vegetation: 4,
            evergreen: 1,
            deciduous: 3,
        })
    );

    let winter = mid_winter.expect("frame 2000 reached");
    assert_eq!(winter.season, Season::Winter);
    assert_eq!(winter.total_trees, 30);
    assert_eq!(winter.lumber, 3);
    assert_eq!(winter.evergreen, 6);
    // Every deciduous tree outside the lumber yard.
    assert_eq!(winter.tracked, 21);
    assert_eq!(winter.illusions, 21);

    let spring = world.snapshot(&scenario.name);
    assert_eq!(spring.frame, 4_000);
    assert_eq!(spring.season, Season::Spring);
    assert_eq!(spring.illusions, 0);
    assert_eq!(spring.tracked, 21);
    assert_eq!(spring.lumber, 3);
}

#[test]
fn same_seed_gives_identical_runs() {
    let scenario = grove();
    let temp = tempdir().expect("tempdir");

    let mut runs = Vec::new();
    for _ in 0..2 {
        let mut world = scenario.build_world().expect("world builds");
        let mut engine = engine_for(&scenario, temp.path());
        engine.run(&mut world, 1_000).expect("run succeeds");
        let summary = serde_json::to_string(&world.snapshot(&scenario.name)).expect("serialize");
        runs.push((summary, tree_states(&world)));
    }

    assert_eq!(runs[0], runs[1]);
    assert!(runs[0].1.iter().any(|tree| tree.growth > 0));
}

#[test]
fn snapshots_land_on_the_configured_interval() {
    let mut scenario = grove();
    scenario.snapshot_interval_frames = 100;
    let mut world = scenario.build_world().expect("world builds");
    let temp = tempdir().expect("tempdir");
    let mut engine = engine_for(&scenario, temp.path());

    let mut written = Vec::new();
    for _ in 0..400 {
        let report = engine.step(&mut world).expect("step succeeds");
        written.extend(report.snapshot_path);
    }

    let dir = temp.path().join("small_grove");
    let expected: Vec<_> = [100, 200, 300, 400]
        .iter()
        .map(|frame| dir.join(format!("frame_{frame:08}.json")))
        .collect();
    assert_eq!(written, expected);

    let last: WorldSnapshot =
        serde_json::from_str(&fs::read_to_string(&expected[3]).expect("read")).expect("parse");
    assert_eq!(last.frame, 400);
    assert_eq!(last.scenario, "small_grove");
    assert_eq!(fs::read_dir(&dir).expect("list").count(), 4);
}
