use anyhow::Result;
use tracing::info;

use crate::{
    commands::{Command, CommandBuffer},
    engine::{System, SystemContext},
    rng::SystemRng,
    world::{Signal, World},
};

/// Restores every winter-illusion tree and strips all seasonal records, so the
/// seasonal systems can be removed without leaving trees stuck as Dead.
///
/// Active while the teardown signal is raised; the signal is dropped once no
/// records remain.
pub struct SafeTeardownSystem {
    active: bool,
    restored: usize,
}

impl SafeTeardownSystem {
    pub fn new() -> Self {
        Self {
            active: false,
            restored: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Default for SafeTeardownSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for SafeTeardownSystem {
    fn name(&self) -> &str {
        "safe_teardown"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &World,
        commands: &mut CommandBuffer,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        if !world.signal_raised(Signal::Teardown) {
            self.active = false;
            return Ok(());
        }

        let tracked = world.seasonal_ids();
        if !self.active {
            info!(frame = ctx.frame, tracked = tracked.len(), "safe teardown started");
            self.active = true;
            self.restored = 0;
        }

        if tracked.is_empty() {
            info!(frame = ctx.frame, restored = self.restored, "safe teardown finished");
            commands.push(Command::ClearSignal(Signal::Teardown));
            self.active = false;
            return Ok(());
        }

        for id in tracked {
            let Some(record) = world.seasonal(id) else {
                continue;
            };
            if let Some(tree) = world.tree(id) {
                if tree.state.is_dead() && !record.previous_state.is_dead() {
                    commands.set_tree_state(id, record.previous_state);
                    self.restored += 1;
                }
                commands.mark_batches_updated(id);
            }
            commands.remove_seasonal(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Position, SeasonalOverride, Species, TreeState};
    use crate::engine::{EngineBuilder, EngineSettings, Schedule};

    #[test]
    fn teardown_restores_illusions_and_runs_to_exhaustion() {
        let mut world = World::default();
        let oak = world.add_species(Species::tree("OakTree01", Vec::new()));
        let fake = world.spawn_tree(oak, TreeState::Dead, Position::default());
        let real = world.spawn_tree(oak, TreeState::Dead, Position::default());
        world.seasonal.insert(
            fake,
            SeasonalOverride {
                previous_state: TreeState::Adult,
                technically_dead: true,
            },
        );
        world
            .seasonal
            .insert(real, SeasonalOverride::observe(TreeState::Dead));
        world.raise_signal(Signal::Teardown);

        let mut engine = EngineBuilder::new(EngineSettings {
            scenario_name: "teardown".into(),
            seed: 1,
            schedule: Schedule::default(),
            snapshot_interval_frames: 0,
            snapshot_dir: "snapshots".into(),
        })
        .with_system(SafeTeardownSystem::new())
        .build();

        engine.step(&mut world).unwrap();
        assert_eq!(world.seasonal_count(), 0);
        assert_eq!(world.tree(fake).unwrap().state, TreeState::Adult);
        assert_eq!(world.tree(real).unwrap().state, TreeState::Dead);
        assert!(world.signal_raised(Signal::Teardown));

        engine.step(&mut world).unwrap();
        assert!(!world.signal_raised(Signal::Teardown));
        assert!(!engine.system::<SafeTeardownSystem>().unwrap().is_active());
    }
}
