use anyhow::Result;
use tracing::{debug, info};

use crate::{
    commands::{Command, CommandBuffer},
    engine::{System, SystemContext},
    rng::SystemRng,
    world::{Signal, World},
};

/// Watches extractor areas and requests a claim rebuild when any of them was
/// created, edited or deleted.
pub struct AreaChangeSystem;

impl AreaChangeSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AreaChangeSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for AreaChangeSystem {
    fn name(&self) -> &str {
        "area_change"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &World,
        commands: &mut CommandBuffer,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let changed = world.updated_areas();
        if !changed.is_empty() && !world.signal_raised(Signal::LumberRefresh) {
            debug!(frame = ctx.frame, areas = changed.len(), "extractor areas changed");
            commands.push(Command::RaiseSignal(Signal::LumberRefresh));
        }
        Ok(())
    }
}

/// Rebuilds lumber claims from the resource lists of every live extractor area.
pub struct LumberSystem {
    rebuilds: u64,
}

impl LumberSystem {
    pub fn new() -> Self {
        Self { rebuilds: 0 }
    }

    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }
}

impl Default for LumberSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for LumberSystem {
    fn name(&self) -> &str {
        "lumber"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &World,
        commands: &mut CommandBuffer,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        if !world.signal_raised(Signal::LumberRefresh) {
            return Ok(());
        }

        let released = world.lumber_ids();
        for &entity in &released {
            commands.push(Command::RemoveLumber { entity });
        }

        let mut claimed = 0usize;
        for area_id in world.area_ids() {
            let Some(area) = world.area(area_id).filter(|area| !area.deleted) else {
                continue;
            };
            for &entity in &area.wood_resources {
                if world.tree(entity).is_some() {
                    commands.push(Command::AddLumber { entity });
                    claimed += 1;
                }
            }
        }
        commands.push(Command::ClearSignal(Signal::LumberRefresh));

        self.rebuilds += 1;
        info!(
            frame = ctx.frame,
            released = released.len(),
            claimed,
            "rebuilt lumber claims"
        );
        Ok(())
    }
}
