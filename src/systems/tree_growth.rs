use anyhow::Result;
use rand::Rng;
use tracing::trace;

use crate::{
    commands::{Command, CommandBuffer},
    engine::{System, SystemContext},
    rng::SystemRng,
    world::World,
};

const GROWTH_STEP_MIN: u16 = 16;
const GROWTH_STEP_MAX: u16 = 48;

/// Host growth advancement. Only trees the active growth filter lets through
/// accumulate growth; overflowing 255 moves the tree to its next age stage.
pub struct TreeGrowthSystem;

impl TreeGrowthSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TreeGrowthSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for TreeGrowthSystem {
    fn name(&self) -> &str {
        "tree_growth"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &World,
        commands: &mut CommandBuffer,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        if !ctx.periodic_due() {
            return Ok(());
        }

        let mut advanced = 0usize;
        for id in world.query_trees(Some(ctx.update_group())) {
            if !world.growth_allowed(id) {
                continue;
            }
            let Some(tree) = world.tree(id) else {
                continue;
            };
            let total = tree.growth as u16 + rng.gen_range(GROWTH_STEP_MIN..=GROWTH_STEP_MAX);
            if total > u8::MAX as u16 {
                commands.set_tree_state(id, tree.state.next());
                commands.push(Command::SetGrowth {
                    entity: id,
                    growth: 0,
                });
                commands.mark_batches_updated(id);
                advanced += 1;
            } else {
                commands.push(Command::SetGrowth {
                    entity: id,
                    growth: total as u8,
                });
            }
        }

        trace!(frame = ctx.frame, advanced, filter = ?world.growth_filter(), "growth pass");
        Ok(())
    }
}
