use anyhow::Result;
use tracing::info;

use crate::{
    commands::{Command, CommandBuffer},
    components::Season,
    engine::{System, SystemContext},
    rng::SystemRng,
    world::{GrowthFilter, World},
};

pub fn select_filter(growth_disabled: bool, season: Season, winter_illusion: bool) -> GrowthFilter {
    if growth_disabled {
        GrowthFilter::Disabled
    } else if season == Season::Winter && winter_illusion {
        GrowthFilter::WinterIllusion
    } else {
        GrowthFilter::Default
    }
}

/// Picks which trees the growth system may advance. Only recomputes when the
/// season or one of the two governing settings changed.
pub struct GrowthGateSystem {
    last_inputs: Option<(Season, bool, bool)>,
}

impl GrowthGateSystem {
    pub fn new() -> Self {
        Self { last_inputs: None }
    }
}

impl Default for GrowthGateSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for GrowthGateSystem {
    fn name(&self) -> &str {
        "growth_gate"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &World,
        commands: &mut CommandBuffer,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let inputs = (
            ctx.season,
            ctx.settings.disable_tree_growth,
            ctx.settings.use_dead_model_during_winter,
        );
        if self.last_inputs == Some(inputs) {
            return Ok(());
        }
        self.last_inputs = Some(inputs);

        let (season, disabled, illusion) = inputs;
        let filter = select_filter(disabled, season, illusion);
        if filter != world.growth_filter() {
            info!(?filter, ?season, growth_disabled = disabled, "growth filter activated");
            commands.push(Command::SetGrowthFilter(filter));
        }
        Ok(())
    }
}
