use anyhow::Result;
use tracing::{debug, info};

use crate::{
    commands::{Command, CommandBuffer},
    components::{Season, SeasonalOverride, TreeState},
    engine::{System, SystemContext},
    rng::SystemRng,
    world::{Signal, World},
};

/// Outcome of reconciling one tracked tree against the current season.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    pub displayed: TreeState,
    /// `None` drops the record.
    pub record: Option<SeasonalOverride>,
    pub batches_updated: bool,
    pub updated: bool,
}

/// Decides the next displayed state and seasonal record of one deciduous tree.
///
/// Lumber claims win over everything else: a Dead tree whose recorded state
/// is alive gets that state back, and the record is dropped. Otherwise an external state change re-baselines the record, winter
/// swaps the displayed state for Dead, and any other season undoes the swap or
/// follows real growth (a tree that reaches Dead outside winter is really dead).
pub fn reconcile(
    displayed: TreeState,
    record: SeasonalOverride,
    season: Season,
    lumber_claimed: bool,
) -> Reconciliation {
    if lumber_claimed {
        let restored = if displayed.is_dead() && !record.previous_state.is_dead() {
            record.previous_state
        } else {
            displayed
        };
        return Reconciliation {
            displayed: restored,
            record: None,
            batches_updated: restored != displayed,
            updated: false,
        };
    }

    let mut next = Reconciliation {
        displayed,
        record: Some(record),
        batches_updated: false,
        updated: false,
    };
    let mut record = record;

    if record.technically_dead && !displayed.is_dead() {
        record.technically_dead = false;
        record.previous_state = displayed;
    }

    if season == Season::Winter {
        if !record.technically_dead && !displayed.is_dead() {
            record.previous_state = displayed;
            record.technically_dead = true;
            next.displayed = TreeState::Dead;
            next.batches_updated = true;
        }
    } else if record.is_illusion(displayed) {
        next.displayed = record.previous_state;
        record.technically_dead = false;
        next.batches_updated = true;
        next.updated = true;
    } else if record.previous_state != displayed {
        record.previous_state = displayed;
        if displayed.is_dead() {
            record.technically_dead = true;
        }
    }

    next.record = Some(record);
    next
}

/// Per-instance seasonal state tracker: runs the winter illusion on every
/// deciduous tree that carries a seasonal record, one update group per cycle.
pub struct DeciduousSystem {
    illusion_enabled: Option<bool>,
}

impl DeciduousSystem {
    pub fn new() -> Self {
        Self {
            illusion_enabled: None,
        }
    }
}

impl Default for DeciduousSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for DeciduousSystem {
    fn name(&self) -> &str {
        "deciduous"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &World,
        commands: &mut CommandBuffer,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let enabled = ctx.settings.use_dead_model_during_winter;
        if self.illusion_enabled != Some(enabled) {
            info!(enabled, "winter illusion setting changed");
            self.illusion_enabled = Some(enabled);
        }

        if !enabled {
            if world.seasonal_count() > 0 && !world.signal_raised(Signal::Teardown) {
                commands.push(Command::RaiseSignal(Signal::Teardown));
            }
            return Ok(());
        }

        if !ctx.periodic_due() {
            return Ok(());
        }

        let mut changed = 0usize;
        for id in world.query_trees(Some(ctx.update_group())) {
            let (Some(record), Some(tree)) = (world.seasonal(id), world.tree(id)) else {
                continue;
            };
            let deciduous = world
                .species_of(id)
                .and_then(|s| world.species(s))
                .map(|s| s.is_deciduous())
                .unwrap_or(false);
            if !deciduous {
                continue;
            }

            let next = reconcile(tree.state, *record, ctx.season, world.has_lumber(id));
            if next.displayed != tree.state {
                commands.set_tree_state(id, next.displayed);
                changed += 1;
            }
            match next.record {
                None => commands.remove_seasonal(id),
                Some(updated) if updated != *record => commands.insert_seasonal(id, updated),
                Some(_) => {}
            }
            if next.batches_updated {
                commands.mark_batches_updated(id);
            }
            if next.updated {
                commands.mark_updated(id);
            }
        }

        if changed > 0 {
            debug!(
                frame = ctx.frame,
                group = ctx.update_group(),
                season = ?ctx.season,
                changed,
                "seasonal states reconciled"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracked(state: TreeState) -> SeasonalOverride {
        SeasonalOverride::observe(state)
    }

    #[test]
    fn winter_entry_is_idempotent() {
        let first = reconcile(TreeState::Adult, tracked(TreeState::Adult), Season::Winter, false);
        assert_eq!(first.displayed, TreeState::Dead);
        let record = first.record.unwrap();
        assert_eq!(
            record,
            SeasonalOverride {
                previous_state: TreeState::Adult,
                technically_dead: true
            }
        );

        let second = reconcile(first.displayed, record, Season::Winter, false);
        assert_eq!(second.displayed, TreeState::Dead);
        assert_eq!(second.record, Some(record));
        assert!(!second.batches_updated);
    }

    #[test]
    fn illusion_round_trips_for_every_living_state() {
        for state in TreeState::ALL.into_iter().filter(|s| !s.is_dead()) {
            let spring = reconcile(state, tracked(state), Season::Spring, false);
            let winter = reconcile(spring.displayed, spring.record.unwrap(), Season::Winter, false);
            assert_eq!(winter.displayed, TreeState::Dead);
            let back = reconcile(winter.displayed, winter.record.unwrap(), Season::Spring, false);
            assert_eq!(back.displayed, state);
            assert_eq!(back.record, Some(tracked(state)));
            assert!(back.batches_updated && back.updated);
        }
    }

    #[test]
    fn lumber_claim_restores_and_drops_record() {
        let record = SeasonalOverride {
            previous_state: TreeState::Adult,
            technically_dead: true,
        };
        let next = reconcile(TreeState::Dead, record, Season::Winter, true);
        assert_eq!(next.displayed, TreeState::Adult);
        assert_eq!(next.record, None);
        assert!(next.batches_updated);
    }

    #[test]
    fn lumber_claim_restores_dead_display_not_yet_flagged() {
        let record = tracked(TreeState::Elderly);
        let next = reconcile(TreeState::Dead, record, Season::Summer, true);
        assert_eq!(next.displayed, TreeState::Elderly);
        assert_eq!(next.record, None);
        assert!(next.batches_updated);
    }

    #[test]
    fn lumber_claim_never_revives_a_real_death() {
        let next = reconcile(TreeState::Dead, tracked(TreeState::Dead), Season::Summer, true);
        assert_eq!(next.displayed, TreeState::Dead);
        assert_eq!(next.record, None);
    }

    #[test]
    fn external_change_rebaselines_record() {
        let record = SeasonalOverride {
            previous_state: TreeState::Adult,
            technically_dead: true,
        };
        let next = reconcile(TreeState::Child, record, Season::Summer, false);
        assert_eq!(next.displayed, TreeState::Child);
        assert_eq!(next.record, Some(tracked(TreeState::Child)));
    }

    #[test]
    fn natural_death_outside_winter_is_recorded_as_real() {
        let next = reconcile(TreeState::Dead, tracked(TreeState::Elderly), Season::Spring, false);
        assert_eq!(next.displayed, TreeState::Dead);
        assert_eq!(next.record, Some(tracked(TreeState::Dead)));

        let winter = reconcile(TreeState::Dead, tracked(TreeState::Dead), Season::Winter, false);
        let spring = reconcile(winter.displayed, winter.record.unwrap(), Season::Spring, false);
        assert_eq!(spring.displayed, TreeState::Dead);
    }

    #[test]
    fn growth_outside_winter_is_followed() {
        let next = reconcile(TreeState::Elderly, tracked(TreeState::Adult), Season::Autumn, false);
        assert_eq!(next.displayed, TreeState::Elderly);
        assert_eq!(next.record, Some(tracked(TreeState::Elderly)));
        assert!(!next.batches_updated);
    }
}
