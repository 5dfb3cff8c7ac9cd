use std::collections::VecDeque;

use anyhow::Result;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    commands::{Command, CommandBuffer},
    components::{Position, SpeciesId, TreeState},
    engine::{System, SystemContext},
    rng::SystemRng,
    settings::AgeSelectionTechnique,
    world::{EntityId, World},
};

pub const MIN_RADIUS: f32 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selection {
    Single { tree: EntityId },
    Radius { center: Position, radius: f32 },
    WholeMap,
}

/// A queued age and/or species change over a set of trees. Empty lists leave
/// that attribute alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkEdit {
    pub selection: Selection,
    #[serde(default)]
    pub ages: Vec<TreeState>,
    #[serde(default)]
    pub species: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BulkEditOutcome {
    pub selected: usize,
    pub aged: usize,
    pub replanted: usize,
}

pub fn select(world: &World, selection: &Selection) -> Vec<EntityId> {
    match selection {
        Selection::Single { tree } => world
            .query_trees(None)
            .into_iter()
            .filter(|id| id == tree)
            .collect(),
        Selection::Radius { center, radius } => {
            let radius = radius.max(MIN_RADIUS);
            world
                .query_trees(None)
                .into_iter()
                .filter(|id| {
                    world
                        .position(*id)
                        .map(|p| p.distance(center) <= radius)
                        .unwrap_or(false)
                })
                .collect()
        }
        Selection::WholeMap => world.query_trees(None),
    }
}

fn pick_age(ages: &[TreeState], technique: AgeSelectionTechnique, rng: &mut SystemRng<'_>) -> TreeState {
    if ages.len() > 1 && technique == AgeSelectionTechnique::Weighted {
        if let Ok(dist) = WeightedIndex::new(ages.iter().map(|age| age.phase_weight())) {
            return ages[dist.sample(rng)];
        }
    }
    ages[rng.gen_range(0..ages.len())]
}

/// Records the commands for one edit. Age edits only touch the displayed
/// state; the tracker re-baselines tracked trees on its next cycle.
pub fn apply_edit(
    world: &World,
    edit: &BulkEdit,
    technique: AgeSelectionTechnique,
    commands: &mut CommandBuffer,
    rng: &mut SystemRng<'_>,
) -> BulkEditOutcome {
    let species: Vec<SpeciesId> = edit
        .species
        .iter()
        .filter_map(|name| {
            let id = world
                .species_named(name)
                .filter(|id| world.species(*id).is_some_and(|s| s.vegetation));
            if id.is_none() {
                warn!(species = %name, "not a known vegetation species, skipped in bulk edit");
            }
            id
        })
        .collect();

    let selected = select(world, &edit.selection);
    let mut outcome = BulkEditOutcome {
        selected: selected.len(),
        ..Default::default()
    };

    for id in selected {
        let Some(tree) = world.tree(id) else {
            continue;
        };

        let mut aged = false;
        if !edit.ages.is_empty() {
            let age = pick_age(&edit.ages, technique, rng);
            if age != tree.state {
                commands.set_tree_state(id, age);
                commands.mark_batches_updated(id);
                outcome.aged += 1;
                aged = true;
            }
        }

        if species.is_empty() {
            continue;
        }
        let replacement = species[rng.gen_range(0..species.len())];
        if world.species_of(id) == Some(replacement) {
            continue;
        }
        commands.push(Command::SetSpecies {
            entity: id,
            species: replacement,
        });
        commands.push(Command::ClearEvergreen { entity: id });
        if let Some(record) = world.seasonal(id) {
            if !aged && record.is_illusion(tree.state) {
                commands.set_tree_state(id, record.previous_state);
                commands.mark_batches_updated(id);
            }
            commands.remove_seasonal(id);
        }
        commands.mark_updated(id);
        outcome.replanted += 1;
    }
    outcome
}

/// Applies queued bulk edits at the next frame.
pub struct BulkEditSystem {
    queue: VecDeque<BulkEdit>,
    last: Option<BulkEditOutcome>,
}

impl BulkEditSystem {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            last: None,
        }
    }

    pub fn queue(&mut self, edit: BulkEdit) {
        self.queue.push_back(edit);
    }

    pub fn last_outcome(&self) -> Option<BulkEditOutcome> {
        self.last
    }
}

impl Default for BulkEditSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for BulkEditSystem {
    fn name(&self) -> &str {
        "bulk_edit"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &World,
        commands: &mut CommandBuffer,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        while let Some(edit) = self.queue.pop_front() {
            if edit.ages.is_empty() && edit.species.is_empty() {
                debug!("bulk edit with nothing to change");
                continue;
            }
            let outcome = apply_edit(
                world,
                &edit,
                ctx.settings.age_selection_technique,
                commands,
                rng,
            );
            info!(
                frame = ctx.frame,
                selected = outcome.selected,
                aged = outcome.aged,
                replanted = outcome.replanted,
                "applied bulk edit"
            );
            self.last = Some(outcome);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{SeasonalOverride, Species};
    use crate::rng::RngManager;

    fn grove() -> (World, Vec<EntityId>) {
        let mut world = World::default();
        let oak = world.add_species(Species::tree("OakTree01", Vec::new()));
        let birch = world.add_species(Species::tree("BirchTree01", Vec::new()));
        world.add_species(Species::tree("Rock01", Vec::new()));
        for id in [oak, birch] {
            world.species_mut(id).unwrap().vegetation = true;
        }
        let trees = (0..4)
            .map(|i| {
                world.spawn_tree(
                    oak,
                    TreeState::Adult,
                    Position {
                        x: i as f32 * 10.0,
                        y: 0.0,
                        z: 0.0,
                    },
                )
            })
            .collect();
        (world, trees)
    }

    #[test]
    fn radius_selection_has_a_minimum() {
        let (world, trees) = grove();
        let tiny = Selection::Radius {
            center: Position::default(),
            radius: 0.5,
        };
        assert_eq!(select(&world, &tiny), vec![trees[0]]);
        let wide = Selection::Radius {
            center: Position::default(),
            radius: 15.0,
        };
        assert_eq!(select(&world, &wide), vec![trees[0], trees[1]]);
        assert_eq!(select(&world, &Selection::WholeMap).len(), 4);
        assert_eq!(
            select(&world, &Selection::Single { tree: trees[2] }),
            vec![trees[2]]
        );
    }

    #[test]
    fn age_edit_only_picks_requested_ages() {
        let (mut world, trees) = grove();
        let mut rngs = RngManager::new(9);
        let mut commands = CommandBuffer::new();
        let edit = BulkEdit {
            selection: Selection::WholeMap,
            ages: vec![TreeState::Child, TreeState::Elderly],
            species: Vec::new(),
        };
        let outcome = apply_edit(
            &world,
            &edit,
            AgeSelectionTechnique::Weighted,
            &mut commands,
            &mut rngs.stream("bulk_edit"),
        );
        commands.apply(&mut world);
        assert_eq!(outcome.aged, 4);
        for id in trees {
            let state = world.tree(id).unwrap().state;
            assert!(matches!(state, TreeState::Child | TreeState::Elderly));
            assert!(world.is_batches_updated(id));
        }
    }

    #[test]
    fn species_edit_restores_illusion_and_drops_tracking() {
        let (mut world, trees) = grove();
        let birch = world.species_named("BirchTree01").unwrap();
        world.set_tree_state(trees[0], TreeState::Dead);
        world.seasonal.insert(
            trees[0],
            SeasonalOverride {
                previous_state: TreeState::Adult,
                technically_dead: true,
            },
        );
        world.evergreen.insert(trees[0]);

        let mut rngs = RngManager::new(9);
        let mut commands = CommandBuffer::new();
        let edit = BulkEdit {
            selection: Selection::Single { tree: trees[0] },
            ages: Vec::new(),
            species: vec!["BirchTree01".into(), "Nope".into(), "Rock01".into()],
        };
        let outcome = apply_edit(
            &world,
            &edit,
            AgeSelectionTechnique::EqualWeight,
            &mut commands,
            &mut rngs.stream("bulk_edit"),
        );
        commands.apply(&mut world);

        assert_eq!(outcome.replanted, 1);
        assert_eq!(world.species_of(trees[0]), Some(birch));
        assert_eq!(world.tree(trees[0]).unwrap().state, TreeState::Adult);
        assert!(world.seasonal(trees[0]).is_none());
        assert!(!world.is_evergreen_instance(trees[0]));
        assert!(world.is_updated(trees[0]));
    }

    #[test]
    fn bulk_edit_deserializes_from_json() {
        let edit: BulkEdit = serde_json::from_str(
            r#"{"selection":{"kind":"radius","center":{"x":1.0,"y":0.0,"z":2.0},"radius":12.0},"ages":["Teen"]}"#,
        )
        .unwrap();
        assert_eq!(edit.ages, vec![TreeState::Teen]);
        assert!(edit.species.is_empty());
        assert!(matches!(edit.selection, Selection::Radius { radius, .. } if radius == 12.0));
    }
}
