use std::collections::BTreeSet;

use anyhow::Result;
use tracing::{debug, error, info};

use crate::{
    commands::{Command, CommandBuffer},
    components::SeasonalOverride,
    engine::{System, SystemContext},
    rng::SystemRng,
    world::{EntityId, Signal, World, VEGETATION_CATEGORY},
};

/// Species with fewer seasonal color variants than this keep their foliage all year.
pub const SEASONAL_VARIATIONS: usize = 4;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub vegetation: usize,
    pub evergreen: usize,
    pub deciduous: usize,
}

/// Tags vegetation species and marks the evergreen ones. Returns `None` when
/// the vegetation category is missing, in which case nothing is tagged.
pub fn classify_species(world: &World, commands: &mut CommandBuffer) -> Option<Classification> {
    let Some(members) = world.category(VEGETATION_CATEGORY) else {
        error!(
            category = VEGETATION_CATEGORY,
            "vegetation category not found, seasonal classification disabled"
        );
        return None;
    };

    let mut result = Classification::default();
    for &species in members {
        commands.push(Command::TagVegetationSpecies { species });
        result.vegetation += 1;
    }

    for id in world.species_ids() {
        let Some(species) = world.species(id) else {
            continue;
        };
        if !species.tree_capable || species.placeholder {
            continue;
        }
        if species.color_variations.len() < SEASONAL_VARIATIONS {
            debug!(species = %species.name, variations = species.color_variations.len(), "evergreen");
            commands.push(Command::TagEvergreenSpecies { species: id });
            result.evergreen += 1;
        } else {
            result.deciduous += 1;
        }
    }
    Some(result)
}

/// Runs the classification once, when the world finishes loading.
pub struct SpeciesClassifierSystem {
    result: Option<Classification>,
}

impl SpeciesClassifierSystem {
    pub fn new() -> Self {
        Self { result: None }
    }

    pub fn result(&self) -> Option<Classification> {
        self.result
    }
}

impl Default for SpeciesClassifierSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for SpeciesClassifierSystem {
    fn name(&self) -> &str {
        "species_classifier"
    }

    fn on_load(&mut self, world: &World, commands: &mut CommandBuffer) -> Result<()> {
        self.result = classify_species(world, commands);
        if let Some(counts) = self.result {
            info!(
                vegetation = counts.vegetation,
                evergreen = counts.evergreen,
                deciduous = counts.deciduous,
                "classified species"
            );
        }
        Ok(())
    }

    fn run(
        &mut self,
        _ctx: &SystemContext,
        _world: &World,
        _commands: &mut CommandBuffer,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        Ok(())
    }
}

/// Attaches seasonal bookkeeping to trees that do not have it yet.
///
/// Periodic and sub-batched like the tracker; trees flagged `Updated` (new
/// species from the bulk tool) are picked up on the very next frame.
pub struct FoliageScanSystem;

impl FoliageScanSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FoliageScanSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for FoliageScanSystem {
    fn name(&self) -> &str {
        "foliage_scan"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &World,
        commands: &mut CommandBuffer,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        if !ctx.settings.use_dead_model_during_winter {
            return Ok(());
        }

        let mut candidates: BTreeSet<EntityId> = world.updated_trees().into_iter().collect();
        if ctx.periodic_due() {
            candidates.extend(world.query_trees(Some(ctx.update_group())));
        }

        let mut attached = 0usize;
        let mut evergreen = 0usize;
        for id in candidates {
            if world.markers(id).excluded()
                || world.has_lumber(id)
                || world.seasonal(id).is_some()
                || world.is_evergreen_instance(id)
            {
                continue;
            }
            let (Some(tree), Some(species)) =
                (world.tree(id), world.species_of(id).and_then(|s| world.species(s)))
            else {
                continue;
            };
            if !species.tree_capable {
                continue;
            }
            if species.evergreen {
                commands.push(Command::MarkEvergreen { entity: id });
                evergreen += 1;
            } else {
                commands.insert_seasonal(id, SeasonalOverride::observe(tree.state));
                attached += 1;
            }
        }

        if attached > 0 {
            debug!(frame = ctx.frame, attached, evergreen, "attached seasonal records");
            if world.signal_raised(Signal::Teardown) {
                info!("winter illusion re-enabled, cancelling safe teardown");
                commands.push(Command::ClearSignal(Signal::Teardown));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{ColorSet, Position, Rgba, Species, TreeState};

    fn variations(count: usize) -> Vec<ColorSet> {
        let green = Rgba::new(0.3, 0.5, 0.3, 1.0);
        vec![
            ColorSet {
                channel0: green,
                channel1: green,
                channel2: green,
            };
            count
        ]
    }

    #[test]
    fn species_with_few_variations_are_evergreen() {
        let mut world = World::default();
        let oak = world.add_species(Species::tree("OakTree01", variations(4)));
        let pine = world.add_species(Species::tree("PineTree01", variations(1)));
        let mut rock = Species::tree("Rock01", Vec::new());
        rock.tree_capable = false;
        let rock = world.add_species(rock);
        for id in [oak, pine, rock] {
            world.add_to_category(VEGETATION_CATEGORY, id);
        }

        let mut commands = CommandBuffer::new();
        let result = classify_species(&world, &mut commands).unwrap();
        assert_eq!(
            result,
            Classification {
                vegetation: 3,
                evergreen: 1,
                deciduous: 1
            }
        );
        commands.apply(&mut world);
        assert!(world.species(pine).unwrap().evergreen);
        assert!(!world.species(oak).unwrap().evergreen);
        assert!(world.species(rock).unwrap().vegetation);
    }

    #[test]
    fn missing_category_tags_nothing() {
        let mut world = World::default();
        world.add_species(Species::tree("PineTree01", variations(1)));
        let mut commands = CommandBuffer::new();
        assert!(classify_species(&world, &mut commands).is_none());
        assert!(commands.is_empty());
    }

    #[test]
    fn placeholders_are_never_classified() {
        let mut world = World::default();
        let mut placeholder = Species::tree("TreePlaceholder", Vec::new());
        placeholder.placeholder = true;
        let id = world.add_species(placeholder);
        world.add_to_category(VEGETATION_CATEGORY, id);
        let mut commands = CommandBuffer::new();
        let result = classify_species(&world, &mut commands).unwrap();
        assert_eq!(result.evergreen, 0);
        commands.apply(&mut world);
        assert!(!world.species(id).unwrap().evergreen);
    }

    #[test]
    fn scan_skips_lumber_and_marks_evergreen_instances() {
        let mut world = World::default();
        let oak = world.add_species(Species::tree("OakTree01", variations(4)));
        let mut pine = Species::tree("PineTree01", variations(1));
        pine.evergreen = true;
        let pine = world.add_species(pine);
        let deciduous = world.spawn_tree(oak, TreeState::Adult, Position::default());
        let conifer = world.spawn_tree(pine, TreeState::Adult, Position::default());
        let harvested = world.spawn_tree(oak, TreeState::Teen, Position::default());
        world.lumber.insert(harvested);

        let settings = crate::settings::Settings {
            use_dead_model_during_winter: true,
            ..Default::default()
        };
        let ctx = SystemContext {
            frame: 0,
            season: world.season(),
            date: world.climate().date,
            settings: &settings,
            schedule: crate::engine::Schedule::default(),
            update_groups: 1,
            scenario_name: "unit",
        };
        let mut rng_manager = crate::rng::RngManager::new(1);
        let mut commands = CommandBuffer::new();
        FoliageScanSystem::new()
            .run(&ctx, &world, &mut commands, &mut rng_manager.stream("scan"))
            .unwrap();
        commands.apply(&mut world);

        assert_eq!(
            world.seasonal(deciduous),
            Some(&SeasonalOverride::observe(TreeState::Adult))
        );
        assert!(world.is_evergreen_instance(conifer));
        assert!(world.seasonal(conifer).is_none());
        assert!(world.seasonal(harvested).is_none());
    }
}
