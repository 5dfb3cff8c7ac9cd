//! Deferred structural mutation.
//!
//! Systems only read the `World` while they decide; every change they want is
//! recorded here and applied in order at the end-of-frame barrier, so a frame's
//! decisions all see the world as it was when the frame started.

use crate::components::{ColorSet, Season, SeasonalOverride, SpeciesId, TreeState};
use crate::world::{EntityId, GrowthFilter, Signal, World};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetTreeState { entity: EntityId, state: TreeState },
    SetGrowth { entity: EntityId, growth: u8 },
    InsertSeasonal { entity: EntityId, record: SeasonalOverride },
    RemoveSeasonal { entity: EntityId },
    AddLumber { entity: EntityId },
    RemoveLumber { entity: EntityId },
    MarkEvergreen { entity: EntityId },
    ClearEvergreen { entity: EntityId },
    SetSpecies { entity: EntityId, species: SpeciesId },
    MarkUpdated { entity: EntityId },
    MarkBatchesUpdated { entity: EntityId },
    TagEvergreenSpecies { species: SpeciesId },
    TagVegetationSpecies { species: SpeciesId },
    SetColorVariation { species: SpeciesId, season: Season, colors: ColorSet },
    SetGrowthFilter(GrowthFilter),
    RaiseSignal(Signal),
    ClearSignal(Signal),
}

#[derive(Debug, Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    pub fn set_tree_state(&mut self, entity: EntityId, state: TreeState) {
        self.push(Command::SetTreeState { entity, state });
    }

    pub fn insert_seasonal(&mut self, entity: EntityId, record: SeasonalOverride) {
        self.push(Command::InsertSeasonal { entity, record });
    }

    pub fn remove_seasonal(&mut self, entity: EntityId) {
        self.push(Command::RemoveSeasonal { entity });
    }

    pub fn mark_batches_updated(&mut self, entity: EntityId) {
        self.push(Command::MarkBatchesUpdated { entity });
    }

    pub fn mark_updated(&mut self, entity: EntityId) {
        self.push(Command::MarkUpdated { entity });
    }

    /// Applies and drains every recorded command. Commands aimed at entities
    /// that no longer exist are dropped.
    pub fn apply(&mut self, world: &mut World) {
        for command in self.commands.drain(..) {
            apply_one(world, command);
        }
    }
}

fn apply_one(world: &mut World, command: Command) {
    match command {
        Command::SetTreeState { entity, state } => {
            if let Some(tree) = world.trees.get_mut(&entity) {
                tree.state = state;
            }
        }
        Command::SetGrowth { entity, growth } => {
            if let Some(tree) = world.trees.get_mut(&entity) {
                tree.growth = growth;
            }
        }
        Command::InsertSeasonal { entity, record } => {
            if world.trees.contains_key(&entity) {
                world.seasonal.insert(entity, record);
            }
        }
        Command::RemoveSeasonal { entity } => {
            world.seasonal.remove(&entity);
        }
        Command::AddLumber { entity } => {
            if world.trees.contains_key(&entity) {
                world.lumber.insert(entity);
            }
        }
        Command::RemoveLumber { entity } => {
            world.lumber.remove(&entity);
        }
        Command::MarkEvergreen { entity } => {
            if world.trees.contains_key(&entity) {
                world.evergreen.insert(entity);
            }
        }
        Command::ClearEvergreen { entity } => {
            world.evergreen.remove(&entity);
        }
        Command::SetSpecies { entity, species } => {
            if world.trees.contains_key(&entity) && world.species(species).is_some() {
                world.prefab_refs.insert(entity, species);
            }
        }
        Command::MarkUpdated { entity } => {
            world.updated.insert(entity);
        }
        Command::MarkBatchesUpdated { entity } => {
            if world.trees.contains_key(&entity) {
                world.batches_updated.insert(entity);
            }
        }
        Command::TagEvergreenSpecies { species } => {
            if let Some(def) = world.species_mut(species) {
                def.evergreen = true;
            }
        }
        Command::TagVegetationSpecies { species } => {
            if let Some(def) = world.species_mut(species) {
                def.vegetation = true;
            }
        }
        Command::SetColorVariation {
            species,
            season,
            colors,
        } => {
            if let Some(slot) = world
                .species_mut(species)
                .and_then(|def| def.color_variations.get_mut(season.index()))
            {
                *slot = colors;
            }
        }
        Command::SetGrowthFilter(filter) => {
            world.growth_filter = filter;
        }
        Command::RaiseSignal(signal) => {
            world.signals.insert(signal);
        }
        Command::ClearSignal(signal) => {
            world.signals.remove(&signal);
        }
    }
}
