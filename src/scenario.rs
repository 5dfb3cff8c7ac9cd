use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::climate::Climate;
use crate::components::{ColorSet, Position, Rgba, Season, Species, TreeState};
use crate::engine::{EngineSettings, Schedule};
use crate::settings::Settings;
use crate::world::{EntityId, World};

fn default_frames() -> u64 {
    8_192
}

fn default_update_groups() -> u32 {
    16
}

fn default_variations() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_count() -> usize {
    1
}

fn default_spacing() -> f32 {
    8.0
}

fn default_frames_per_day() -> u32 {
    2_048
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub seed: u64,
    #[serde(default)]
    pub frames: Option<u64>,
    #[serde(default = "default_update_groups")]
    pub update_groups: u32,
    #[serde(default)]
    pub schedule: Schedule,
    #[serde(default)]
    pub snapshot_interval_frames: u32,
    pub climate: ScenarioClimate,
    #[serde(default)]
    pub settings: Option<Settings>,
    pub species: Vec<ScenarioSpecies>,
    #[serde(default)]
    pub categories: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub trees: Vec<ScenarioTrees>,
    #[serde(default)]
    pub areas: Vec<ScenarioArea>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioClimate {
    pub start_date: NaiveDate,
    #[serde(default = "default_frames_per_day")]
    pub frames_per_day: u32,
    /// Host season identifier that pins the season regardless of the date.
    #[serde(default)]
    pub season_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioSpecies {
    pub name: String,
    #[serde(default = "default_true")]
    pub tree_capable: bool,
    #[serde(default)]
    pub placeholder: bool,
    /// Number of seasonal color variants; fewer than four makes an evergreen.
    #[serde(default = "default_variations")]
    pub variations: usize,
}

/// A block of identical trees laid out on a square grid starting at `at`.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioTrees {
    pub species: String,
    pub state: TreeState,
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default)]
    pub at: Position,
    #[serde(default = "default_spacing")]
    pub spacing: f32,
}

/// An extractor area; `trees` are indices into the spawned trees, in order.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioArea {
    pub trees: Vec<usize>,
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(scenario)
    }
}

/// Foliage palette generated for scenario species: green through the year,
/// warmer in autumn, grey-brown in winter.
pub fn seasonal_palette(season: Season) -> ColorSet {
    let (r, g, b) = match season {
        Season::Spring => (0.38, 0.55, 0.30),
        Season::Summer => (0.31, 0.47, 0.26),
        Season::Autumn => (0.82, 0.45, 0.15),
        Season::Winter => (0.52, 0.45, 0.38),
    };
    ColorSet {
        channel0: Rgba::new(r, g, b, 1.0),
        channel1: Rgba::new(r * 0.9, g * 0.9, b * 0.9, 1.0),
        channel2: Rgba::new(r * 1.1, g * 1.1, b * 1.1, 1.0).clamped(),
    }
}

impl Scenario {
    pub fn build_world(&self) -> Result<World> {
        let mut climate = Climate::new(self.climate.start_date, self.climate.frames_per_day);
        climate.set_season_id(self.climate.season_id.as_deref());
        let mut world = World::new(climate, self.update_groups);

        for def in &self.species {
            let mut species = Species::tree(
                def.name.clone(),
                Season::ALL
                    .iter()
                    .take(def.variations.min(Season::ALL.len()))
                    .map(|season| seasonal_palette(*season))
                    .collect(),
            );
            species.tree_capable = def.tree_capable;
            species.placeholder = def.placeholder;
            world.add_species(species);
        }

        for (category, members) in &self.categories {
            for name in members {
                let id = world
                    .species_named(name)
                    .with_context(|| format!("category {category} lists unknown species {name}"))?;
                world.add_to_category(category, id);
            }
        }

        let mut spawned: Vec<EntityId> = Vec::new();
        for block in &self.trees {
            let species = world
                .species_named(&block.species)
                .with_context(|| format!("unknown tree species {}", block.species))?;
            let side = (block.count as f32).sqrt().ceil().max(1.0) as usize;
            for index in 0..block.count {
                let position = Position {
                    x: block.at.x + (index % side) as f32 * block.spacing,
                    y: block.at.y,
                    z: block.at.z + (index / side) as f32 * block.spacing,
                };
                spawned.push(world.spawn_tree(species, block.state, position));
            }
        }

        for (area_index, area) in self.areas.iter().enumerate() {
            let mut resources = Vec::with_capacity(area.trees.len());
            for &tree in &area.trees {
                let Some(&id) = spawned.get(tree) else {
                    bail!(
                        "area {area_index} references tree {tree}, only {} spawned",
                        spawned.len()
                    );
                };
                resources.push(id);
            }
            world.spawn_extractor_area(resources);
        }

        Ok(world)
    }

    pub fn frames(&self, override_frames: Option<u64>) -> u64 {
        override_frames.or(self.frames).unwrap_or_else(default_frames)
    }

    pub fn settings(&self) -> Settings {
        self.settings.clone().unwrap_or_default()
    }

    pub fn engine_settings(&self, snapshot_dir: impl Into<PathBuf>) -> EngineSettings {
        EngineSettings {
            scenario_name: self.name.clone(),
            seed: self.seed,
            schedule: self.schedule,
            snapshot_interval_frames: self.snapshot_interval_frames,
            snapshot_dir: snapshot_dir.into(),
        }
    }
}
