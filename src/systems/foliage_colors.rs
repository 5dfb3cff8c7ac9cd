use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::{
    commands::{Command, CommandBuffer},
    components::{ColorSet, Rgba, Season, SpeciesId},
    engine::{System, SystemContext},
    palette,
    rng::SystemRng,
    settings::ColorVariationSet,
    systems::classifier::SEASONAL_VARIATIONS,
    world::{Signal, World},
};

const fn set(channel0: Rgba, channel1: Rgba, channel2: Rgba) -> ColorSet {
    ColorSet {
        channel0,
        channel1,
        channel2,
    }
}

const fn rgb(r: f32, g: f32, b: f32) -> Rgba {
    Rgba::new(r, g, b, 1.0)
}

const SUMMER_GREEN: (Rgba, Rgba) = (rgb(0.409, 0.509, 0.344), rgb(0.335, 0.462, 0.265));

/// Hand-tuned seasonal palettes. Species/season pairs missing here keep the
/// game's own colors.
const CURATED: &[(&str, Season, ColorSet)] = &[
    ("AppleTree01", Season::Spring, set(SUMMER_GREEN.0, SUMMER_GREEN.1, rgb(0.945, 0.941, 0.957))),
    ("AppleTree01", Season::Summer, set(SUMMER_GREEN.0, SUMMER_GREEN.1, rgb(0.625, 0.141, 0.098))),
    ("AppleTree01", Season::Autumn, set(rgb(0.934, 0.250, 0.109), rgb(0.785, 0.313, 0.137), rgb(0.625, 0.141, 0.098))),
    ("AppleTree01", Season::Winter, set(rgb(0.670, 0.523, 0.409), rgb(0.642, 0.574, 0.428), rgb(0.689, 0.608, 0.466))),
    ("BirchTree01", Season::Autumn, set(rgb(0.981, 0.773, 0.270), rgb(0.867, 0.586, 0.137), rgb(0.957, 0.664, 0.199))),
    ("EU_AlderTree01", Season::Autumn, set(SUMMER_GREEN.0, SUMMER_GREEN.1, rgb(0.373, 0.500, 0.324))),
    ("EU_AlderTree01", Season::Winter, set(SUMMER_GREEN.0, SUMMER_GREEN.1, rgb(0.373, 0.500, 0.324))),
    ("EU_ChestnutTree01", Season::Autumn, set(rgb(0.981, 0.707, 0.099), rgb(0.961, 0.531, 0.031), rgb(0.984, 0.664, 0.094))),
    ("EU_ChestnutTree01", Season::Winter, set(rgb(0.606, 0.219, 0.0), rgb(0.633, 0.227, 0.051), rgb(0.379, 0.082, 0.0))),
    ("EU_PoplarTree01", Season::Autumn, set(rgb(0.961, 0.781, 0.344), rgb(0.793, 0.613, 0.141), rgb(0.984, 0.789, 0.281))),
    ("FlowerBushWild01", Season::Spring, set(rgb(0.310, 0.463, 0.310), rgb(0.329, 0.443, 0.294), rgb(0.32, 0.45, 0.3))),
    ("FlowerBushWild02", Season::Summer, set(rgb(0.310, 0.463, 0.310), rgb(0.329, 0.443, 0.294), rgb(0.32, 0.45, 0.3))),
    ("NA_HickoryTree01", Season::Autumn, set(rgb(0.965, 0.805, 0.066), rgb(0.914, 0.582, 0.125), rgb(0.863, 0.504, 0.242))),
    ("NA_LindenTree01", Season::Autumn, set(rgb(0.930, 0.600, 0.008), rgb(0.633, 0.320, 0.016), rgb(0.852, 0.297, 0.004))),
    ("NA_LondonPlaneTree01", Season::Autumn, set(rgb(0.922, 0.535, 0.106), rgb(0.871, 0.676, 0.168), rgb(0.543, 0.188, 0.070))),
    ("NA_LondonPlaneTree01", Season::Winter, set(rgb(0.680, 0.379, 0.051), rgb(0.605, 0.340, 0.063), rgb(0.508, 0.199, 0.032))),
    ("OakTree01", Season::Autumn, set(rgb(0.957, 0.356, 0.113), rgb(0.957, 0.266, 0.125), rgb(0.961, 0.469, 0.281))),
    ("OakTree01", Season::Winter, set(rgb(0.934, 0.25, 0.109), rgb(0.785, 0.313, 0.137), rgb(0.902, 0.148, 0.059))),
];

pub fn curated(species: &str, season: Season) -> Option<ColorSet> {
    CURATED
        .iter()
        .find(|(name, s, _)| *name == species && *s == season)
        .map(|(_, _, colors)| *colors)
}

/// Rewrites the seasonal foliage colors of deciduous species from the chosen
/// color set: the game's own (remembered the first time they are seen), the
/// curated table, or per-species CSV palettes.
pub struct FoliageColorSystem {
    last_season: Option<Season>,
    last_set: Option<ColorVariationSet>,
    last_illusion: Option<bool>,
    vanilla: HashMap<(SpeciesId, Season), ColorSet>,
}

impl FoliageColorSystem {
    pub fn new() -> Self {
        Self {
            last_season: None,
            last_set: None,
            last_illusion: None,
            vanilla: HashMap::new(),
        }
    }

    pub fn vanilla(&self, species: SpeciesId, season: Season) -> Option<&ColorSet> {
        self.vanilla.get(&(species, season))
    }

    fn target(
        &self,
        set: ColorVariationSet,
        palette_dir: Option<&Path>,
        species: SpeciesId,
        name: &str,
        lookup: Season,
    ) -> Option<ColorSet> {
        match set {
            ColorVariationSet::Vanilla => self.vanilla(species, lookup).copied(),
            ColorVariationSet::Curated => {
                curated(name, lookup).or_else(|| self.vanilla(species, lookup).copied())
            }
            ColorVariationSet::Custom => {
                let dir = palette_dir?;
                let path = palette::palette_path(dir, name, lookup);
                match palette::import(&path) {
                    Ok(colors) => colors,
                    Err(err) => {
                        warn!(species = name, season = ?lookup, "skipping custom palette: {err}");
                        None
                    }
                }
            }
        }
    }
}

impl Default for FoliageColorSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for FoliageColorSystem {
    fn name(&self) -> &str {
        "foliage_colors"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &World,
        commands: &mut CommandBuffer,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let set = ctx.settings.color_variation_set;
        let illusion = ctx.settings.use_dead_model_during_winter;
        let requested = world.signal_raised(Signal::ColorReload);
        let changed = self.last_season != Some(ctx.season)
            || self.last_set != Some(set)
            || self.last_illusion != Some(illusion);
        if !changed && !requested {
            return Ok(());
        }
        self.last_season = Some(ctx.season);
        self.last_set = Some(set);
        self.last_illusion = Some(illusion);
        if requested {
            commands.push(Command::ClearSignal(Signal::ColorReload));
        }

        let palette_dir = ctx.settings.palette_dir.as_deref();
        let mut rewritten = 0usize;
        for id in world.species_ids() {
            let Some(species) = world.species(id) else {
                continue;
            };
            if !species.tree_capable || species.placeholder || species.evergreen {
                continue;
            }
            if species.color_variations.len() < SEASONAL_VARIATIONS {
                commands.push(Command::TagEvergreenSpecies { species: id });
                continue;
            }

            for season in Season::ALL {
                let current = species.color_variations[season.index()];
                let vanilla = *self.vanilla.entry((id, season)).or_insert(current);
                if let Some(dir) = palette_dir {
                    match palette::export_default(dir, &species.name, season, &vanilla) {
                        Ok(true) => debug!(species = %species.name, ?season, "exported default palette"),
                        Ok(false) => {}
                        Err(err) => warn!(species = %species.name, ?season, "palette export failed: {err}"),
                    }
                }
            }

            for season in Season::ALL {
                let lookup = if illusion && ctx.season == Season::Spring && season == Season::Winter {
                    Season::Spring
                } else {
                    season
                };
                let Some(colors) = self.target(set, palette_dir, id, &species.name, lookup) else {
                    continue;
                };
                if colors != species.color_variations[season.index()] {
                    commands.push(Command::SetColorVariation {
                        species: id,
                        season,
                        colors,
                    });
                    rewritten += 1;
                }
            }
        }

        info!(season = ?ctx.season, set = ?set, rewritten, "reloaded foliage colors");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Species;
    use crate::engine::{EngineBuilder, EngineSettings, Schedule};
    use crate::settings::Settings;

    fn greens() -> Vec<ColorSet> {
        Season::ALL
            .iter()
            .map(|season| {
                let shade = 0.2 + season.index() as f32 * 0.1;
                set(rgb(shade, 0.5, 0.3), rgb(shade, 0.4, 0.3), rgb(shade, 0.3, 0.3))
            })
            .collect()
    }

    fn engine(settings: Settings) -> crate::engine::Engine {
        EngineBuilder::new(EngineSettings {
            scenario_name: "colors".into(),
            seed: 1,
            schedule: Schedule::default(),
            snapshot_interval_frames: 0,
            snapshot_dir: "snapshots".into(),
        })
        .with_settings(settings)
        .with_system(FoliageColorSystem::new())
        .build()
    }

    #[test]
    fn curated_then_vanilla_restores_remembered_colors() {
        let mut world = World::default();
        let oak = world.add_species(Species::tree("OakTree01", greens()));
        let mut engine = engine(Settings {
            color_variation_set: ColorVariationSet::Curated,
            ..Settings::default()
        });

        engine.step(&mut world).unwrap();
        assert_eq!(
            world.color_variation(oak, Season::Autumn),
            curated("OakTree01", Season::Autumn).as_ref()
        );
        assert_eq!(world.color_variation(oak, Season::Spring), Some(&greens()[0]));

        engine.settings_mut().color_variation_set = ColorVariationSet::Vanilla;
        engine.step(&mut world).unwrap();
        assert_eq!(world.species(oak).unwrap().color_variations, greens());
    }

    #[test]
    fn custom_palettes_are_exported_then_imported() {
        let dir = tempfile::tempdir().unwrap();
        let mut world = World::default();
        let birch = world.add_species(Species::tree("BirchTree01", greens()));
        let mut engine = engine(Settings {
            color_variation_set: ColorVariationSet::Custom,
            palette_dir: Some(dir.path().to_path_buf()),
            ..Settings::default()
        });

        engine.step(&mut world).unwrap();
        for season in Season::ALL {
            assert!(palette::palette_path(dir.path(), "BirchTree01", season).exists());
        }
        assert_eq!(world.species(birch).unwrap().color_variations, greens());

        let autumn = set(rgb(1.0, 0.5, 0.0), rgb(0.9, 0.4, 0.0), rgb(0.8, 0.3, 0.0));
        palette::export(
            &palette::palette_path(dir.path(), "BirchTree01", Season::Autumn),
            &autumn,
        )
        .unwrap();
        std::fs::write(
            palette::palette_path(dir.path(), "BirchTree01", Season::Summer),
            "garbage",
        )
        .unwrap();
        world.raise_signal(Signal::ColorReload);
        engine.step(&mut world).unwrap();

        assert_eq!(world.color_variation(birch, Season::Autumn), Some(&autumn));
        assert_eq!(world.color_variation(birch, Season::Summer), Some(&greens()[1]));
        assert!(!world.signal_raised(Signal::ColorReload));
    }

    #[test]
    fn spring_with_illusion_uses_spring_colors_for_winter_slot() {
        let mut world = World::default();
        let oak = world.add_species(Species::tree("OakTree01", greens()));
        let mut engine = engine(Settings {
            use_dead_model_during_winter: true,
            ..Settings::default()
        });
        engine.step(&mut world).unwrap();
        assert_eq!(world.season(), Season::Spring);
        assert_eq!(world.color_variation(oak, Season::Winter), Some(&greens()[0]));
    }

    #[test]
    fn species_without_seasonal_variants_become_evergreen() {
        let mut world = World::default();
        let pine = world.add_species(Species::tree("PineTree01", greens()[..1].to_vec()));
        let mut engine = engine(Settings::default());
        engine.step(&mut world).unwrap();
        assert!(world.species(pine).unwrap().evergreen);
    }
}
