use std::any::Any;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::commands::CommandBuffer;
use crate::components::Season;
use crate::rng::{RngManager, SystemRng};
use crate::settings::Settings;
use crate::snapshot::SnapshotWriter;
use crate::systems::{
    AreaChangeSystem, BulkEditSystem, DeciduousSystem, FoliageColorSystem, FoliageScanSystem,
    GrowthGateSystem, LumberSystem, SafeTeardownSystem, SpeciesClassifierSystem,
    TreeGrowthSystem,
};
use crate::world::{World, WorldSnapshot};

fn default_interval() -> u32 {
    512
}

/// How often the periodic tree systems run. Each run handles one update group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default = "default_interval")]
    pub interval: u32,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            interval: default_interval(),
        }
    }
}

pub struct EngineSettings {
    pub scenario_name: String,
    pub seed: u64,
    pub schedule: Schedule,
    pub snapshot_interval_frames: u32,
    pub snapshot_dir: PathBuf,
}

pub struct EngineBuilder {
    settings: EngineSettings,
    user_settings: Settings,
    systems: Vec<Box<dyn System>>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            user_settings: Settings::default(),
            systems: Vec::new(),
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.user_settings = settings;
        self
    }

    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    /// The full seasonal pipeline in host phase order: load-time classification,
    /// instance tracking, lumber claims, teardown, growth gating and the growth
    /// system it gates, colors, then tool edits.
    pub fn with_default_systems(self) -> Self {
        self.with_system(SpeciesClassifierSystem::new())
            .with_system(FoliageScanSystem::new())
            .with_system(AreaChangeSystem::new())
            .with_system(LumberSystem::new())
            .with_system(DeciduousSystem::new())
            .with_system(SafeTeardownSystem::new())
            .with_system(GrowthGateSystem::new())
            .with_system(TreeGrowthSystem::new())
            .with_system(FoliageColorSystem::new())
            .with_system(BulkEditSystem::new())
    }

    pub fn build(self) -> Engine {
        Engine {
            rng: RngManager::new(self.settings.seed),
            systems: self.systems,
            commands: CommandBuffer::new(),
            snapshot_writer: SnapshotWriter::new(
                &self.settings.snapshot_dir,
                self.settings.snapshot_interval_frames,
            ),
            user_settings: self.user_settings,
            settings: self.settings,
            loaded: false,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SystemRunReport {
    pub name: String,
    pub duration_ms: f64,
    pub failed: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct TickReport {
    pub frame: u32,
    pub season: Season,
    pub systems: Vec<SystemRunReport>,
    pub commands_applied: usize,
    pub snapshot_path: Option<PathBuf>,
}

pub struct Engine {
    rng: RngManager,
    systems: Vec<Box<dyn System>>,
    commands: CommandBuffer,
    snapshot_writer: SnapshotWriter,
    user_settings: Settings,
    settings: EngineSettings,
    loaded: bool,
}

impl Engine {
    /// Gives every system its load-time pass and applies the result right
    /// away, so the first frame already sees it. Runs once, before frame 0.
    pub fn load(&mut self, world: &mut World) {
        if self.loaded {
            return;
        }
        self.loaded = true;
        for system in self.systems.iter_mut() {
            if let Err(err) = system.on_load(world, &mut self.commands) {
                error!(system = %system.name(), "load failed: {err:#}");
            }
        }
        self.commands.apply(world);
    }

    /// Runs one simulation frame: every system decides against the frame-start
    /// world, then the command buffer is applied at the end-of-frame barrier.
    ///
    /// A failing system is logged and skipped; it never aborts the frame.
    pub fn step(&mut self, world: &mut World) -> Result<TickReport> {
        self.load(world);
        let ctx = SystemContext {
            frame: world.frame(),
            season: world.season(),
            date: world.climate().date,
            settings: &self.user_settings,
            schedule: self.settings.schedule,
            update_groups: world.update_groups(),
            scenario_name: &self.settings.scenario_name,
        };

        let mut reports = Vec::with_capacity(self.systems.len());
        for system in self.systems.iter_mut() {
            let name = system.name().to_string();
            let mut rng = self.rng.stream(&name);
            let start = Instant::now();
            let outcome = system.run(&ctx, world, &mut self.commands, &mut rng);
            let failed = match outcome {
                Ok(()) => false,
                Err(err) => {
                    error!(system = %name, frame = ctx.frame, "system failed: {err:#}");
                    true
                }
            };
            reports.push(SystemRunReport {
                name,
                duration_ms: start.elapsed().as_secs_f64() * 1_000.0,
                failed,
            });
        }

        let frame = ctx.frame;
        let season = ctx.season;
        let commands_applied = self.commands.len();
        world.clear_transient_flags();
        self.commands.apply(world);
        world.advance_frame();
        if commands_applied > 0 {
            debug!(frame, commands_applied, "applied end-of-frame commands");
        }

        let snapshot_path = self
            .snapshot_writer
            .maybe_write(world, &self.settings.scenario_name)?;

        Ok(TickReport {
            frame,
            season,
            systems: reports,
            commands_applied,
            snapshot_path,
        })
    }

    pub fn run(&mut self, world: &mut World, frames: u64) -> Result<()> {
        for _ in 0..frames {
            self.step(world)?;
        }
        Ok(())
    }

    pub fn run_with_hook<F>(&mut self, world: &mut World, frames: u64, mut hook: F) -> Result<()>
    where
        F: FnMut(WorldSnapshot),
    {
        for _ in 0..frames {
            self.step(world)?;
            hook(world.snapshot(&self.settings.scenario_name));
        }
        Ok(())
    }

    pub fn scenario_name(&self) -> &str {
        &self.settings.scenario_name
    }

    pub fn settings(&self) -> &Settings {
        &self.user_settings
    }

    /// Settings are polled by the systems each cycle, so edits made here take
    /// effect on the next frame.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.user_settings
    }

    pub fn system<T: 'static>(&self) -> Option<&T> {
        self.systems
            .iter()
            .find_map(|system| system.as_ref().as_any().downcast_ref::<T>())
    }

    pub fn system_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.systems
            .iter_mut()
            .find_map(|system| system.as_mut().as_any_mut().downcast_mut::<T>())
    }
}

pub struct SystemContext<'a> {
    pub frame: u32,
    pub season: Season,
    pub date: NaiveDate,
    pub settings: &'a Settings,
    pub schedule: Schedule,
    pub update_groups: u32,
    pub scenario_name: &'a str,
}

impl<'a> SystemContext<'a> {
    /// Whether the periodic systems run on this frame.
    pub fn periodic_due(&self) -> bool {
        self.frame % self.schedule.interval.max(1) == 0
    }

    /// Update group handled by the periodic systems on this frame.
    pub fn update_group(&self) -> u32 {
        (self.frame / self.schedule.interval.max(1)) % self.update_groups.max(1)
    }
}

pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A unit of per-frame work. Systems read the world and record every change
/// they want into the command buffer.
pub trait System: AsAny + Send {
    fn name(&self) -> &str;

    fn on_load(&mut self, _world: &World, _commands: &mut CommandBuffer) -> Result<()> {
        Ok(())
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &World,
        commands: &mut CommandBuffer,
        rng: &mut SystemRng<'_>,
    ) -> Result<()>;
}
