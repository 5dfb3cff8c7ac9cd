pub mod climate;
pub mod commands;
pub mod components;
pub mod engine;
pub mod error;
pub mod palette;
pub mod rng;
pub mod scenario;
pub mod settings;
pub mod snapshot;
pub mod systems;
pub mod web;
pub mod world;

pub use engine::{Engine, EngineBuilder, EngineSettings, Schedule, TickReport};
pub use scenario::{Scenario, ScenarioLoader};
pub use settings::Settings;
pub use world::{World, WorldSnapshot};
