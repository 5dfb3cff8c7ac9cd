use serde::{Deserialize, Serialize};

/// Biological age stage of a tree, as displayed by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TreeState {
    Child,
    Teen,
    Adult,
    Elderly,
    Dead,
}

impl TreeState {
    pub const ALL: [TreeState; 5] = [
        TreeState::Child,
        TreeState::Teen,
        TreeState::Adult,
        TreeState::Elderly,
        TreeState::Dead,
    ];

    /// Next stage the host growth system moves a tree to. Dead wraps to Child.
    pub fn next(self) -> Self {
        match self {
            TreeState::Child => TreeState::Teen,
            TreeState::Teen => TreeState::Adult,
            TreeState::Adult => TreeState::Elderly,
            TreeState::Elderly => TreeState::Dead,
            TreeState::Dead => TreeState::Child,
        }
    }

    /// Relative length of each age phase, used for weighted age selection.
    pub fn phase_weight(self) -> f32 {
        match self {
            TreeState::Child => 0.10,
            TreeState::Teen => 0.15,
            TreeState::Adult => 0.35,
            TreeState::Elderly => 0.30,
            TreeState::Dead => 0.10,
        }
    }

    pub fn is_dead(self) -> bool {
        self == TreeState::Dead
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Spring, Season::Summer, Season::Autumn, Season::Winter];

    pub fn index(self) -> usize {
        match self {
            Season::Spring => 0,
            Season::Summer => 1,
            Season::Autumn => 2,
            Season::Winter => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Autumn => "Autumn",
            Season::Winter => "Winter",
        }
    }

    /// Maps a host climate season identifier such as `Climate.SEASON[Winter]`.
    /// Unknown identifiers fall back to Spring.
    pub fn from_season_id(id: &str) -> Self {
        let parsed = id
            .strip_prefix("Climate.SEASON[")
            .and_then(|rest| rest.strip_suffix(']'))
            .and_then(|name| Season::ALL.into_iter().find(|s| s.name() == name));
        match parsed {
            Some(season) => season,
            None => {
                tracing::info!(season_id = id, "unknown season id, assuming Spring");
                Season::Spring
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn clamped(self) -> Self {
        Self {
            r: self.r.clamp(0.0, 1.0),
            g: self.g.clamp(0.0, 1.0),
            b: self.b.clamp(0.0, 1.0),
            a: self.a.clamp(0.0, 1.0),
        }
    }
}

/// The three color channels the renderer blends for one seasonal foliage variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorSet {
    pub channel0: Rgba,
    pub channel1: Rgba,
    pub channel2: Rgba,
}

impl ColorSet {
    pub fn channels(&self) -> [Rgba; 3] {
        [self.channel0, self.channel1, self.channel2]
    }
}

/// Host-owned per-instance tree data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub state: TreeState,
    pub growth: u8,
}

impl Tree {
    pub fn new(state: TreeState) -> Self {
        Self { state, growth: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Bookkeeping attached to deciduous trees so the winter illusion can be undone.
///
/// While `technically_dead` is set and `previous_state` is not Dead, the tree is
/// displayed as Dead only because of winter and `previous_state` is its true age.
/// With `previous_state == Dead` the tree has really died.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonalOverride {
    pub previous_state: TreeState,
    pub technically_dead: bool,
}

impl SeasonalOverride {
    /// Baseline record for a tree that is first seen in `state`.
    pub fn observe(state: TreeState) -> Self {
        Self {
            previous_state: state,
            technically_dead: state.is_dead(),
        }
    }

    pub fn is_illusion(&self, displayed: TreeState) -> bool {
        self.technically_dead && displayed.is_dead() && !self.previous_state.is_dead()
    }
}

/// Host lifecycle markers that exclude an entity from simulation queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Markers {
    pub deleted: bool,
    pub temp: bool,
    pub overridden: bool,
}

impl Markers {
    pub fn excluded(&self) -> bool {
        self.deleted || self.temp || self.overridden
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpeciesId(pub u32);

/// A placeable object definition (prefab).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub name: String,
    pub tree_capable: bool,
    pub placeholder: bool,
    /// Seasonal foliage variants indexed by `Season::index`.
    pub color_variations: Vec<ColorSet>,
    pub evergreen: bool,
    pub vegetation: bool,
}

impl Species {
    pub fn tree(name: impl Into<String>, color_variations: Vec<ColorSet>) -> Self {
        Self {
            name: name.into(),
            tree_capable: true,
            placeholder: false,
            color_variations,
            evergreen: false,
            vegetation: false,
        }
    }

    pub fn is_deciduous(&self) -> bool {
        self.tree_capable && !self.evergreen
    }
}

/// A land-use extractor area whose wood resources are harvested by industry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractorArea {
    pub wood_resources: Vec<crate::world::EntityId>,
    pub deleted: bool,
}
