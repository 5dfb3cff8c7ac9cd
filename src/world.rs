use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::climate::Climate;
use crate::components::{
    ColorSet, ExtractorArea, Markers, Position, Season, SeasonalOverride, Species, SpeciesId, Tree,
    TreeState,
};

pub const VEGETATION_CATEGORY: &str = "Vegetation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Which trees the host growth system is allowed to advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrowthFilter {
    /// Every eligible tree grows.
    Default,
    /// Only lumber-claimed trees grow.
    Disabled,
    /// Every eligible tree grows except those carrying a seasonal record.
    WinterIllusion,
}

/// One-shot requests raised by one system and consumed by another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    Teardown,
    LumberRefresh,
    ColorReload,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StateCounts {
    pub child: usize,
    pub teen: usize,
    pub adult: usize,
    pub elderly: usize,
    pub dead: usize,
}

impl StateCounts {
    fn record(&mut self, state: TreeState) {
        match state {
            TreeState::Child => self.child += 1,
            TreeState::Teen => self.teen += 1,
            TreeState::Adult => self.adult += 1,
            TreeState::Elderly => self.elderly += 1,
            TreeState::Dead => self.dead += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub scenario: String,
    pub frame: u32,
    pub date: NaiveDate,
    pub season: Season,
    pub growth_filter: GrowthFilter,
    pub total_trees: usize,
    pub states: StateCounts,
    pub tracked: usize,
    pub illusions: usize,
    pub lumber: usize,
    pub evergreen: usize,
    pub species: BTreeMap<String, usize>,
}

pub struct World {
    next_entity: u64,
    frame: u32,
    update_groups: u32,
    pub(crate) climate: Climate,
    pub(crate) species: Vec<Species>,
    pub(crate) asset_categories: HashMap<String, Vec<SpeciesId>>,
    pub(crate) trees: HashMap<EntityId, Tree>,
    pub(crate) positions: HashMap<EntityId, Position>,
    pub(crate) prefab_refs: HashMap<EntityId, SpeciesId>,
    pub(crate) update_frames: HashMap<EntityId, u32>,
    pub(crate) markers: HashMap<EntityId, Markers>,
    pub(crate) seasonal: HashMap<EntityId, SeasonalOverride>,
    pub(crate) lumber: HashSet<EntityId>,
    pub(crate) evergreen: HashSet<EntityId>,
    pub(crate) areas: HashMap<EntityId, ExtractorArea>,
    pub(crate) updated: HashSet<EntityId>,
    pub(crate) batches_updated: HashSet<EntityId>,
    pub(crate) growth_filter: GrowthFilter,
    pub(crate) signals: HashSet<Signal>,
}

impl World {
    pub fn new(climate: Climate, update_groups: u32) -> Self {
        Self {
            next_entity: 0,
            frame: 0,
            update_groups: update_groups.max(1),
            climate,
            species: Vec::new(),
            asset_categories: HashMap::new(),
            trees: HashMap::new(),
            positions: HashMap::new(),
            prefab_refs: HashMap::new(),
            update_frames: HashMap::new(),
            markers: HashMap::new(),
            seasonal: HashMap::new(),
            lumber: HashSet::new(),
            evergreen: HashSet::new(),
            areas: HashMap::new(),
            updated: HashSet::new(),
            batches_updated: HashSet::new(),
            growth_filter: GrowthFilter::Default,
            signals: HashSet::new(),
        }
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn update_groups(&self) -> u32 {
        self.update_groups
    }

    pub fn climate(&self) -> &Climate {
        &self.climate
    }

    pub fn climate_mut(&mut self) -> &mut Climate {
        &mut self.climate
    }

    pub fn season(&self) -> Season {
        self.climate.season()
    }

    /// Drops the per-frame `Updated`/`BatchesUpdated` markers once every system
    /// has had a chance to see them.
    pub(crate) fn clear_transient_flags(&mut self) {
        self.updated.clear();
        self.batches_updated.clear();
    }

    pub(crate) fn advance_frame(&mut self) {
        self.frame = self.frame.wrapping_add(1);
        self.climate.advance_frame();
    }

    pub fn add_species(&mut self, species: Species) -> SpeciesId {
        let id = SpeciesId(self.species.len() as u32);
        self.species.push(species);
        id
    }

    pub fn species(&self, id: SpeciesId) -> Option<&Species> {
        self.species.get(id.0 as usize)
    }

    pub(crate) fn species_mut(&mut self, id: SpeciesId) -> Option<&mut Species> {
        self.species.get_mut(id.0 as usize)
    }

    pub fn species_ids(&self) -> impl Iterator<Item = SpeciesId> + '_ {
        (0..self.species.len() as u32).map(SpeciesId)
    }

    pub fn species_named(&self, name: &str) -> Option<SpeciesId> {
        self.species
            .iter()
            .position(|s| s.name == name)
            .map(|index| SpeciesId(index as u32))
    }

    pub fn add_to_category(&mut self, category: &str, species: SpeciesId) {
        self.asset_categories
            .entry(category.to_string())
            .or_default()
            .push(species);
    }

    pub fn category(&self, category: &str) -> Option<&[SpeciesId]> {
        self.asset_categories.get(category).map(Vec::as_slice)
    }

    pub fn spawn_tree(&mut self, species: SpeciesId, state: TreeState, position: Position) -> EntityId {
        let id = self.allocate();
        self.trees.insert(id, Tree::new(state));
        self.positions.insert(id, position);
        self.prefab_refs.insert(id, species);
        self.update_frames
            .insert(id, (id.raw() % self.update_groups as u64) as u32);
        self.markers.insert(id, Markers::default());
        id
    }

    /// Removes a tree together with every per-instance record attached to it.
    pub fn despawn_tree(&mut self, id: EntityId) {
        self.trees.remove(&id);
        self.positions.remove(&id);
        self.prefab_refs.remove(&id);
        self.update_frames.remove(&id);
        self.markers.remove(&id);
        self.seasonal.remove(&id);
        self.lumber.remove(&id);
        self.evergreen.remove(&id);
        self.updated.remove(&id);
        self.batches_updated.remove(&id);
    }

    pub fn spawn_extractor_area(&mut self, wood_resources: Vec<EntityId>) -> EntityId {
        let id = self.allocate();
        self.areas.insert(
            id,
            ExtractorArea {
                wood_resources,
                deleted: false,
            },
        );
        self.updated.insert(id);
        id
    }

    pub fn set_area_resources(&mut self, area: EntityId, wood_resources: Vec<EntityId>) {
        if let Some(existing) = self.areas.get_mut(&area) {
            existing.wood_resources = wood_resources;
            self.updated.insert(area);
        }
    }

    pub fn delete_area(&mut self, area: EntityId) {
        if let Some(existing) = self.areas.get_mut(&area) {
            existing.deleted = true;
            self.updated.insert(area);
        }
    }

    pub fn area(&self, id: EntityId) -> Option<&ExtractorArea> {
        self.areas.get(&id)
    }

    pub fn area_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.areas.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn tree(&self, id: EntityId) -> Option<&Tree> {
        self.trees.get(&id)
    }

    /// Direct host-side edit of a tree's displayed state, bypassing the command buffer.
    pub fn set_tree_state(&mut self, id: EntityId, state: TreeState) {
        if let Some(tree) = self.trees.get_mut(&id) {
            tree.state = state;
        }
    }

    pub fn position(&self, id: EntityId) -> Option<&Position> {
        self.positions.get(&id)
    }

    pub fn species_of(&self, id: EntityId) -> Option<SpeciesId> {
        self.prefab_refs.get(&id).copied()
    }

    pub fn update_frame(&self, id: EntityId) -> Option<u32> {
        self.update_frames.get(&id).copied()
    }

    pub fn markers(&self, id: EntityId) -> Markers {
        self.markers.get(&id).copied().unwrap_or_default()
    }

    pub fn markers_mut(&mut self, id: EntityId) -> Option<&mut Markers> {
        self.markers.get_mut(&id)
    }

    pub fn seasonal(&self, id: EntityId) -> Option<&SeasonalOverride> {
        self.seasonal.get(&id)
    }

    pub fn seasonal_count(&self) -> usize {
        self.seasonal.len()
    }

    pub fn seasonal_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.seasonal.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn has_lumber(&self, id: EntityId) -> bool {
        self.lumber.contains(&id)
    }

    pub fn lumber_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.lumber.iter().copied().collect();
        ids.sort();
        ids
    }

    pub fn is_evergreen_instance(&self, id: EntityId) -> bool {
        self.evergreen.contains(&id)
    }

    pub fn is_updated(&self, id: EntityId) -> bool {
        self.updated.contains(&id)
    }

    /// Live trees flagged `Updated` during the previous frame, sorted.
    pub fn updated_trees(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self
            .updated
            .iter()
            .copied()
            .filter(|id| self.trees.contains_key(id) && !self.markers(*id).excluded())
            .collect();
        ids.sort();
        ids
    }

    /// Extractor areas flagged `Updated` during the previous frame, sorted.
    pub fn updated_areas(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self
            .updated
            .iter()
            .copied()
            .filter(|id| self.areas.contains_key(id))
            .collect();
        ids.sort();
        ids
    }

    pub fn is_batches_updated(&self, id: EntityId) -> bool {
        self.batches_updated.contains(&id)
    }

    pub fn growth_filter(&self) -> GrowthFilter {
        self.growth_filter
    }

    pub fn signal_raised(&self, signal: Signal) -> bool {
        self.signals.contains(&signal)
    }

    /// Raises a signal from outside the simulation (settings UI, host hooks).
    pub fn raise_signal(&mut self, signal: Signal) {
        self.signals.insert(signal);
    }

    /// Every tree id, including ones excluded by lifecycle markers, sorted.
    pub fn tree_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.trees.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Live trees (not Deleted/Temp/Overridden), optionally restricted to one update group.
    pub fn query_trees(&self, group: Option<u32>) -> Vec<EntityId> {
        let mut ids: Vec<_> = self
            .trees
            .keys()
            .copied()
            .filter(|id| !self.markers(*id).excluded())
            .filter(|id| match group {
                Some(group) => self.update_frames.get(id) == Some(&group),
                None => true,
            })
            .collect();
        ids.sort();
        ids
    }

    /// Whether the growth filter currently active lets `id` grow. A tree still
    /// showing the winter Dead never grows, whatever the filter, until the
    /// tracker has restored its true state.
    pub fn growth_allowed(&self, id: EntityId) -> bool {
        let Some(tree) = self.trees.get(&id) else {
            return false;
        };
        if self.markers(id).excluded() {
            return false;
        }
        if self
            .seasonal
            .get(&id)
            .is_some_and(|record| record.is_illusion(tree.state))
        {
            return false;
        }
        match self.growth_filter {
            GrowthFilter::Default => true,
            GrowthFilter::Disabled => self.lumber.contains(&id),
            GrowthFilter::WinterIllusion => !self.seasonal.contains_key(&id),
        }
    }

    pub fn color_variation(&self, species: SpeciesId, season: Season) -> Option<&ColorSet> {
        self.species(species)
            .and_then(|s| s.color_variations.get(season.index()))
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn snapshot(&self, scenario: &str) -> WorldSnapshot {
        let mut states = StateCounts::default();
        let mut species: BTreeMap<String, usize> = BTreeMap::new();
        for (id, tree) in &self.trees {
            states.record(tree.state);
            if let Some(def) = self.species_of(*id).and_then(|s| self.species(s)) {
                *species.entry(def.name.clone()).or_default() += 1;
            }
        }
        let illusions = self
            .seasonal
            .iter()
            .filter(|(id, record)| {
                self.trees
                    .get(id)
                    .map(|tree| record.is_illusion(tree.state))
                    .unwrap_or(false)
            })
            .count();
        WorldSnapshot {
            scenario: scenario.to_string(),
            frame: self.frame,
            date: self.climate.date,
            season: self.season(),
            growth_filter: self.growth_filter,
            total_trees: self.trees.len(),
            states,
            tracked: self.seasonal.len(),
            illusions,
            lumber: self.lumber.len(),
            evergreen: self.evergreen.len(),
            species,
        }
    }

    fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next_entity);
        self.next_entity += 1;
        id
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(Climate::default(), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oak(world: &mut World) -> SpeciesId {
        world.add_species(Species::tree("OakTree01", Vec::new()))
    }

    #[test]
    fn trees_are_partitioned_by_id() {
        let mut world = World::new(Climate::default(), 4);
        let species = oak(&mut world);
        let ids: Vec<_> = (0..8)
            .map(|_| world.spawn_tree(species, TreeState::Adult, Position::default()))
            .collect();
        assert_eq!(world.query_trees(Some(1)), vec![ids[1], ids[5]]);
        assert_eq!(world.query_trees(None).len(), 8);
    }

    #[test]
    fn excluded_trees_are_not_queried_and_do_not_grow() {
        let mut world = World::default();
        let species = oak(&mut world);
        let id = world.spawn_tree(species, TreeState::Teen, Position::default());
        assert!(world.growth_allowed(id));
        world.markers_mut(id).unwrap().temp = true;
        assert!(world.query_trees(None).is_empty());
        assert!(!world.growth_allowed(id));
    }

    #[test]
    fn illusion_dead_never_grows_under_any_filter() {
        let mut world = World::default();
        let species = oak(&mut world);
        let frozen = world.spawn_tree(species, TreeState::Dead, Position::default());
        world.seasonal.insert(
            frozen,
            SeasonalOverride {
                previous_state: TreeState::Adult,
                technically_dead: true,
            },
        );
        world.lumber.insert(frozen);
        for filter in [
            GrowthFilter::Default,
            GrowthFilter::Disabled,
            GrowthFilter::WinterIllusion,
        ] {
            world.growth_filter = filter;
            assert!(!world.growth_allowed(frozen), "{filter:?}");
        }

        world.seasonal.insert(frozen, SeasonalOverride::observe(TreeState::Dead));
        world.growth_filter = GrowthFilter::Default;
        assert!(world.growth_allowed(frozen));
    }

    #[test]
    fn winter_filter_freezes_tracked_trees_only() {
        let mut world = World::default();
        let species = oak(&mut world);
        let tracked = world.spawn_tree(species, TreeState::Teen, Position::default());
        let evergreen = world.spawn_tree(species, TreeState::Adult, Position::default());
        let lumber = world.spawn_tree(species, TreeState::Adult, Position::default());
        world
            .seasonal
            .insert(tracked, SeasonalOverride::observe(TreeState::Teen));
        world.evergreen.insert(evergreen);
        world.lumber.insert(lumber);
        world.growth_filter = GrowthFilter::WinterIllusion;

        assert!(!world.growth_allowed(tracked));
        assert!(world.growth_allowed(evergreen));
        assert!(world.growth_allowed(lumber));

        world.growth_filter = GrowthFilter::Default;
        assert!(world.growth_allowed(tracked));
    }

    #[test]
    fn despawn_drops_attached_records() {
        let mut world = World::default();
        let species = oak(&mut world);
        let id = world.spawn_tree(species, TreeState::Adult, Position::default());
        world
            .seasonal
            .insert(id, SeasonalOverride::observe(TreeState::Adult));
        world.lumber.insert(id);
        world.despawn_tree(id);
        assert!(world.seasonal(id).is_none());
        assert!(!world.has_lumber(id));
        assert_eq!(world.tree_count(), 0);
    }

    #[test]
    fn snapshot_counts_illusions_separately_from_real_deaths() {
        let mut world = World::default();
        let species = oak(&mut world);
        let fake = world.spawn_tree(species, TreeState::Dead, Position::default());
        let real = world.spawn_tree(species, TreeState::Dead, Position::default());
        world.seasonal.insert(
            fake,
            SeasonalOverride {
                previous_state: TreeState::Adult,
                technically_dead: true,
            },
        );
        world
            .seasonal
            .insert(real, SeasonalOverride::observe(TreeState::Dead));
        let snapshot = world.snapshot("test");
        assert_eq!(snapshot.states.dead, 2);
        assert_eq!(snapshot.tracked, 2);
        assert_eq!(snapshot.illusions, 1);
        assert_eq!(snapshot.species.get("OakTree01"), Some(&2));
    }
}
