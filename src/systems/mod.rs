mod bulk_edit;
mod classifier;
mod deciduous;
mod foliage_colors;
mod growth_gate;
mod lumber;
mod teardown;
mod tree_growth;

pub use bulk_edit::{apply_edit, select, BulkEdit, BulkEditOutcome, BulkEditSystem, Selection, MIN_RADIUS};
pub use classifier::{
    classify_species, Classification, FoliageScanSystem, SpeciesClassifierSystem,
    SEASONAL_VARIATIONS,
};
pub use deciduous::{reconcile, DeciduousSystem, Reconciliation};
pub use foliage_colors::{curated, FoliageColorSystem};
pub use growth_gate::{select_filter, GrowthGateSystem};
pub use lumber::{AreaChangeSystem, LumberSystem};
pub use teardown::SafeTeardownSystem;
pub use tree_growth::TreeGrowthSystem;
