//! Data processing modules.

pub mod discovery;
pub mod height;
pub mod traversal;

// Re-export key types for convenience
pub use discovery::{collect_inputs, find_survey_files, DiscoveryError};
pub use height::{extract_height, Acceptance, HeightExtractor, HeightPattern};
pub use traversal::{
    seed_heights, traverse, traverse_with, Connection, CoordinateMap, HeightTable, Heights, Point,
    Traversal, TraversalOptions,
};
