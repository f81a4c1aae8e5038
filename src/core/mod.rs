//! Core data types and I/O operations.

pub mod loaders;
pub mod transforms;

pub use loaders::{load_survey, LoaderError, MeasurementRecord, SurveyFormat};
pub use transforms::{normalize_angle, project};
