//! Total-station survey traversal.
//!
//! This crate provides tools for:
//! - Reading field sheets (Excel, CSV, Word tables) into measurement records
//! - Recovering target heights from free-text observation notes
//! - Chaining station/target sights into planar coordinates
//! - Rendering the resulting network as a PNG chart
//!
//! # Example
//!
//! ```no_run
//! use survey_traverse::config::SurveyConfig;
//! use survey_traverse::core::loaders::load_survey;
//! use survey_traverse::processors::traversal::{traverse, TraversalOptions};
//!
//! let config = SurveyConfig::default();
//! let records = load_survey("levantamento.xlsx", &config.sheet, &config.document).unwrap();
//! let result = traverse(&records, TraversalOptions::default());
//! println!("{} points", result.points.len());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{DocumentLayout, PlotConfig, SheetLayout, SurveyConfig};
pub use core::loaders::MeasurementRecord;
pub use processors::traversal::{Connection, Point, Traversal, TraversalOptions};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
