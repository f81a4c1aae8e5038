//! Configuration types for the survey traversal tool.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Column layout of spreadsheet and CSV field sheets.
///
/// Column indices are zero-based (column A is 0).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetLayout {
    /// Worksheet holding the measurements (ignored for CSV)
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,

    /// Text in the station column that marks a repeated header row
    #[serde(default = "default_header_marker")]
    pub header_marker: String,

    #[serde(default)]
    pub station_col: usize,

    #[serde(default = "default_target_col")]
    pub target_col: usize,

    /// Slope distance (DI)
    #[serde(default = "default_sheet_distance_col")]
    pub distance_col: usize,

    /// Signed vertical angle in degrees
    #[serde(default = "default_sheet_angle_col")]
    pub angle_col: usize,

    /// Instrument height (HB)
    #[serde(default = "default_sheet_instrument_height_col")]
    pub instrument_height_col: usize,

    /// Free-text observations, searched for the target height (HT)
    #[serde(default = "default_sheet_notes_col")]
    pub notes_col: usize,
}

fn default_sheet_name() -> String {
    "Plan1".to_string()
}

fn default_header_marker() -> String {
    "EST.".to_string()
}

fn default_target_col() -> usize {
    1
}

fn default_sheet_distance_col() -> usize {
    3
}

fn default_sheet_angle_col() -> usize {
    4
}

fn default_sheet_instrument_height_col() -> usize {
    10
}

fn default_sheet_notes_col() -> usize {
    11
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            sheet_name: default_sheet_name(),
            header_marker: default_header_marker(),
            station_col: 0,
            target_col: default_target_col(),
            distance_col: default_sheet_distance_col(),
            angle_col: default_sheet_angle_col(),
            instrument_height_col: default_sheet_instrument_height_col(),
            notes_col: default_sheet_notes_col(),
        }
    }
}

/// Cell layout of the first table in a `.docx` field sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentLayout {
    /// Rows with fewer cells are ignored
    #[serde(default = "default_min_cells")]
    pub min_cells: usize,

    #[serde(default = "default_header_marker")]
    pub header_marker: String,

    #[serde(default)]
    pub station_cell: usize,

    #[serde(default = "default_target_col")]
    pub target_cell: usize,

    /// Vertical angle when the sight points upwards
    #[serde(default = "default_angle_positive_cell")]
    pub angle_positive_cell: usize,

    /// Vertical angle magnitude when the sight points downwards
    #[serde(default = "default_angle_negative_cell")]
    pub angle_negative_cell: usize,

    #[serde(default = "default_document_distance_cell")]
    pub distance_cell: usize,

    #[serde(default = "default_target_height_cell")]
    pub target_height_cell: usize,

    #[serde(default = "default_instrument_height_cell")]
    pub instrument_height_cell: usize,
}

fn default_min_cells() -> usize {
    14
}

fn default_angle_positive_cell() -> usize {
    3
}

fn default_angle_negative_cell() -> usize {
    4
}

fn default_document_distance_cell() -> usize {
    6
}

fn default_target_height_cell() -> usize {
    12
}

fn default_instrument_height_cell() -> usize {
    13
}

impl Default for DocumentLayout {
    fn default() -> Self {
        Self {
            min_cells: default_min_cells(),
            header_marker: default_header_marker(),
            station_cell: 0,
            target_cell: default_target_col(),
            angle_positive_cell: default_angle_positive_cell(),
            angle_negative_cell: default_angle_negative_cell(),
            distance_cell: default_document_distance_cell(),
            target_height_cell: default_target_height_cell(),
            instrument_height_cell: default_instrument_height_cell(),
        }
    }
}

/// Configuration for survey file discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Extensions picked up when scanning a folder, in processing order
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_extensions() -> Vec<String> {
    vec!["xls".to_string(), "xlsx".to_string(), "docx".to_string()]
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
        }
    }
}

/// Configuration for the rendered chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotConfig {
    /// Image width in pixels
    #[serde(default = "default_width")]
    pub width: u32,

    /// Image height in pixels
    #[serde(default = "default_height")]
    pub height: u32,

    /// Radius of point markers in pixels
    #[serde(default = "default_point_size")]
    pub point_size: u32,

    /// Size of the HT/HB triangle markers in pixels
    #[serde(default = "default_marker_size")]
    pub marker_size: u32,

    /// Draw caption, axis labels and point names (needs system fonts)
    #[serde(default = "default_show_text")]
    pub show_text: bool,
}

fn default_width() -> u32 {
    1600
}

fn default_height() -> u32 {
    1200
}

fn default_point_size() -> u32 {
    4
}

fn default_marker_size() -> u32 {
    5
}

fn default_show_text() -> bool {
    true
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            point_size: default_point_size(),
            marker_size: default_marker_size(),
            show_text: default_show_text(),
        }
    }
}

/// Configuration for the traversal engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraversalConfig {
    /// Retry records whose station was not yet resolved
    #[serde(default)]
    pub retry_deferred: bool,
}

/// Main configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurveyConfig {
    #[serde(default)]
    pub sheet: SheetLayout,

    #[serde(default)]
    pub document: DocumentLayout,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub plot: PlotConfig,

    #[serde(default)]
    pub traversal: TraversalConfig,
}

impl SurveyConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: SurveyConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_sheet_layout() {
        let layout = SheetLayout::default();
        assert_eq!(layout.sheet_name, "Plan1");
        assert_eq!(layout.distance_col, 3);
        assert_eq!(layout.angle_col, 4);
        assert_eq!(layout.instrument_height_col, 10);
        assert_eq!(layout.notes_col, 11);
    }

    #[test]
    fn test_default_survey_config() {
        let config = SurveyConfig::default();
        assert_eq!(config.document.min_cells, 14);
        assert_eq!(config.discovery.extensions, vec!["xls", "xlsx", "docx"]);
        assert!(!config.traversal.retry_deferred);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "sheet:\n  sheet_name: Field\ntraversal:\n  retry_deferred: true\n";
        let config: SurveyConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.sheet.sheet_name, "Field");
        assert_eq!(config.sheet.notes_col, 11);
        assert!(config.traversal.retry_deferred);
        assert_eq!(config.plot.width, 1600);
    }

    #[test]
    fn test_yaml_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("survey.yaml");

        let mut config = SurveyConfig::default();
        config.plot.show_text = false;
        config.to_yaml(&path).unwrap();

        let loaded = SurveyConfig::from_yaml(&path).unwrap();
        assert!(!loaded.plot.show_text);
        assert_eq!(loaded.document.distance_cell, 6);
    }
}
