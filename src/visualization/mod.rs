//! Topography chart rendering.
//!
//! Draws a traversal as a PNG using the plotters library: connections as
//! blue segments, points as red dots, and target/instrument heights as a
//! vertical extent with triangle markers at its ends.

use std::fs;
use std::ops::Range;
use std::path::Path;

use log::warn;
use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::config::PlotConfig;
use crate::processors::traversal::Traversal;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("No coordinates to plot")]
    EmptyCoordinates,
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Outer margin in pixels.
const MARGIN: u32 = 20;

/// Label area sizes when text is drawn.
const X_LABEL_AREA: u32 = 40;
const Y_LABEL_AREA: u32 = 60;
const CAPTION_AREA: u32 = 40;

/// Fraction of the data extent added on each side.
const PADDING: f64 = 0.05;

const LABEL_COLOR: RGBColor = RGBColor(139, 0, 0);

fn plot_err<E: std::fmt::Display>(e: E) -> VisualizationError {
    VisualizationError::PlottingError(e.to_string())
}

/// Data bounds as `(x_min, x_max, y_min, y_max)`, including height extents.
pub fn compute_bounds(traversal: &Traversal) -> (f64, f64, f64, f64) {
    let mut x_min = f64::MAX;
    let mut x_max = f64::MIN;
    let mut y_min = f64::MAX;
    let mut y_max = f64::MIN;

    for point in traversal.points.values() {
        x_min = x_min.min(point.x);
        x_max = x_max.max(point.x);
        y_min = y_min.min(point.y - point.instrument_height);
        y_max = y_max.max(point.y + point.target_height);
    }

    for connection in &traversal.connections {
        let (start, end) = connection.endpoints;
        for (x, y) in [start, end] {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
    }

    if (x_max - x_min).abs() < f64::EPSILON {
        x_min -= 1.0;
        x_max += 1.0;
    }
    if (y_max - y_min).abs() < f64::EPSILON {
        y_min -= 1.0;
        y_max += 1.0;
    }

    (x_min, x_max, y_min, y_max)
}

/// Pad the bounds and widen one axis so both share the same scale on a
/// plotting area of `area` pixels.
pub fn equal_aspect_ranges(
    bounds: (f64, f64, f64, f64),
    area: (u32, u32),
) -> (Range<f64>, Range<f64>) {
    let (x_min, x_max, y_min, y_max) = bounds;
    let dx = (x_max - x_min) * (1.0 + 2.0 * PADDING);
    let dy = (y_max - y_min) * (1.0 + 2.0 * PADDING);

    let width = area.0.max(1) as f64;
    let height = area.1.max(1) as f64;
    let scale = (dx / width).max(dy / height);

    let half_x = width * scale / 2.0;
    let half_y = height * scale / 2.0;
    let cx = (x_min + x_max) / 2.0;
    let cy = (y_min + y_max) / 2.0;

    ((cx - half_x)..(cx + half_x), (cy - half_y)..(cy + half_y))
}

/// Plot a traversal and save it as PNG.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image (parent directories are created)
/// * `traversal` - Resolved points and connections
/// * `title` - Shown in the caption as `Topography - {title}`
/// * `config` - Image size, marker sizes and text switch
///
/// # Errors
///
/// Returns [`VisualizationError::EmptyCoordinates`] if no point was resolved.
pub fn plot_topography(
    output_path: &Path,
    traversal: &Traversal,
    title: &str,
    config: &PlotConfig,
) -> Result<()> {
    if traversal.is_empty() {
        return Err(VisualizationError::EmptyCoordinates);
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let (label_x, label_y, caption) = if config.show_text {
        (X_LABEL_AREA, Y_LABEL_AREA, CAPTION_AREA)
    } else {
        (0, 0, 0)
    };
    let area = (
        config.width.saturating_sub(2 * MARGIN + label_y),
        config.height.saturating_sub(2 * MARGIN + label_x + caption),
    );
    let (x_range, y_range) = equal_aspect_ranges(compute_bounds(traversal), area);

    let root = BitMapBackend::new(output_path, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(MARGIN);
    if config.show_text {
        builder
            .caption(format!("Topography - {}", title), ("sans-serif", 24))
            .x_label_area_size(label_x)
            .y_label_area_size(label_y);
    }
    let mut chart = builder
        .build_cartesian_2d(x_range, y_range)
        .map_err(plot_err)?;

    {
        let mut mesh = chart.configure_mesh();
        mesh.light_line_style(BLACK.mix(0.05))
            .bold_line_style(BLACK.mix(0.15));
        if config.show_text {
            mesh.x_desc("East-West distance (m)")
                .y_desc("North-South distance (m)");
        }
        mesh.draw().map_err(plot_err)?;
    }

    let point_size = config.point_size as i32;
    let marker_size = config.marker_size as i32;
    let points = traversal.sorted_points();

    let connections = chart
        .draw_series(traversal.connections.iter().map(|c| {
            PathElement::new(vec![c.endpoints.0, c.endpoints.1], BLUE.mix(0.7).stroke_width(1))
        }))
        .map_err(plot_err)?;
    if config.show_text {
        connections
            .label("Connections")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));
    }

    let raised: Vec<_> = points
        .iter()
        .filter(|p| p.target_height > 0.0 || p.instrument_height > 0.0)
        .collect();

    let extents = chart
        .draw_series(raised.iter().map(|p| {
            PathElement::new(
                vec![(p.x, p.y - p.instrument_height), (p.x, p.y + p.target_height)],
                BLACK.mix(0.7).stroke_width(2),
            )
        }))
        .map_err(plot_err)?;
    if config.show_text {
        extents
            .label("Height (HT+HB)")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK.stroke_width(2)));
    }

    let stations = chart
        .draw_series(
            points
                .iter()
                .map(|p| Circle::new((p.x, p.y), point_size, RED.filled())),
        )
        .map_err(plot_err)?;
    if config.show_text {
        stations
            .label("Survey point")
            .legend(move |(x, y)| Circle::new((x + 10, y), point_size, RED.filled()));
    }

    let tops = chart
        .draw_series(
            raised
                .iter()
                .filter(|p| p.target_height > 0.0)
                .map(|p| TriangleMarker::new((p.x, p.y + p.target_height), marker_size, RED.mix(0.8).filled())),
        )
        .map_err(plot_err)?;
    if config.show_text {
        tops.label("HT (top)")
            .legend(move |(x, y)| TriangleMarker::new((x + 10, y), marker_size, RED.filled()));
    }

    // Downward triangle in pixel offsets around the base position
    let half = marker_size;
    let base_shape = move || vec![(-half, -half / 2), (half, -half / 2), (0, half)];
    let bases = chart
        .draw_series(raised.iter().filter(|p| p.instrument_height > 0.0).map(|p| {
            EmptyElement::at((p.x, p.y - p.instrument_height))
                + Polygon::new(base_shape(), BLUE.mix(0.8).filled())
        }))
        .map_err(plot_err)?;
    if config.show_text {
        bases.label("HB (base)").legend(move |(x, y)| {
            EmptyElement::at((x + 10, y)) + Polygon::new(base_shape(), BLUE.filled())
        });
    }

    if config.show_text {
        let style = ("sans-serif", 10).into_font().color(&LABEL_COLOR);
        let labels = chart.draw_series(points.iter().map(|p| {
            EmptyElement::at((p.x, p.y)) + Text::new(p.id.clone(), (3, -12), style.clone())
        }));
        if let Err(e) = labels {
            warn!("Point labels skipped: {}", e);
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(plot_err)?;
    }

    root.present().map_err(plot_err)?;

    Ok(())
}
