//! Station-to-target traversal.
//!
//! Chains the sights of a field sheet into planar coordinates. The first
//! station becomes the origin; every later sight is projected from a point
//! that is already resolved. Records whose station is not yet known are
//! skipped, and a point keeps the coordinates of the first sight that
//! resolved it.
//!
//! The height table and the coordinate map are plain values handed in and
//! out of [`traverse_with`], so each step can be exercised on its own.

use std::collections::HashMap;

use log::debug;

use crate::core::loaders::MeasurementRecord;
use crate::core::transforms::{normalize_angle, project};

/// Target and instrument heights attached to a point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Heights {
    /// HT
    pub target: f64,
    /// HB
    pub instrument: f64,
}

/// Height lookup keyed by point id.
pub type HeightTable = HashMap<String, Heights>;

/// Resolved points keyed by point id.
pub type CoordinateMap = HashMap<String, Point>;

/// A resolved survey point.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub target_height: f64,
    pub instrument_height: f64,
}

impl Point {
    fn new(id: &str, (x, y): (f64, f64), heights: Heights) -> Self {
        Self {
            id: id.to_string(),
            x,
            y,
            target_height: heights.target,
            instrument_height: heights.instrument,
        }
    }

    /// Position as an `(x, y)` pair.
    #[inline]
    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

/// One sight between two resolved positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub from_id: String,
    pub to_id: String,
    /// Station position and the target position computed by this sight
    pub endpoints: ((f64, f64), (f64, f64)),
    pub distance: f64,
    /// Normalized angle in degrees
    pub angle_deg: f64,
}

/// Options for [`traverse`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalOptions {
    /// Retry skipped records once their station has been resolved.
    ///
    /// Off by default: plain traversal drops out-of-order records.
    pub retry_deferred: bool,
}

/// Result of a traversal.
#[derive(Debug, Clone, Default)]
pub struct Traversal {
    pub points: CoordinateMap,
    pub connections: Vec<Connection>,
    /// Indices of records that could not be resolved
    pub skipped: Vec<usize>,
}

impl Traversal {
    /// Returns true if no point was resolved.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points sorted by id, for stable output.
    pub fn sorted_points(&self) -> Vec<&Point> {
        let mut points: Vec<&Point> = self.points.values().collect();
        points.sort_by(|a, b| a.id.cmp(&b.id));
        points
    }
}

/// Build the height table for a record sequence.
///
/// A station takes the heights of the records that occupy it, the last one
/// winning. A target seen only as a target gets zero heights.
pub fn seed_heights(records: &[MeasurementRecord]) -> HeightTable {
    let mut table = HeightTable::with_capacity(records.len() * 2);

    for record in records {
        table.insert(
            record.station_id.clone(),
            Heights {
                target: record.target_height,
                instrument: record.instrument_height,
            },
        );
        table.entry(record.target_id.clone()).or_default();
    }

    table
}

/// Resolve one record against the current coordinates.
///
/// Returns `None` without touching `points` when the station is unknown.
fn resolve(
    record: &MeasurementRecord,
    heights: &HeightTable,
    points: &mut CoordinateMap,
) -> Option<Connection> {
    let angle_deg = normalize_angle(record.vertical_angle_deg);
    let lookup = |id: &str| heights.get(id).copied().unwrap_or_default();

    if points.is_empty() {
        let origin = Point::new(&record.station_id, (0.0, 0.0), lookup(&record.station_id));
        points.insert(record.station_id.clone(), origin);
    }

    let start = points.get(&record.station_id)?.position();
    let end = project(start, record.slope_distance, angle_deg);

    points
        .entry(record.target_id.clone())
        .or_insert_with(|| Point::new(&record.target_id, end, lookup(&record.target_id)));

    Some(Connection {
        from_id: record.station_id.clone(),
        to_id: record.target_id.clone(),
        endpoints: (start, end),
        distance: record.slope_distance,
        angle_deg,
    })
}

/// Traverse `records` in order on top of existing coordinates.
///
/// # Arguments
///
/// * `records` - Sights in field-sheet order
/// * `heights` - Height table, usually from [`seed_heights`]
/// * `points` - Already resolved points; an empty map lets the first
///   record's station become the origin
///
/// # Returns
///
/// The updated coordinate map, the connections in record order, and the
/// indices of the skipped records.
pub fn traverse_with(
    records: &[MeasurementRecord],
    heights: &HeightTable,
    mut points: CoordinateMap,
) -> (CoordinateMap, Vec<Connection>, Vec<usize>) {
    let mut connections = Vec::with_capacity(records.len());
    let mut skipped = Vec::new();

    for (idx, record) in records.iter().enumerate() {
        match resolve(record, heights, &mut points) {
            Some(connection) => connections.push(connection),
            None => {
                debug!(
                    "Record {} ({} -> {}): station not resolved, skipping",
                    idx + 1,
                    record.station_id,
                    record.target_id
                );
                skipped.push(idx);
            }
        }
    }

    (points, connections, skipped)
}

/// Compute point coordinates and connections for a field sheet.
///
/// # Example
///
/// ```
/// use survey_traverse::core::loaders::MeasurementRecord;
/// use survey_traverse::processors::traversal::{traverse, TraversalOptions};
///
/// let records = vec![MeasurementRecord::new("A", "B", 10.0, 0.0)];
/// let result = traverse(&records, TraversalOptions::default());
/// assert_eq!(result.points["B"].x, 10.0);
/// assert_eq!(result.connections.len(), 1);
/// ```
pub fn traverse(records: &[MeasurementRecord], options: TraversalOptions) -> Traversal {
    let heights = seed_heights(records);
    let (mut points, mut connections, mut skipped) =
        traverse_with(records, &heights, CoordinateMap::new());

    if options.retry_deferred {
        // Retry in original order until a pass resolves nothing new
        while !skipped.is_empty() {
            let pending: Vec<MeasurementRecord> =
                skipped.iter().map(|&idx| records[idx].clone()).collect();
            let (next_points, resolved, still_skipped) = traverse_with(&pending, &heights, points);
            points = next_points;

            if resolved.is_empty() {
                break;
            }
            debug!("Deferred pass resolved {} records", resolved.len());

            connections.extend(resolved);
            skipped = still_skipped.into_iter().map(|i| skipped[i]).collect();
        }
    }

    Traversal {
        points,
        connections,
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn record(station: &str, target: &str, distance: f64, angle: f64) -> MeasurementRecord {
        MeasurementRecord::new(station, target, distance, angle)
    }

    fn assert_close(actual: (f64, f64), expected: (f64, f64)) {
        assert!(
            (actual.0 - expected.0).abs() < EPS && (actual.1 - expected.1).abs() < EPS,
            "{:?} != {:?}",
            actual,
            expected
        );
    }

    #[test]
    fn test_empty_input() {
        let result = traverse(&[], TraversalOptions::default());
        assert!(result.is_empty());
        assert!(result.connections.is_empty());
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn test_single_sight() {
        let result = traverse(&[record("A", "B", 10.0, 90.0)], TraversalOptions::default());

        assert_eq!(result.points.len(), 2);
        assert_eq!(result.points["A"].position(), (0.0, 0.0));
        assert_close(result.points["B"].position(), (0.0, 10.0));

        assert_eq!(result.connections.len(), 1);
        let connection = &result.connections[0];
        assert_eq!(connection.from_id, "A");
        assert_eq!(connection.to_id, "B");
        assert_eq!(connection.angle_deg, 90.0);
        assert_eq!(connection.distance, 10.0);
    }

    #[test]
    fn test_chained_sights() {
        let records = vec![record("A", "B", 10.0, 0.0), record("B", "C", 5.0, 180.0)];
        let result = traverse(&records, TraversalOptions::default());

        let b = result.points["B"].position();
        assert_close(b, (10.0, 0.0));
        assert_close(result.points["C"].position(), (b.0 - 5.0, b.1));
        assert_eq!(result.connections[1].endpoints.0, b);
    }

    #[test]
    fn test_negative_angle_is_normalized() {
        let result = traverse(&[record("A", "B", 2.0, -90.0)], TraversalOptions::default());

        assert_eq!(result.connections[0].angle_deg, 270.0);
        assert_close(result.points["B"].position(), (0.0, -2.0));
    }

    #[test]
    fn test_unresolved_station_is_skipped() {
        let records = vec![
            record("A", "B", 10.0, 0.0),
            record("X", "Y", 3.0, 0.0),
            record("B", "C", 1.0, 90.0),
        ];
        let result = traverse(&records, TraversalOptions::default());

        assert_eq!(result.skipped, vec![1]);
        assert!(!result.points.contains_key("X"));
        assert!(!result.points.contains_key("Y"));
        assert_eq!(result.connections.len(), 2);
        assert_eq!(result.connections[1].from_id, "B");
    }

    #[test]
    fn test_out_of_order_records_are_dropped() {
        // C is only resolved by the last record, too late for the second one
        let records = vec![
            record("A", "B", 10.0, 0.0),
            record("C", "D", 4.0, 90.0),
            record("B", "C", 5.0, 0.0),
        ];
        let result = traverse(&records, TraversalOptions::default());

        assert_eq!(result.skipped, vec![1]);
        assert!(result.points.contains_key("C"));
        assert!(!result.points.contains_key("D"));
        assert_eq!(result.connections.len(), 2);
    }

    #[test]
    fn test_retry_deferred_resolves_out_of_order_records() {
        let records = vec![
            record("A", "B", 10.0, 0.0),
            record("D", "E", 1.0, 0.0),
            record("C", "D", 4.0, 90.0),
            record("B", "C", 5.0, 0.0),
        ];
        let options = TraversalOptions {
            retry_deferred: true,
        };
        let result = traverse(&records, options);

        assert!(result.skipped.is_empty());
        assert_close(result.points["C"].position(), (15.0, 0.0));
        assert_close(result.points["D"].position(), (15.0, 4.0));
        assert_close(result.points["E"].position(), (16.0, 4.0));

        let order: Vec<(&str, &str)> = result
            .connections
            .iter()
            .map(|c| (c.from_id.as_str(), c.to_id.as_str()))
            .collect();
        assert_eq!(order, vec![("A", "B"), ("B", "C"), ("C", "D"), ("D", "E")]);
    }

    #[test]
    fn test_retry_deferred_keeps_unreachable_records() {
        let records = vec![record("A", "B", 1.0, 0.0), record("X", "Y", 1.0, 0.0)];
        let options = TraversalOptions {
            retry_deferred: true,
        };
        let result = traverse(&records, options);

        assert_eq!(result.skipped, vec![1]);
        assert_eq!(result.points.len(), 2);
    }

    #[test]
    fn test_first_write_wins() {
        let records = vec![record("A", "B", 10.0, 0.0), record("A", "B", 20.0, 90.0)];
        let result = traverse(&records, TraversalOptions::default());

        assert_close(result.points["B"].position(), (10.0, 0.0));
        assert_eq!(result.connections.len(), 2);
        // The second sight still reports where it would have placed B
        assert_close(result.connections[1].endpoints.1, (0.0, 20.0));
    }

    #[test]
    fn test_seed_heights() {
        let records = vec![
            record("A", "B", 1.0, 0.0).with_heights(2.0, 1.5),
            record("B", "C", 1.0, 0.0).with_heights(3.0, 1.6),
            record("A", "C", 1.0, 0.0).with_heights(4.0, 1.7),
        ];
        let table = seed_heights(&records);

        assert_eq!(table.len(), 3);
        assert_eq!(table["A"], Heights { target: 4.0, instrument: 1.7 });
        assert_eq!(table["B"], Heights { target: 3.0, instrument: 1.6 });
        assert_eq!(table["C"], Heights::default());
    }

    #[test]
    fn test_points_take_heights_from_table() {
        let records = vec![
            record("A", "B", 1.0, 0.0).with_heights(2.0, 1.5),
            record("B", "C", 1.0, 0.0).with_heights(3.0, 1.6),
        ];
        let result = traverse(&records, TraversalOptions::default());

        assert_eq!(result.points["A"].target_height, 2.0);
        assert_eq!(result.points["A"].instrument_height, 1.5);
        // B is created as a target but occupied later: table values apply
        assert_eq!(result.points["B"].target_height, 3.0);
        assert_eq!(result.points["C"].target_height, 0.0);
    }

    #[test]
    fn test_traverse_with_existing_points() {
        let records = vec![record("K", "L", 2.0, 0.0)];
        let mut points = CoordinateMap::new();
        points.insert(
            "K".to_string(),
            Point::new("K", (100.0, 50.0), Heights::default()),
        );

        let (points, connections, skipped) = traverse_with(&records, &seed_heights(&records), points);

        assert!(skipped.is_empty());
        assert_eq!(connections.len(), 1);
        assert_close(points["L"].position(), (102.0, 50.0));
    }

    #[test]
    fn test_traverse_with_unknown_station_and_existing_points() {
        // No implicit origin once any point is resolved
        let records = vec![record("M", "N", 2.0, 0.0)];
        let mut points = CoordinateMap::new();
        points.insert("K".to_string(), Point::new("K", (0.0, 0.0), Heights::default()));

        let (points, connections, skipped) = traverse_with(&records, &HeightTable::new(), points);

        assert_eq!(skipped, vec![0]);
        assert!(connections.is_empty());
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn test_sorted_points() {
        let records = vec![record("B", "A", 1.0, 0.0), record("A", "C", 1.0, 0.0)];
        let result = traverse(&records, TraversalOptions::default());

        let ids: Vec<&str> = result.sorted_points().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }
}
