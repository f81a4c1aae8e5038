//! Angle normalization and polar-to-Cartesian projection of single sights.

/// Map a signed angle in degrees to its unsigned equivalent.
///
/// Non-negative angles are returned unchanged, negative ones are shifted by
/// a full turn (`-20` becomes `340`). Inputs at or below `-360` are not
/// wrapped further and stay out of the `[0, 360)` range.
#[inline]
pub fn normalize_angle(angle_deg: f64) -> f64 {
    if angle_deg >= 0.0 {
        angle_deg
    } else {
        360.0 + angle_deg
    }
}

/// Project a sight from `origin` along `angle_deg` over `distance`.
///
/// Computes x = x0 + d * cos(angle) and y = y0 + d * sin(angle).
///
/// # Example
///
/// ```
/// use survey_traverse::core::transforms::project;
///
/// let (x, y) = project((1.0, 1.0), 2.0, 0.0);
/// assert_eq!((x, y), (3.0, 1.0));
/// ```
pub fn project(origin: (f64, f64), distance: f64, angle_deg: f64) -> (f64, f64) {
    let angle_rad = angle_deg.to_radians();
    (
        origin.0 + distance * angle_rad.cos(),
        origin.1 + distance * angle_rad.sin(),
    )
}
