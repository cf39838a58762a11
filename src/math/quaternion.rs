//! Quaternion helpers on `(w, x, y, z)` orientations.
//!
//! Inputs are assumed to be unit quaternions; nothing here renormalises.

use nalgebra::Quaternion;
use serde_json::Value;

use crate::telemetry::{ShapeError, value_to_array};

pub fn identity() -> Quaternion<f64> {
    Quaternion::new(1.0, 0.0, 0.0, 0.0)
}

/// Hamilton product: `q0` is applied first, then `q1`.
pub fn multiply(q1: &Quaternion<f64>, q0: &Quaternion<f64>) -> Quaternion<f64> {
    let (w0, x0, y0, z0) = (q0.w, q0.i, q0.j, q0.k);
    let (w1, x1, y1, z1) = (q1.w, q1.i, q1.j, q1.k);

    Quaternion::new(
        w1 * w0 - x1 * x0 - y1 * y0 - z1 * z0,
        w1 * x0 + x1 * w0 + y1 * z0 - z1 * y0,
        w1 * y0 - x1 * z0 + y1 * w0 + z1 * x0,
        w1 * z0 + x1 * y0 - y1 * x0 + z1 * w0,
    )
}

/// Inverse of a unit quaternion, i.e. its conjugate.
pub fn invert(q: &Quaternion<f64>) -> Quaternion<f64> {
    Quaternion::new(q.w, -q.i, -q.j, -q.k)
}

pub fn from_wxyz(wxyz: [f64; 4]) -> Quaternion<f64> {
    let [w, x, y, z] = wxyz;
    Quaternion::new(w, x, y, z)
}

pub fn to_wxyz(q: &Quaternion<f64>) -> [f64; 4] {
    [q.w, q.i, q.j, q.k]
}

/// Reads a telemetry value shaped as `[w, x, y, z]`.
pub fn quaternion_from_value(value: &Value) -> Result<Quaternion<f64>, ShapeError> {
    value_to_array::<4>(value).map(from_wxyz)
}
