// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Piecewise-linear interpolation over calibration points.
//!
//! - Below the lowest point: the lowest point's duty
//! - Above the highest point: the highest point's duty
//! - Between two points: linear interpolation
//!
//! The functions here take points sorted by ascending temperature, which
//! [`CurveTable`](crate::curve::CurveTable) guarantees.

use crate::curve::CalibrationPoint;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum EvaluateError {
    #[error("no calibration data loaded")]
    NoCalibrationData,

    #[error("temperature reading is not a number")]
    InvalidTemperature,
}

/// Where a temperature falls relative to the curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment<'a> {
    /// At or below the first knot.
    Below(&'a CalibrationPoint),
    /// At or above the last knot.
    Above(&'a CalibrationPoint),
    /// Strictly inside the curve, `lo.temp_c <= t < hi.temp_c`.
    Within {
        lo: &'a CalibrationPoint,
        hi: &'a CalibrationPoint,
    },
}

/// Find the segment governing `temp_c`.
pub fn locate(points: &[CalibrationPoint], temp_c: f64) -> Result<Segment<'_>, EvaluateError> {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Err(EvaluateError::NoCalibrationData);
    };
    if temp_c.is_nan() {
        return Err(EvaluateError::InvalidTemperature);
    }

    if temp_c <= first.temp_c {
        return Ok(Segment::Below(first));
    }
    if temp_c >= last.temp_c {
        return Ok(Segment::Above(last));
    }

    // first < t < last, so there are at least two points and the upper
    // bound lands strictly inside the slice.
    let upper = points
        .partition_point(|p| p.temp_c <= temp_c)
        .clamp(1, points.len() - 1);
    Ok(Segment::Within {
        lo: &points[upper - 1],
        hi: &points[upper],
    })
}

/// Map a temperature to a duty cycle in `0.0..=1.0`.
///
/// Exact at every knot. Pure, so it can be called from any number of
/// readers sharing the same points.
pub fn evaluate(points: &[CalibrationPoint], temp_c: f64) -> Result<f64, EvaluateError> {
    let duty = match locate(points, temp_c)? {
        Segment::Below(p) | Segment::Above(p) => p.duty,
        Segment::Within { lo, hi } => lerp(lo, hi, temp_c),
    };
    Ok(duty.clamp(0.0, 1.0))
}

/// Linear interpolation between two knots. A zero-width pair yields the
/// lower knot's duty.
pub fn lerp(lo: &CalibrationPoint, hi: &CalibrationPoint, temp_c: f64) -> f64 {
    let range_t = hi.temp_c - lo.temp_c;
    if range_t == 0.0 {
        return lo.duty;
    }
    let ratio = (temp_c - lo.temp_c) / range_t;
    lo.duty + ratio * (hi.duty - lo.duty)
}
