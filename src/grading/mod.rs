//! Scores a finished mission run.
//!
//! `grade` is a pure function of the flight trace, the submitted program and
//! the mission's success criteria. Each criterion that is present adds its
//! own points; the code heuristics always run. The sum is clamped to 100 and
//! a run passes at 70.

pub mod heuristics;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ValidationFailure;

pub const LANDING_POINTS: u32 = 30;
pub const ALTITUDE_POINTS: u32 = 20;
pub const TIME_POINTS: u32 = 15;
pub const ACCURACY_POINTS: u32 = 20;
pub const LOOP_POINTS: u32 = 10;
pub const CODE_POINTS: u32 = 5;

pub const MAX_SCORE: u32 = 100;
pub const PASS_SCORE: u32 = 70;

pub const PASSED_MESSAGE: &str = "Great job! Mission completed successfully.";
pub const FAILED_MESSAGE: &str =
    "Mission not completed. Review the feedback below and try again.";

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Horizontal distance from the take-off point.
    pub fn xy_distance(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

/// What the simulator recorded during one mission attempt.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightTrace {
    pub path: Vec<Position>,
    pub elapsed_time: f64,
    pub max_altitude_reached: f64,
    pub landed: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_landing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_accuracy_radius: Option<f64>,
}

impl SuccessCriteria {
    /// Checks authored mission content. Grading never calls this; it copes
    /// with whatever it is given.
    pub fn validate(&self) -> Result<(), ValidationFailure> {
        if let Some(min) = self.min_altitude {
            if !min.is_finite() || min < 0.0 {
                return Err(ValidationFailure::new(
                    "minAltitude",
                    format!("must be a non-negative number, got {}", min),
                ));
            }
        }
        if let Some(max) = self.max_time {
            if !max.is_finite() || max <= 0.0 {
                return Err(ValidationFailure::new(
                    "maxTime",
                    format!("must be a positive number of seconds, got {}", max),
                ));
            }
        }
        if let Some(radius) = self.position_accuracy_radius {
            if !radius.is_finite() || radius < 0.0 {
                return Err(ValidationFailure::new(
                    "positionAccuracyRadius",
                    format!("must be a non-negative distance, got {}", radius),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeResult {
    pub score: u32,
    pub passed: bool,
    pub feedback: Vec<String>,
    pub breakdown: BTreeMap<String, u32>,
}

pub fn grade(trace: &FlightTrace, source_code: &str, criteria: &SuccessCriteria) -> GradeResult {
    let mut breakdown = BTreeMap::new();
    let mut feedback = Vec::new();

    if criteria.required_landing.is_some() {
        let points = if trace.landed {
            LANDING_POINTS
        } else {
            feedback.push("Drone did not land as required.".to_string());
            0
        };
        breakdown.insert("landed".to_string(), points);
    }

    if let Some(min_altitude) = criteria.min_altitude {
        let points = if trace.max_altitude_reached >= min_altitude {
            ALTITUDE_POINTS
        } else {
            feedback.push(format!(
                "Drone did not reach the required altitude of {}m.",
                min_altitude
            ));
            0
        };
        breakdown.insert("altitude".to_string(), points);
    }

    if let Some(max_time) = criteria.max_time {
        let points = if trace.elapsed_time <= max_time {
            TIME_POINTS
        } else {
            feedback.push(format!(
                "Mission took longer than the target time of {}s.",
                max_time
            ));
            0
        };
        breakdown.insert("time".to_string(), points);
    }

    if let (Some(radius), Some(last)) = (criteria.position_accuracy_radius, trace.path.last()) {
        let distance = last.xy_distance();
        let points = accuracy_points(distance, radius);
        if points < ACCURACY_POINTS {
            feedback.push(format!(
                "Final position was {:.2}m from the target (allowed: {:.2}m).",
                distance, radius
            ));
        }
        breakdown.insert("accuracy".to_string(), points);
    }

    let loops = if heuristics::has_loop(source_code) {
        LOOP_POINTS
    } else {
        0
    };
    breakdown.insert("loops".to_string(), loops);

    let code = if heuristics::has_assignment(source_code) {
        CODE_POINTS
    } else {
        0
    };
    breakdown.insert("code".to_string(), code);

    let score = breakdown.values().sum::<u32>().min(MAX_SCORE);
    let passed = score >= PASS_SCORE;
    let headline = if passed { PASSED_MESSAGE } else { FAILED_MESSAGE };
    feedback.insert(0, headline.to_string());

    GradeResult {
        score,
        passed,
        feedback,
        breakdown,
    }
}

/// Full credit inside the radius. Outside it the credit shrinks with the
/// overshoot ratio; a zero, negative or NaN radius gives nothing.
fn accuracy_points(distance: f64, radius: f64) -> u32 {
    if distance <= radius {
        return ACCURACY_POINTS;
    }
    if radius.is_nan() || radius <= 0.0 || !distance.is_finite() {
        return 0;
    }
    let max = ACCURACY_POINTS as f64;
    let penalty = (distance / radius * max).min(max).round();
    (max - penalty).max(0.0) as u32
}
