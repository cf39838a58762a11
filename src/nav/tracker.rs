//! Dead-reckoning position tracker.
//!
//! Each accelerometer sample is classified as moving or still. Moving samples
//! go through a [`KalmanFilter3`] and are integrated twice with a fixed `dt`.
//! Still samples bypass the filter: the corrected sample becomes the estimate
//! as is, the covariance is kept, and velocity and position shrink by
//! `decay_factor`, which bleeds off integration drift while the sensor rests.
//!
//! `dt` is nominal, never measured. If the sample rate wanders the integrated
//! position drifts no matter how good the filter is.

use log::{trace, warn};
use nalgebra::Vector3;
use strum::{AsRefStr, Display};

use crate::{config::ConfigError, parameters::ParameterMap};

use super::{
    imu::ImuReading,
    kalman::{KalmanError, KalmanFilter3},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    pub still_threshold: f64,
    pub decay_factor: f64,
    pub dt: f64,
    pub process_noise: f64,
    pub measurement_noise: f64,
    pub initial_covariance: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            still_threshold: 0.05,
            decay_factor: 0.95,
            dt: 0.05,
            process_noise: 0.01,
            measurement_noise: 0.02,
            initial_covariance: 1.0,
        }
    }
}

impl TrackerConfig {
    /// Reads the `tracker` section. Missing keys keep their defaults.
    pub fn from_params(params: &ParameterMap) -> Result<Self, ConfigError> {
        let d = Self::default();

        let config = Self {
            still_threshold: params.value_or("tracker.still_threshold", d.still_threshold)?,
            decay_factor: params.value_or("tracker.decay_factor", d.decay_factor)?,
            dt: params.value_or("tracker.dt", d.dt)?,
            process_noise: params.value_or("tracker.process_noise", d.process_noise)?,
            measurement_noise: params.value_or("tracker.measurement_noise", d.measurement_noise)?,
            initial_covariance: params
                .value_or("tracker.initial_covariance", d.initial_covariance)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("tracker.dt", self.dt),
            ("tracker.process_noise", self.process_noise),
            ("tracker.measurement_noise", self.measurement_noise),
            ("tracker.initial_covariance", self.initial_covariance),
        ];

        for (path, v) in positive {
            if !(v > 0.0 && v.is_finite()) {
                return Err(ConfigError::invalid(path, format!("must be positive, got {v}")));
            }
        }

        if !(self.decay_factor > 0.0 && self.decay_factor <= 1.0) {
            return Err(ConfigError::invalid(
                "tracker.decay_factor",
                format!("must be in (0, 1], got {}", self.decay_factor),
            ));
        }

        if !(self.still_threshold >= 0.0 && self.still_threshold.is_finite()) {
            return Err(ConfigError::invalid(
                "tracker.still_threshold",
                format!("must not be negative, got {}", self.still_threshold),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum MotionRegime {
    Moving,
    Still,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerStep {
    pub regime: MotionRegime,
    pub position: Vector3<f64>,
}

/// Mean of a window of accelerometer samples taken while at rest.
pub fn estimate_bias(samples: &[Vector3<f64>]) -> Option<Vector3<f64>> {
    if samples.is_empty() {
        return None;
    }

    Some(samples.iter().sum::<Vector3<f64>>() / samples.len() as f64)
}

#[derive(Debug, Clone)]
pub struct PositionTracker {
    config: TrackerConfig,
    filter: KalmanFilter3,

    position: Vector3<f64>,
    velocity: Vector3<f64>,
    accel_bias: Vector3<f64>,
    trajectory: Vec<Vector3<f64>>,
}

impl PositionTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            filter: KalmanFilter3::from_scales(
                config.initial_covariance,
                config.process_noise,
                config.measurement_noise,
            ),
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            accel_bias: Vector3::zeros(),
            trajectory: vec![],
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn filter(&self) -> &KalmanFilter3 {
        &self.filter
    }

    pub fn current_position(&self) -> Vector3<f64> {
        self.position
    }

    pub fn velocity(&self) -> Vector3<f64> {
        self.velocity
    }

    /// Every position produced so far, oldest first.
    pub fn trajectory(&self) -> &[Vector3<f64>] {
        &self.trajectory
    }

    pub fn accel_bias(&self) -> Vector3<f64> {
        self.accel_bias
    }

    pub fn set_accel_bias(&mut self, bias: Vector3<f64>) {
        self.accel_bias = bias;
    }

    /// Advances by one accelerometer sample. On error nothing changes and no
    /// trajectory point is added.
    pub fn update(&mut self, accel: &Vector3<f64>) -> Result<TrackerStep, KalmanError> {
        let corrected = accel - self.accel_bias;
        let dt = self.config.dt;

        let regime = if corrected.norm() > self.config.still_threshold {
            self.filter.step(&corrected)?;

            self.velocity += self.filter.estimate() * dt;
            self.position += self.velocity * dt;

            MotionRegime::Moving
        } else {
            self.filter.pass_through(&corrected);

            self.velocity *= self.config.decay_factor;
            self.position *= self.config.decay_factor;

            MotionRegime::Still
        };

        self.trajectory.push(self.position);
        trace!("{regime}: p={:?} v={:?}", self.position, self.velocity);

        Ok(TrackerStep {
            regime,
            position: self.position,
        })
    }

    /// Parses one raw IMU line and feeds its accelerometer part. Malformed
    /// lines are logged and skipped.
    pub fn ingest_line(&mut self, line: &str) -> Option<TrackerStep> {
        let reading: ImuReading = match line.parse() {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Error parsing IMU line '{}': {e}", line.trim());
                return None;
            }
        };

        match self.update(&reading.accel) {
            Ok(step) => Some(step),
            Err(e) => {
                warn!("Skipping IMU sample: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use pretty_assertions::assert_eq;

    use crate::parameters::parse_string;

    use super::*;

    #[test]
    fn test_moving_then_still() {
        let mut tracker = PositionTracker::new(TrackerConfig::default());
        let push = Vector3::new(0.1, 0.0, 0.0);

        let mut last_v = 0.0;
        let mut last_p = 0.0;
        for _ in 0..10 {
            let step = tracker.update(&push).unwrap();
            assert_eq!(step.regime, MotionRegime::Moving);

            let v = tracker.velocity().x;
            let p = tracker.current_position().x;
            assert!(v > last_v);
            assert!(p > last_p);
            assert_eq!(tracker.current_position().yz(), nalgebra::Vector2::zeros());

            last_v = v;
            last_p = p;
        }
        assert_eq!(tracker.trajectory().len(), 10);

        for _ in 0..10 {
            let before_p = tracker.current_position();
            let before_v = tracker.velocity();

            let step = tracker.update(&Vector3::zeros()).unwrap();
            assert_eq!(step.regime, MotionRegime::Still);

            let p = tracker.current_position();
            assert!(p.norm() < before_p.norm());
            assert!(p.norm() > 0.0);
            assert!(tracker.velocity().norm() > 0.0);
            assert_relative_eq!(p, before_p * 0.95, epsilon = 1e-15);
            assert_relative_eq!(tracker.velocity(), before_v * 0.95, epsilon = 1e-15);
        }
        assert_eq!(tracker.trajectory().len(), 20);
        assert_eq!(*tracker.trajectory().last().unwrap(), tracker.current_position());
    }

    #[test]
    fn test_still_samples_skip_filter() {
        let mut tracker = PositionTracker::new(TrackerConfig::default());
        let cov = *tracker.filter().covariance();

        // Exactly at the threshold counts as still
        tracker.update(&Vector3::new(0.05, 0.0, 0.0)).unwrap();
        tracker.update(&Vector3::new(0.0, 0.03, -0.03)).unwrap();

        assert_eq!(*tracker.filter().covariance(), cov);
        assert_eq!(*tracker.filter().estimate(), Vector3::new(0.0, 0.03, -0.03));
        assert_eq!(tracker.current_position(), Vector3::zeros());
        assert_eq!(tracker.trajectory().len(), 2);
    }

    #[test]
    fn test_still_sample_replaces_estimate() {
        let mut tracker = PositionTracker::new(TrackerConfig::default());
        tracker.set_accel_bias(Vector3::new(0.0, 0.0, 0.01));

        for _ in 0..5 {
            tracker.update(&Vector3::new(1.0, 0.0, 0.01)).unwrap();
        }
        let cov = *tracker.filter().covariance();

        let step = tracker.update(&Vector3::new(0.01, 0.0, 0.01)).unwrap();
        assert_eq!(step.regime, MotionRegime::Still);

        // The estimate is the bias-corrected sample, not the stale moving one
        assert_relative_eq!(
            *tracker.filter().estimate(),
            Vector3::new(0.01, 0.0, 0.0),
            epsilon = 1e-15
        );
        assert_eq!(*tracker.filter().covariance(), cov);
    }

    #[test]
    fn test_first_moving_step() {
        let mut tracker = PositionTracker::new(TrackerConfig::default());

        tracker.update(&Vector3::new(0.0, 0.0, 1.0)).unwrap();

        let k = 1.01 / 1.03;
        assert_relative_eq!(tracker.velocity().z, k * 0.05, epsilon = 1e-12);
        assert_relative_eq!(tracker.current_position().z, k * 0.05 * 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_bias_is_removed() {
        let rest = [
            Vector3::new(0.01, -0.02, 9.80),
            Vector3::new(0.03, 0.00, 9.82),
        ];
        let bias = estimate_bias(&rest).unwrap();
        assert_abs_diff_eq!(bias, Vector3::new(0.02, -0.01, 9.81), epsilon = 1e-12);
        assert_eq!(estimate_bias(&[]), None);

        let mut tracker = PositionTracker::new(TrackerConfig::default());
        tracker.set_accel_bias(bias);

        let step = tracker.update(&Vector3::new(0.02, -0.01, 9.83)).unwrap();
        assert_eq!(step.regime, MotionRegime::Still);
    }

    #[test]
    fn test_malformed_line_changes_nothing() {
        let mut tracker = PositionTracker::new(TrackerConfig::default());

        assert!(tracker.ingest_line("0.1 0 0 0 0 0 0 0 0\n").is_some());
        let before = tracker.current_position();

        assert!(tracker.ingest_line("0.1 0 0 0 0 0 0 0\n").is_none());
        assert!(tracker.ingest_line("0.1 0 0 0 zero 0 0 0 0\n").is_none());
        assert!(tracker.ingest_line("nan 0 0 0 0 0 0 0 0\n").is_none());

        assert_eq!(tracker.current_position(), before);
        assert_eq!(tracker.trajectory().len(), 1);
    }

    #[test]
    fn test_config_from_params() {
        let params = parse_string(
            r#"
            [tracker]
            decay_factor = { val = 0.9, type = "float" }
            measurement_noise = { val = 0.5, type = "float" }
            "#,
        )
        .unwrap();

        let config = TrackerConfig::from_params(&params).unwrap();
        assert_eq!(
            config,
            TrackerConfig {
                decay_factor: 0.9,
                measurement_noise: 0.5,
                ..TrackerConfig::default()
            }
        );
    }

    #[test]
    fn test_config_rejects_out_of_range() {
        let cases = [
            ("dt", "0.0"),
            ("process_noise", "-0.01"),
            ("decay_factor", "1.5"),
            ("decay_factor", "0.0"),
            ("still_threshold", "-1.0"),
        ];

        for (key, val) in cases {
            let params = parse_string(&format!(
                "tracker.{key} = {{ val = {val}, type = \"float\" }}"
            ))
            .unwrap();

            let err = TrackerConfig::from_params(&params).unwrap_err();
            assert!(
                matches!(&err, ConfigError::Invalid { path, .. } if *path == format!("tracker.{key}")),
                "{key} = {val}: {err}"
            );
        }
    }

    #[test]
    fn test_regime_names() {
        assert_eq!(MotionRegime::Moving.to_string(), "moving");
        assert_eq!(MotionRegime::Still.as_ref(), "still");
    }
}
