use nalgebra::{Matrix3, Vector3};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KalmanError {
    #[error("Innovation covariance is singular")]
    SingularInnovation,
}

/// Three-axis Kalman filter with an identity (random walk) process model.
///
/// The state is observed directly, so the measurement matrix is the identity
/// and predict only inflates the covariance.
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanFilter3 {
    x: Vector3<f64>,
    p: Matrix3<f64>,
    q: Matrix3<f64>,
    r: Matrix3<f64>,
}

impl KalmanFilter3 {
    pub fn new(p: Matrix3<f64>, q: Matrix3<f64>, r: Matrix3<f64>) -> Self {
        Self {
            x: Vector3::zeros(),
            p,
            q,
            r,
        }
    }

    /// Covariances as scaled identities.
    pub fn from_scales(initial_covariance: f64, process_noise: f64, measurement_noise: f64) -> Self {
        Self::new(
            Matrix3::identity() * initial_covariance,
            Matrix3::identity() * process_noise,
            Matrix3::identity() * measurement_noise,
        )
    }

    pub fn estimate(&self) -> &Vector3<f64> {
        &self.x
    }

    pub fn covariance(&self) -> &Matrix3<f64> {
        &self.p
    }

    /// Takes `z` as the estimate without filtering it. The covariance is
    /// left as is.
    pub fn pass_through(&mut self, z: &Vector3<f64>) {
        self.x = *z;
    }

    /// One predict/update cycle against measurement `z`. On error the filter
    /// is left untouched.
    pub fn step(&mut self, z: &Vector3<f64>) -> Result<(), KalmanError> {
        let p_pred = self.p + self.q;

        let s_inv = (p_pred + self.r)
            .try_inverse()
            .ok_or(KalmanError::SingularInnovation)?;
        let k = p_pred * s_inv;

        self.x += k * (z - self.x);

        let p = (Matrix3::identity() - k) * p_pred;
        // Round-off would otherwise make P drift away from symmetric
        self.p = (p + p.transpose()) * 0.5;

        Ok(())
    }
}
