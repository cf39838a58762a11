pub mod imu;
pub mod kalman;
pub mod tracker;

pub use imu::{ImuLineError, ImuReading};
pub use kalman::{KalmanError, KalmanFilter3};
pub use tracker::{MotionRegime, PositionTracker, TrackerConfig, TrackerStep, estimate_bias};
