use std::{num::ParseFloatError, str::FromStr};

use nalgebra::Vector3;
use thiserror::Error;

const FIELD_COUNT: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImuLineError {
    #[error("Expected 9 fields, got {0}")]
    FieldCount(usize),

    #[error("Bad number: {0}")]
    BadNumber(#[from] ParseFloatError),

    #[error("Non-finite field at index {0}")]
    NonFinite(usize),
}

/// One raw IMU line: accelerometer, gyroscope and magnetometer, three axes
/// each, separated by whitespace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuReading {
    pub accel: Vector3<f64>,
    pub gyro: Vector3<f64>,
    pub magn: Vector3<f64>,
}

impl FromStr for ImuReading {
    type Err = ImuLineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        if fields.len() != FIELD_COUNT {
            return Err(ImuLineError::FieldCount(fields.len()));
        }

        let mut v = [0.0f64; FIELD_COUNT];
        for (i, field) in fields.iter().enumerate() {
            v[i] = field.parse::<f64>()?;
            if !v[i].is_finite() {
                return Err(ImuLineError::NonFinite(i));
            }
        }

        Ok(Self {
            accel: Vector3::new(v[0], v[1], v[2]),
            gyro: Vector3::new(v[3], v[4], v[5]),
            magn: Vector3::new(v[6], v[7], v[8]),
        })
    }
}
