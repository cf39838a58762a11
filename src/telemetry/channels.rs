//! Well-known telemetry keys published by the arm controllers.

pub mod joints {
    pub const RIGHT_UPPER_ARM: &str = "/joint/0";
    pub const RIGHT_LOWER_ARM: &str = "/joint/1";
    pub const LEFT_UPPER_ARM: &str = "/joint/2";
    pub const LEFT_LOWER_ARM: &str = "/joint/3";
}
