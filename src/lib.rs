pub mod config;
pub mod fusion;
pub mod io;
pub mod math;
pub mod nav;
pub mod parameters;
pub mod telemetry;
pub mod utils;
