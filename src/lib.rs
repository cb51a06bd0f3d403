
pub mod constants;
pub mod kalman;
pub mod scenario;
pub mod output;
pub mod driver;
pub mod config;
