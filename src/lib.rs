pub mod animation;
pub mod calibration;
pub mod collaborators;
pub mod config;
pub mod constants;
pub mod engine;
pub mod rng;
pub mod scaler;
pub mod timers;
pub mod types;
