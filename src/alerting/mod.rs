pub mod downtime;
pub mod engine;

pub use engine::{CycleOptions, CycleReport, TransitionEngine, TransitionRecord};
