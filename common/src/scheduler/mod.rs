// Scheduler module driving the periodic notification tick

pub mod engine;

pub use engine::{Scheduler, SchedulerEngine};
