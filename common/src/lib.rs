// Common library shared by the api and scheduler binaries

pub mod bootstrap;
pub mod channels;
pub mod config;
pub mod db;
pub mod errors;
pub mod extraction;
pub mod models;
pub mod notifications;
pub mod schedule;
pub mod scheduler;
pub mod telemetry;
