//! Relays Hystrix/Turbine `turbine.stream` metrics into StatsD or InfluxDB.
//!
//! One supervisor per cluster keeps a stream attached and pushes decoded
//! [`models::event::Event`]s onto a shared channel; a single dispatch loop
//! hands them to the configured [`sinks::MetricSink`].

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod sinks;
pub mod state;
pub mod turbine;
