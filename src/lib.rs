//! Helios Edge: windowed aggregation and resumable delivery for solar
//! telemetry.
//!
//! Raw sensor rows land in a local sled store; on a fixed cadence the
//! pipeline validates them against per-channel physical ranges,
//! forward-fills gaps, partitions the stream into epoch-aligned windows,
//! aggregates per-channel statistics with a data-health percentage, and
//! posts one payload per window to the backend. A durable watermark makes
//! delivery resumable: it only advances after the backend confirms, so an
//! outage replays windows instead of losing them.

pub mod channels;
pub mod config;
pub mod delivery;
pub mod fill;
pub mod payload;
pub mod pipeline;
pub mod scheduler;
pub mod stats;
pub mod store;
pub mod types;
pub mod validate;
pub mod window;

pub use channels::{ChannelSpec, Panel, CHANNELS, CHANNEL_COUNT};
pub use config::EdgeConfig;
pub use delivery::{BackendClient, DeliverySink};
pub use pipeline::{CycleReport, Pipeline, PipelineSettings, RunError};
pub use store::{
    MemorySource, MemoryState, SampleSource, SledTelemetryStore, StateStore, StoreError,
    WatermarkStore,
};
pub use types::{
    AuthSession, ChannelStat, CleanedRow, DeliveryOutcome, RawRow, Window,
};
