//! `mnemos-runtime` – The Memory Manager
//!
//! Wires the memory tiers of `mnemos-memory` into one engine an agent loop can
//! hold: a registry that routes writes and fans reads out, the heuristics that
//! decide where an unlabelled memory belongs, on-disk configuration, and
//! tracing setup.
//!
//! # Modules
//!
//! - [`manager`] – [`MemoryManager`][manager::MemoryManager]: one backend per
//!   [`MemoryType`][mnemos_types::MemoryType], concurrent fan-out retrieval
//!   merged by importance, cross-tier forgetting, and working → episodic
//!   consolidation.
//! - [`classifier`] – [`classify`][classifier::classify] and
//!   [`estimate_importance`][classifier::estimate_importance]: keyword
//!   heuristics (English and Chinese) used when a write does not name its
//!   tier or importance.
//! - [`config`] – [`MnemosConfig`][config::MnemosConfig]: per-store settings
//!   persisted at `~/.mnemos/config.toml`, overridable through `MNEMOS_*`
//!   environment variables.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export
//!   to Jaeger, Grafana Tempo, or any OTLP-compatible collector.

pub mod classifier;
pub mod config;
pub mod manager;
pub mod telemetry;

pub use classifier::{classify, estimate_importance};
pub use config::{ConfigError, EmbedderConfig, MnemosConfig};
pub use manager::MemoryManager;
