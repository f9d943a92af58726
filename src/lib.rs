//! Roadwatch: road-surface defect mapping from phone IMU/GPS traces.
//!
//! ## Architecture
//!
//! - **Pipeline**: per-trip signal processing — normalization, gravity
//!   separation, stability classification, impulse detection, micro-
//!   clustering, roughness segmentation
//! - **Clusters**: on-demand cross-trip aggregation with a continuous
//!   confidence and priority model
//! - **API**: axum HTTP surface for trip ingestion and cluster queries
//! - **Storage**: PostgreSQL persistence plus the trip-processing job queue
//! - **Worker**: background job loop, one job = one trip

pub mod api;
pub mod clusters;
pub mod config;
pub mod geo;
pub mod pipeline;
pub mod stats;
pub mod storage;
pub mod types;
pub mod worker;

// Re-export the core domain types
pub use types::{
    Detection, DetectionPoint, Likelihood, MountState, PotholeCluster, RawSample, RoughSegment,
    SampleRow, TripCell, TripOutputs, TripPayload, WindowClass,
};

pub use config::AppConfig;
