//! # ClusterSeeker
//!
//! Inventories very large, network-mounted directory trees on a SLURM
//! cluster. Each top-level folder becomes one scan job; a single merge job,
//! gated on every accepted scan job through an `afterok` dependency,
//! concatenates the results and writes per-extension file reports.
//!
//! ## Core Components
//!
//! - [`paths`]: drive-letter / network-mount path translation
//! - [`scanner`]: exclusion-aware directory enumeration
//! - [`batch`]: fixed-size partitioning and partition files
//! - [`jobs`]: job descriptors, script rendering and the scheduler seam
//! - [`orchestrator`]: the submission run and its state machine
//! - [`aggregate`]: merge step, metadata extraction and report tables
//! - [`config`]: layered application config and the JSON job config
//! - [`error`]: error taxonomy
//! - [`types`]: shared data types

pub mod aggregate;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod orchestrator;
pub mod paths;
pub mod scanner;
pub mod types;

#[cfg(test)]
mod tests;
