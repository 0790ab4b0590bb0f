//! Unit tests for ClusterSeeker.
//!
//! ## Test Modules
//!
//! - **paths_tests**: path convention translation and list rewriting
//! - **scanner_tests**: enumeration, exclusion pruning and leaf filtering
//! - **batch_tests**: partition laws and partition files
//! - **jobs_tests**: script rendering, dependency expressions, acknowledgments
//! - **orchestrator_tests**: submission runs against a fake scheduler
//! - **aggregate_tests**: metadata extraction, report tables, merge step
//! - **config_tests**: layered config and job config validation
//! - **error_tests**: error messages and input validation
//!
//! Individual test modules can be run with:
//! ```bash
//! cargo test scanner_tests
//! ```

pub mod orchestrator_tests;
pub mod paths_tests;
