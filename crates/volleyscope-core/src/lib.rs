// Library root: re-exports all modules so the CLI, integration tests and
// external consumers can access the crate's public API.

pub mod aggregate;
pub mod archetype;
pub mod config;
pub mod dataset;
pub mod features;
pub mod model;
pub mod pca;
pub mod report;
pub mod similarity;
