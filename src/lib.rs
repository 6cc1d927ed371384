//! Threat-actor intelligence aggregation: per-source adapters feed a shared
//! extraction pipeline, and the aggregator merges what they find.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod export;
pub mod fetch;
pub mod model;
pub mod parser;
pub mod rank;
pub mod report;
pub mod sources;
pub mod variants;
