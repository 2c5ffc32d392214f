//! Transit Tracking Library
//!
//! A real-time fleet tracking engine: in-memory vehicle and route state,
//! geospatial proximity queries, arrival estimation, a topic-based broadcast
//! router, and a synthetic motion generator for exercising the pipeline.

pub mod tracking;
