//! Data models shared across the pipeline.

pub mod config;
pub mod customer;
pub mod document;
pub mod grid;
pub mod posting;
