//! Wayfare resolves place concepts against several travel data providers and
//! merges what they return into one canonical record per place.
//!
//! Pipeline, leaf first: [`providers`] fetch raw records, [`resolution`]
//! fans out per concept, [`matching`] groups records that describe the same
//! place, [`consolidation`] merges a group, and [`services`] drives a batch
//! through all of it. [`api`] exposes the batch over HTTP.

pub mod api;
pub mod cache;
pub mod config;
pub mod consolidation;
pub mod error;
pub mod llm;
pub mod matching;
pub mod models;
pub mod providers;
pub mod resolution;
pub mod services;

pub use error::{Result, WayfareError};
