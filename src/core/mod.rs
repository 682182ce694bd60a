//! Core domain models for Pipeline
//!
//! This module defines the pipeline and step structures compiled from the
//! YAML configuration, ahead of launch planning.

pub mod config;
pub mod pipeline;
pub mod step;

pub use pipeline::*;
pub use step::*;
