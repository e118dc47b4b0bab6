#![forbid(unsafe_code)]
//! Asset build orchestrator for hybrid web/mobile applications.
//!
//! `kiln` wires style compilation, template rendering, image optimization
//! and static copies into an explicit task graph, and keeps the output live
//! through a dev server with reload notification and a filesystem watcher.

pub mod config;
pub mod error;
pub mod graph;
pub mod io;
pub mod manifest;
pub mod paths;
pub mod pipeline;
pub mod serve;
pub mod stages;
pub mod tasks;
pub mod tools;
pub mod watch;

pub use crate::config::{BuildConfig, Product};
pub use crate::error::{GraphError, KilnError, ManifestError, WatchError};
pub use crate::graph::{Registry, RunReport, TaskContext, TaskGraph, TaskResult};
pub use crate::paths::{AssetKind, PathConfig};
pub use crate::pipeline::{FileEntry, Pipeline, PipelineReport, Stage, StageContext};
