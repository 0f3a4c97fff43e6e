//! `mooltah_core` is the core library for the `mooltah` command line tool. It
//! loads variables from YAML, JSON, TOML, and `key=value` files, merges them
//! into a single namespace, and renders a template against that namespace
//! with one of several interchangeable backends.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Variable files
//!   → Format dispatch (extension → YAML / JSON / TOML / key=value decoder)
//!   → Merge engine (left to right, last file wins, shallow)
//!   → Renderer (jinja2 | native | external helper)
//!   → Output file
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Optional `mooltah.toml` defaults and the resolved
//!   [`MooltahConfig`] for an invocation.
//! - [`render`]: The [`Renderer`] trait and its three backends.
//!
//! ## Key Types
//!
//! - [`VariableSpace`]: The merged, key-sorted variable namespace.
//! - [`SourceFile`] / [`SourceFormat`]: A variable file and its decoder.
//! - [`RenderRequest`] / [`RenderOutcome`]: Input and output of a backend.
//! - [`MooltahError`]: Every failure the pipeline can report.
//!
//! ## Merge Semantics
//!
//! Files are merged in the order given and the last file wins on conflicting
//! keys. Only top-level keys are merged: a nested mapping defined in a later
//! file replaces the earlier mapping under the same key as a whole.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mooltah_core::Backend;
//! use mooltah_core::ExternalSettings;
//! use mooltah_core::MooltahConfig;
//! use mooltah_core::run;
//! use std::path::PathBuf;
//!
//! let config = MooltahConfig {
//!     sources: vec![PathBuf::from("defaults.yaml"), PathBuf::from("local.kv")],
//!     template: PathBuf::from("nginx.conf.j2"),
//!     output: PathBuf::from("nginx.conf"),
//!     backend: Backend::Jinja,
//!     external: ExternalSettings::default(),
//! };
//!
//! let summary = run(&config)?;
//! println!("wrote {}", summary.output.display());
//! # Ok::<(), mooltah_core::MooltahError>(())
//! ```

pub use config::*;
pub use engine::*;
pub use error::*;
pub use key_value::*;
pub use merge::*;
pub use render::Backend;
pub use render::RenderOutcome;
pub use render::RenderPhase;
pub use render::RenderRequest;
pub use render::Renderer;
pub use render::render_to_destination;
pub use render::render_with;
pub use render::renderer_for;
pub use render::write_output;
pub use source::*;
pub use variables::*;

pub mod config;
mod engine;
#[allow(unused_assignments)]
mod error;
mod key_value;
mod merge;
pub mod render;
mod source;
mod variables;
