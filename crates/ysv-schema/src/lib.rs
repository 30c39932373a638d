//! # ysv-schema: Schema Resolution and Validation Engine
//!
//! Everything between a schema identifier and a list of diagnostics:
//!
//! - [`paths`]: identifier classification and resolution to a
//!   [`SchemaLocation`] (relative, absolute, Windows drive, URI).
//! - [`fetch`]: [`SchemaFetcher`] reads local schemas and fetches remote
//!   ones with `reqwest`.
//! - [`registry`]: the glob-pattern [`SchemaRegistry`] with priorities.
//! - [`document`]: [`TextDocument`] and the position-tracking YAML parser.
//! - [`service`]: [`SchemaService`], the compile cache and the
//!   `jsonschema`-backed [`ValidationEngine`] / [`ExplanationProvider`].
//!
//! ## Crate Policy
//!
//! - Schema load failures are diagnostics, not errors. Only configuration
//!   problems (unsupported scheme, malformed pattern) surface as
//!   [`SchemaError`] from registration.
//! - No locks are held across `.await` points.

pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod explain;
pub mod fetch;
pub mod paths;
pub mod registry;
pub mod scalar;
pub mod service;
pub mod workspace;

pub use config::FetchConfig;
pub use document::{ParsedDocument, ParsedYaml, TextDocument};
pub use engine::{ExplanationProvider, ValidationEngine};
pub use error::SchemaError;
pub use fetch::SchemaFetcher;
pub use paths::{resolve_identifier, SchemaLocation};
pub use registry::SchemaRegistry;
pub use service::{SchemaService, ServiceOptions};
pub use workspace::{DocumentRelativeContext, RootRelativeContext, WorkspaceContext};
