//! # arrclient
//!
//! Blocking client for the configuration APIs of Sonarr, Radarr, Lidarr,
//! Readarr and Whisparr.
//!
//! Resources are exchanged as raw JSON; the [`Dialect`] table carries the
//! few differences between the five servers.
//!
//! ## Example
//!
//! ```no_run
//! use arrclient::backend::Backend;
//! use arrclient::backend::http::HttpBackend;
//! use arrclient::{Dialect, ResourceKind};
//!
//! let backend = HttpBackend::new(Dialect::Radarr, "http://localhost:7878", "secret");
//! let status = backend.system_status().unwrap();
//! println!("{} {}", status.app_name, status.version);
//!
//! for profile in backend.list(ResourceKind::QualityProfile).unwrap() {
//!     println!("{}", profile["name"]);
//! }
//! ```
//!
//! ## Supported Dialects
//!
//! | Dialect  | API | Metadata profiles | Root-folder extras |
//! |----------|-----|-------------------|--------------------|
//! | Sonarr   | v3  | no                | no                 |
//! | Radarr   | v3  | no                | no                 |
//! | Lidarr   | v1  | yes               | yes                |
//! | Readarr  | v1  | yes               | yes                |
//! | Whisparr | v3  | no                | no                 |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod types;

pub use backend::http::HttpBackend;
pub use backend::{Backend, MASK, MockBackend};
pub use error::{Error, ErrorCategory, Result};
pub use types::{Dialect, ResourceKind, SchemaShape, SystemStatus, Tag};
