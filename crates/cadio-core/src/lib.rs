//! # cadio-core
//!
//! Core building blocks of the cadio CAD I/O engine: format identity, content
//! probers, the levelled messenger sink, hierarchical task progress and the
//! shared error types.
//!
//! The companion crate `cadio-system` assembles these into a registry of
//! reader/writer factories plus import/export orchestrators.
//!
//! ## Quick look
//!
//! ```
//! use cadio_core::{Format, FormatProbeInput, probe_step};
//! use std::path::Path;
//!
//! let contents = b"   ISO-10303-21 ; HEADER;";
//! let input = FormatProbeInput {
//!     filepath: Path::new("part.step"),
//!     contents_prefix: contents,
//!     hint_full_size: contents.len() as u64,
//! };
//! assert_eq!(probe_step(&input), Format::Step);
//! ```
//!
//! ## Module organization
//!
//! - [`mod@format`] — the [`Format`] tag and canonical suffix lists
//! - [`probe`] — pure content probers over a bounded byte window
//! - [`messenger`] — levelled diagnostics with a null process-wide sink
//! - [`progress`] — hierarchical, cancellable progress nodes
//! - [`error`] — error types shared by reader/writer implementations

pub mod error;
pub mod format;
pub mod messenger;
pub mod probe;
pub mod progress;

pub use error::{Error, Result};
pub use format::Format;
pub use messenger::{LogMessenger, MessageType, Messenger, MessengerByCallback, NullMessenger};
pub use probe::{
    probe_iges, probe_obj, probe_occbrep, probe_step, probe_stl, FormatProbe, FormatProbeInput,
    PROBE_WINDOW_SIZE,
};
pub use progress::{AbortFlag, TaskProgress};
