//! # cadio-system
//!
//! The I/O orchestration engine of cadio: a registry of pluggable format
//! readers and writers, a content/suffix format-probe dispatcher, a minimal
//! task scheduler, and import/export orchestrators.
//!
//! ## Shape of an import
//!
//! ```no_run
//! use cadio_system::{Document, EntityHandle, System};
//! use std::sync::Arc;
//!
//! struct MyDocument(Vec<EntityHandle>);
//!
//! impl Document for MyDocument {
//!     fn add_entity_tree_node(&mut self, entity: EntityHandle) {
//!         self.0.push(entity);
//!     }
//! }
//!
//! let system = Arc::new(System::with_predefined_probes());
//! // system.add_factory_reader(...) for the formats the application ships
//!
//! let mut document = MyDocument(Vec::new());
//! let ok = system
//!     .import_in_document()
//!     .target_document(&mut document)
//!     .with_filepaths(["part.step", "bracket.stl"])
//!     .execute();
//! # let _ = ok;
//! ```
//!
//! Reads for distinct files run concurrently on the worker pool; transfers
//! into the shared document are drained strictly one at a time on the calling
//! thread. Per-file failures are reported through the messenger and do not
//! abort the other files.
//!
//! ## Module organization
//!
//! - [`system`] — prober/factory registry and the probe dispatcher
//! - [`traits`] — reader/writer/factory/document contracts
//! - [`task`] — minimal scheduler backing the parallel read stage
//! - [`import`] — import orchestrator and its fluent builder
//! - [`export`] — export orchestrator and its fluent builder

pub mod export;
pub mod import;
pub mod system;
pub mod task;
pub mod traits;

pub use export::{ExportApplicationItems, ExportArgs};
pub use import::{EntityPostProcess, EntityPostProcessRequiredIf, ImportArgs, ImportInDocument};
pub use system::System;
pub use task::{TaskAutoDestroy, TaskId, TaskManager};
pub use traits::{
    ApplicationItem, Document, EntityHandle, FactoryReader, FactoryWriter, ParametersProvider,
    PropertyGroup, Reader, Writer,
};
