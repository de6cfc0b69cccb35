//! Contracts consumed by the I/O orchestration engine
//!
//! Concrete format support lives outside this crate; the engine only needs
//! the trait surface: factories advertising formats, readers with a strict
//! parse-then-graft lifecycle, writers with a gather-then-serialise
//! lifecycle, and the document aggregate that accumulates entities.

use cadio_core::{Format, Messenger, Result, TaskProgress};
use std::path::Path;
use std::sync::Arc;

/// Property group handed to readers and writers before they run
///
/// Free-form JSON mapping so parameter providers can carry format-specific
/// knobs without this crate knowing their schema.
pub type PropertyGroup = serde_json::Map<String, serde_json::Value>;

/// Opaque reference to a top-level entity inside a document
///
/// Produced by [`Reader::transfer`], consumed by post-processing and
/// [`Document::add_entity_tree_node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle(pub u64);

/// Selection handed to writers for export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ApplicationItem {
    /// Entity this item refers to
    pub entity: EntityHandle,
}

impl From<EntityHandle> for ApplicationItem {
    #[inline]
    fn from(entity: EntityHandle) -> Self {
        Self { entity }
    }
}

/// The shared aggregate imports feed into
///
/// Not assumed thread-safe: the orchestrator mutates it on one thread only,
/// and readers hold it exclusively for the duration of their transfer.
pub trait Document {
    /// Record a transferred entity in the document's model tree
    fn add_entity_tree_node(&mut self, entity: EntityHandle);
}

/// Source of per-format reader parameters
pub trait ParametersProvider: Send + Sync {
    /// Parameters to apply to readers of `format`, if any are configured
    fn find_reader_parameters(&self, format: Format) -> Option<PropertyGroup>;
}

/// Per-file import object with a parse-then-graft lifecycle
///
/// [`Reader::read_file`] is the parse-only step and must not touch the shared
/// document; it is the stage the orchestrator parallelises across files.
/// [`Reader::transfer`] grafts the parsed result into one document and runs
/// strictly serialised. A reader is single-use: one file, then discarded.
pub trait Reader: Send {
    /// Apply reader parameters before [`Reader::read_file`]
    fn apply_properties(&mut self, _params: &PropertyGroup) {}

    /// Install the diagnostics sink this reader should report through
    fn set_messenger(&mut self, _messenger: Arc<dyn Messenger>) {}

    /// Parse `filepath`, reporting progress and polling cancellation
    fn read_file(&mut self, filepath: &Path, progress: &TaskProgress) -> Result<()>;

    /// Graft the parsed result into `document`
    ///
    /// Returns the transferred top-level entities; an empty sequence means
    /// the transfer failed. Only called after a successful
    /// [`Reader::read_file`] on the same reader.
    fn transfer(
        &mut self,
        document: &mut dyn Document,
        progress: &TaskProgress,
    ) -> Vec<EntityHandle>;
}

/// Per-file export object with a gather-then-serialise lifecycle
pub trait Writer: Send {
    /// Install the diagnostics sink this writer should report through
    fn set_messenger(&mut self, _messenger: Arc<dyn Messenger>) {}

    /// Apply writer parameters before [`Writer::transfer`]
    fn apply_properties(&mut self, _params: &PropertyGroup) {}

    /// Gather `items` into the writer's in-memory model
    fn transfer(&mut self, items: &[ApplicationItem], progress: &TaskProgress) -> Result<()>;

    /// Serialise the gathered model to `filepath`
    fn write_file(&mut self, filepath: &Path, progress: &TaskProgress) -> Result<()>;
}

/// Factory constructing readers for a finite set of formats
///
/// Registered once into the system registry; the registry owns it for the
/// program duration while each created reader is exclusively owned by the
/// import task that requested it.
pub trait FactoryReader: Send + Sync {
    /// Formats this factory can construct readers for
    fn formats(&self) -> &[Format];

    /// Construct a reader for `format`, or `None` when unsupported
    fn create(&self, format: Format) -> Option<Box<dyn Reader>>;

    /// Check if this factory advertises `format`
    fn supports(&self, format: Format) -> bool {
        self.formats().contains(&format)
    }
}

/// Factory constructing writers for a finite set of formats
pub trait FactoryWriter: Send + Sync {
    /// Formats this factory can construct writers for
    fn formats(&self) -> &[Format];

    /// Construct a writer for `format`, or `None` when unsupported
    fn create(&self, format: Format) -> Option<Box<dyn Writer>>;

    /// Check if this factory advertises `format`
    fn supports(&self, format: Format) -> bool {
        self.formats().contains(&format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopReader;

    impl Reader for NoopReader {
        fn read_file(&mut self, _filepath: &Path, _progress: &TaskProgress) -> Result<()> {
            Ok(())
        }

        fn transfer(
            &mut self,
            document: &mut dyn Document,
            _progress: &TaskProgress,
        ) -> Vec<EntityHandle> {
            let entity = EntityHandle(1);
            document.add_entity_tree_node(entity);
            vec![entity]
        }
    }

    struct MeshFactory;

    impl FactoryReader for MeshFactory {
        fn formats(&self) -> &[Format] {
            &[Format::Stl, Format::Obj]
        }

        fn create(&self, format: Format) -> Option<Box<dyn Reader>> {
            self.supports(format).then(|| Box::new(NoopReader) as Box<dyn Reader>)
        }
    }

    #[derive(Default)]
    struct VecDocument(Vec<EntityHandle>);

    impl Document for VecDocument {
        fn add_entity_tree_node(&mut self, entity: EntityHandle) {
            self.0.push(entity);
        }
    }

    #[test]
    fn test_factory_supports_advertised_formats() {
        let factory = MeshFactory;
        assert!(factory.supports(Format::Stl));
        assert!(factory.supports(Format::Obj));
        assert!(!factory.supports(Format::Step));
        assert!(!factory.supports(Format::Unknown));
    }

    #[test]
    fn test_factory_create_declines_unsupported() {
        let factory = MeshFactory;
        assert!(factory.create(Format::Stl).is_some());
        assert!(factory.create(Format::Iges).is_none());
    }

    #[test]
    fn test_reader_lifecycle_against_document() {
        let factory = MeshFactory;
        let mut reader = factory.create(Format::Obj).unwrap();
        let progress = TaskProgress::new();
        let mut document = VecDocument::default();

        reader.read_file(Path::new("mesh.obj"), &progress).unwrap();
        let entities = reader.transfer(&mut document, &progress);
        assert_eq!(entities, vec![EntityHandle(1)]);
        assert_eq!(document.0, vec![EntityHandle(1)]);
    }

    #[test]
    fn test_application_item_from_entity() {
        let item = ApplicationItem::from(EntityHandle(7));
        assert_eq!(item.entity, EntityHandle(7));
    }

    #[test]
    fn test_default_property_and_messenger_hooks_are_noops() {
        let mut reader = NoopReader;
        reader.apply_properties(&PropertyGroup::new());
        reader.set_messenger(cadio_core::NullMessenger::instance());
    }
}
