//! Batch import example
//!
//! Probes each input file, imports them all into one in-memory document and
//! prints a per-file diagnostic summary. Reads run concurrently; transfers
//! drain serially into the document.
//!
//! Run with:
//! ```bash
//! cargo run --example batch_import -- path/to/models/*.step
//! ```

use cadio_core::{Format, MessageType, Messenger, MessengerByCallback, TaskProgress};
use cadio_system::{Document, EntityHandle, FactoryReader, Reader, System};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Document that just counts what lands in its model tree
#[derive(Default)]
struct TallyDocument {
    entities: Vec<EntityHandle>,
}

impl Document for TallyDocument {
    fn add_entity_tree_node(&mut self, entity: EntityHandle) {
        self.entities.push(entity);
    }
}

/// Reader that validates the file is loadable and yields one entity
///
/// Stands in for real format readers, which live in their own crates.
struct PlaceholderReader {
    next_entity: Arc<AtomicU64>,
}

impl Reader for PlaceholderReader {
    fn read_file(
        &mut self,
        filepath: &Path,
        progress: &TaskProgress,
    ) -> cadio_core::Result<()> {
        let contents = std::fs::read(filepath)?;
        if contents.is_empty() {
            return Err(cadio_core::Error::read(filepath, "empty file"));
        }
        progress.set_value(100);
        Ok(())
    }

    fn transfer(
        &mut self,
        _document: &mut dyn Document,
        progress: &TaskProgress,
    ) -> Vec<EntityHandle> {
        progress.set_value(100);
        vec![EntityHandle(self.next_entity.fetch_add(1, Ordering::SeqCst))]
    }
}

struct PlaceholderFactory {
    next_entity: Arc<AtomicU64>,
}

impl FactoryReader for PlaceholderFactory {
    fn formats(&self) -> &[Format] {
        &[
            Format::Step,
            Format::Iges,
            Format::OccBrep,
            Format::Stl,
            Format::Obj,
        ]
    }

    fn create(&self, format: Format) -> Option<Box<dyn Reader>> {
        self.supports(format).then(|| {
            Box::new(PlaceholderReader {
                next_entity: Arc::clone(&self.next_entity),
            }) as Box<dyn Reader>
        })
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <path-to-models...>", args[0]);
        eprintln!("\nExample:");
        eprintln!("  {} part.step bracket.stl mesh.obj", args[0]);
        std::process::exit(1);
    }
    let input_paths: Vec<PathBuf> = args[1..].iter().map(PathBuf::from).collect();

    let mut system = System::with_predefined_probes();
    system.add_factory_reader(Arc::new(PlaceholderFactory {
        next_entity: Arc::new(AtomicU64::new(1)),
    }));
    let system = Arc::new(system);

    // Show what the prober makes of each input before importing
    println!("=== Probed formats ===");
    for path in &input_paths {
        println!("  {} -> {}", path.display(), system.probe_format(path));
    }
    println!();

    let messenger = Arc::new(MessengerByCallback::new(|msg_type, text| {
        if msg_type == MessageType::Error {
            eprintln!("✗ {text}");
        }
    }));

    let progress = TaskProgress::new();
    let mut document = TallyDocument::default();
    let start = Instant::now();

    let ok = system
        .import_in_document()
        .target_document(&mut document)
        .with_filepaths(input_paths.iter().cloned())
        .with_messenger(messenger as Arc<dyn Messenger>)
        .with_task_progress(&progress)
        .execute();

    let elapsed = start.elapsed();
    println!("=== Import Summary ===");
    println!("  Files: {}", input_paths.len());
    println!("  Entities attached: {}", document.entities.len());
    println!("  All files succeeded: {ok}");
    println!("  Total time: {elapsed:?}");
}
