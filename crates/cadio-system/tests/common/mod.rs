//! Shared fixtures for orchestration tests
//!
//! The mock reader derives its behavior from the file name so one factory
//! serves every scenario: a stem containing `readfail` fails the parse step,
//! `emptytransfer` yields an empty transfer. The shared [`Observations`]
//! record lets tests check the concurrency contract (no overlapping
//! transfers) and the lifecycle contract (no transfer without a prior
//! successful read).

use cadio_core::{Error, Format, MessageType, Messenger, Result, TaskProgress};
use cadio_system::{Document, EntityHandle, FactoryReader, PropertyGroup, Reader};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

/// Messenger collecting everything it is told
#[derive(Default)]
pub struct RecordingMessenger {
    pub messages: Mutex<Vec<(MessageType, String)>>,
}

impl RecordingMessenger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn errors(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(msg_type, _)| *msg_type == MessageType::Error)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

impl Messenger for RecordingMessenger {
    fn emit_message(&self, msg_type: MessageType, text: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((msg_type, text.to_string()));
    }
}

/// Document that records attached entities in order
#[derive(Default)]
pub struct VecDocument(pub Vec<EntityHandle>);

impl Document for VecDocument {
    fn add_entity_tree_node(&mut self, entity: EntityHandle) {
        self.0.push(entity);
    }
}

/// Cross-reader observations of one import run
#[derive(Default)]
pub struct Observations {
    transfers_in_flight: AtomicUsize,
    pub transfer_overlap_detected: AtomicBool,
    pub transfers_started: AtomicUsize,
    pub properties_applied: AtomicUsize,
    next_entity: AtomicU64,
}

pub struct MockReader {
    observations: Arc<Observations>,
    read_delay: Duration,
    transfer_delay: Duration,
    read_succeeded: bool,
    filepath: Option<PathBuf>,
}

impl Reader for MockReader {
    fn apply_properties(&mut self, _params: &PropertyGroup) {
        self.observations
            .properties_applied
            .fetch_add(1, Ordering::SeqCst);
    }

    fn read_file(&mut self, filepath: &Path, progress: &TaskProgress) -> Result<()> {
        thread::sleep(self.read_delay);
        if file_stem_contains(filepath, "readfail") {
            return Err(Error::read(filepath, "simulated parse failure"));
        }
        self.read_succeeded = true;
        self.filepath = Some(filepath.to_path_buf());
        progress.set_value(100);
        Ok(())
    }

    fn transfer(
        &mut self,
        _document: &mut dyn Document,
        progress: &TaskProgress,
    ) -> Vec<EntityHandle> {
        assert!(
            self.read_succeeded,
            "transfer invoked without a prior successful read_file"
        );
        if self
            .filepath
            .as_deref()
            .is_some_and(|path| file_stem_contains(path, "emptytransfer"))
        {
            return Vec::new();
        }
        self.observations
            .transfers_started
            .fetch_add(1, Ordering::SeqCst);

        let previously_in_flight = self
            .observations
            .transfers_in_flight
            .fetch_add(1, Ordering::SeqCst);
        if previously_in_flight != 0 {
            self.observations
                .transfer_overlap_detected
                .store(true, Ordering::SeqCst);
        }
        thread::sleep(self.transfer_delay);
        self.observations
            .transfers_in_flight
            .fetch_sub(1, Ordering::SeqCst);
        progress.set_value(100);

        let entity = EntityHandle(self.observations.next_entity.fetch_add(1, Ordering::SeqCst));
        vec![entity]
    }
}

pub struct MockReaderFactory {
    pub formats: Vec<Format>,
    pub observations: Arc<Observations>,
    pub read_delay: Duration,
    pub transfer_delay: Duration,
}

impl MockReaderFactory {
    pub fn new(formats: &[Format]) -> Self {
        Self {
            formats: formats.to_vec(),
            observations: Arc::new(Observations::default()),
            read_delay: Duration::from_millis(10),
            transfer_delay: Duration::from_millis(5),
        }
    }
}

impl FactoryReader for MockReaderFactory {
    fn formats(&self) -> &[Format] {
        &self.formats
    }

    fn create(&self, format: Format) -> Option<Box<dyn Reader>> {
        self.supports(format).then(|| {
            Box::new(MockReader {
                observations: Arc::clone(&self.observations),
                read_delay: self.read_delay,
                transfer_delay: self.transfer_delay,
                read_succeeded: false,
                filepath: None,
            }) as Box<dyn Reader>
        })
    }
}

fn file_stem_contains(filepath: &Path, needle: &str) -> bool {
    filepath
        .file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| stem.contains(needle))
}

/// Write a file whose content the STEP prober accepts
pub fn write_step_file(dir: &TempDir, name: &str) -> PathBuf {
    write_file(
        dir,
        name,
        b"ISO-10303-21;\nHEADER;\nFILE_DESCRIPTION(('mock part'),'2;1');\nENDSEC;\n",
    )
}

/// Write a file no prober or suffix rule matches
pub fn write_unknown_file(dir: &TempDir, name: &str) -> PathBuf {
    write_file(dir, name, b"opaque payload with no recognisable structure")
}

pub fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = File::create(&path).unwrap();
    file.write_all(contents).unwrap();
    path
}
