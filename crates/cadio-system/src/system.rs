//! Registry of probers and reader/writer factories, plus the probe dispatcher
//!
//! A [`System`] is populated once at startup and read-only afterwards; the
//! import and export orchestrators only ever query it. Probers run in
//! registration order and the first decisive answer wins; factory lookup is
//! first-match over registration order as well, so earlier registrations
//! shadow later ones for the formats they share.

use crate::traits::{FactoryReader, FactoryWriter, Reader, Writer};
use cadio_core::probe::{FormatProbe, FormatProbeInput, PROBE_WINDOW_SIZE};
use cadio_core::{probe_iges, probe_obj, probe_occbrep, probe_step, probe_stl, Format};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Process-wide registry of format probers and reader/writer factories
///
/// Invariants: the same factory (pointer-equal `Arc`) is registered at most
/// once, and each advertised format appears in the respective known-format
/// list at most once, in first-registration order. That order drives the
/// deterministic suffix fallback of [`System::probe_format`].
#[derive(Default)]
pub struct System {
    format_probes: Vec<FormatProbe>,
    factory_readers: Vec<Arc<dyn FactoryReader>>,
    factory_writers: Vec<Arc<dyn FactoryWriter>>,
    reader_formats: Vec<Format>,
    writer_formats: Vec<Format>,
}

impl System {
    /// Empty registry with no probers or factories
    #[must_use = "creates an empty registry"]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the predefined content probers
    #[must_use = "creates a registry with the predefined probers"]
    pub fn with_predefined_probes() -> Self {
        let mut system = Self::new();
        system.add_predefined_format_probes();
        system
    }

    /// Register the predefined probers in their canonical order:
    /// STEP, IGES, OCC B-rep, STL, OBJ
    pub fn add_predefined_format_probes(&mut self) {
        self.add_format_probe(probe_step);
        self.add_format_probe(probe_iges);
        self.add_format_probe(probe_occbrep);
        self.add_format_probe(probe_stl);
        self.add_format_probe(probe_obj);
    }

    /// Append a prober; registration order is the probing order
    pub fn add_format_probe(
        &mut self,
        probe: impl Fn(&FormatProbeInput<'_>) -> Format + Send + Sync + 'static,
    ) {
        self.format_probes.push(Box::new(probe));
    }

    /// Register a reader factory
    ///
    /// A factory already present (pointer-equal) is ignored. Each format the
    /// factory advertises is recorded in the known reader formats once.
    pub fn add_factory_reader(&mut self, factory: Arc<dyn FactoryReader>) {
        if self
            .factory_readers
            .iter()
            .any(|registered| Arc::ptr_eq(registered, &factory))
        {
            return;
        }

        for &format in factory.formats() {
            if !self.reader_formats.contains(&format) {
                self.reader_formats.push(format);
            }
        }
        self.factory_readers.push(factory);
    }

    /// Register a writer factory
    ///
    /// Same idempotence and format-recording rules as
    /// [`System::add_factory_reader`].
    pub fn add_factory_writer(&mut self, factory: Arc<dyn FactoryWriter>) {
        if self
            .factory_writers
            .iter()
            .any(|registered| Arc::ptr_eq(registered, &factory))
        {
            return;
        }

        for &format in factory.formats() {
            if !self.writer_formats.contains(&format) {
                self.writer_formats.push(format);
            }
        }
        self.factory_writers.push(factory);
    }

    /// First registered reader factory advertising `format`
    #[must_use = "returns the matching reader factory"]
    pub fn find_factory_reader(&self, format: Format) -> Option<&Arc<dyn FactoryReader>> {
        self.factory_readers
            .iter()
            .find(|factory| factory.supports(format))
    }

    /// First registered writer factory advertising `format`
    #[must_use = "returns the matching writer factory"]
    pub fn find_factory_writer(&self, format: Format) -> Option<&Arc<dyn FactoryWriter>> {
        self.factory_writers
            .iter()
            .find(|factory| factory.supports(format))
    }

    /// Construct a reader for `format` through the first matching factory
    #[must_use = "the created reader performs the import"]
    pub fn create_reader(&self, format: Format) -> Option<Box<dyn Reader>> {
        self.find_factory_reader(format)
            .and_then(|factory| factory.create(format))
    }

    /// Construct a writer for `format` through the first matching factory
    #[must_use = "the created writer performs the export"]
    pub fn create_writer(&self, format: Format) -> Option<Box<dyn Writer>> {
        self.find_factory_writer(format)
            .and_then(|factory| factory.create(format))
    }

    /// Formats some registered reader factory advertises, in registration
    /// order
    #[inline]
    #[must_use = "returns the known reader formats"]
    pub fn reader_formats(&self) -> &[Format] {
        &self.reader_formats
    }

    /// Formats some registered writer factory advertises, in registration
    /// order
    #[inline]
    #[must_use = "returns the known writer formats"]
    pub fn writer_formats(&self) -> &[Format] {
        &self.writer_formats
    }

    /// Determine the format of the file at `filepath`
    ///
    /// Opens the file once, reads the probing window (up to
    /// [`PROBE_WINDOW_SIZE`] bytes, zero-filled for shorter files), queries
    /// the file size and runs every registered prober in order; the first
    /// non-Unknown answer wins. When no prober decides, or the file cannot be
    /// opened, falls back to matching the path's final extension
    /// (ASCII case-insensitive, without the leading dot) against the suffix
    /// lists of the known reader formats and then the known writer formats,
    /// both in registration order.
    ///
    /// Never fails: undecidable inputs answer [`Format::Unknown`]. No state
    /// is mutated.
    #[must_use = "returns the probed format"]
    pub fn probe_format(&self, filepath: &Path) -> Format {
        if let Ok(mut file) = File::open(filepath) {
            let mut window = [0u8; PROBE_WINDOW_SIZE];
            if read_window(&mut file, &mut window).is_ok() {
                let hint_full_size = file.metadata().map_or(0, |meta| meta.len());
                let input = FormatProbeInput {
                    filepath,
                    contents_prefix: &window,
                    hint_full_size,
                };
                for probe in &self.format_probes {
                    let format = probe(&input);
                    if format != Format::Unknown {
                        return format;
                    }
                }
            }
        }

        // Guess from the file suffix
        let suffix = filepath
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        if !suffix.is_empty() {
            for &format in &self.reader_formats {
                if format.matches_file_suffix(suffix) {
                    return format;
                }
            }
            for &format in &self.writer_formats {
                if format.matches_file_suffix(suffix) {
                    return format;
                }
            }
        }

        Format::Unknown
    }
}

impl std::fmt::Debug for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("System")
            .field("format_probes", &self.format_probes.len())
            .field("factory_readers", &self.factory_readers.len())
            .field("factory_writers", &self.factory_writers.len())
            .field("reader_formats", &self.reader_formats)
            .field("writer_formats", &self.writer_formats)
            .finish()
    }
}

/// Fill `window` from the start of `file`, stopping early at end of file
fn read_window(file: &mut File, window: &mut [u8]) -> std::io::Result<()> {
    let mut filled = 0;
    while filled < window.len() {
        match file.read(&mut window[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
