//! Import orchestration: parallel read, serialised transfer
//!
//! Importing many files pipelines two stages with different constraints. The
//! read stage parses a file without touching the shared document, so reads
//! for distinct files run concurrently on the worker pool. The transfer stage
//! grafts parsed results into the one target document, which is not
//! thread-safe; the orchestrator therefore drains completed reads one at a
//! time on the calling thread instead of locking the document. Entity
//! post-processing runs on that same thread right after each transfer, since
//! it operates on entities just attached.
//!
//! Failures are per file: a file that cannot be probed, read or transferred
//! is reported through the messenger and flips the operation result to
//! `false`, while the remaining files continue. Cancellation is cooperative
//! and checked between drain steps and before each transfer.

use crate::system::System;
use crate::task::{TaskAutoDestroy, TaskId, TaskManager};
use crate::traits::{Document, EntityHandle, ParametersProvider, Reader};
use cadio_core::{Format, Messenger, NullMessenger, TaskProgress};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Portion of a file's progress taken by the read stage, in percent
const READ_PORTION: f64 = 40.0;
/// Portion of a file's progress taken by the transfer stage, in percent
const TRANSFER_PORTION: f64 = 60.0;
/// Bounded wait per drain-loop candidate
const DRAIN_POLL: Duration = Duration::from_millis(25);

/// Per-entity post-process hook, run after each file's transfer
pub type EntityPostProcess = Arc<dyn Fn(EntityHandle, &TaskProgress) + Send + Sync>;
/// Predicate deciding whether post-processing applies to a format
pub type EntityPostProcessRequiredIf = Arc<dyn Fn(Format) -> bool + Send + Sync>;

/// Configuration record of one import operation
///
/// Usually assembled through the [`ImportInDocument`] builder; the record
/// itself is public so callers can also fill it directly.
pub struct ImportArgs<'a> {
    /// Document receiving the imported entities
    pub target_document: Option<&'a mut dyn Document>,
    /// Files to import, in caller order
    pub filepaths: Vec<PathBuf>,
    /// Optional source of per-format reader parameters
    pub parameters_provider: Option<Arc<dyn ParametersProvider>>,
    /// Diagnostics sink; the null messenger when absent
    pub messenger: Option<Arc<dyn Messenger>>,
    /// Root progress; a fresh detached root when absent
    pub progress: Option<&'a TaskProgress>,
    /// Per-entity hook run after transfer
    pub entity_post_process: Option<EntityPostProcess>,
    /// Predicate gating the post-process hook per format
    pub entity_post_process_required_if: Option<EntityPostProcessRequiredIf>,
    /// Percent of each file's progress reserved for post-processing
    pub entity_post_process_progress_size: i32,
    /// Step label shown while post-processing
    pub entity_post_process_progress_step: String,
}

impl Default for ImportArgs<'_> {
    fn default() -> Self {
        Self {
            target_document: None,
            filepaths: Vec::new(),
            parameters_provider: None,
            messenger: None,
            progress: None,
            entity_post_process: None,
            entity_post_process_required_if: None,
            entity_post_process_progress_size: 0,
            entity_post_process_progress_step: String::new(),
        }
    }
}

/// Fluent builder for an import operation
///
/// Obtained from [`System::import_in_document`]; every setter returns the
/// builder for chaining and [`ImportInDocument::execute`] runs the
/// synchronous orchestration.
pub struct ImportInDocument<'a> {
    system: Arc<System>,
    args: ImportArgs<'a>,
}

impl<'a> ImportInDocument<'a> {
    pub(crate) fn new(system: Arc<System>) -> Self {
        Self {
            system,
            args: ImportArgs::default(),
        }
    }

    /// Set the document receiving the imported entities
    pub fn target_document(&mut self, document: &'a mut dyn Document) -> &mut Self {
        self.args.target_document = Some(document);
        self
    }

    /// Import a single file
    pub fn with_filepath(&mut self, filepath: impl Into<PathBuf>) -> &mut Self {
        self.args.filepaths = vec![filepath.into()];
        self
    }

    /// Import a list of files
    pub fn with_filepaths<I, P>(&mut self, filepaths: I) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.args.filepaths = filepaths.into_iter().map(Into::into).collect();
        self
    }

    /// Provide per-format reader parameters
    pub fn with_parameters_provider(&mut self, provider: Arc<dyn ParametersProvider>) -> &mut Self {
        self.args.parameters_provider = Some(provider);
        self
    }

    /// Route diagnostics to `messenger`
    pub fn with_messenger(&mut self, messenger: Arc<dyn Messenger>) -> &mut Self {
        self.args.messenger = Some(messenger);
        self
    }

    /// Report progress into `progress` and observe its cancellation signal
    pub fn with_task_progress(&mut self, progress: &'a TaskProgress) -> &mut Self {
        self.args.progress = Some(progress);
        self
    }

    /// Run `post_process` for each transferred entity
    pub fn with_entity_post_process(
        &mut self,
        post_process: impl Fn(EntityHandle, &TaskProgress) + Send + Sync + 'static,
    ) -> &mut Self {
        self.args.entity_post_process = Some(Arc::new(post_process));
        self
    }

    /// Gate the post-process hook on `required_if` per probed format
    pub fn with_entity_post_process_required_if(
        &mut self,
        required_if: impl Fn(Format) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.args.entity_post_process_required_if = Some(Arc::new(required_if));
        self
    }

    /// Reserve `progress_size` percent per file for post-processing, labelled
    /// `progress_step`
    pub fn with_entity_post_process_info_progress(
        &mut self,
        progress_size: i32,
        progress_step: &str,
    ) -> &mut Self {
        self.args.entity_post_process_progress_size = progress_size;
        self.args.entity_post_process_progress_step = progress_step.to_string();
        self
    }

    /// Run the import; `true` only when every file succeeded
    pub fn execute(&mut self) -> bool {
        run_import(&self.system, std::mem::take(&mut self.args))
    }
}

impl System {
    /// Fluent builder for importing files into a document
    #[must_use = "the builder runs nothing until execute()"]
    pub fn import_in_document<'a>(self: &Arc<Self>) -> ImportInDocument<'a> {
        ImportInDocument::new(Arc::clone(self))
    }

    /// Run an import described by an already-filled [`ImportArgs`]
    pub fn import_in_document_with(self: &Arc<Self>, args: ImportArgs<'_>) -> bool {
        run_import(self, args)
    }
}

/// State shared between the orchestrator thread and read workers
struct ImportContext {
    system: Arc<System>,
    messenger: Arc<dyn Messenger>,
    parameters_provider: Option<Arc<dyn ParametersProvider>>,
    post_process: Option<EntityPostProcess>,
    post_process_required_if: Option<EntityPostProcessRequiredIf>,
    post_process_progress_size: i32,
    post_process_progress_step: String,
    all_ok: AtomicBool,
}

impl ImportContext {
    fn post_process_required(&self, format: Format) -> bool {
        match (&self.post_process, &self.post_process_required_if) {
            (Some(_), Some(required_if)) => required_if(format),
            _ => false,
        }
    }

    fn add_error(&self, filepath: &Path, reason: &str) {
        self.all_ok.store(false, Ordering::SeqCst);
        self.messenger.emit_error(&format!(
            "Error during import of '{}'\n{}",
            filepath.display(),
            reason
        ));
    }

    /// Scale a stage portion down when post-processing claims its share
    fn scaled_portion(&self, base: f64, format: Format) -> f64 {
        if self.post_process_required(format) {
            base * f64::from(100 - self.post_process_progress_size) / 100.0
        } else {
            base
        }
    }

    /// Probe, create and drive a reader through its parse step
    ///
    /// Runs on a worker thread in the multi-file case. Never touches the
    /// shared document.
    fn read_file_stage(
        &self,
        filepath: &Path,
        progress: &TaskProgress,
    ) -> Option<(Box<dyn Reader>, Format)> {
        let format = self.system.probe_format(filepath);
        if format == Format::Unknown {
            self.add_error(filepath, "Unknown format");
            return None;
        }

        let read_progress = progress.child(self.scaled_portion(READ_PORTION, format), "Reading file");
        let Some(mut reader) = self.system.create_reader(format) else {
            self.add_error(filepath, "No supporting reader");
            return None;
        };

        reader.set_messenger(Arc::clone(&self.messenger));
        if let Some(provider) = &self.parameters_provider {
            if let Some(parameters) = provider.find_reader_parameters(format) {
                reader.apply_properties(&parameters);
            }
        }

        match reader.read_file(filepath, &read_progress) {
            Ok(()) => Some((reader, format)),
            Err(err) => {
                log::warn!("reader failed on '{}': {err}", filepath.display());
                self.add_error(filepath, "File read problem");
                None
            }
        }
    }

    /// Graft a parsed reader into the document; calling thread only
    fn transfer_stage(
        &self,
        filepath: &Path,
        format: Format,
        reader: &mut dyn Reader,
        task_progress: &TaskProgress,
        document: &mut dyn Document,
    ) -> Vec<EntityHandle> {
        let transfer_progress = task_progress.child(
            self.scaled_portion(TRANSFER_PORTION, format),
            "Transferring file",
        );
        if transfer_progress.is_abort_requested() {
            return Vec::new();
        }

        let entities = reader.transfer(document, &transfer_progress);
        if entities.is_empty() {
            self.add_error(filepath, "File transfer problem");
        }
        entities
    }

    /// Run the per-entity hook over the transferred entities
    fn post_process_stage(
        &self,
        format: Format,
        entities: &[EntityHandle],
        task_progress: &TaskProgress,
    ) {
        if !self.post_process_required(format) {
            return;
        }
        let Some(post_process) = &self.post_process else {
            return;
        };

        let progress = task_progress.child(
            f64::from(self.post_process_progress_size),
            &self.post_process_progress_step,
        );
        if entities.is_empty() {
            return;
        }
        #[allow(clippy::cast_precision_loss)]
        let sub_portion = 100.0 / entities.len() as f64;
        for &entity in entities {
            let sub_progress = progress.child(sub_portion, "");
            post_process(entity, &sub_progress);
        }
    }
}

fn add_model_tree_entities(document: &mut dyn Document, entities: &[EntityHandle]) {
    for &entity in entities {
        document.add_entity_tree_node(entity);
    }
}

/// Outcome of one file's read stage, filled by the worker and drained by the
/// orchestrator thread
#[derive(Default)]
struct ReadSlot {
    reader: Option<Box<dyn Reader>>,
    format: Format,
    progress: Option<TaskProgress>,
    read_success: bool,
}

struct FileTask {
    filepath: PathBuf,
    task_id: TaskId,
    slot: Arc<Mutex<ReadSlot>>,
}

pub(crate) fn run_import(system: &Arc<System>, args: ImportArgs<'_>) -> bool {
    let ImportArgs {
        target_document,
        filepaths,
        parameters_provider,
        messenger,
        progress,
        entity_post_process,
        entity_post_process_required_if,
        entity_post_process_progress_size,
        entity_post_process_progress_step,
    } = args;

    let Some(document) = target_document else {
        log::error!("import requested without a target document");
        return false;
    };

    let local_root;
    let root = match progress {
        Some(progress) => progress,
        None => {
            local_root = TaskProgress::new();
            &local_root
        }
    };

    let ctx = Arc::new(ImportContext {
        system: Arc::clone(system),
        messenger: messenger.unwrap_or_else(NullMessenger::instance),
        parameters_provider,
        post_process: entity_post_process,
        post_process_required_if: entity_post_process_required_if,
        post_process_progress_size: entity_post_process_progress_size,
        post_process_progress_step: entity_post_process_progress_step,
        all_ok: AtomicBool::new(true),
    });

    if filepaths.len() == 1 {
        // Single file: every stage runs inline under the root progress
        let filepath = &filepaths[0];
        if let Some((mut reader, format)) = ctx.read_file_stage(filepath, root) {
            let entities = ctx.transfer_stage(filepath, format, reader.as_mut(), root, document);
            ctx.post_process_stage(format, &entities, root);
            add_model_tree_entities(document, &entities);
        }
    } else {
        // Many files: reads fan out on the worker pool, transfers drain
        // serially on this thread
        let manager = TaskManager::with_abort(root.abort_flag());

        let file_tasks: Vec<FileTask> = filepaths
            .iter()
            .map(|filepath| {
                let slot = Arc::new(Mutex::new(ReadSlot::default()));
                let worker_ctx = Arc::clone(&ctx);
                let worker_path = filepath.clone();
                let worker_slot = Arc::clone(&slot);
                let task_id = manager.new_task(move |progress| {
                    let outcome = worker_ctx.read_file_stage(&worker_path, progress);
                    let mut slot = worker_slot.lock().unwrap();
                    slot.progress = Some(progress.share());
                    match outcome {
                        Some((reader, format)) => {
                            slot.reader = Some(reader);
                            slot.format = format;
                            slot.read_success = true;
                        }
                        None => slot.read_success = false,
                    }
                });
                FileTask {
                    filepath: filepath.clone(),
                    task_id,
                    slot,
                }
            })
            .collect();

        // Root-progress updater: fold the workers' percentages into the root
        // as they move
        let task_index: HashMap<TaskId, usize> = file_tasks
            .iter()
            .enumerate()
            .map(|(index, task)| (task.task_id, index))
            .collect();
        // The store-sum-set sequence runs under one lock; unsynchronised
        // updaters could write a stale, lower mean into the root and break
        // its monotonicity
        let task_pcts = Mutex::new(vec![0i32; file_tasks.len()]);
        let root_updater = root.share();
        #[allow(clippy::cast_possible_wrap)]
        let task_count = file_tasks.len() as i64;
        manager.set_on_progress_changed(move |task_id, pct| {
            if let Some(&index) = task_index.get(&task_id) {
                let mut task_pcts = task_pcts.lock().unwrap();
                task_pcts[index] = pct;
                let sum: i64 = task_pcts.iter().copied().map(i64::from).sum();
                #[allow(clippy::cast_possible_truncation)]
                root_updater.set_value((sum / task_count) as i32);
            }
        });

        for task in &file_tasks {
            manager.run(task.task_id, TaskAutoDestroy::Off);
        }

        // Serial drain: transfer each file on this thread as its read
        // completes, in completion order
        let mut transferred = vec![false; file_tasks.len()];
        let mut remaining = file_tasks.len();
        while remaining > 0 && !root.is_abort_requested() {
            let candidate = (0..file_tasks.len()).find(|&index| {
                !transferred[index] && manager.wait_for_done(file_tasks[index].task_id, DRAIN_POLL)
            });
            let Some(index) = candidate else {
                continue;
            };

            let record = &file_tasks[index];
            let (reader, format, task_progress, read_success) = {
                let mut slot = record.slot.lock().unwrap();
                (
                    slot.reader.take(),
                    slot.format,
                    slot.progress.take(),
                    slot.read_success,
                )
            };

            if read_success {
                if let (Some(mut reader), Some(task_progress)) = (reader, task_progress) {
                    let entities = ctx.transfer_stage(
                        &record.filepath,
                        format,
                        reader.as_mut(),
                        &task_progress,
                        document,
                    );
                    ctx.post_process_stage(format, &entities, &task_progress);
                    add_model_tree_entities(document, &entities);
                }
            }

            transferred[index] = true;
            remaining -= 1;
        }

        // On cancellation, wait out still-running readers before the task
        // records are discarded; they observe the abort flag through their
        // progress
        for (index, record) in file_tasks.iter().enumerate() {
            if !transferred[index] {
                while !manager.wait_for_done(record.task_id, DRAIN_POLL) {}
            }
        }
    }

    ctx.all_ok.load(Ordering::SeqCst)
}
