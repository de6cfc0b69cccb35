//! Export orchestration: a strict linear pipeline per file
//!
//! Export has none of the import side's concurrency concerns. A writer is
//! created for the target format, gathers the application items into its
//! in-memory model under a 40% progress child, then serialises the file under
//! a 60% child. Any failing stage is reported through the messenger and ends
//! the pipeline.

use crate::system::System;
use crate::traits::{ApplicationItem, PropertyGroup};
use cadio_core::{Format, Messenger, NullMessenger, TaskProgress};
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration record of one export operation
pub struct ExportArgs<'a> {
    /// Destination file
    pub target_filepath: PathBuf,
    /// Format the writer must produce
    pub target_format: Format,
    /// Items to export
    pub application_items: Vec<ApplicationItem>,
    /// Optional writer parameters
    pub parameters: Option<PropertyGroup>,
    /// Diagnostics sink; the null messenger when absent
    pub messenger: Option<Arc<dyn Messenger>>,
    /// Root progress; a fresh detached root when absent
    pub progress: Option<&'a TaskProgress>,
}

impl Default for ExportArgs<'_> {
    fn default() -> Self {
        Self {
            target_filepath: PathBuf::new(),
            target_format: Format::Unknown,
            application_items: Vec::new(),
            parameters: None,
            messenger: None,
            progress: None,
        }
    }
}

/// Fluent builder for an export operation
///
/// Obtained from [`System::export_application_items`]; setters return the
/// builder for chaining and [`ExportApplicationItems::execute`] runs the
/// synchronous pipeline.
pub struct ExportApplicationItems<'a> {
    system: &'a System,
    args: ExportArgs<'a>,
}

impl<'a> ExportApplicationItems<'a> {
    pub(crate) fn new(system: &'a System) -> Self {
        Self {
            system,
            args: ExportArgs::default(),
        }
    }

    /// Set the destination file
    pub fn target_file(&mut self, filepath: impl Into<PathBuf>) -> &mut Self {
        self.args.target_filepath = filepath.into();
        self
    }

    /// Set the format the writer must produce
    pub fn target_format(&mut self, format: Format) -> &mut Self {
        self.args.target_format = format;
        self
    }

    /// Set the items to export
    pub fn with_items<I>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator<Item = ApplicationItem>,
    {
        self.args.application_items = items.into_iter().collect();
        self
    }

    /// Apply writer parameters before the transfer stage
    pub fn with_parameters(&mut self, parameters: PropertyGroup) -> &mut Self {
        self.args.parameters = Some(parameters);
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

    /// Run the export; `true` only when both stages succeeded
    pub fn execute(&mut self) -> bool {
        run_export(self.system, std::mem::take(&mut self.args))
    }
}

impl System {
    /// Fluent builder for exporting application items to a file
    #[must_use = "the builder runs nothing until execute()"]
    pub fn export_application_items(&self) -> ExportApplicationItems<'_> {
        ExportApplicationItems::new(self)
    }

    /// Run an export described by an already-filled [`ExportArgs`]
    pub fn export_application_items_with(&self, args: ExportArgs<'_>) -> bool {
        run_export(self, args)
    }
}

pub(crate) fn run_export(system: &System, args: ExportArgs<'_>) -> bool {
    let local_root;
    let progress = match args.progress {
        Some(progress) => progress,
        None => {
            local_root = TaskProgress::new();
            &local_root
        }
    };
    let messenger = args
        .messenger
        .unwrap_or_else(NullMessenger::instance);

    let fail = |reason: &str| {
        messenger.emit_error(&format!(
            "Error during export to '{}'\n{}",
            args.target_filepath.display(),
            reason
        ));
        false
    };

    let Some(mut writer) = system.create_writer(args.target_format) else {
        return fail("No supporting writer");
    };

    writer.set_messenger(Arc::clone(&messenger));
    if let Some(parameters) = &args.parameters {
        writer.apply_properties(parameters);
    }

    {
        let transfer_progress = progress.child(40.0, "Transfer");
        if let Err(err) = writer.transfer(&args.application_items, &transfer_progress) {
            log::warn!(
                "writer transfer failed for '{}': {err}",
                args.target_filepath.display()
            );
            return fail("File transfer problem");
        }
    }

    {
        let write_progress = progress.child(60.0, "Write");
        if let Err(err) = writer.write_file(&args.target_filepath, &write_progress) {
            log::warn!(
                "writer failed on '{}': {err}",
                args.target_filepath.display()
            );
            return fail("File write problem");
        }
    }

    true
}
