//! Hierarchical, cancellable task progress
//!
//! A [`TaskProgress`] node owns a portion weight expressed as a percent of its
//! parent. Setting a child's value rolls the weighted delta up into the
//! parent, so a stage worth 40% of an operation that is half done moves the
//! operation by 20 points. Dropping a child completes it, which folds its
//! remaining portion into the parent even when a stage bails out early.
//!
//! Cancellation is cooperative: every node created under a root shares the
//! root's [`AbortFlag`], and workers poll [`TaskProgress::is_abort_requested`]
//! at their own pace.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

/// Cloneable cancellation token shared by a progress tree
///
/// A clone observes and controls the same underlying flag.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    /// Create a fresh, unsignalled flag
    #[must_use = "creates a new abort flag"]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the flag; observers see it on their next poll
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check whether abort has been requested
    #[inline]
    #[must_use = "returns whether abort has been requested"]
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

type ProgressObserver = Box<dyn Fn(i32) + Send + Sync>;

struct ProgressNode {
    value: AtomicI32,
    /// Percent of the parent this node accounts for, 0..=100
    portion: f64,
    parent: Option<Arc<ProgressNode>>,
    abort: AbortFlag,
    step: Mutex<String>,
    /// Root-only notification hook (task managers hang their
    /// progress-changed signal here)
    observer: Option<ProgressObserver>,
}

impl ProgressNode {
    fn set_value(&self, pct: i32) {
        let clamped = pct.clamp(0, 100);
        let on_entry = self.value.swap(clamped, Ordering::SeqCst);
        if clamped != 0 && clamped == on_entry {
            return;
        }

        if let Some(parent) = &self.parent {
            let delta = (f64::from(clamped - on_entry) * (self.portion / 100.0)).ceil();
            #[allow(clippy::cast_possible_truncation)]
            parent.set_value(parent.value.load(Ordering::SeqCst) + delta as i32);
        } else if let Some(observer) = &self.observer {
            observer(clamped);
        }
    }
}

/// Hierarchical progress node with a parent-relative weight
///
/// Created either as a root (per operation or per scheduled task) or as a
/// scoped child via [`TaskProgress::child`]. Children complete themselves on
/// drop; use [`TaskProgress::share`] for long-lived observer handles that must
/// not complete the node.
pub struct TaskProgress {
    node: Arc<ProgressNode>,
    completes_on_drop: bool,
}

impl TaskProgress {
    /// New detached root with its own abort flag
    #[must_use = "creates a new root progress"]
    pub fn new() -> Self {
        Self::root(AbortFlag::new(), None)
    }

    /// New root sharing `abort` and notifying `observer` on value changes
    ///
    /// This is the constructor task managers use so that every task progress
    /// observes the operation-wide abort flag and feeds aggregated progress
    /// back out.
    #[must_use = "creates a new observed root progress"]
    pub fn observed(abort: AbortFlag, observer: impl Fn(i32) + Send + Sync + 'static) -> Self {
        Self::root(abort, Some(Box::new(observer)))
    }

    fn root(abort: AbortFlag, observer: Option<ProgressObserver>) -> Self {
        Self {
            node: Arc::new(ProgressNode {
                value: AtomicI32::new(0),
                portion: 100.0,
                parent: None,
                abort,
                step: Mutex::new(String::new()),
                observer,
            }),
            completes_on_drop: false,
        }
    }

    /// Attach a scoped child accounting for `portion` percent of this node
    ///
    /// The child shares this node's abort flag. A non-empty `step` labels the
    /// stage the child tracks. The child completes itself when dropped.
    #[must_use = "the child handle drives the sub-progress"]
    pub fn child(&self, portion: f64, step: &str) -> TaskProgress {
        let child = TaskProgress {
            node: Arc::new(ProgressNode {
                value: AtomicI32::new(0),
                portion: portion.clamp(0.0, 100.0),
                parent: Some(Arc::clone(&self.node)),
                abort: self.node.abort.clone(),
                step: Mutex::new(String::new()),
                observer: None,
            }),
            completes_on_drop: true,
        };
        if !step.is_empty() {
            child.set_step(step);
        }
        child
    }

    /// Non-completing handle to the same node
    ///
    /// Use for observers that outlive a stage; dropping the shared handle
    /// leaves the node's value untouched.
    #[must_use = "returns a non-completing handle to the same node"]
    pub fn share(&self) -> TaskProgress {
        TaskProgress {
            node: Arc::clone(&self.node),
            completes_on_drop: false,
        }
    }

    /// Current value, 0..=100
    #[inline]
    #[must_use = "returns the current progress value"]
    pub fn value(&self) -> i32 {
        self.node.value.load(Ordering::SeqCst)
    }

    /// Set the value, rolling the weighted delta into the parent
    ///
    /// Ignored once abort has been requested. Values are clamped to 0..=100
    /// and non-zero repeats are deduplicated.
    pub fn set_value(&self, pct: i32) {
        if self.is_abort_requested() {
            return;
        }
        self.node.set_value(pct);
    }

    /// Label of the stage this node tracks
    #[must_use = "returns the current step label"]
    pub fn step(&self) -> String {
        self.node.step.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Relabel the stage this node tracks
    pub fn set_step(&self, title: &str) {
        *self.node.step.lock().unwrap_or_else(|e| e.into_inner()) = title.to_string();
    }

    /// Check the shared cancellation signal
    #[inline]
    #[must_use = "returns whether abort has been requested"]
    pub fn is_abort_requested(&self) -> bool {
        self.node.abort.is_requested()
    }

    /// Request cooperative cancellation of the whole progress tree
    pub fn request_abort(&self) {
        self.node.abort.request();
    }

    /// Clone of the tree's shared abort flag
    #[must_use = "returns the shared abort flag"]
    pub fn abort_flag(&self) -> AbortFlag {
        self.node.abort.clone()
    }
}

impl Default for TaskProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskProgress {
    fn drop(&mut self) {
        if self.completes_on_drop && self.node.parent.is_some() {
            self.set_value(100);
        }
    }
}

impl std::fmt::Debug for TaskProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskProgress")
            .field("value", &self.value())
            .field("step", &self.step())
            .field("abort_requested", &self.is_abort_requested())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_starts_at_zero() {
        let root = TaskProgress::new();
        assert_eq!(root.value(), 0);
        assert!(!root.is_abort_requested());
    }

    #[test]
    fn test_child_rolls_up_weighted_delta() {
        let root = TaskProgress::new();
        let child = root.child(40.0, "read");
        child.set_value(50);
        assert_eq!(root.value(), 20);
        child.set_value(100);
        assert_eq!(root.value(), 40);
    }

    #[test]
    fn test_two_stage_split_reaches_hundred() {
        let root = TaskProgress::new();
        {
            let read = root.child(40.0, "read");
            read.set_value(100);
        }
        assert_eq!(root.value(), 40);
        {
            let transfer = root.child(60.0, "transfer");
            transfer.set_value(100);
        }
        assert_eq!(root.value(), 100);
    }

    #[test]
    fn test_drop_completes_child() {
        let root = TaskProgress::new();
        {
            let child = root.child(50.0, "half");
            child.set_value(10);
            assert_eq!(root.value(), 5);
        }
        // The child completed on drop and folded the rest in
        assert_eq!(root.value(), 50);
    }

    #[test]
    fn test_share_does_not_complete_on_drop() {
        let root = TaskProgress::new();
        let child = root.child(50.0, "stage");
        {
            let shared = child.share();
            shared.set_value(20);
        }
        assert_eq!(root.value(), 10);
        assert_eq!(child.value(), 20);
    }

    #[test]
    fn test_grandchild_rollup() {
        let root = TaskProgress::new();
        let stage = root.child(50.0, "stage");
        let sub = stage.child(50.0, "sub");
        sub.set_value(100);
        assert_eq!(stage.value(), 50);
        assert_eq!(root.value(), 25);
    }

    #[test]
    fn test_values_clamped() {
        let root = TaskProgress::new();
        root.set_value(250);
        assert_eq!(root.value(), 100);
        root.set_value(-10);
        assert_eq!(root.value(), 0);
    }

    #[test]
    fn test_monotonic_under_sequential_stages() {
        let root = TaskProgress::new();
        let mut last = 0;
        for (portion, step) in [(40.0, "read"), (60.0, "transfer")] {
            let child = root.child(portion, step);
            for pct in [10, 30, 55, 80, 100] {
                child.set_value(pct);
                assert!(root.value() >= last, "root progress went backwards");
                last = root.value();
            }
        }
        assert_eq!(root.value(), 100);
    }

    #[test]
    fn test_abort_shared_with_children() {
        let root = TaskProgress::new();
        let child = root.child(40.0, "read");
        root.request_abort();
        assert!(child.is_abort_requested());

        let late_child = root.child(60.0, "transfer");
        assert!(late_child.is_abort_requested());
    }

    #[test]
    fn test_set_value_ignored_after_abort() {
        let root = TaskProgress::new();
        root.set_value(30);
        root.request_abort();
        root.set_value(90);
        assert_eq!(root.value(), 30);
    }

    #[test]
    fn test_observer_fires_on_root_changes() {
        use std::sync::Mutex;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let root = TaskProgress::observed(AbortFlag::new(), move |pct| {
            seen_clone.lock().unwrap().push(pct);
        });

        let child = root.child(100.0, "all");
        child.set_value(25);
        child.set_value(75);
        drop(child);

        assert_eq!(*seen.lock().unwrap(), vec![25, 75, 100]);
    }

    #[test]
    fn test_abort_flag_is_shared_token() {
        let flag = AbortFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_requested());
        flag.request();
        assert!(clone.is_requested());
    }

    #[test]
    fn test_step_labels() {
        let root = TaskProgress::new();
        let child = root.child(40.0, "Reading file");
        assert_eq!(child.step(), "Reading file");
        child.set_step("Still reading");
        assert_eq!(child.step(), "Still reading");
        assert_eq!(root.step(), "");
    }
}
