//! State of one in-flight upload batch.

use dropzone_transfer::{
    TaskStatus, UploadFile, UploadResult, UploadTask, aggregate_progress,
};

/// A task that settled with a transport failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUpload {
    pub index: usize,
    pub file_name: String,
    pub error: String,
    /// Last progress the task reported before failing.
    pub progress: u8,
}

/// Ordered, index-addressed tasks of a single batch.
///
/// Progress updates replace the value at the task's index; the task list
/// never grows after construction. The aggregate is recomputed from the
/// whole set on every update.
#[derive(Debug, Clone)]
pub struct BatchState {
    id: u64,
    tasks: Vec<UploadTask>,
    is_multi: bool,
    aggregate: u8,
}

impl BatchState {
    /// Builds one pending task per candidate.
    ///
    /// With `is_multi == false` only the first candidate is kept.
    pub fn new(id: u64, candidates: Vec<UploadFile>, is_multi: bool) -> Self {
        let take = if is_multi { candidates.len() } else { 1 };
        let tasks = candidates
            .into_iter()
            .take(take)
            .enumerate()
            .map(|(index, file)| UploadTask::new(index, file))
            .collect();

        Self {
            id,
            tasks,
            is_multi,
            aggregate: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_multi(&self) -> bool {
        self.is_multi
    }

    pub fn tasks(&self) -> &[UploadTask] {
        &self.tasks
    }

    pub fn task(&self, index: usize) -> Option<&UploadTask> {
        self.tasks.get(index)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Marks every pending task as in flight.
    pub fn start_all(&mut self) {
        for task in &mut self.tasks {
            task.start();
        }
    }

    /// Replaces the progress of task `index` and returns the new aggregate.
    ///
    /// Returns `None` for an unknown index or a task that already settled.
    pub fn update_progress(&mut self, index: usize, progress: u8) -> Option<u8> {
        let task = self.tasks.get_mut(index)?;
        if task.status.is_terminal() {
            return None;
        }
        task.set_progress(progress);
        self.aggregate = aggregate_progress(self.tasks.iter().map(|t| t.progress));
        Some(self.aggregate)
    }

    /// Settles task `index`. A task settles at most once; later calls are
    /// ignored and return `false`.
    pub fn settle(&mut self, index: usize, outcome: Result<UploadResult, String>) -> bool {
        let Some(task) = self.tasks.get_mut(index) else {
            return false;
        };
        if task.status.is_terminal() {
            return false;
        }
        match outcome {
            Ok(result) => task.succeed(result),
            Err(error) => task.fail(error),
        }
        true
    }

    /// Truncated mean of all task progress values.
    pub fn aggregate_progress(&self) -> u8 {
        self.aggregate
    }

    /// `true` once every task succeeded or failed.
    pub fn is_settled(&self) -> bool {
        self.tasks.iter().all(|t| t.status.is_terminal())
    }

    /// Results of succeeded tasks, in batch order.
    pub fn succeeded(&self) -> Vec<UploadResult> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Succeeded)
            .filter_map(|t| t.result.clone())
            .collect()
    }

    /// Failed tasks, in batch order.
    pub fn failed(&self) -> Vec<FailedUpload> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .map(|t| FailedUpload {
                index: t.index,
                file_name: t.file.name.clone(),
                error: t.error.clone().unwrap_or_default(),
                progress: t.progress,
            })
            .collect()
    }
}
