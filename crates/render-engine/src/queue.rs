//! FIFO render queue.
//!
//! Jobs run strictly one at a time, in submission order. The queue state
//! sits behind one mutex; callbacks and the pipeline itself always run with
//! the lock released, so a callback may query or mutate the queue freely.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

use tracing::info;

use crate::pipeline::{RenderOutcome, RenderStatus};
use crate::render::Render;

pub type ProgressCallback = Arc<dyn Fn(&Render, RenderStatus) + Send + Sync>;
pub type FinishedCallback = Arc<dyn Fn(&Render, &RenderOutcome) + Send + Sync>;

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<Arc<Render>>,
    current: Option<Arc<Render>>,
}

pub struct RenderQueue {
    state: Mutex<QueueState>,
    idle: Condvar,
    on_progress: Mutex<Option<ProgressCallback>>,
    on_finished: Mutex<Option<FinishedCallback>>,
}

impl Default for RenderQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            idle: Condvar::new(),
            on_progress: Mutex::new(None),
            on_finished: Mutex::new(None),
        }
    }

    /// Fires on every progress update of the running job.
    pub fn on_progress(&self, callback: ProgressCallback) {
        *self.on_progress.lock().unwrap() = Some(callback);
    }

    /// Fires once per job, after it reaches a terminal state.
    pub fn on_finished(&self, callback: FinishedCallback) {
        *self.on_finished.lock().unwrap() = Some(callback);
    }

    pub fn push(&self, render: Render) -> Arc<Render> {
        let render = Arc::new(render);
        let mut state = self.state.lock().unwrap();
        state.jobs.push_back(Arc::clone(&render));
        info!(
            output = %render.output().display(),
            position = state.jobs.len(),
            "render queued"
        );
        render
    }

    /// Queued jobs, not counting the one currently running.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.jobs.is_empty() && state.current.is_none()
    }

    pub fn current(&self) -> Option<Arc<Render>> {
        self.state.lock().unwrap().current.clone()
    }

    /// Pop and run the next job. Returns `None` when the queue is empty.
    pub fn process_next(&self) -> Option<RenderOutcome> {
        let render = {
            let mut state = self.state.lock().unwrap();
            let render = state.jobs.pop_front()?;
            state.current = Some(Arc::clone(&render));
            render
        };

        let progress = self.on_progress.lock().unwrap().clone();
        let outcome = render.run(&|status| {
            if let Some(callback) = &progress {
                callback(&render, status);
            }
        });

        self.state.lock().unwrap().current = None;
        self.idle.notify_all();

        let finished = self.on_finished.lock().unwrap().clone();
        if let Some(callback) = &finished {
            callback(&render, &outcome);
        }
        Some(outcome)
    }

    /// Run jobs until the queue drains.
    pub fn process_all(&self) {
        while self.process_next().is_some() {}
    }

    /// Request a stop on the running job and every queued one. Queued jobs
    /// still pass through the processing loop, where the pre-set stop flag
    /// short-circuits them into `Stopped` without spawning anything.
    pub fn stop_all(&self) {
        let state = self.state.lock().unwrap();
        if let Some(current) = &state.current {
            current.pipeline().stop();
        }
        for job in &state.jobs {
            job.pipeline().stop();
        }
    }

    /// `stop_all`, then block until the running job reaches a terminal
    /// state. Queued jobs may still be draining on the processing thread
    /// when this returns; they can no longer spawn anything.
    pub fn stop_and_wait(&self) {
        self.stop_all();
        let mut state = self.state.lock().unwrap();
        while state.current.is_some() {
            state = self.idle.wait(state).unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::VideoInfo;
    use smear_common::config::AppSettings;
    use smear_settings::model::BlurSettings;
    use std::fs;
    use std::path::{Path, PathBuf};

    struct TestDir(PathBuf);

    impl TestDir {
        fn new(tag: &str) -> Self {
            let dir = std::env::temp_dir().join(format!(
                "smear-queue-test-{tag}-{}-{:?}",
                std::process::id(),
                std::thread::current().id()
            ));
            fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }

        fn path(&self) -> &Path {
            &self.0
        }
    }

    impl Drop for TestDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    fn fabricated_info() -> VideoInfo {
        VideoInfo {
            has_video_stream: true,
            fps_num: 60,
            fps_den: 1,
            color_range: None,
            color_space: None,
            color_transfer: None,
            color_primaries: None,
            pix_fmt: None,
            sample_rate: -1,
        }
    }

    fn job(dir: &TestDir, id: u64, name: &str) -> Render {
        let input = dir.path().join(name);
        fs::File::create(&input).unwrap();
        Render::new(
            id,
            input,
            None,
            fabricated_info(),
            BlurSettings::default(),
            &AppSettings::default(),
            dir.path(),
        )
        .unwrap()
    }

    #[test]
    fn jobs_finish_in_submission_order() {
        let dir = TestDir::new("fifo");
        let queue = RenderQueue::new();

        let finished: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&finished);
        queue.on_finished(Arc::new(move |render, outcome| {
            // The producer binary does not exist on test machines, so every
            // job terminates; order is what matters here.
            assert!(matches!(
                outcome,
                RenderOutcome::Failed(_) | RenderOutcome::Stopped
            ));
            sink.lock().unwrap().push(render.input().to_path_buf());
        }));

        queue.push(job(&dir, 1, "a.mp4"));
        queue.push(job(&dir, 2, "b.mp4"));
        queue.push(job(&dir, 3, "c.mp4"));
        assert_eq!(queue.len(), 3);

        queue.process_all();

        let finished = finished.lock().unwrap();
        let names: Vec<_> = finished
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["a.mp4", "b.mp4", "c.mp4"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn stop_all_turns_queued_jobs_into_stops() {
        let dir = TestDir::new("stopall");
        let queue = RenderQueue::new();
        queue.push(job(&dir, 1, "a.mp4"));
        queue.push(job(&dir, 2, "b.mp4"));

        queue.stop_all();

        assert_eq!(queue.process_next(), Some(RenderOutcome::Stopped));
        assert_eq!(queue.process_next(), Some(RenderOutcome::Stopped));
        assert_eq!(queue.process_next(), None);
    }

    #[test]
    fn finished_callback_may_reenter_the_queue() {
        let dir = TestDir::new("reenter");
        let queue = Arc::new(RenderQueue::new());
        queue.stop_all();

        let probe = Arc::clone(&queue);
        let observed = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&observed);
        queue.on_finished(Arc::new(move |_, _| {
            // Runs with the queue lock released.
            *sink.lock().unwrap() = Some(probe.len());
        }));

        queue.push(job(&dir, 1, "a.mp4"));
        queue.stop_all();
        queue.process_all();

        assert_eq!(*observed.lock().unwrap(), Some(0));
    }

    #[test]
    fn stop_and_wait_returns_immediately_when_idle() {
        let queue = RenderQueue::new();
        queue.stop_and_wait();
        assert!(queue.is_empty());
    }
}
