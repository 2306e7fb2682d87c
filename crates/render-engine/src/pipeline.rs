//! The producer/consumer process pipeline for one render.
//!
//! `run` spawns the frame-generation producer with its stdout piped into the
//! encoding consumer's stdin, monitors the producer's diagnostic stream for
//! progress, and polls both children until they exit or a stop is requested.
//! A requested stop always yields [`RenderOutcome::Stopped`], regardless of
//! how the processes actually went down.

use std::io::Read;
use std::process::{Child, ChildStderr, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use smear_common::clock::FpsClock;
use smear_common::error::{SmearError, SmearResult};
use tracing::{debug, warn};

use crate::command::{CommandPair, ProcessCommand};
use crate::pause::{Pausable, SignalPauser};
use crate::progress::{DiagnosticReader, StreamEvent};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How many buffered diagnostic lines a failure report keeps.
const FAILURE_LOG_TAIL: usize = 20;

/// Live progress snapshot, handed to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderStatus {
    pub current_frame: u32,
    pub total_frames: u32,
    /// Observed rendering rate. Taken from the producer's own report when
    /// present, otherwise derived from wall-clock frame deltas. Holds its
    /// last value when neither source has a figure yet.
    pub fps: f64,
    pub paused: bool,
    /// True once the pipeline has reached a terminal outcome.
    pub finished: bool,
}

impl RenderStatus {
    /// One-line human-readable form, for progress displays and logs.
    pub fn text(&self) -> String {
        if self.total_frames == 0 {
            return "starting".to_string();
        }
        let mut text = format!(
            "frame {}/{} ({:.1} fps)",
            self.current_frame, self.total_frames, self.fps
        );
        if self.paused {
            text.push_str(" [paused]");
        }
        text
    }
}

/// Terminal state of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    Succeeded,
    /// The user asked for the render to stop. Not an error.
    Stopped,
    Failed(String),
}

/// One render's process pair and its control surface.
///
/// `run` is called exactly once, from the queue's processing thread;
/// `stop`, `pause` and `resume` may be called from any thread at any time,
/// including before `run`.
pub struct RenderPipeline {
    producer: ProcessCommand,
    consumer: ProcessCommand,
    stop_requested: AtomicBool,
    paused: AtomicBool,
    consumer_pid: AtomicU32,
    status: Mutex<RenderStatus>,
    clock: Mutex<FpsClock>,
    pauser: Box<dyn Pausable>,
}

impl RenderPipeline {
    pub fn new(commands: CommandPair) -> Self {
        Self {
            producer: commands.producer,
            consumer: commands.consumer,
            stop_requested: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            consumer_pid: AtomicU32::new(0),
            status: Mutex::new(RenderStatus::default()),
            clock: Mutex::new(FpsClock::start()),
            pauser: Box::new(SignalPauser),
        }
    }

    /// Request a stop. Idempotent; safe before or during `run`.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    pub fn paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> RenderStatus {
        *self.status.lock().unwrap()
    }

    /// Suspend the consumer. The producer keeps running until the pipe
    /// buffer fills, then blocks on write; nothing is torn down.
    pub fn pause(&self) -> SmearResult<()> {
        let pid = self.consumer_pid.load(Ordering::SeqCst);
        if pid == 0 {
            return Err(SmearError::render("no active render to pause"));
        }
        self.pauser.suspend(pid)?;
        self.paused.store(true, Ordering::SeqCst);
        self.status.lock().unwrap().paused = true;
        debug!(pid, "render paused");
        Ok(())
    }

    /// Resume a paused consumer and restart rate measurement, so the time
    /// spent suspended does not drag the reported fps down.
    pub fn resume(&self) -> SmearResult<()> {
        let pid = self.consumer_pid.load(Ordering::SeqCst);
        if pid == 0 {
            return Err(SmearError::render("no active render to resume"));
        }
        self.pauser.resume(pid)?;
        self.paused.store(false, Ordering::SeqCst);
        self.status.lock().unwrap().paused = false;
        self.clock.lock().unwrap().reset();
        debug!(pid, "render resumed");
        Ok(())
    }

    /// Run the pipeline to completion. `on_progress` fires once per parsed
    /// progress update, on the monitor thread.
    pub fn run(&self, on_progress: &(dyn Fn(RenderStatus) + Sync)) -> RenderOutcome {
        if self.stop_requested() {
            self.mark_finished();
            return RenderOutcome::Stopped;
        }

        let mut producer = match self.spawn_producer() {
            Ok(child) => child,
            Err(e) => return self.spawn_failure(e),
        };

        let Some(producer_stdout) = producer.stdout.take() else {
            let _ = producer.kill();
            let _ = producer.wait();
            self.mark_finished();
            return RenderOutcome::Failed("producer stdout was not captured".to_string());
        };
        let producer_stderr = producer.stderr.take();

        let mut consumer = match self.spawn_consumer(producer_stdout) {
            Ok(child) => child,
            Err(e) => {
                let _ = producer.kill();
                let _ = producer.wait();
                return self.spawn_failure(e);
            }
        };
        self.consumer_pid.store(consumer.id(), Ordering::SeqCst);
        let consumer_stderr = consumer.stderr.take();

        let logs: Mutex<Vec<String>> = Mutex::new(Vec::new());

        // Killing the children on stop closes both pipes, which ends the
        // reader threads; the scope then joins them.
        let (producer_status, consumer_status) = thread::scope(|s| {
            if let Some(stderr) = producer_stderr {
                s.spawn(|| self.monitor_diagnostics(stderr, on_progress, &logs));
            }
            if let Some(stderr) = consumer_stderr {
                s.spawn(|| drain_into(stderr, &logs));
            }
            self.poll(&mut producer, &mut consumer)
        });
        self.consumer_pid.store(0, Ordering::SeqCst);
        self.mark_finished();

        if self.stop_requested() {
            return RenderOutcome::Stopped;
        }

        let producer_ok = producer_status.map(|s| s.success()).unwrap_or(false);
        let consumer_ok = consumer_status.map(|s| s.success()).unwrap_or(false);
        if producer_ok && consumer_ok {
            return RenderOutcome::Succeeded;
        }

        let logs = logs.into_inner().unwrap();
        let tail_start = logs.len().saturating_sub(FAILURE_LOG_TAIL);
        let mut report = format!(
            "producer exited {}, consumer exited {}",
            describe_exit(producer_status),
            describe_exit(consumer_status),
        );
        for line in &logs[tail_start..] {
            report.push('\n');
            report.push_str(line);
        }
        RenderOutcome::Failed(report)
    }

    fn spawn_producer(&self) -> SmearResult<Child> {
        debug!(program = %self.producer.program, "spawning producer");
        Command::new(&self.producer.program)
            .args(&self.producer.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SmearError::spawn(&self.producer.program, e.to_string()))
    }

    fn spawn_consumer(&self, stdin: std::process::ChildStdout) -> SmearResult<Child> {
        debug!(program = %self.consumer.program, "spawning consumer");
        Command::new(&self.consumer.program)
            .args(&self.consumer.args)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SmearError::spawn(&self.consumer.program, e.to_string()))
    }

    fn spawn_failure(&self, e: SmearError) -> RenderOutcome {
        self.mark_finished();
        // A stop raced the spawn; the stop wins.
        if self.stop_requested() {
            return RenderOutcome::Stopped;
        }
        RenderOutcome::Failed(e.to_string())
    }

    fn mark_finished(&self) {
        self.status.lock().unwrap().finished = true;
    }

    fn monitor_diagnostics(
        &self,
        stderr: ChildStderr,
        on_progress: &(dyn Fn(RenderStatus) + Sync),
        logs: &Mutex<Vec<String>>,
    ) {
        for event in DiagnosticReader::new(stderr) {
            match event {
                Err(e) => {
                    warn!("diagnostic stream read failed: {e}");
                    return;
                }
                Ok(StreamEvent::Log(line)) => {
                    debug!(target: "smear_render_engine::producer", "{line}");
                    logs.lock().unwrap().push(line);
                }
                Ok(StreamEvent::Progress(line)) => {
                    let snapshot = {
                        let mut status = self.status.lock().unwrap();
                        status.current_frame = line.current;
                        status.total_frames = line.total;
                        let measured = line
                            .fps
                            .or_else(|| self.clock.lock().unwrap().sample(line.current));
                        if let Some(fps) = measured {
                            status.fps = fps;
                        }
                        status.paused = self.paused();
                        *status
                    };
                    on_progress(snapshot);
                }
            }
        }
    }

    fn poll(
        &self,
        producer: &mut Child,
        consumer: &mut Child,
    ) -> (
        Option<std::process::ExitStatus>,
        Option<std::process::ExitStatus>,
    ) {
        let mut producer_status = None;
        let mut consumer_status = None;

        loop {
            if self.stop_requested() {
                // Resume first so a paused consumer can be killed and reaped.
                if self.paused() {
                    let pid = self.consumer_pid.load(Ordering::SeqCst);
                    if pid != 0 {
                        let _ = self.pauser.resume(pid);
                    }
                }
                if producer_status.is_none() {
                    let _ = producer.kill();
                    producer_status = producer.wait().ok();
                }
                if consumer_status.is_none() {
                    let _ = consumer.kill();
                    consumer_status = consumer.wait().ok();
                }
                return (producer_status, consumer_status);
            }

            if producer_status.is_none() {
                match producer.try_wait() {
                    Ok(status) => producer_status = status,
                    Err(e) => {
                        warn!("producer wait failed: {e}");
                        let _ = producer.kill();
                        producer_status = producer.wait().ok();
                    }
                }
            }
            if consumer_status.is_none() {
                match consumer.try_wait() {
                    Ok(status) => consumer_status = status,
                    Err(e) => {
                        warn!("consumer wait failed: {e}");
                        let _ = consumer.kill();
                        consumer_status = consumer.wait().ok();
                    }
                }
            }

            if producer_status.is_some() && consumer_status.is_some() {
                return (producer_status, consumer_status);
            }

            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn describe_exit(status: Option<std::process::ExitStatus>) -> String {
    match status {
        Some(status) => status.to_string(),
        None => "without status".to_string(),
    }
}

fn drain_into(stderr: ChildStderr, logs: &Mutex<Vec<String>>) {
    let mut buf = String::new();
    let mut reader = std::io::BufReader::new(stderr);
    if reader.read_to_string(&mut buf).is_ok() {
        let mut logs = logs.lock().unwrap();
        logs.extend(buf.lines().map(str::to_string));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ProcessCommand;
    use std::sync::Arc;

    fn shell(script: &str) -> ProcessCommand {
        ProcessCommand::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    fn pipeline(producer: ProcessCommand, consumer: ProcessCommand) -> RenderPipeline {
        RenderPipeline::new(CommandPair { producer, consumer })
    }

    #[cfg(unix)]
    #[test]
    fn clean_exit_of_both_processes_succeeds() {
        let p = pipeline(
            shell(r#"printf 'Frame: 1/2\rFrame: 2/2 (30.00 fps)\r' >&2; echo data"#),
            shell("cat > /dev/null"),
        );
        let seen: Mutex<Vec<RenderStatus>> = Mutex::new(Vec::new());
        let outcome = p.run(&|status| seen.lock().unwrap().push(status));
        assert_eq!(outcome, RenderOutcome::Succeeded);

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].current_frame, 2);
        assert_eq!(seen[1].total_frames, 2);
        assert_eq!(seen[1].fps, 30.0);
        assert!(p.status().finished);
    }

    #[test]
    fn status_text_formats_progress() {
        let status = RenderStatus {
            current_frame: 12,
            total_frames: 240,
            fps: 23.5,
            paused: false,
            finished: false,
        };
        assert_eq!(status.text(), "frame 12/240 (23.5 fps)");

        let paused = RenderStatus { paused: true, ..status };
        assert_eq!(paused.text(), "frame 12/240 (23.5 fps) [paused]");

        assert_eq!(RenderStatus::default().text(), "starting");
    }

    #[cfg(unix)]
    #[test]
    fn consumer_failure_reports_buffered_diagnostics() {
        let p = pipeline(
            shell(r#"printf 'loading model failed\n' >&2; true"#),
            shell("cat > /dev/null; exit 3"),
        );
        let outcome = p.run(&|_| {});
        match outcome {
            RenderOutcome::Failed(report) => {
                assert!(report.contains("consumer exited"), "report: {report}");
                assert!(report.contains("loading model failed"), "report: {report}");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn producer_failure_fails_the_render() {
        let p = pipeline(shell("exit 7"), shell("cat > /dev/null"));
        assert!(matches!(p.run(&|_| {}), RenderOutcome::Failed(_)));
    }

    #[test]
    fn stop_before_run_wins_over_everything() {
        // Even a spawn failure is reported as a stop once one was requested.
        let p = pipeline(
            ProcessCommand::new("smear-test-no-such-binary", vec![]),
            ProcessCommand::new("smear-test-no-such-binary", vec![]),
        );
        p.stop();
        assert_eq!(p.run(&|_| {}), RenderOutcome::Stopped);
    }

    #[test]
    fn spawn_failure_without_stop_is_a_failure() {
        let p = pipeline(
            ProcessCommand::new("smear-test-no-such-binary", vec![]),
            ProcessCommand::new("smear-test-no-such-binary", vec![]),
        );
        match p.run(&|_| {}) {
            RenderOutcome::Failed(report) => {
                assert!(report.contains("smear-test-no-such-binary"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn stop_during_run_kills_both_processes() {
        let p = Arc::new(pipeline(shell("sleep 10"), shell("sleep 10")));
        let stopper = Arc::clone(&p);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            stopper.stop();
        });
        let started = std::time::Instant::now();
        let outcome = p.run(&|_| {});
        handle.join().unwrap();
        assert_eq!(outcome, RenderOutcome::Stopped);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn pause_and_resume_toggle_the_flag_on_a_live_consumer() {
        let p = Arc::new(pipeline(shell("sleep 10"), shell("sleep 10")));
        let controller = Arc::clone(&p);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            controller.pause().unwrap();
            assert!(controller.paused());
            controller.resume().unwrap();
            assert!(!controller.paused());
            controller.stop();
        });
        let outcome = p.run(&|_| {});
        handle.join().unwrap();
        assert_eq!(outcome, RenderOutcome::Stopped);
    }

    #[test]
    fn pause_without_a_live_consumer_is_an_error() {
        let p = pipeline(shell("true"), shell("true"));
        assert!(p.pause().is_err());
        assert!(p.resume().is_err());
    }
}
