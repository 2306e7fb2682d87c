//! A single render job.
//!
//! A `Render` binds one input video to a resolved settings snapshot, a
//! reserved output path, and a private temp directory, and owns the process
//! pipeline that produces the output. Jobs are created up front when work is
//! queued and consumed one at a time by the queue.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use smear_common::config::AppSettings;
use smear_common::error::{SmearError, SmearResult};
use smear_common::paths;
use smear_settings::model::BlurSettings;
use tracing::{info, warn};

use crate::command::build_commands;
use crate::pipeline::{RenderOutcome, RenderPipeline, RenderStatus};
use crate::probe::VideoInfo;

/// Suffix appended to every output filename, before details and counters.
const OUTPUT_SUFFIX: &str = " - blur";

const PREVIEW_FILENAME: &str = "preview.webp";

pub struct Render {
    id: u64,
    input: PathBuf,
    output: PathBuf,
    temp_dir: PathBuf,
    preview_path: Option<PathBuf>,
    settings: BlurSettings,
    info: VideoInfo,
    pipeline: Arc<RenderPipeline>,
    temp_removed: AtomicBool,
}

impl Render {
    /// Create a job: reserve an output name (or take an explicit one),
    /// create the job temp directory, and build the process pipeline. No
    /// process is spawned yet.
    pub fn new(
        id: u64,
        input: PathBuf,
        output: Option<PathBuf>,
        info: VideoInfo,
        settings: BlurSettings,
        app: &AppSettings,
        temp_root: &Path,
    ) -> SmearResult<Self> {
        let output = match output {
            Some(output) => output,
            None => next_output_path(&input, &settings)?,
        };

        let temp_dir = paths::job_temp_dir(temp_root, &output);
        fs::create_dir_all(&temp_dir)?;

        let preview_path = settings.preview.then(|| temp_dir.join(PREVIEW_FILENAME));

        let commands = build_commands(
            &input,
            &output,
            preview_path.as_deref(),
            &info,
            &settings,
            app,
        )?;

        Ok(Self {
            id,
            input,
            output,
            temp_dir,
            preview_path,
            settings,
            info,
            pipeline: Arc::new(RenderPipeline::new(commands)),
            temp_removed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn video_info(&self) -> &VideoInfo {
        &self.info
    }

    pub fn settings(&self) -> &BlurSettings {
        &self.settings
    }

    pub fn preview_path(&self) -> Option<&Path> {
        self.preview_path.as_deref()
    }

    /// Control surface, cloneable across threads.
    pub fn pipeline(&self) -> Arc<RenderPipeline> {
        Arc::clone(&self.pipeline)
    }

    pub fn status(&self) -> RenderStatus {
        self.pipeline.status()
    }

    /// Run the job to completion and finalize the output.
    ///
    /// On success the source's modified time is copied onto the output when
    /// the settings ask for it. On a stop, any partial output is deleted.
    /// The job temp directory is removed in every case.
    pub fn run(&self, on_progress: &(dyn Fn(RenderStatus) + Sync)) -> RenderOutcome {
        info!(
            id = self.id,
            input = %self.input.display(),
            output = %self.output.display(),
            "render starting"
        );

        let outcome = self.pipeline.run(on_progress);

        match &outcome {
            RenderOutcome::Succeeded => {
                if self.settings.copy_dates {
                    if let Err(e) = copy_modified_time(&self.input, &self.output) {
                        warn!("could not copy dates onto output: {e}");
                    }
                }
                info!(output = %self.output.display(), "render finished");
            }
            RenderOutcome::Stopped => {
                if self.output.exists() {
                    if let Err(e) = fs::remove_file(&self.output) {
                        warn!("could not remove partial output: {e}");
                    }
                }
                info!(output = %self.output.display(), "render stopped");
            }
            RenderOutcome::Failed(report) => {
                warn!(output = %self.output.display(), "render failed: {report}");
            }
        }

        self.cleanup_temp();
        outcome
    }

    /// Remove the job temp directory. Idempotent; later calls are no-ops.
    pub fn cleanup_temp(&self) {
        if self.temp_removed.swap(true, Ordering::SeqCst) {
            return;
        }
        paths::remove_dir_best_effort(&self.temp_dir);
    }
}

/// Reserve an output path next to the input.
///
/// `<name> - blur[ ~ <details>][ (<n>)].<container>`, where the counter
/// starts at 2 and climbs until the name is free.
pub fn next_output_path(input: &Path, settings: &BlurSettings) -> SmearResult<PathBuf> {
    let parent = input.parent().unwrap_or_else(|| Path::new("."));
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| SmearError::render(format!("unusable input name: {}", input.display())))?;

    let mut base = format!("{stem}{OUTPUT_SUFFIX}");
    if settings.detailed_filenames {
        let details = settings.filename_details();
        if !details.is_empty() {
            base.push_str(" ~ ");
            base.push_str(&details);
        }
    }

    let container = &settings.video_container;
    let candidate = parent.join(format!("{base}.{container}"));
    if !candidate.exists() {
        return Ok(candidate);
    }
    for n in 2.. {
        let candidate = parent.join(format!("{base} ({n}).{container}"));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    unreachable!()
}

fn copy_modified_time(source: &Path, target: &Path) -> SmearResult<()> {
    let metadata = fs::metadata(source)?;
    let mtime = filetime::FileTime::from_last_modification_time(&metadata);
    filetime::set_file_mtime(target, mtime)?;
    Ok(())
}
