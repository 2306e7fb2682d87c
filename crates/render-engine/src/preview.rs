//! Single-frame preview renders.
//!
//! A preview runs the same producer/consumer pair as a full render, but
//! seeks to one frame and writes a single image instead of a video. Previews
//! bypass the queue: they are short-lived, run on demand, and their output
//! lives in the temp tree so it disappears with the session.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use smear_common::config::AppSettings;
use smear_common::error::{SmearError, SmearResult};
use smear_common::paths;
use smear_settings::model::BlurSettings;
use tracing::debug;

use crate::command::build_preview_commands;
use crate::pipeline::{RenderOutcome, RenderPipeline};
use crate::probe::VideoInfo;

// Previews for the same input and frame can overlap (a stale handle may
// still be dropping while a fresh one renders), so every instance gets its
// own directory.
static NEXT_PREVIEW: AtomicU64 = AtomicU64::new(1);

pub struct PreviewRender {
    image_path: PathBuf,
    temp_dir: PathBuf,
    pipeline: Arc<RenderPipeline>,
    started: AtomicBool,
    can_delete: AtomicBool,
}

impl PreviewRender {
    pub fn new(
        input: &Path,
        seek_frame: u32,
        info: &VideoInfo,
        settings: &BlurSettings,
        app: &AppSettings,
        temp_root: &Path,
    ) -> SmearResult<Self> {
        let serial = NEXT_PREVIEW.fetch_add(1, Ordering::SeqCst);
        let temp_dir = paths::job_temp_dir(temp_root, input)
            .join(format!("preview-{seek_frame}-{serial}"));
        fs::create_dir_all(&temp_dir)?;
        let image_path = temp_dir.join("frame.webp");

        let commands =
            build_preview_commands(input, &image_path, seek_frame, info, settings, app)?;

        Ok(Self {
            image_path,
            temp_dir,
            pipeline: Arc::new(RenderPipeline::new(commands)),
            started: AtomicBool::new(false),
            can_delete: AtomicBool::new(false),
        })
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    /// Control surface for cancelling an in-flight preview.
    pub fn pipeline(&self) -> Arc<RenderPipeline> {
        Arc::clone(&self.pipeline)
    }

    /// Whether teardown is safe: true before the pipeline starts and again
    /// once it has exited, never while processes are live.
    pub fn can_delete(&self) -> bool {
        !self.started.load(Ordering::SeqCst) || self.can_delete.load(Ordering::SeqCst)
    }

    /// Render the frame and return the image path.
    pub fn run(&self) -> SmearResult<PathBuf> {
        self.started.store(true, Ordering::SeqCst);
        let outcome = self.pipeline.run(&|_| {});
        self.can_delete.store(true, Ordering::SeqCst);
        match outcome {
            RenderOutcome::Succeeded => {
                debug!(image = %self.image_path.display(), "preview rendered");
                Ok(self.image_path.clone())
            }
            RenderOutcome::Stopped => Err(SmearError::render("preview cancelled")),
            RenderOutcome::Failed(report) => Err(SmearError::render(report)),
        }
    }
}

impl Drop for PreviewRender {
    // The image is session-scoped; it goes away with the preview handle.
    // A handle dropped while its pipeline still runs leaves the directory
    // for the session-root cleanup instead of pulling it out from under
    // the processes.
    fn drop(&mut self) {
        if self.can_delete() {
            paths::remove_dir_best_effort(&self.temp_dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn preview_image_lives_under_the_temp_root_and_is_session_scoped() {
        let root = std::env::temp_dir().join(format!(
            "smear-preview-test-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        fs::create_dir_all(&root).unwrap();

        let temp_dir = {
            let preview = PreviewRender::new(
                Path::new("/videos/clip.mp4"),
                42,
                &fabricated_info(),
                &BlurSettings::default(),
                &AppSettings::default(),
                &root,
            )
            .unwrap();
            assert!(preview.image_path().starts_with(&root));
            preview.temp_dir.clone()
        };
        // Dropped previews leave nothing behind.
        assert!(!temp_dir.exists());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn overlapping_previews_of_the_same_frame_keep_separate_directories() {
        let root = std::env::temp_dir().join(format!(
            "smear-preview-overlap-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        fs::create_dir_all(&root).unwrap();

        let make = || {
            PreviewRender::new(
                Path::new("/videos/clip.mp4"),
                42,
                &fabricated_info(),
                &BlurSettings::default(),
                &AppSettings::default(),
                &root,
            )
            .unwrap()
        };
        let stale = make();
        let fresh = make();
        assert_ne!(stale.image_path(), fresh.image_path());
        assert_ne!(stale.temp_dir, fresh.temp_dir);

        // Tearing down one handle leaves the other's directory alone.
        drop(stale);
        assert!(fresh.temp_dir.is_dir());

        drop(fresh);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn cancelled_preview_reports_an_error() {
        let root = std::env::temp_dir().join(format!(
            "smear-preview-cancel-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        fs::create_dir_all(&root).unwrap();

        let preview = PreviewRender::new(
            Path::new("/videos/clip.mp4"),
            1,
            &fabricated_info(),
            &BlurSettings::default(),
            &AppSettings::default(),
            &root,
        )
        .unwrap();
        assert!(preview.can_delete());
        preview.pipeline().stop();
        assert!(preview.run().is_err());
        assert!(preview.can_delete());

        drop(preview);
        let _ = fs::remove_dir_all(&root);
    }
}
