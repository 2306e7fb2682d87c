//! Engine session state.
//!
//! An `EngineContext` owns the session temp root and the single-shot
//! shutdown path. One context lives for the whole process; jobs and
//! previews hang their temp directories off its root, and shutdown tears
//! the root down exactly once no matter how many signals arrive.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use smear_common::config::AppSettings;
use smear_common::error::SmearResult;
use smear_common::paths;
use smear_settings::model::BlurSettings;
use tracing::info;

use crate::probe::VideoInfo;
use crate::queue::RenderQueue;
use crate::render::Render;

/// Latch that admits exactly one shutdown.
#[derive(Default)]
pub struct ShutdownToken {
    fired: AtomicBool,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true for the first caller only.
    pub fn fire(&self) -> bool {
        !self.fired.swap(true, Ordering::SeqCst)
    }

    pub fn fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

pub struct EngineContext {
    app: AppSettings,
    temp_root: PathBuf,
    next_render_id: AtomicU64,
    shutdown: ShutdownToken,
    cleaned: AtomicBool,
}

impl EngineContext {
    /// Create the session temp root and bind the app settings snapshot.
    pub fn new(app: AppSettings) -> SmearResult<Self> {
        let temp_root = paths::create_temp_root()?;
        info!(temp_root = %temp_root.display(), "engine session started");
        Ok(Self {
            app,
            temp_root,
            next_render_id: AtomicU64::new(1),
            shutdown: ShutdownToken::new(),
            cleaned: AtomicBool::new(false),
        })
    }

    pub fn app_settings(&self) -> &AppSettings {
        &self.app
    }

    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    /// Build a queueable job inside this session, assigning it the next id.
    /// `output` overrides the derived output path when given.
    pub fn create_render(
        &self,
        input: PathBuf,
        output: Option<PathBuf>,
        info: VideoInfo,
        settings: BlurSettings,
    ) -> SmearResult<Render> {
        let id = self.next_render_id.fetch_add(1, Ordering::SeqCst);
        Render::new(id, input, output, info, settings, &self.app, &self.temp_root)
    }

    /// Stop everything and remove the temp root. Only the first call does
    /// any work; later calls (a second signal, the final drop) are no-ops.
    pub fn shutdown(&self, queue: &RenderQueue) -> bool {
        if !self.shutdown.fire() {
            return false;
        }
        info!("shutting down");
        queue.stop_and_wait();
        self.cleanup();
        true
    }

    fn cleanup(&self) {
        if self.cleaned.swap(true, Ordering::SeqCst) {
            return;
        }
        paths::remove_dir_best_effort(&self.temp_root);
    }
}

impl Drop for EngineContext {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_creates_and_removes_its_temp_root() {
        let root = {
            let ctx = EngineContext::new(AppSettings::default()).unwrap();
            let root = ctx.temp_root().to_path_buf();
            assert!(root.is_dir());
            root
        };
        assert!(!root.exists());
    }

    #[test]
    fn shutdown_is_single_shot() {
        let ctx = EngineContext::new(AppSettings::default()).unwrap();
        let queue = RenderQueue::new();
        assert!(ctx.shutdown(&queue));
        assert!(!ctx.shutdown(&queue));
        assert!(!ctx.temp_root().exists());
    }

    #[test]
    fn render_ids_count_up_from_one() {
        let ctx = EngineContext::new(AppSettings::default()).unwrap();
        let info = VideoInfo {
            has_video_stream: true,
            fps_num: 60,
            fps_den: 1,
            color_range: None,
            color_space: None,
            color_transfer: None,
            color_primaries: None,
            pix_fmt: None,
            sample_rate: -1,
        };
        let out = ctx.temp_root().join("out.mp4");
        let a = ctx
            .create_render(
                PathBuf::from("/videos/a.mp4"),
                Some(out.clone()),
                info.clone(),
                BlurSettings::default(),
            )
            .unwrap();
        let b = ctx
            .create_render(
                PathBuf::from("/videos/b.mp4"),
                Some(out),
                info,
                BlurSettings::default(),
            )
            .unwrap();
        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), 2);
    }

    #[test]
    fn token_admits_exactly_one_caller() {
        let token = ShutdownToken::new();
        assert!(!token.fired());
        assert!(token.fire());
        assert!(!token.fire());
        assert!(token.fired());
    }
}
