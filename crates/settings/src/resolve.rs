//! Settings resolution cascade.
//!
//! Precedence, highest first: explicit path > per-folder config next to the
//! video > global config (only when prefer-global is set) > defaults
//! materialized as a brand-new per-folder file.
//!
//! Every successful load re-serializes the parsed values back to disk. That
//! canonicalization pass normalizes formatting and backfills fields missing
//! from older files, and callers must expect the side effect.

use std::path::{Path, PathBuf};

use smear_common::error::{SmearError, SmearResult};

use crate::hardware::HardwareCaps;
use crate::model::BlurSettings;

/// Name of the per-folder config that lives next to videos.
pub const LOCAL_CONFIG_FILENAME: &str = "smear-config.json";

/// A resolved snapshot plus where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSettings {
    pub settings: BlurSettings,
    /// True when the global config supplied the values.
    pub used_global: bool,
}

/// Resolve the effective settings for one video.
///
/// An explicit path, when given, is loaded alone; it disables the global
/// fallback entirely, and a missing file is a [`SmearError::Config`] (the
/// job is never created). After load, gpu/preset choices are revalidated
/// against the probed hardware.
pub fn resolve(
    video_path: &Path,
    explicit: Option<&Path>,
    prefer_global: bool,
    global_path: &Path,
    caps: &HardwareCaps,
) -> SmearResult<ResolvedSettings> {
    let (mut settings, used_global) = match explicit {
        Some(path) => {
            if !path.is_file() {
                return Err(SmearError::config(format!(
                    "explicit config does not exist: {}",
                    path.display()
                )));
            }
            (load_and_canonicalize(path)?, false)
        }
        None => resolve_cascade(video_path, prefer_global, global_path)?,
    };

    caps.revalidate(&mut settings);
    Ok(ResolvedSettings {
        settings,
        used_global,
    })
}

fn resolve_cascade(
    video_path: &Path,
    prefer_global: bool,
    global_path: &Path,
) -> SmearResult<(BlurSettings, bool)> {
    let local = local_config_path(video_path);

    if local.is_file() {
        tracing::debug!(path = %local.display(), "Using per-folder config");
        return Ok((load_and_canonicalize(&local)?, false));
    }

    if prefer_global && global_path.is_file() {
        tracing::debug!(path = %global_path.display(), "Using global config");
        return Ok((load_and_canonicalize(global_path)?, true));
    }

    tracing::info!(path = %local.display(), "No config found, materializing defaults");
    let settings = BlurSettings::default();
    save(&settings, &local)?;
    Ok((settings, false))
}

/// Path of the per-folder config for a given video.
pub fn local_config_path(video_path: &Path) -> PathBuf {
    video_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(LOCAL_CONFIG_FILENAME)
}

/// Load a config file and write the parsed values straight back.
pub fn load_and_canonicalize(path: &Path) -> SmearResult<BlurSettings> {
    let content = std::fs::read_to_string(path)?;
    let settings: BlurSettings = serde_json::from_str(&content)
        .map_err(|e| SmearError::config(format!("failed to parse {}: {e}", path.display())))?;
    save(&settings, path)?;
    Ok(settings)
}

fn save(settings: &BlurSettings, path: &Path) -> SmearResult<()> {
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, json)?;
    Ok(())
}
