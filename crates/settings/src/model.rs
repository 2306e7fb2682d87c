//! Per-video render settings.
//!
//! A `BlurSettings` value is resolved once at job creation, copied into the
//! render, and never mutated afterward. Full structural equality drives
//! unsaved-changes detection in frontends, so every field participates in
//! `PartialEq`.
//!
//! Serde defaults on every field let the canonicalizing re-save in
//! [`crate::resolve`] backfill keys missing from older files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The full settings snapshot for one render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurSettings {
    // Blur
    /// Enable motion blur.
    pub blur: bool,

    /// Fraction of the frame interval each output frame integrates over.
    pub blur_amount: f64,

    /// Output frame rate after blurring.
    pub blur_output_fps: u32,

    /// Frame weighting function: "equal", "gaussian", "gaussian_sym",
    /// "pyramid", "vegas".
    pub blur_weighting: String,

    /// Gamma applied before averaging so bright frames keep their weight.
    pub blur_gamma: f64,

    // Interpolation
    /// Enable frame interpolation before blurring.
    pub interpolate: bool,

    /// Interpolation target: a multiplier like "5x" or an absolute rate.
    pub interpolated_fps: String,

    /// Interpolation engine: "svp" or "rife".
    pub interpolation_method: String,

    // Pre-interpolation
    /// Run a cheaper interpolation pass before the main one.
    pub pre_interpolate: bool,

    /// Target rate for the pre-interpolation pass.
    pub pre_interpolated_fps: String,

    // Deduplication
    /// Detect and re-interpolate duplicate source frames.
    pub deduplicate: bool,

    /// How many neighboring frames to search for a replacement.
    pub deduplicate_range: i32,

    /// Difference threshold below which two frames count as duplicates.
    pub deduplicate_threshold: f64,

    // Encoding
    /// Encoder quality (CRF-style; lower is better).
    pub quality: u32,

    /// Encode preset family: "h264", "h265", "av1", "vp9", "prores".
    pub encode_preset: String,

    /// Output container extension.
    pub video_container: String,

    /// When non-empty, replaces preset/quality/GPU encoder selection wholesale.
    pub custom_ffmpeg_filters: String,

    /// Emit a single-frame preview image alongside the render.
    pub preview: bool,

    /// Summarize active parameters in the output filename.
    pub detailed_filenames: bool,

    /// Copy the source file's modified time onto the output on success.
    pub copy_dates: bool,

    // GPU
    /// Use the GPU for interpolation.
    pub gpu_interpolation: bool,

    /// Use a hardware encoder.
    pub gpu_encoding: bool,

    /// GPU vendor for encoding ("nvidia", "amd", "intel", "cpu").
    pub gpu_type: String,

    // Timescale
    /// Speed factor applied to the input before processing.
    pub input_timescale: f64,

    /// Speed factor applied to the output.
    pub output_timescale: f64,

    /// Keep audio pitch constant when timescaling.
    pub adjust_timescaled_audio_pitch: bool,

    // Color filters
    pub brightness: f64,
    pub saturation: f64,
    pub contrast: f64,

    // Advanced
    /// When false, the `advanced` record is carried but ignored.
    pub override_advanced: bool,

    pub advanced: AdvancedSettings,
}

/// Tuning knobs meaningful only when `override_advanced` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedSettings {
    /// Standard deviation for the gaussian weighting functions.
    pub blur_weighting_gaussian_std_dev: f64,

    /// Reverse the triangle weighting ramp.
    pub blur_weighting_triangle_reverse: bool,

    /// Clamp bounds for weighting, as "[lo,hi]".
    pub blur_weighting_bound: String,

    /// Motion-estimation block size.
    pub interpolation_block_size: u32,

    /// Area threshold for interpolation artifact masking (0 = off).
    pub interpolation_mask_area: u32,

    /// Model file for rife interpolation. Serialization of the producer blob
    /// fails if this is set and the file does not exist.
    pub interpolation_model_path: Option<PathBuf>,

    /// SVP preset name.
    pub svp_preset: String,

    /// SVP algorithm id.
    pub svp_algorithm: String,

    /// Pixel format handed to the encoder.
    pub pix_fmt: String,

    /// ffmpeg loglevel for the consumer process.
    pub ffmpeg_loglevel: String,

    /// Keep producer debug output in the diagnostic stream.
    pub debug: bool,
}

impl Default for BlurSettings {
    fn default() -> Self {
        Self {
            blur: true,
            blur_amount: 1.0,
            blur_output_fps: 60,
            blur_weighting: "equal".to_string(),
            blur_gamma: 1.0,
            interpolate: true,
            interpolated_fps: "5x".to_string(),
            interpolation_method: "svp".to_string(),
            pre_interpolate: false,
            pre_interpolated_fps: "360".to_string(),
            deduplicate: true,
            deduplicate_range: 2,
            deduplicate_threshold: 0.001,
            quality: 18,
            encode_preset: "h264".to_string(),
            video_container: "mp4".to_string(),
            custom_ffmpeg_filters: String::new(),
            preview: false,
            detailed_filenames: false,
            copy_dates: false,
            gpu_interpolation: true,
            gpu_encoding: false,
            gpu_type: "cpu".to_string(),
            input_timescale: 1.0,
            output_timescale: 1.0,
            adjust_timescaled_audio_pitch: false,
            brightness: 1.0,
            saturation: 1.0,
            contrast: 1.0,
            override_advanced: false,
            advanced: AdvancedSettings::default(),
        }
    }
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            blur_weighting_gaussian_std_dev: 2.0,
            blur_weighting_triangle_reverse: false,
            blur_weighting_bound: "[0,2]".to_string(),
            interpolation_block_size: 16,
            interpolation_mask_area: 0,
            interpolation_model_path: None,
            svp_preset: "weak".to_string(),
            svp_algorithm: "13".to_string(),
            pix_fmt: "yuv420p".to_string(),
            ffmpeg_loglevel: "error".to_string(),
            debug: false,
        }
    }
}

impl BlurSettings {
    /// Whether any timescale processing is active.
    pub fn timescale_active(&self) -> bool {
        self.input_timescale != 1.0 || self.output_timescale != 1.0
    }

    /// Short human-readable summary of the active blur/interpolation
    /// parameters, used by the detailed-filenames output policy.
    pub fn filename_details(&self) -> String {
        let mut parts = Vec::new();
        if self.blur {
            parts.push(format!("{}fps", self.blur_output_fps));
            parts.push(format!("{}", self.blur_amount));
        }
        if self.interpolate {
            parts.push(self.interpolated_fps.clone());
        }
        parts.join("~")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_field_by_field() {
        let a = BlurSettings::default();
        let mut b = BlurSettings::default();
        assert_eq!(a, b);

        b.advanced.interpolation_block_size = 32;
        assert_ne!(a, b);

        b.advanced.interpolation_block_size = 16;
        assert_eq!(a, b);
    }

    #[test]
    fn missing_fields_are_backfilled_on_parse() {
        let parsed: BlurSettings =
            serde_json::from_str(r#"{ "blur_amount": 0.5, "quality": 30 }"#).unwrap();
        assert_eq!(parsed.blur_amount, 0.5);
        assert_eq!(parsed.quality, 30);
        // Everything else holds its default.
        assert_eq!(parsed.encode_preset, "h264");
        assert_eq!(parsed.advanced, AdvancedSettings::default());
    }

    #[test]
    fn filename_details_reflects_enabled_stages() {
        let mut settings = BlurSettings::default();
        settings.blur_output_fps = 144;
        settings.blur_amount = 0.6;
        settings.interpolated_fps = "10x".to_string();
        assert_eq!(settings.filename_details(), "144fps~0.6~10x");

        settings.interpolate = false;
        assert_eq!(settings.filename_details(), "144fps~0.6");

        settings.blur = false;
        assert_eq!(settings.filename_details(), "");
    }

    proptest::proptest! {
        #[test]
        fn serde_round_trip_preserves_equality(
            quality in 0u32..52,
            blur_amount in 0.0f64..2.0,
            fps in 1u32..960,
            timescale in 0.1f64..4.0,
        ) {
            let mut settings = BlurSettings::default();
            settings.quality = quality;
            settings.blur_amount = blur_amount;
            settings.blur_output_fps = fps;
            settings.output_timescale = timescale;

            let json = serde_json::to_string(&settings).unwrap();
            let back: BlurSettings = serde_json::from_str(&json).unwrap();
            proptest::prop_assert_eq!(settings, back);
        }
    }

    #[test]
    fn timescale_active_checks_both_directions() {
        let mut settings = BlurSettings::default();
        assert!(!settings.timescale_active());
        settings.input_timescale = 0.5;
        assert!(settings.timescale_active());
        settings.input_timescale = 1.0;
        settings.output_timescale = 2.0;
        assert!(settings.timescale_active());
    }
}
