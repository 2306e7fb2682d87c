//! Input metadata probing.
//!
//! Wraps an `ffprobe` invocation and distills its JSON into the `VideoInfo`
//! every job carries. Probing happens once per input, before the job is
//! created; an input without a video stream is never queued.

use std::path::Path;
use std::process::Command;

use serde::Deserialize;
use smear_common::error::{SmearError, SmearResult};

/// Metadata for one input video. Immutable, owned by its render.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub has_video_stream: bool,

    /// Frame rate as an exact rational.
    pub fps_num: u32,
    pub fps_den: u32,

    /// Color metadata, re-applied to the consumer because the piped
    /// intermediate stream loses it.
    pub color_range: Option<String>,
    pub color_space: Option<String>,
    pub color_transfer: Option<String>,
    pub color_primaries: Option<String>,

    pub pix_fmt: Option<String>,

    /// Audio sample rate; -1 when unknown or no audio stream exists.
    pub sample_rate: i32,
}

impl VideoInfo {
    pub fn fps(&self) -> f64 {
        if self.fps_den == 0 {
            return 0.0;
        }
        self.fps_num as f64 / self.fps_den as f64
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    r_frame_rate: Option<String>,
    color_range: Option<String>,
    color_space: Option<String>,
    color_transfer: Option<String>,
    color_primaries: Option<String>,
    pix_fmt: Option<String>,
    sample_rate: Option<String>,
}

/// Probe one input file.
pub fn probe(path: &Path) -> SmearResult<VideoInfo> {
    if !path.is_file() {
        return Err(SmearError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| SmearError::spawn("ffprobe", e.to_string()))?;

    if !output.status.success() {
        return Err(SmearError::ProcessExit {
            program: "ffprobe".to_string(),
            status: output.status.code().unwrap_or(-1),
            diagnostics: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout), path)
}

fn parse_probe_output(json: &str, path: &Path) -> SmearResult<VideoInfo> {
    let parsed: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| SmearError::probe(format!("unreadable ffprobe output: {e}")))?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| {
            SmearError::probe(format!("no video stream in {}", path.display()))
        })?;

    // The producer is launched with this rate; a stream without a readable
    // rate is rejected here rather than handed downstream as 0 fps.
    let (fps_num, fps_den) = video
        .r_frame_rate
        .as_deref()
        .and_then(parse_rational)
        .ok_or_else(|| {
            SmearError::probe(format!("no usable frame rate in {}", path.display()))
        })?;

    let sample_rate = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .and_then(|s| s.sample_rate.as_deref())
        .and_then(|s| s.parse().ok())
        .unwrap_or(-1);

    Ok(VideoInfo {
        has_video_stream: true,
        fps_num,
        fps_den,
        color_range: video.color_range.clone(),
        color_space: video.color_space.clone(),
        color_transfer: video.color_transfer.clone(),
        color_primaries: video.color_primaries.clone(),
        pix_fmt: video.pix_fmt.clone(),
        sample_rate,
    })
}

fn parse_rational(value: &str) -> Option<(u32, u32)> {
    let (num, den) = value.split_once('/')?;
    let num = num.trim().parse().ok()?;
    let den = den.trim().parse().ok()?;
    if den == 0 {
        return None;
    }
    Some((num, den))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SAMPLE: &str = r#"{
        "streams": [
            {
                "codec_type": "video",
                "r_frame_rate": "60000/1001",
                "color_range": "tv",
                "color_space": "bt709",
                "color_transfer": "bt709",
                "color_primaries": "bt709",
                "pix_fmt": "yuv420p"
            },
            {
                "codec_type": "audio",
                "sample_rate": "48000"
            }
        ]
    }"#;

    #[test]
    fn parses_video_and_audio_streams() {
        let info = parse_probe_output(SAMPLE, &PathBuf::from("clip.mp4")).unwrap();
        assert!(info.has_video_stream);
        assert_eq!((info.fps_num, info.fps_den), (60000, 1001));
        assert!((info.fps() - 59.94).abs() < 0.01);
        assert_eq!(info.color_space.as_deref(), Some("bt709"));
        assert_eq!(info.pix_fmt.as_deref(), Some("yuv420p"));
        assert_eq!(info.sample_rate, 48000);
    }

    #[test]
    fn audio_only_input_is_a_probe_error() {
        let json = r#"{ "streams": [ { "codec_type": "audio", "sample_rate": "44100" } ] }"#;
        let err = parse_probe_output(json, &PathBuf::from("song.flac")).unwrap_err();
        assert!(matches!(err, SmearError::Probe { .. }));
    }

    #[test]
    fn missing_audio_reports_unknown_sample_rate() {
        let json = r#"{ "streams": [ { "codec_type": "video", "r_frame_rate": "30/1" } ] }"#;
        let info = parse_probe_output(json, &PathBuf::from("silent.mp4")).unwrap();
        assert_eq!(info.sample_rate, -1);
        assert_eq!((info.fps_num, info.fps_den), (30, 1));
        assert!(info.color_range.is_none());
    }

    #[test]
    fn video_stream_without_a_frame_rate_is_a_probe_error() {
        let json = r#"{ "streams": [ { "codec_type": "video", "pix_fmt": "yuv420p" } ] }"#;
        let err = parse_probe_output(json, &PathBuf::from("odd.mp4")).unwrap_err();
        assert!(matches!(err, SmearError::Probe { .. }));

        let json = r#"{ "streams": [ { "codec_type": "video", "r_frame_rate": "0/0" } ] }"#;
        let err = parse_probe_output(json, &PathBuf::from("odd.mp4")).unwrap_err();
        assert!(matches!(err, SmearError::Probe { .. }));
    }

    #[test]
    fn missing_input_is_file_not_found() {
        let err = probe(&PathBuf::from("/nonexistent/clip.mp4")).unwrap_err();
        assert!(matches!(err, SmearError::FileNotFound { .. }));
    }

    #[test]
    fn zero_denominator_rational_is_rejected() {
        assert_eq!(parse_rational("30/0"), None);
        assert_eq!(parse_rational("not-a-rate"), None);
        assert_eq!(parse_rational("24000/1001"), Some((24000, 1001)));
    }
}
