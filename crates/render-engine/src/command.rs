//! Producer/consumer argument construction.
//!
//! A pure mapping from (input, output, probe result, settings) to the two
//! argument lists. The producer owns all interpolation/blur math and gets a
//! serialized settings blob; the consumer re-applies the source color
//! metadata that the piped intermediate stream loses, and handles audio
//! timescaling and encoding.

use std::path::Path;

use smear_common::config::AppSettings;
use smear_common::error::{SmearError, SmearResult};
use smear_settings::hardware::GpuType;
use smear_settings::model::BlurSettings;

use crate::probe::VideoInfo;

/// Name of the frame-generation producer binary.
pub const PRODUCER_PROGRAM: &str = "smear-frames";

/// Name of the encoding consumer binary.
pub const CONSUMER_PROGRAM: &str = "ffmpeg";

/// A program plus its argument list, ready to spawn.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

/// The producer/consumer pair for one render.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandPair {
    pub producer: ProcessCommand,
    pub consumer: ProcessCommand,
}

/// Build the argument lists for a full render.
///
/// Fails without partial output when the settings blob cannot be built.
pub fn build_commands(
    input: &Path,
    output: &Path,
    preview_target: Option<&Path>,
    info: &VideoInfo,
    settings: &BlurSettings,
    app: &AppSettings,
) -> SmearResult<CommandPair> {
    let producer = build_producer(input, info, settings, app, None)?;
    let consumer = build_consumer(input, output, preview_target, info, settings);
    Ok(CommandPair { producer, consumer })
}

/// Build the argument lists for a single-frame preview.
pub fn build_preview_commands(
    input: &Path,
    preview_image: &Path,
    seek_frame: u32,
    info: &VideoInfo,
    settings: &BlurSettings,
    app: &AppSettings,
) -> SmearResult<CommandPair> {
    let producer = build_producer(input, info, settings, app, Some(seek_frame))?;

    let mut args = consumer_base_args(settings);
    args.extend(["-i".to_string(), "-".to_string()]);
    if let Some(filter) = color_metadata_filter(info) {
        args.extend(["-vf".to_string(), filter]);
    }
    args.extend([
        "-frames:v".to_string(),
        "1".to_string(),
        "-update".to_string(),
        "1".to_string(),
        preview_image.display().to_string(),
    ]);

    Ok(CommandPair {
        producer,
        consumer: ProcessCommand::new(CONSUMER_PROGRAM, args),
    })
}

/// Serialize the settings for the producer.
///
/// The producer is opaque; it receives the whole snapshot as JSON. Settings
/// the pipeline cannot run with fail here, before any process is spawned: a
/// referenced interpolation model that does not exist on disk, or a
/// non-positive timescale (config files are not validated on load, so the
/// values can be anything).
pub fn producer_settings_blob(settings: &BlurSettings) -> SmearResult<String> {
    if settings.input_timescale <= 0.0 || settings.output_timescale <= 0.0 {
        return Err(SmearError::serialization(format!(
            "timescale must be positive (input {}, output {})",
            settings.input_timescale, settings.output_timescale
        )));
    }
    if settings.override_advanced {
        if let Some(model) = &settings.advanced.interpolation_model_path {
            if !model.is_file() {
                return Err(SmearError::serialization(format!(
                    "interpolation model not found: {}",
                    model.display()
                )));
            }
        }
    }
    Ok(serde_json::to_string(settings)?)
}

fn build_producer(
    input: &Path,
    info: &VideoInfo,
    settings: &BlurSettings,
    app: &AppSettings,
    seek_frame: Option<u32>,
) -> SmearResult<ProcessCommand> {
    let blob = producer_settings_blob(settings)?;

    let mut args = vec![
        "--input".to_string(),
        input.display().to_string(),
        "--fps".to_string(),
        format!("{}/{}", info.fps_num, info.fps_den),
    ];

    for (flag, value) in [
        ("--color-range", &info.color_range),
        ("--color-space", &info.color_space),
        ("--color-transfer", &info.color_transfer),
        ("--color-primaries", &info.color_primaries),
    ] {
        if let Some(value) = value {
            args.extend([flag.to_string(), value.clone()]);
        }
    }

    if let Some(pix_fmt) = &info.pix_fmt {
        args.extend(["--source-pix-fmt".to_string(), pix_fmt.clone()]);
    }

    if settings.gpu_interpolation {
        args.extend([
            "--gpu-device".to_string(),
            app.gpu_device_index.to_string(),
        ]);
    }

    if let Some(frame) = seek_frame {
        args.extend([
            "--start-frame".to_string(),
            frame.to_string(),
            "--frame-count".to_string(),
            "1".to_string(),
        ]);
    }

    args.extend(["--settings-json".to_string(), blob]);

    // Chosen at compile time, never from runtime input.
    #[cfg(windows)]
    args.push("--no-console-window".to_string());

    args.extend(["--output".to_string(), "-".to_string()]);

    Ok(ProcessCommand::new(PRODUCER_PROGRAM, args))
}

fn build_consumer(
    input: &Path,
    output: &Path,
    preview_target: Option<&Path>,
    info: &VideoInfo,
    settings: &BlurSettings,
) -> ProcessCommand {
    let mut args = consumer_base_args(settings);

    // Input 0 is the piped frame stream, input 1 the source (for audio).
    args.extend([
        "-i".to_string(),
        "-".to_string(),
        "-i".to_string(),
        input.display().to_string(),
        "-map".to_string(),
        "0:v".to_string(),
        "-map".to_string(),
        "1:a?".to_string(),
    ]);

    if let Some(filter) = color_metadata_filter(info) {
        args.extend(["-vf".to_string(), filter]);
    }

    if settings.timescale_active() {
        args.extend([
            "-af".to_string(),
            audio_filter_chain(settings, info.sample_rate),
        ]);
    }

    if settings.custom_ffmpeg_filters.is_empty() {
        args.extend(encoder_args(settings));
    } else {
        // The override string replaces preset/quality/GPU selection wholesale.
        args.extend(
            settings
                .custom_ffmpeg_filters
                .split_whitespace()
                .map(str::to_string),
        );
    }

    if settings.video_container == "mp4" {
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);
    }

    args.push(output.display().to_string());

    // Secondary single-frame preview target.
    if let Some(preview) = preview_target {
        args.extend([
            "-map".to_string(),
            "0:v".to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-update".to_string(),
            "1".to_string(),
            preview.display().to_string(),
        ]);
    }

    ProcessCommand::new(CONSUMER_PROGRAM, args)
}

fn consumer_base_args(settings: &BlurSettings) -> Vec<String> {
    let loglevel = if settings.override_advanced {
        settings.advanced.ffmpeg_loglevel.as_str()
    } else {
        "error"
    };
    vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        loglevel.to_string(),
        "-nostats".to_string(),
    ]
}

/// Re-apply the source color metadata lost by the piped stream.
fn color_metadata_filter(info: &VideoInfo) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(range) = &info.color_range {
        parts.push(format!("range={range}"));
    }
    if let Some(space) = &info.color_space {
        parts.push(format!("colorspace={space}"));
    }
    if let Some(transfer) = &info.color_transfer {
        parts.push(format!("color_trc={transfer}"));
    }
    if let Some(primaries) = &info.color_primaries {
        parts.push(format!("color_primaries={primaries}"));
    }
    if parts.is_empty() {
        return None;
    }
    Some(format!("setparams={}", parts.join(":")))
}

/// Audio chain for timescaled renders.
///
/// With pitch adjustment the sample rate itself is scaled (audio speeds up
/// and shifts pitch together); without it `atempo` stages keep the original
/// pitch. `atempo` only accepts factors in [0.5, 100], so extreme slowdowns
/// are split across stages.
fn audio_filter_chain(settings: &BlurSettings, sample_rate: i32) -> String {
    let rate = if sample_rate > 0 { sample_rate } else { 48000 };
    let speed = settings.input_timescale * settings.output_timescale;

    if settings.adjust_timescaled_audio_pitch {
        return format!("asetrate={rate}*{speed},aresample={rate}");
    }

    let mut stages = Vec::new();
    let mut remaining = speed;
    while remaining < 0.5 {
        stages.push("atempo=0.5".to_string());
        remaining /= 0.5;
    }
    while remaining > 100.0 {
        stages.push("atempo=100.0".to_string());
        remaining /= 100.0;
    }
    stages.push(format!("atempo={remaining}"));
    stages.join(",")
}

/// Encoder selection from preset/quality/GPU. The quality knob is CRF-style
/// for software encoders and the closest equivalent for hardware ones.
fn encoder_args(settings: &BlurSettings) -> Vec<String> {
    let quality = settings.quality.to_string();
    let gpu = GpuType::parse(&settings.gpu_type).unwrap_or(GpuType::Cpu);
    let gpu = if settings.gpu_encoding { gpu } else { GpuType::Cpu };

    let mut args: Vec<String> = match (gpu, settings.encode_preset.as_str()) {
        (GpuType::Nvidia, "h264") => svec(&["-c:v", "h264_nvenc", "-preset", "p7", "-cq", &quality]),
        (GpuType::Nvidia, "h265") => svec(&["-c:v", "hevc_nvenc", "-preset", "p7", "-cq", &quality]),
        (GpuType::Nvidia, "av1") => svec(&["-c:v", "av1_nvenc", "-preset", "p7", "-cq", &quality]),
        (GpuType::Amd, "h264") => svec(&["-c:v", "h264_amf", "-rc", "cqp", "-qp_i", &quality, "-qp_p", &quality]),
        (GpuType::Amd, "h265") => svec(&["-c:v", "hevc_amf", "-rc", "cqp", "-qp_i", &quality, "-qp_p", &quality]),
        (GpuType::Intel, "h264") => svec(&["-c:v", "h264_qsv", "-global_quality", &quality]),
        (GpuType::Intel, "h265") => svec(&["-c:v", "hevc_qsv", "-global_quality", &quality]),
        (GpuType::Intel, "av1") => svec(&["-c:v", "av1_qsv", "-global_quality", &quality]),
        (_, "h265") => svec(&["-c:v", "libx265", "-preset", "medium", "-crf", &quality]),
        (_, "av1") => svec(&["-c:v", "libsvtav1", "-crf", &quality]),
        (_, "vp9") => svec(&["-c:v", "libvpx-vp9", "-crf", &quality, "-b:v", "0"]),
        (_, "prores") => svec(&["-c:v", "prores_ks", "-profile:v", "3"]),
        _ => svec(&["-c:v", "libx264", "-preset", "slower", "-crf", &quality]),
    };

    let pix_fmt = if settings.override_advanced {
        settings.advanced.pix_fmt.as_str()
    } else {
        "yuv420p"
    };
    args.extend(["-pix_fmt".to_string(), pix_fmt.to_string()]);

    let audio_codec = if settings.encode_preset == "vp9" {
        "libopus"
    } else {
        "aac"
    };
    args.extend([
        "-c:a".to_string(),
        audio_codec.to_string(),
        "-b:a".to_string(),
        "320k".to_string(),
    ]);

    args
}

fn svec(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
