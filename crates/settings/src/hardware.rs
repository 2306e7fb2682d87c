//! Hardware capability probing and settings revalidation.
//!
//! Config files travel between machines, so the gpu/preset choices they
//! carry are checked against the hardware actually present before a job is
//! created. An unavailable gpu type degrades to the primary probed type (or
//! cpu), and a preset the resolved type cannot encode falls back to h264.

use std::process::Command;

use crate::model::BlurSettings;

/// GPU vendor families the encoder selection understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuType {
    Nvidia,
    Amd,
    Intel,
    Cpu,
}

impl GpuType {
    pub fn as_str(self) -> &'static str {
        match self {
            GpuType::Nvidia => "nvidia",
            GpuType::Amd => "amd",
            GpuType::Intel => "intel",
            GpuType::Cpu => "cpu",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "nvidia" => Some(GpuType::Nvidia),
            "amd" => Some(GpuType::Amd),
            "intel" => Some(GpuType::Intel),
            "cpu" => Some(GpuType::Cpu),
            _ => None,
        }
    }
}

/// Encode preset families each gpu type can drive.
pub fn supported_presets(gpu: GpuType) -> &'static [&'static str] {
    match gpu {
        GpuType::Nvidia => &["h264", "h265", "av1"],
        GpuType::Amd => &["h264", "h265"],
        GpuType::Intel => &["h264", "h265", "av1"],
        GpuType::Cpu => &["h264", "h265", "av1", "vp9", "prores"],
    }
}

/// GPU types probed on this machine, in preference order. Always ends with
/// cpu, which every machine supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareCaps {
    available: Vec<GpuType>,
}

impl HardwareCaps {
    /// Probe the local machine once.
    pub fn detect() -> Self {
        let mut available = Vec::new();

        if nvidia_smi_present() {
            available.push(GpuType::Nvidia);
        }

        #[cfg(target_os = "linux")]
        for vendor in drm_vendor_ids() {
            let gpu = match vendor.as_str() {
                "0x10de" => GpuType::Nvidia,
                "0x1002" => GpuType::Amd,
                "0x8086" => GpuType::Intel,
                _ => continue,
            };
            if !available.contains(&gpu) {
                available.push(gpu);
            }
        }

        available.push(GpuType::Cpu);
        tracing::debug!(?available, "Probed GPU types");
        Self { available }
    }

    /// Build caps from a known list (tests, overrides). Cpu is appended if
    /// absent.
    pub fn from_types(mut available: Vec<GpuType>) -> Self {
        if !available.contains(&GpuType::Cpu) {
            available.push(GpuType::Cpu);
        }
        Self { available }
    }

    pub fn available(&self) -> &[GpuType] {
        &self.available
    }

    /// The preferred gpu type on this machine: the first probed non-cpu
    /// type, or cpu when none exists.
    pub fn primary(&self) -> GpuType {
        self.available
            .iter()
            .copied()
            .find(|g| *g != GpuType::Cpu)
            .unwrap_or(GpuType::Cpu)
    }

    pub fn has(&self, gpu: GpuType) -> bool {
        self.available.contains(&gpu)
    }

    /// Rewrite gpu_type/encode_preset in place so they match this machine.
    pub fn revalidate(&self, settings: &mut BlurSettings) {
        let requested = GpuType::parse(&settings.gpu_type);
        let resolved = match requested {
            Some(gpu) if self.has(gpu) => gpu,
            _ => {
                let fallback = self.primary();
                tracing::warn!(
                    requested = %settings.gpu_type,
                    resolved = fallback.as_str(),
                    "Configured gpu_type is not available on this machine"
                );
                settings.gpu_type = fallback.as_str().to_string();
                fallback
            }
        };

        if !supported_presets(resolved).contains(&settings.encode_preset.as_str()) {
            tracing::warn!(
                preset = %settings.encode_preset,
                gpu = resolved.as_str(),
                "Configured encode_preset is not supported by the resolved gpu type"
            );
            settings.encode_preset = "h264".to_string();
        }
    }
}

fn nvidia_smi_present() -> bool {
    Command::new("nvidia-smi")
        .arg("-L")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(target_os = "linux")]
fn drm_vendor_ids() -> Vec<String> {
    let Ok(entries) = std::fs::read_dir("/sys/class/drm") else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .filter_map(|e| std::fs::read_to_string(e.path().join("device/vendor")).ok())
        .map(|v| v.trim().to_string())
        .collect()
}
