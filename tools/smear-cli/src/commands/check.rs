//! Check hardware capabilities and external tools.

use std::process::{Command, Stdio};

use smear_render_engine::command::{CONSUMER_PROGRAM, PRODUCER_PROGRAM};
use smear_settings::hardware::{supported_presets, GpuType, HardwareCaps};

pub fn run() -> anyhow::Result<()> {
    println!("Smear System Check");
    println!("{}", "=".repeat(50));

    let caps = HardwareCaps::detect();
    for gpu in caps.available() {
        if *gpu == GpuType::Cpu {
            continue;
        }
        println!(
            "[OK] GPU: {} (presets: {})",
            gpu.as_str(),
            supported_presets(*gpu).join(", ")
        );
    }
    match caps.primary() {
        GpuType::Cpu => println!("[WARN] No GPU detected; encoding will use the CPU"),
        primary => println!("[OK] Primary GPU: {}", primary.as_str()),
    }

    let mut all_present = true;
    for tool in [PRODUCER_PROGRAM, CONSUMER_PROGRAM, "ffprobe"] {
        if tool_present(tool) {
            println!("[OK] {tool} found");
        } else {
            println!("[MISSING] {tool} not found in PATH");
            all_present = false;
        }
    }

    println!();
    if all_present {
        println!("All external tools are available. Smear is ready.");
    } else {
        println!("Some external tools are missing. Install them and re-run.");
    }

    Ok(())
}

fn tool_present(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}
