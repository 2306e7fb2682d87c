//! Queue videos and render them in order.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use smear_common::config::{global_config_path, AppSettings};
use smear_render_engine::{EngineContext, RenderOutcome, RenderQueue};
use smear_settings::hardware::HardwareCaps;
use smear_settings::resolve;
use tracing::error;

pub fn run(
    inputs: Vec<PathBuf>,
    outputs: Vec<PathBuf>,
    configs: Vec<PathBuf>,
    prefer_global: bool,
) -> anyhow::Result<()> {
    // List mismatches and missing explicit configs reject the whole
    // invocation before any job exists.
    if !outputs.is_empty() && outputs.len() != inputs.len() {
        anyhow::bail!(
            "got {} outputs for {} inputs; counts must match",
            outputs.len(),
            inputs.len()
        );
    }
    if !configs.is_empty() && configs.len() != inputs.len() {
        anyhow::bail!(
            "got {} configs for {} inputs; counts must match",
            configs.len(),
            inputs.len()
        );
    }
    for config in &configs {
        if !config.is_file() {
            anyhow::bail!("config does not exist: {}", config.display());
        }
    }

    let app = AppSettings::load();
    let caps = HardwareCaps::detect();
    let prefer_global = prefer_global || app.prefer_global_config;
    let global_path = global_config_path();

    let ctx = Arc::new(EngineContext::new(app)?);
    let queue = Arc::new(RenderQueue::new());
    install_callbacks(&queue);
    install_signal_handler(&ctx, &queue);

    let mut queued = 0usize;
    let failed = Arc::new(AtomicUsize::new(0));

    for (index, input) in inputs.iter().enumerate() {
        // One bad input skips that job; the rest of the batch still runs.
        let result = (|| {
            let info = smear_render_engine::probe::probe(input)?;
            let resolved = resolve::resolve(
                input,
                configs.get(index).map(|p| p.as_path()),
                prefer_global,
                &global_path,
                &caps,
            )?;
            let render = ctx.create_render(
                input.clone(),
                outputs.get(index).cloned(),
                info,
                resolved.settings,
            )?;
            queue.push(render);
            Ok::<_, smear_common::error::SmearError>(())
        })();

        if let Err(e) = result {
            error!("skipping {}: {e}", input.display());
            failed.fetch_add(1, Ordering::SeqCst);
        } else {
            queued += 1;
        }
    }

    if queued > 0 {
        println!("Rendering {queued} video(s)...");
    }

    let sink = Arc::clone(&failed);
    queue.on_finished(Arc::new(move |render, outcome| match outcome {
        RenderOutcome::Succeeded => {
            println!("\n[OK] {}", render.output().display());
        }
        RenderOutcome::Stopped => {
            println!("\n[STOPPED] {}", render.input().display());
        }
        RenderOutcome::Failed(report) => {
            println!("\n[FAILED] {}: {report}", render.input().display());
            sink.fetch_add(1, Ordering::SeqCst);
        }
    }));

    queue.process_all();
    ctx.shutdown(&queue);

    let failed = failed.load(Ordering::SeqCst);
    if failed > 0 {
        anyhow::bail!("{failed} of {} video(s) did not render", inputs.len());
    }
    Ok(())
}

fn install_callbacks(queue: &Arc<RenderQueue>) {
    queue.on_progress(Arc::new(|render, status| {
        let name = render
            .output()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        print!("\r{name}: {}", status.text());
        let _ = std::io::stdout().flush();
    }));
}

#[cfg(unix)]
fn install_signal_handler(ctx: &Arc<EngineContext>, queue: &Arc<RenderQueue>) {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let ctx = Arc::clone(ctx);
    let queue = Arc::clone(queue);
    std::thread::spawn(move || {
        let mut signals = match Signals::new([SIGINT, SIGTERM]) {
            Ok(signals) => signals,
            Err(e) => {
                error!("could not install signal handler: {e}");
                return;
            }
        };
        for signal in signals.forever() {
            if ctx.shutdown(&queue) {
                eprintln!("\nstopping after signal {signal}...");
            } else {
                // Second signal: the user is done waiting.
                std::process::exit(130);
            }
        }
    });
}

#[cfg(not(unix))]
fn install_signal_handler(_ctx: &Arc<EngineContext>, _queue: &Arc<RenderQueue>) {}
