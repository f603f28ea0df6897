use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "reelforge", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a job spec JSON to an MP4 (requires `ffmpeg` on PATH).
    Render(RenderArgs),
    /// Print a pre-flight cost estimate without rendering anything.
    Estimate(EstimateArgs),
    /// Delete job output directories older than the retention window.
    Sweep(SweepArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input job spec JSON.
    #[arg(long = "spec")]
    spec_path: PathBuf,

    /// Task id used for progress keying (defaults to the job id).
    #[arg(long)]
    task_id: Option<String>,

    /// Soft time limit in seconds; the render aborts gracefully past it.
    #[arg(long)]
    soft_time_limit_secs: Option<u64>,
}

#[derive(Parser, Debug)]
struct EstimateArgs {
    /// Expected output duration in seconds.
    #[arg(long)]
    duration: f64,

    #[arg(long, default_value_t = 1080)]
    width: u32,

    #[arg(long, default_value_t = 1920)]
    height: u32,

    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Multiplier for complex renders (1.0 = normal).
    #[arg(long, default_value_t = 1.0)]
    complexity: f64,
}

#[derive(Parser, Debug)]
struct SweepArgs {
    /// Output root holding per-job directories.
    #[arg(long)]
    root: PathBuf,

    #[arg(long, default_value_t = 24)]
    max_age_hours: u64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Estimate(args) => cmd_estimate(args),
        Command::Sweep(args) => cmd_sweep(args),
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let payload = std::fs::read_to_string(&args.spec_path)
        .with_context(|| format!("read job spec '{}'", args.spec_path.display()))?;

    let task_id = match &args.task_id {
        Some(id) => id.clone(),
        None => serde_json::from_str::<serde_json::Value>(&payload)
            .ok()
            .and_then(|v| v.get("job_id")?.as_str().map(str::to_string))
            .unwrap_or_else(|| "local".to_string()),
    };

    let store = Arc::new(reelforge::InMemoryResultStore::new());
    let mut worker = reelforge::JobWorker::new(store as Arc<dyn reelforge::ResultStore>);
    if let Some(secs) = args.soft_time_limit_secs {
        worker = worker.with_soft_time_limit(Duration::from_secs(secs));
    }

    let result = worker.run(&task_id, &payload);
    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_estimate(args: EstimateArgs) -> anyhow::Result<()> {
    let calculator = reelforge::CostCalculator::from_env();
    let estimate = calculator.estimate(
        args.duration,
        args.width,
        args.height,
        args.fps,
        args.complexity,
    );
    println!("{}", serde_json::to_string_pretty(&estimate)?);
    Ok(())
}

fn cmd_sweep(args: SweepArgs) -> anyhow::Result<()> {
    let stats = reelforge::cleanup::sweep_output_root(
        &args.root,
        Duration::from_secs(args.max_age_hours * 3600),
    )?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
