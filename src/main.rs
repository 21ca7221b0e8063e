use colored::Colorize;
use erg_kinematics::config::{load_config, Config};
use erg_kinematics::local::process_file::{process_file, process_files, SessionReport};
use erg_kinematics::local::simulate::SyntheticRower;
use erg_kinematics::processing::frame_processor::FrameProcessor;
use erg_kinematics::processing::metrics::StrokeSummary;
use erg_kinematics::Result;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

const USAGE: &str = "usage:
  erg-kinematics process <config.yaml> <frames.csv>
  erg-kinematics batch <config.yaml> <frames.csv>...
  erg-kinematics simulate [seconds] [stroke_period_sec]";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "erg_kinematics=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let result = match args.get(1).map(String::as_str) {
        Some("process") if args.len() == 4 => run_process(&args[2], &args[3]),
        Some("batch") if args.len() >= 4 => run_batch(&args[2], &args[3..]),
        Some("simulate") => run_simulate(args.get(2), args.get(3)),
        _ => {
            println!("{}", USAGE);
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            eprintln!("{} {}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

fn run_process(config_path: &str, frames_path: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let report = process_file(&config, frames_path)?;
    print_report(frames_path, &report);
    Ok(())
}

fn run_batch(config_path: &str, frame_paths: &[String]) -> Result<()> {
    let config = load_config(config_path)?;
    let paths: Vec<PathBuf> = frame_paths.iter().map(PathBuf::from).collect();

    let mut failures = 0;
    for (path, result) in process_files(&config, &paths) {
        match result {
            Ok(report) => print_report(&path.display().to_string(), &report),
            Err(err) => {
                failures += 1;
                println!("{} {}: {}", "failed".red(), path.display(), err);
            }
        }
    }
    if failures > 0 {
        println!("{}", format!("{failures} of {} files failed", paths.len()).yellow());
    }
    Ok(())
}

fn run_simulate(seconds: Option<&String>, period: Option<&String>) -> Result<()> {
    let defaults = SyntheticRower::default();
    let rower = SyntheticRower {
        stroke_period_sec: parse_or(period, defaults.stroke_period_sec),
        noise_deg: 1.5,
        ..defaults
    };
    let seconds = parse_or(seconds, 30.0);

    let mut processor = FrameProcessor::new(Config::default())?;
    for frame in rower.frames(seconds) {
        let output = processor.process_frame(&frame)?;
        for event in output.events() {
            let tag = match event.name() {
                "catch" => event.name().green(),
                _ => event.name().blue(),
            };
            println!("{:>8.3}s  {}", event.timestamp(), tag);
        }
    }

    print_summary(&processor.summary());
    Ok(())
}

fn parse_or(value: Option<&String>, default: f64) -> f64 {
    value
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
        .unwrap_or(default)
}

fn print_report(name: &str, report: &SessionReport) {
    println!(
        "{} ({} frames, {} without a knee angle)",
        name.bold(),
        report.frames,
        report.skipped_frames
    );
    print_summary(&report.summary);
}

fn print_summary(summary: &StrokeSummary) {
    let ratio = summary
        .drive_recovery_ratio
        .map(|r| format!("{:.2}", r))
        .unwrap_or_else(|| "-".to_string());
    println!("  strokes        {}", summary.stroke_count.to_string().green());
    println!("  stroke rate    {} spm", format!("{:.1}", summary.strokes_per_minute).green());
    println!("  drive:recovery {}", ratio.green());
}
