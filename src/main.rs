use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::ProgressBar;
use log::Level;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use folder2pdf::accelerator;
use folder2pdf::cli::Args;
use folder2pdf::image_processing::ConversionConfig;
use folder2pdf::json_output::JsonMessage;
use folder2pdf::progress::{LogEntry, ProgressMessage, RunProgress};
use folder2pdf::report;
use folder2pdf::temp_session::TempSession;
use folder2pdf::utils::{
    create_progress_bar, error_println, verbose_println, warn_println, PROGRESS_STEPS,
};
use folder2pdf::worker::spawn_conversion;

/// Append-only run log on disk
struct LogFile {
    file: File,
}

impl LogFile {
    fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        Ok(Self { file })
    }

    fn append(&mut self, entry: &LogEntry) {
        // A full disk must not stop the conversion
        let _ = writeln!(self.file, "{}", entry);
    }
}

/// Handle --temp-status, --clean-temp, --clean-all-temp and --gpu-info
fn run_maintenance(args: &Args) -> Result<()> {
    if args.gpu_info {
        let probe = accelerator::probe();
        if args.json_progress {
            println!("{}", serde_json::to_string(&probe)?);
        } else {
            report::print_accelerator(&probe);
            println!();
        }
    }

    let mut session = TempSession::new().context("Failed to prepare temp folder")?;
    verbose_println(
        args.verbose && !args.json_progress,
        &format!("Temp folder: {}", session.app_root().display()),
    );

    if args.clean_temp || args.clean_all_temp {
        let adopted = session.adopt_existing_sessions();
        verbose_println(
            args.verbose && !args.json_progress,
            &format!("Found {} session folder(s) from earlier runs", adopted),
        );
        let cleanup = session.cleanup(args.clean_all_temp);
        if !args.json_progress {
            report::print_cleanup(&cleanup);
            println!();
        }
    }

    // Current usage is always shown last
    if !args.json_progress {
        report::print_temp_usage(&session.measure());
    }

    Ok(())
}

fn print_configuration(config: &ConversionConfig) {
    println!("{}", style("Configuration:").bold());
    println!("  Input folder: {}", config.input_dir.display());
    println!("  Output: {}", config.output.display());
    println!("  Sort by name: {}", config.sort_by_name);
    println!("  Preserve ratio (temp files): {}", config.preserve_aspect_ratio);
    println!("  Split by ratio: {}", config.split_by_ratio);
    println!("  Force GPU: {}", config.force_accelerator);
    println!("  Auto clean temp: {}", config.auto_clean_temp);
    println!("  Extensions: {:?}", config.extensions);
    println!();
}

fn main() -> Result<()> {
    let mut args = Args::parse();
    args.load_and_merge_config()?;
    let json = args.json_progress;

    if !json {
        println!("{}", style("folder2pdf - Image folder to PDF").bold().blue());
        println!();
    }

    if args.is_maintenance() {
        return run_maintenance(&args);
    }

    let config = args.conversion_config().map_err(anyhow::Error::msg)?;
    if args.verbose && !json {
        print_configuration(&config);
    }

    let mut log_file = match &args.log_file {
        Some(path) => Some(LogFile::open(path)?),
        None => None,
    };

    let session = TempSession::new().context("Failed to prepare temp folder")?;
    let handle = spawn_conversion(config, session);

    let progress_bar = if json {
        ProgressBar::hidden()
    } else {
        create_progress_bar(PROGRESS_STEPS)
    };

    let mut progress = RunProgress::default();
    for message in handle.messages().iter() {
        match &message {
            ProgressMessage::Stage(stage) => progress_bar.set_message(stage.to_string()),
            ProgressMessage::Progress { current, .. } => {
                if !current.is_empty() {
                    progress_bar.set_message(current.clone());
                }
            }
            ProgressMessage::Log(entry) => {
                if let Some(log_file) = log_file.as_mut() {
                    log_file.append(entry);
                }
                if json {
                    JsonMessage::log(entry);
                } else if args.verbose || entry.level == Level::Error {
                    progress_bar.println(entry.to_string());
                }
            }
            ProgressMessage::Finished => {}
        }

        let moves_bar = matches!(
            message,
            ProgressMessage::Stage(_) | ProgressMessage::Progress { .. }
        );
        progress.apply(message);
        progress_bar.set_position((progress.fraction * PROGRESS_STEPS as f32) as u64);
        if json && moves_bar {
            JsonMessage::progress(
                progress.stage.to_string(),
                progress.fraction,
                &progress.current_item,
            );
        }
        if progress.finished {
            break;
        }
    }
    progress_bar.finish_and_clear();

    match handle.join() {
        Ok(result) => {
            if json {
                for outcome in result.outputs.values() {
                    JsonMessage::bucket_completed(outcome);
                }
                JsonMessage::summary(&result);
            } else {
                report::print_summary(&result);
                let problems = progress.problem_count();
                if problems > 0 {
                    println!();
                    warn_println(&format!(
                        "{} warning(s) during the run{}",
                        problems,
                        if args.log_file.is_some() {
                            ", see the log file"
                        } else {
                            ", use --verbose for details"
                        }
                    ));
                }
            }
            Ok(())
        }
        Err(e) => {
            if json {
                JsonMessage::failed(e.to_string());
            } else {
                error_println(&e.to_string());
            }
            std::process::exit(1);
        }
    }
}
