//! Console reports shown at the end of a run or a maintenance command

use console::style;
use prettytable::{format, Cell, Row, Table};

use crate::accelerator::AcceleratorReport;
use crate::image_processing::ConversionResult;
use crate::temp_session::{CleanupReport, TempUsage};
use crate::utils::{format_duration, format_megabytes};

/// Truncate string to max length, keeping the end of the string
fn truncate_start(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s.to_string()
    } else {
        let tail: String = chars[chars.len() - (max_len - 3)..].iter().collect();
        format!("...{}", tail)
    }
}

/// One row per output bucket
pub fn summary_table(result: &ConversionResult) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);

    table.add_row(Row::new(vec![
        Cell::new("Bucket"),
        Cell::new("Output"),
        Cell::new("Images"),
        Cell::new("Pages"),
        Cell::new("Skipped"),
        Cell::new("Status"),
    ]));

    for outcome in result.outputs.values() {
        let status = match (&outcome.error, outcome.strategy) {
            (Some(error), _) => format!("failed: {}", error),
            (None, Some(strategy)) => format!("ok ({})", strategy),
            (None, None) => "ok".to_string(),
        };
        table.add_row(Row::new(vec![
            Cell::new(outcome.bucket.description()),
            Cell::new(&truncate_start(&outcome.output.display().to_string(), 40)),
            Cell::new(&outcome.attempted.to_string()),
            Cell::new(&outcome.embedded.to_string()),
            Cell::new(&outcome.skipped.to_string()),
            Cell::new(&status),
        ]));
    }

    table
}

pub fn print_summary(result: &ConversionResult) {
    println!();
    println!("{}", style("Results Summary:").bold().green());
    summary_table(result).printstd();

    println!(
        "  Images found: {}  embedded: {}  skipped: {}",
        style(result.discovered).bold(),
        style(result.embedded()).bold().green(),
        if result.skipped() > 0 {
            style(result.skipped()).bold().yellow()
        } else {
            style(result.skipped()).dim()
        }
    );
    if !result.unclassified.is_empty() {
        println!(
            "  {} image(s) could not be measured and were left out",
            style(result.unclassified.len()).yellow()
        );
    }

    match (&result.cleanup, &result.session_dir) {
        (Some(cleanup), _) => println!(
            "  Temp files removed: {} ({})",
            cleanup.files_removed,
            format_megabytes(cleanup.megabytes_freed())
        ),
        (None, Some(dir)) => println!("  Temp files kept in: {}", style(dir.display()).dim()),
        (None, None) => {}
    }

    println!(
        "  Total processing time: {}",
        style(format_duration(result.elapsed)).bold()
    );
}

pub fn print_cleanup(report: &CleanupReport) {
    println!("{}", style("Temp cleanup:").bold().blue());
    println!("  Files removed: {}", style(report.files_removed).bold());
    println!("  Folders removed: {}", style(report.dirs_removed).bold());
    println!("  Space freed: {}", format_megabytes(report.megabytes_freed()));
}

pub fn print_temp_usage(usage: &TempUsage) {
    println!("{}", style("Temp storage:").bold().blue());
    println!(
        "  Application folder: {} file(s), {}",
        usage.app_root_files,
        format_megabytes(usage.app_root_bytes as f64 / (1024.0 * 1024.0))
    );
    println!(
        "  Stray temp files: {} file(s), {}",
        usage.stray_files,
        format_megabytes(usage.stray_bytes as f64 / (1024.0 * 1024.0))
    );
    println!(
        "  Total: {} file(s), {}",
        style(usage.total_files()).bold(),
        format_megabytes(usage.total_megabytes())
    );
}

pub fn print_accelerator(report: &AcceleratorReport) {
    println!("{}", style("GPU:").bold().blue());
    if report.devices.is_empty() {
        println!("  {}", style(report.summary()).dim());
    }
    for device in &report.devices {
        println!("  {}", style(device).bold().green());
    }
    println!("  {}", style("Conversion always runs on the CPU").dim());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_processing::orientation::AspectBucket;
    use crate::image_processing::BucketOutcome;
    use crate::pdf::AssemblyStrategy;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn outcome(bucket: AspectBucket, error: Option<&str>) -> BucketOutcome {
        BucketOutcome {
            bucket,
            output: PathBuf::from(format!("album_{}.pdf", bucket)),
            attempted: 2,
            converted: 0,
            embedded: if error.is_some() { 0 } else { 2 },
            skipped: 0,
            strategy: error.is_none().then_some(AssemblyStrategy::DirectEmbed),
            bytes_written: 0,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_truncate_start() {
        assert_eq!(truncate_start("short.pdf", 20), "short.pdf");
        assert_eq!(truncate_start("/a/very/long/path/album.pdf", 12), "...album.pdf");
    }

    #[test]
    fn test_summary_table_has_row_per_bucket() {
        let mut outputs = BTreeMap::new();
        outputs.insert(AspectBucket::Landscape, outcome(AspectBucket::Landscape, None));
        outputs.insert(
            AspectBucket::Other,
            outcome(AspectBucket::Other, Some("No images processed successfully")),
        );
        let result = ConversionResult {
            outputs,
            discovered: 4,
            unclassified: Vec::new(),
            session_dir: None,
            cleanup: None,
            elapsed: Duration::from_millis(5),
        };

        let table = summary_table(&result);
        assert_eq!(table.len(), 3);
        let rendered = table.to_string();
        assert!(rendered.contains("direct embed"));
        assert!(rendered.contains("failed: No images processed successfully"));
    }
}
