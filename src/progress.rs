//! Console header and summary for the monitor

use crate::monitor::MonitorSummary;
use console::style;
use std::path::Path;
use std::time::Duration;

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| {
            chunk
                .iter()
                .rev()
                .map(|&b| b as char)
                .collect::<String>()
        })
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a header before discovery starts
pub fn print_header(root: &Path, debounce: Duration, output: Option<&Path>) {
    eprintln!();
    eprintln!(
        "{} {}",
        style("maildir-walker").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("{}", style("─".repeat(50)).dim());
    eprintln!("  {} {}", style("Root:").bold(), root.display());
    eprintln!("  {} {}ms", style("Debounce:").bold(), debounce.as_millis());
    match output {
        Some(path) => eprintln!("  {} {}", style("Metrics:").bold(), path.display()),
        None => eprintln!("  {} stdout on exit", style("Metrics:").bold()),
    }
    eprintln!();
}

/// Print a summary once the monitor stopped
pub fn print_summary(summary: &MonitorSummary) {
    eprintln!();
    eprintln!("{}", style("Monitor Stopped").green().bold());
    eprintln!("{}", style("─".repeat(50)).dim());
    eprintln!(
        "  {} {}",
        style("Users:").bold(),
        format_number(summary.users as u64)
    );
    eprintln!("  {} {}", style("Walks:").bold(), format_number(summary.walks));
    eprintln!(
        "  {} {:.1}s",
        style("Uptime:").bold(),
        summary.duration.as_secs_f64()
    );
    if summary.failed > 0 {
        eprintln!(
            "  {} {}",
            style("Failed walkers:").yellow().bold(),
            format_number(summary.failed as u64)
        );
    }
    eprintln!();
}
