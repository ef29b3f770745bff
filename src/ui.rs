//! Terminal output: status stream rendering and run summaries.

use colored::Colorize;
use engine::{EventSink, Run, RunSummary, Stage, StatusResponse};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a section header
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.len()).dimmed());
}

/// Renders engine status events as they stream in.
pub struct StreamSink {
    verbose: bool,
    quiet: bool,
}

impl StreamSink {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        StreamSink { verbose, quiet }
    }
}

impl EventSink for StreamSink {
    fn emit(&self, event: StatusResponse) {
        if self.quiet {
            return;
        }
        let stage = match event.stage {
            Stage::Plan => "plan",
            Stage::Apply => "apply",
        };
        match event.run {
            Run::Started => {
                if self.verbose {
                    println!("  {} {} {}", "…".dimmed(), stage.dimmed(), event.id.dimmed());
                }
            }
            Run::Finished => {
                let Some(details) = &event.details else {
                    return;
                };
                let id = display_id(&event.id);
                if let Some(err) = &details.error {
                    println!("  {} {} {}  {}", "✗".red(), stage.dimmed(), id, err.red());
                } else if details.has_changes {
                    println!("  {} {} {}", "~".yellow(), stage.dimmed(), id);
                    for (key, diff) in &details.changes {
                        if diff.changes {
                            println!(
                                "      {}: {} {} {}",
                                key.dimmed(),
                                diff.original,
                                "→".dimmed(),
                                diff.current
                            );
                        }
                    }
                } else if let Some(skip) = details
                    .messages
                    .iter()
                    .find(|m| m.starts_with("skipped:"))
                {
                    println!("  {} {} {}  {}", "-".dimmed(), stage.dimmed(), id, skip.dimmed());
                } else if self.verbose {
                    println!("  {} {} {}", "✓".green(), stage.dimmed(), id);
                }
            }
        }
    }
}

fn display_id(id: &str) -> &str {
    if id.is_empty() { "(root)" } else { id }
}

/// Print the aggregate for a finished stage.
pub fn print_summary(label: &str, summary: &RunSummary) {
    println!();
    println!(
        "{}: {} to change, {} unchanged, {} skipped, {}",
        label.bold(),
        summary.changed.to_string().yellow(),
        summary.no_change.to_string().green(),
        summary.skipped.to_string().dimmed(),
        if summary.failed == 0 {
            "0 failed".green().to_string()
        } else {
            format!("{} failed", summary.failed).red().to_string()
        }
    );
}
