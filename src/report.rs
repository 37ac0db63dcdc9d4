//! Human-readable report rendering for terminal output.
//!
//! Produces a colored summary of a finished search: the outcome (credential,
//! strategy and position when found) and run statistics.
use colored::*;

use crate::orchestrator::{SearchOutcome, SearchSummary};
use crate::progress::{format_duration, format_number, format_rate};

fn visible_len(s: &str) -> usize {
    // Strip ANSI escape sequences (\x1b[ ... m) to compute printable width
    let mut len = 0;
    let mut iter = s.chars().peekable();
    while let Some(ch) = iter.next() {
        if ch == '\u{1b}' {
            if let Some('[') = iter.peek().cloned() {
                let _ = iter.next();
            }
            for c in iter.by_ref() {
                if c == 'm' {
                    break;
                }
            }
        } else {
            len += 1;
        }
    }
    len
}

fn section_header(title: &str) -> String {
    let len = visible_len(title);
    let mut s = String::new();
    s.push('\n');
    s.push_str(title);
    s.push('\n');
    s.push_str(&"─".repeat(len));
    s.push_str("\n\n");
    s
}

fn push_section(out: &mut String, title: String, lines: Vec<String>) {
    out.push_str(&section_header(&title));
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
}

pub fn render_outcome(outcome: &SearchOutcome) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", "doccrack: Search Summary".bold().cyan()));

    let mut result_lines: Vec<String> = Vec::new();
    match outcome {
        SearchOutcome::Found {
            candidate,
            strategy,
            position,
            ..
        } => {
            result_lines.push(format!("Status: {}", "FOUND".bold().green()));
            result_lines.push(format!("Candidate: {}", candidate.red()));
            result_lines.push(format!("Strategy: {strategy}"));
            result_lines.push(format!("Position: {position}"));
        }
        SearchOutcome::ExhaustedAll { .. } => {
            result_lines.push(format!("Status: {}", "NOT FOUND".bold().yellow()));
            result_lines.push("(Every configured strategy was exhausted)".to_string());
        }
        SearchOutcome::Interrupted {
            strategy, position, ..
        } => {
            result_lines.push(format!("Status: {}", "INTERRUPTED".bold().magenta()));
            result_lines.push(format!("Strategy: {strategy}"));
            result_lines.push(format!("Resumable from position: {position}"));
        }
    }
    push_section(&mut out, "Result".bold().yellow().to_string(), result_lines);
    push_section(
        &mut out,
        "Statistics".bold().blue().to_string(),
        summary_lines(outcome.summary()),
    );
    out
}

fn summary_lines(summary: &SearchSummary) -> Vec<String> {
    let secs = summary.elapsed.as_secs_f64();
    let rate = if secs > 0.0 {
        summary.tried as f64 / secs
    } else {
        0.0
    };
    let strategies = if summary.strategies.is_empty() {
        "(none)".dimmed().to_string()
    } else {
        summary
            .strategies
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(", ")
    };
    vec![
        format!("Tried: {}", format_number(summary.tried)),
        format!("Elapsed: {}", format_duration(summary.elapsed)),
        format!("Rate: {}", format_rate(rate)),
        format!("Strategies: {strategies}"),
        format!("Skipped spaces: {}", summary.skipped_spaces),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::Strategy;
    use std::time::Duration;

    fn summary() -> SearchSummary {
        SearchSummary {
            tried: 1_234,
            elapsed: Duration::from_secs(65),
            strategies: vec![Strategy::HeuristicSet, Strategy::FixedLengthDigits],
            skipped_spaces: 1,
        }
    }

    #[test]
    fn snapshot_found() {
        colored::control::set_override(false);
        let s = render_outcome(&SearchOutcome::Found {
            candidate: "0042".into(),
            strategy: Strategy::FixedLengthDigits,
            position: 42,
            summary: summary(),
        });
        insta::assert_snapshot!(s, @r"
        doccrack: Search Summary

        Result
        ──────

        Status: FOUND
        Candidate: 0042
        Strategy: FixedLengthDigits
        Position: 42

        Statistics
        ──────────

        Tried: 1,234
        Elapsed: 1m 5s
        Rate: 19/s
        Strategies: HeuristicSet, FixedLengthDigits
        Skipped spaces: 1
        ");
    }

    #[test]
    fn interrupted_names_resume_position() {
        let s = render_outcome(&SearchOutcome::Interrupted {
            strategy: Strategy::Alphabetic,
            position: 900,
            summary: SearchSummary::default(),
        });
        assert!(s.contains("INTERRUPTED"));
        assert!(s.contains("Resumable from position: 900"));
        assert!(s.contains("Strategies: "));
    }

    #[test]
    fn exhausted_reports_not_found() {
        let s = render_outcome(&SearchOutcome::ExhaustedAll { summary: summary() });
        assert!(s.contains("NOT FOUND"));
        assert!(s.contains("Tried: 1,234"));
    }

    #[test]
    fn visible_len_ignores_ansi() {
        assert_eq!(visible_len("\u{1b}[1;33mResult\u{1b}[0m"), 6);
    }
}
