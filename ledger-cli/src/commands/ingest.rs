//! Ingest command implementation
//!
//! Replays a JSON-lines file of event envelopes through the ingress adapter,
//! one transaction per line. Failed lines are reported, never retried here:
//! the delivery layer owns redelivery.

use crate::commands::{to_json, OutputFormat};
use anyhow::{anyhow, Result};
use referral_ledger::{handle_json, IngressResponse, IngressStatus, ReferralEngine};
use serde::Serialize;
use std::fmt::Write as _;
use tracing::{info, warn};

/// Response for one line of the input file
#[derive(Clone, Debug, Serialize)]
pub struct LineResult {
    pub line: usize,
    #[serde(flatten)]
    pub response: IngressResponse,
}

/// Per-status totals for an ingest run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub processed: u64,
    pub duplicate: u64,
    pub deferred: u64,
    pub rejected: u64,
    pub failed: u64,
}

impl IngestSummary {
    fn record(&mut self, status: IngressStatus) {
        let counter = match status {
            IngressStatus::Processed => &mut self.processed,
            IngressStatus::Duplicate => &mut self.duplicate,
            IngressStatus::Deferred => &mut self.deferred,
            IngressStatus::Rejected => &mut self.rejected,
            IngressStatus::Failed { .. } => &mut self.failed,
        };
        *counter = counter.saturating_add(1);
    }
}

#[derive(Clone, Debug, Serialize)]
struct IngestReport {
    summary: IngestSummary,
    lines: Vec<LineResult>,
}

/// Run every non-blank line of `contents` through the engine
pub fn ingest_lines(engine: &mut ReferralEngine, contents: &str) -> (IngestSummary, Vec<LineResult>) {
    let mut summary = IngestSummary::default();
    let mut lines = Vec::new();

    for (index, raw) in contents.lines().enumerate() {
        let json = raw.trim();
        if json.is_empty() {
            continue;
        }
        let response = handle_json(engine, json);
        summary.record(response.status);
        lines.push(LineResult {
            line: index.saturating_add(1),
            response,
        });
    }

    (summary, lines)
}

/// Execute the ingest command
pub async fn execute(
    engine: &mut ReferralEngine,
    file_path: &str,
    output_format: OutputFormat,
) -> Result<String> {
    info!("Ingesting events from {}", file_path);

    let contents = tokio::fs::read_to_string(file_path)
        .await
        .map_err(|e| anyhow!("Failed to read event file '{file_path}': {e}"))?;

    let (summary, lines) = ingest_lines(engine, &contents);
    if summary.failed > 0 {
        warn!(failed = summary.failed, "Some events failed and must be redelivered");
    }
    info!(
        processed = summary.processed,
        duplicate = summary.duplicate,
        deferred = summary.deferred,
        rejected = summary.rejected,
        failed = summary.failed,
        "Ingest complete"
    );

    match output_format {
        OutputFormat::Human => Ok(format_human(&summary, &lines)),
        OutputFormat::Json => to_json(&IngestReport { summary, lines }),
    }
}

fn format_human(summary: &IngestSummary, lines: &[LineResult]) -> String {
    let mut output = format!("Ingest Results\n{}\n", "=".repeat(50));
    let _ = writeln!(output, "Processed:  {}", summary.processed);
    let _ = writeln!(output, "Duplicate:  {}", summary.duplicate);
    let _ = writeln!(output, "Deferred:   {}", summary.deferred);
    let _ = writeln!(output, "Rejected:   {}", summary.rejected);
    let _ = writeln!(output, "Failed:     {}", summary.failed);

    let problems: Vec<&LineResult> = lines
        .iter()
        .filter(|l| {
            matches!(
                l.response.status,
                IngressStatus::Rejected | IngressStatus::Failed { .. }
            )
        })
        .collect();
    if !problems.is_empty() {
        output.push_str("\nLines needing attention:\n");
        for line in problems {
            let _ = writeln!(
                output,
                "  line {:>5}: {:?} {}",
                line.line, line.response.status, line.response.message
            );
        }
    }
    output
}
