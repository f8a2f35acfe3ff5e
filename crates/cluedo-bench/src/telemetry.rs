use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

const DEDUCTION_TARGET: &str = "cluedo_core::deduction";
const TURN_TARGET: &str = "cluedo_bench::turn";
const CERTAINTY_TARGET: &str = "cluedo_bench::certainty";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse telemetry JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize)]
pub struct TelemetrySummary {
    pub deduction: DeductionTelemetrySummary,
    pub harness: HarnessTelemetrySummary,
}

/// Engine-side counters taken from `cluedo_core::deduction` events.
#[derive(Debug, Default, Serialize)]
pub struct DeductionTelemetrySummary {
    pub ingested: usize,
    pub rejected: usize,
    pub cap_warnings: usize,
    pub certain_after_ingest: usize,
    pub avg_passes: Option<f64>,
    pub max_passes: Option<u64>,
    pub rule_firings: BTreeMap<String, usize>,
    pub shapes: BTreeMap<String, usize>,
}

#[derive(Debug, Default, Serialize)]
pub struct HarnessTelemetrySummary {
    pub turns: usize,
    pub unrefuted_turns: usize,
    pub certainty_events: usize,
    pub avg_turn_at_certainty: Option<f64>,
    pub malformed_lines: usize,
}

#[derive(Debug)]
struct Average {
    sum: f64,
    count: usize,
}

impl Average {
    fn new() -> Self {
        Self { sum: 0.0, count: 0 }
    }

    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Aggregate engine and harness events from a JSON lines telemetry log.
pub fn summarise_telemetry(path: &Path) -> Result<TelemetrySummary, TelemetryError> {
    if !path.exists() {
        return Ok(TelemetrySummary::default());
    }

    let file = File::open(path).map_err(|source| TelemetryError::Io {
        context: "opening telemetry log",
        source,
    })?;
    let reader = BufReader::new(file);

    let mut deduction = DeductionTelemetrySummary::default();
    let mut passes_avg = Average::new();
    let mut harness = HarnessTelemetrySummary::default();
    let mut certainty_turn_avg = Average::new();

    for line in reader.lines() {
        let line = line.map_err(|source| TelemetryError::Io {
            context: "reading telemetry line",
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }

        // The non-blocking writer may still be flushing the final line.
        let Ok(payload) = serde_json::from_str::<Value>(&line) else {
            harness.malformed_lines += 1;
            continue;
        };
        let target = payload
            .get("target")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let fields = payload
            .get("fields")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let message = fields
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();

        match target {
            DEDUCTION_TARGET => match message {
                "suggestion ingested" => {
                    deduction.ingested += 1;
                    if let Some(passes) = fields.get("passes").and_then(Value::as_u64) {
                        passes_avg.add(passes as f64);
                        deduction.max_passes =
                            Some(deduction.max_passes.map_or(passes, |max| max.max(passes)));
                    }
                    if fields.get("certain").and_then(Value::as_bool) == Some(true) {
                        deduction.certain_after_ingest += 1;
                    }
                    *deduction
                        .shapes
                        .entry(label(&fields, "shape"))
                        .or_insert(0) += 1;
                }
                "suggestion rejected" => deduction.rejected += 1,
                "rule fired" => {
                    *deduction
                        .rule_firings
                        .entry(label(&fields, "rule"))
                        .or_insert(0) += 1;
                }
                "deduction pass cap reached before convergence" => deduction.cap_warnings += 1,
                _ => {}
            },
            TURN_TARGET => {
                harness.turns += 1;
                if fields.get("refuter").and_then(Value::as_str) == Some("-") {
                    harness.unrefuted_turns += 1;
                }
            }
            CERTAINTY_TARGET => {
                harness.certainty_events += 1;
                if let Some(turn) = fields.get("turn").and_then(Value::as_u64) {
                    certainty_turn_avg.add(turn as f64);
                }
            }
            _ => {}
        }
    }

    deduction.avg_passes = passes_avg.mean();
    harness.avg_turn_at_certainty = certainty_turn_avg.mean();

    Ok(TelemetrySummary { deduction, harness })
}

fn label(fields: &Map<String, Value>, key: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("<unset>")
        .to_string()
}

pub fn write_summary_outputs(
    telemetry_path: &Path,
    output_dir: &Path,
) -> Result<Option<TelemetryOutputs>, TelemetryError> {
    if !telemetry_path.exists() {
        return Ok(None);
    }

    let summary = summarise_telemetry(telemetry_path)?;
    let json_path = output_dir.join("telemetry_summary.json");
    let md_path = output_dir.join("telemetry_summary.md");

    std::fs::write(
        &json_path,
        serde_json::to_vec_pretty(&summary).map_err(TelemetryError::from)?,
    )
    .map_err(|source| TelemetryError::Io {
        context: "writing telemetry summary json",
        source,
    })?;

    let markdown = render_markdown(&summary, telemetry_path);
    std::fs::write(&md_path, markdown).map_err(|source| TelemetryError::Io {
        context: "writing telemetry summary markdown",
        source,
    })?;

    Ok(Some(TelemetryOutputs {
        summary,
        json_path,
        markdown_path: md_path,
    }))
}

pub fn append_highlights_to_markdown(
    summary_path: &Path,
    outputs: &TelemetryOutputs,
) -> Result<(), TelemetryError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(summary_path)
        .map_err(|source| TelemetryError::Io {
            context: "opening summary markdown for telemetry append",
            source,
        })?;

    let deduction = &outputs.summary.deduction;
    let mut section = String::new();
    section.push_str("\n## Telemetry Highlights\n");
    section.push_str(&format!("- Suggestions ingested: {}\n", deduction.ingested));
    section.push_str(&format!("- Suggestions rejected: {}\n", deduction.rejected));
    section.push_str(&format!("- Pass cap warnings: {}\n", deduction.cap_warnings));
    if let Some(value) = deduction.avg_passes {
        section.push_str(&format!("- Avg fixed-point passes: {:.2}\n", value));
    }
    push_counts(&mut section, "### Rule Firings", &deduction.rule_firings);

    write!(file, "{section}").map_err(|source| TelemetryError::Io {
        context: "writing telemetry highlights",
        source,
    })?;

    Ok(())
}

fn push_counts(output: &mut String, heading: &str, counts: &BTreeMap<String, usize>) {
    output.push('\n');
    output.push_str(heading);
    output.push('\n');
    if counts.is_empty() {
        output.push_str("- <none>\n");
    } else {
        for (label, count) in counts {
            output.push_str(&format!("- {}: {}\n", label, count));
        }
    }
}

fn render_markdown(summary: &TelemetrySummary, telemetry_path: &Path) -> String {
    let deduction = &summary.deduction;
    let harness = &summary.harness;
    let mut output = String::new();
    output.push_str("# Telemetry Summary\n\n");
    output.push_str(&format!("- Source: `{}`\n", telemetry_path.display()));
    output.push('\n');

    output.push_str("## Deduction\n");
    output.push_str(&format!("- Ingested: {}\n", deduction.ingested));
    output.push_str(&format!("- Rejected: {}\n", deduction.rejected));
    output.push_str(&format!("- Pass cap warnings: {}\n", deduction.cap_warnings));
    output.push_str(&format!(
        "- Certain after ingest: {}\n",
        deduction.certain_after_ingest
    ));
    if let Some(value) = deduction.avg_passes {
        output.push_str(&format!("- Avg passes: {:.2}\n", value));
    }
    if let Some(value) = deduction.max_passes {
        output.push_str(&format!("- Max passes: {}\n", value));
    }
    push_counts(&mut output, "### Rule Firings", &deduction.rule_firings);
    push_counts(&mut output, "### Event Shapes", &deduction.shapes);
    output.push('\n');

    output.push_str("## Harness\n");
    output.push_str(&format!("- Turns logged: {}\n", harness.turns));
    output.push_str(&format!("- Unrefuted turns: {}\n", harness.unrefuted_turns));
    output.push_str(&format!(
        "- Seats reaching certainty: {}\n",
        harness.certainty_events
    ));
    if let Some(value) = harness.avg_turn_at_certainty {
        output.push_str(&format!("- Avg turn at certainty: {:.2}\n", value));
    }
    output
}

#[derive(Debug)]
pub struct TelemetryOutputs {
    pub summary: TelemetrySummary,
    pub json_path: PathBuf,
    pub markdown_path: PathBuf,
}
