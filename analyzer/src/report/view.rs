use anyhow::Context;
use galrotcore::processing::{AverageSummary, ConversionSummary, PeakMode, VelocityReport};
use galrotcore::records::{RestFrequency, RestFrequencySource, VelocityRow};
use serde::Serialize;
use serde_json::json;
use std::fmt::Write;

/// Rotation curve as shown to the user.
#[derive(Debug, Clone, Serialize)]
pub struct RotationCurveView {
    pub target: String,
    pub mode: PeakMode,
    pub rest_frequency: RestFrequency,
    pub rows: Vec<VelocityRow>,
    pub logs: Vec<String>,
}

impl RotationCurveView {
    pub fn new(target: impl Into<String>, mode: PeakMode, report: &VelocityReport) -> Self {
        Self {
            target: target.into(),
            mode,
            rest_frequency: report.rest_frequency,
            rows: report.rows.clone(),
            logs: report.logs.clone(),
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("serializing rotation curve")
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let source = match self.rest_frequency.source {
            RestFrequencySource::Measured { samples } => format!("measured, {samples} sample(s)"),
            RestFrequencySource::Fallback => "fallback".to_string(),
        };
        let _ = writeln!(out, "target: {}", self.target);
        let _ = writeln!(
            out,
            "rest frequency: {:.6} MHz ({source})",
            self.rest_frequency.hz / 1e6
        );
        let _ = writeln!(out, "{:>8} {:>14} {:>14}", "lon[deg]", "distance[ly]", "speed[km/s]");
        for row in &self.rows {
            let _ = writeln!(
                out,
                "{:>8} {:>14.1} {:>14}",
                row.longitude_deg,
                row.distance_ly,
                row.speed_label()
            );
        }
        if !self.logs.is_empty() {
            let _ = writeln!(out, "notes:");
            for entry in &self.logs {
                let _ = writeln!(out, "  {entry}");
            }
        }
        out
    }
}

pub fn conversion_text(summary: &ConversionSummary) -> String {
    let mut out = format!("converted {} file(s)\n", summary.converted);
    for error in &summary.errors {
        out.push_str(&format!("  {error}\n"));
    }
    out
}

pub fn conversion_json(summary: &ConversionSummary) -> serde_json::Value {
    json!({
        "converted": summary.converted,
        "outputs": summary.outputs,
        "errors": summary.errors,
    })
}

pub fn averaging_text(summary: &AverageSummary) -> String {
    let mut out = format!(
        "averaged {} observation(s) into {}\n",
        summary.processed,
        summary.avg_dir.display()
    );
    for error in &summary.errors {
        out.push_str(&format!("  {error}\n"));
    }
    out
}

pub fn averaging_json(summary: &AverageSummary) -> serde_json::Value {
    json!({
        "processed": summary.processed,
        "avg_dir": summary.avg_dir,
        "errors": summary.errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn report() -> VelocityReport {
        VelocityReport {
            rows: vec![
                VelocityRow {
                    longitude_deg: 0,
                    distance_ly: 0.0,
                    speed_kms: Some(0.0),
                },
                VelocityRow {
                    longitude_deg: 90,
                    distance_ly: 26_000.0,
                    speed_kms: None,
                },
            ],
            rest_frequency: RestFrequency {
                hz: 1415e6,
                source: RestFrequencySource::Measured { samples: 2 },
            },
            logs: vec!["lon 5°: insufficient data".into()],
        }
    }

    #[test]
    fn text_view_marks_undefined_speed() {
        let view = RotationCurveView::new("survey", PeakMode::BackgroundSubtraction, &report());
        let text = view.render_text();
        assert!(text.contains("1415.000000 MHz (measured, 2 sample(s))"));
        assert!(text.contains("undefined"));
        assert!(text.contains("lon 5°: insufficient data"));
    }

    #[test]
    fn json_view_uses_null_for_undefined_speed() {
        let view = RotationCurveView::new("survey", PeakMode::MedianBaseline, &report());
        let value: serde_json::Value = serde_json::from_str(&view.to_json().unwrap()).unwrap();
        assert_eq!(value["mode"], "median_baseline");
        assert_eq!(value["rest_frequency"]["source"]["kind"], "measured");
        assert!(value["rows"][1]["speed_kms"].is_null());
    }

    #[test]
    fn summaries_render_errors() {
        let summary = AverageSummary {
            processed: 1,
            avg_dir: PathBuf::from("survey/avg"),
            errors: vec!["error at lon 5B: rows differ".into()],
        };
        assert!(averaging_text(&summary).contains("error at lon 5B"));
        assert_eq!(averaging_json(&summary)["processed"], 1);
    }
}
