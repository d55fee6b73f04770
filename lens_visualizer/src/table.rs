use exposure_lens::{ExposureEntry, ExposureReport, TacticalCategory};
use std::fmt;

const WIDE_RULE: usize = 60;
const TABLE_RULE: usize = 75;

/// Plain-text rendering of an `ExposureReport`, split into body and head tables.
pub struct ReportTable<'a> {
    report: &'a ExposureReport,
}

impl<'a> ReportTable<'a> {
    pub fn new(report: &'a ExposureReport) -> Self {
        Self { report }
    }
}

fn write_rows<'e>(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    entries: impl Iterator<Item = &'e ExposureEntry>,
) -> fmt::Result {
    let mut entries = entries.peekable();
    if entries.peek().is_none() {
        return Ok(());
    }

    writeln!(f)?;
    writeln!(f, "{title}")?;
    writeln!(
        f,
        "{:<5} | {:<10} | {:<8} | {:<8} | {:<10} | Tactical Category",
        "ID", "Class", "Start", "End", "Duration"
    )?;
    writeln!(f, "{}", "-".repeat(TABLE_RULE))?;
    for entry in entries {
        let i = &entry.interval;
        writeln!(
            f,
            "{:<5} | {:<10} | {:<8.2} | {:<8.2} | {:<10.2} | {}",
            i.track_id, i.class_label, i.start_time, i.end_time, i.duration, entry.category
        )?;
    }
    writeln!(f, "{}", "-".repeat(TABLE_RULE))
}

impl fmt::Display for ReportTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = &self.report.summary;

        writeln!(f, "{}", "=".repeat(WIDE_RULE))?;
        writeln!(f, "TACTICAL VULNERABILITY REPORT (MERGED)")?;
        writeln!(f, "{}", "=".repeat(WIDE_RULE))?;
        writeln!(f, "Total Distinct Targets: {}", summary.distinct_targets)?;
        writeln!(f, "Total Exposure Events: {}", summary.exposure_events)?;
        writeln!(
            f,
            "Raw Fragments Before Merge: {} | Total Exposed: {:.2}s",
            summary.raw_fragments, summary.total_exposed_seconds
        )?;
        let counts: Vec<String> = TacticalCategory::ALL
            .iter()
            .map(|c| format!("{c}: {}", summary.category_counts.get(c).copied().unwrap_or(0)))
            .collect();
        writeln!(f, "{}", counts.join(" | "))?;
        writeln!(f, "{}", "-".repeat(WIDE_RULE))?;

        write_rows(f, "BODY EXPOSURES (Full Target)", self.report.body())?;
        write_rows(f, "HEAD EXPOSURES (Partial Target)", self.report.head())?;

        if self.report.is_empty() {
            writeln!(f, "No opponents detected.")?;
        }
        writeln!(f, "{}", "=".repeat(WIDE_RULE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exposure_lens::{CategoryThresholds, MergedInterval};

    fn merged(track_id: u64, class_label: &str, start: f64, end: f64) -> MergedInterval {
        MergedInterval {
            track_id,
            class_label: class_label.to_owned(),
            start_time: start,
            end_time: end,
            duration: end - start,
            peak_confidence: 0.8,
        }
    }

    #[test]
    fn lists_body_and_head_tables() {
        let report = ExposureReport::build(
            vec![merged(1, "T", 0.0, 1.25), merged(2, "CT_HEAD", 2.0, 2.1)],
            3,
            &CategoryThresholds::default(),
            "HEAD",
        );
        let text = ReportTable::new(&report).to_string();

        assert!(text.contains("Total Distinct Targets: 2"));
        assert!(text.contains("BODY EXPOSURES (Full Target)"));
        assert!(text.contains("HEAD EXPOSURES (Partial Target)"));
        assert!(text.contains("1     | T          | 0.00     | 1.25     | 1.25       | High Vulnerability"));
        assert!(text.contains("CT_HEAD"));
        assert!(text.contains("Flash/Noise: 1 | Standard: 0 | High Vulnerability: 1"));
        assert!(!text.contains("No opponents detected."));

        let body_at = text.find("BODY EXPOSURES").unwrap();
        let head_at = text.find("HEAD EXPOSURES").unwrap();
        assert!(body_at < head_at);
    }

    #[test]
    fn omits_empty_tables() {
        let report = ExposureReport::build(
            vec![merged(5, "T", 0.0, 0.5)],
            1,
            &CategoryThresholds::default(),
            "HEAD",
        );
        let text = ReportTable::new(&report).to_string();
        assert!(!text.contains("HEAD EXPOSURES"));
    }

    #[test]
    fn reports_no_opponents() {
        let report = ExposureReport::default();
        let text = ReportTable::new(&report).to_string();
        assert!(text.contains("No opponents detected."));
        assert!(!text.contains("BODY EXPOSURES"));
    }
}
