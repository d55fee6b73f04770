use anyhow::{Context, Result};
use exposure_lens::{ExposureReport, PipelineConfig};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// The JSON document written next to the charts.
#[derive(Debug, Serialize)]
pub struct ExportDocument<'a> {
    pub gap_threshold: f64,
    pub flash_below: f64,
    pub standard_below: f64,
    pub head_marker: &'a str,
    #[serde(flatten)]
    pub report: &'a ExposureReport,
}

impl<'a> ExportDocument<'a> {
    pub fn new(report: &'a ExposureReport, config: &'a PipelineConfig) -> Self {
        Self {
            gap_threshold: config.gap_threshold.seconds(),
            flash_below: config.categories.flash_below,
            standard_below: config.categories.standard_below,
            head_marker: &config.head_marker,
            report,
        }
    }
}

pub fn to_json_string(report: &ExposureReport, config: &PipelineConfig) -> Result<String> {
    serde_json::to_string_pretty(&ExportDocument::new(report, config)).context("failed to serialize exposure report")
}

pub fn write_json(report: &ExposureReport, config: &PipelineConfig, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &ExportDocument::new(report, config))
        .with_context(|| format!("failed to write {}", path.display()))?;
    writer.flush().with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(())
}
