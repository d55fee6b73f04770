// THEORY:
// The timeline is a Gantt chart of merged exposures: one horizontal lane per
// track id (ascending id from top to bottom), time on the x axis, one bar per
// exposure colored by the target's class. Faint vertical grid lines mark every
// whole second.

use anyhow::{Context, Result};
use exposure_lens::MergedInterval;
use image::{Rgb, RgbImage};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

pub const CT_COLOR: Rgb<u8> = Rgb([31, 119, 180]);
pub const T_COLOR: Rgb<u8> = Rgb([255, 140, 0]);
pub const CT_HEAD_COLOR: Rgb<u8> = Rgb([0, 200, 220]);
pub const T_HEAD_COLOR: Rgb<u8> = Rgb([240, 220, 0]);
pub const DEFAULT_COLOR: Rgb<u8> = Rgb([128, 128, 128]);

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const LANE_SHADE: Rgb<u8> = Rgb([243, 243, 243]);
const GRID: Rgb<u8> = Rgb([210, 210, 210]);
const OUTLINE: Rgb<u8> = Rgb([0, 0, 0]);
const MIN_GRID_SPACING: u32 = 4;

/// Picks the bar color for a class label. The label is split into tokens on
/// non-alphanumeric characters, so "CT_HEAD" is a CT head and "BOT" is no side.
pub fn class_color(class_label: &str) -> Rgb<u8> {
    let upper = class_label.to_uppercase();
    let tokens: Vec<&str> = upper.split(|c: char| !c.is_ascii_alphanumeric()).collect();
    let has = |token: &str| tokens.iter().any(|t| *t == token);
    match (has("CT"), has("T"), has("HEAD")) {
        (true, _, true) => CT_HEAD_COLOR,
        (false, true, true) => T_HEAD_COLOR,
        (true, _, false) => CT_COLOR,
        (false, true, false) => T_COLOR,
        _ => DEFAULT_COLOR,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TimelineLayout {
    pub width: u32,
    pub lane_height: u32,
    pub margin: u32,
    /// Fraction of the lane height covered by a bar.
    pub bar_fill: f64,
}

impl Default for TimelineLayout {
    fn default() -> Self {
        Self {
            width: 1200,
            lane_height: 40,
            margin: 20,
            bar_fill: 0.6,
        }
    }
}

/// Renders the chart, or `None` when there is nothing to draw.
pub fn render_timeline<'a>(
    intervals: impl IntoIterator<Item = &'a MergedInterval>,
    layout: &TimelineLayout,
) -> Option<RgbImage> {
    let intervals: Vec<&MergedInterval> = intervals.into_iter().collect();
    if intervals.is_empty() {
        return None;
    }

    // --- 1. Lanes & Scale ---
    let lanes: BTreeMap<u64, u32> = intervals
        .iter()
        .map(|i| i.track_id)
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .enumerate()
        .map(|(lane, id)| (id, lane as u32))
        .collect();
    let span = intervals
        .iter()
        .map(|i| i.end_time)
        .fold(0.0_f64, f64::max)
        .max(1e-6);

    let plot_width = layout.width.saturating_sub(2 * layout.margin).max(1);
    let height = 2 * layout.margin + lanes.len() as u32 * layout.lane_height;
    let mut canvas = RgbImage::from_pixel(layout.width, height, BACKGROUND);
    let x_of = |t: f64| layout.margin + ((t.max(0.0) / span) * plot_width as f64).round() as u32;

    // --- 2. Lane Shading & Grid ---
    for lane in lanes.values().filter(|lane| *lane % 2 == 0) {
        let top = layout.margin + lane * layout.lane_height;
        fill_rect(&mut canvas, layout.margin, top, plot_width, layout.lane_height, LANE_SHADE);
    }
    // Whole-second lines, thinned so they stay at least MIN_GRID_SPACING px apart.
    let max_lines = (plot_width / MIN_GRID_SPACING).max(1) as f64;
    let grid_step = (span / max_lines).ceil().max(1.0);
    let line_count = (span / grid_step).floor() as u64;
    for line in 0..=line_count {
        let x = x_of(line as f64 * grid_step);
        for y in (layout.margin..height - layout.margin).step_by(2) {
            put(&mut canvas, x, y, GRID);
        }
    }

    // --- 3. Bars ---
    let bar_height = ((layout.lane_height as f64 * layout.bar_fill).round() as u32).max(1);
    let inset = (layout.lane_height - bar_height.min(layout.lane_height)) / 2;
    for interval in &intervals {
        let lane = lanes[&interval.track_id];
        let left = x_of(interval.start_time);
        let right = x_of(interval.end_time).max(left + 1);
        let top = layout.margin + lane * layout.lane_height + inset;
        let color = class_color(&interval.class_label);
        fill_rect(&mut canvas, left, top, right - left, bar_height, color);
        outline_rect(&mut canvas, left, top, right - left, bar_height, OUTLINE);
    }

    debug!(lanes = lanes.len(), bars = intervals.len(), span, "rendered timeline");
    Some(canvas)
}

/// Renders and saves the chart. Returns `false` when there was nothing to draw.
pub fn save_timeline<'a>(
    intervals: impl IntoIterator<Item = &'a MergedInterval>,
    layout: &TimelineLayout,
    path: &Path,
) -> Result<bool> {
    let Some(canvas) = render_timeline(intervals, layout) else {
        return Ok(false);
    };
    canvas
        .save(path)
        .with_context(|| format!("failed to save timeline to {}", path.display()))?;
    Ok(true)
}

fn put(canvas: &mut RgbImage, x: u32, y: u32, color: Rgb<u8>) {
    if x < canvas.width() && y < canvas.height() {
        canvas.put_pixel(x, y, color);
    }
}

fn fill_rect(canvas: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    for yy in y..y + h {
        for xx in x..x + w {
            put(canvas, xx, yy, color);
        }
    }
}

fn outline_rect(canvas: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    let (right, bottom) = (x + w.saturating_sub(1), y + h.saturating_sub(1));
    for xx in x..=right {
        put(canvas, xx, y, color);
        put(canvas, xx, bottom, color);
    }
    for yy in y..=bottom {
        put(canvas, x, yy, color);
        put(canvas, right, yy, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn head_classes_take_precedence() {
        assert_eq!(class_color("CT_HEAD"), CT_HEAD_COLOR);
        assert_eq!(class_color("t_head"), T_HEAD_COLOR);
        assert_eq!(class_color("CT"), CT_COLOR);
        assert_eq!(class_color("T"), T_COLOR);
        assert_eq!(class_color("ct-head"), CT_HEAD_COLOR);
        assert_eq!(class_color("bot"), DEFAULT_COLOR);
        assert_eq!(class_color("HEADSHOT"), DEFAULT_COLOR);
        assert_eq!(class_color("player"), DEFAULT_COLOR);
    }

    #[test]
    fn nothing_to_draw() {
        assert!(render_timeline(std::iter::empty(), &TimelineLayout::default()).is_none());
    }

    #[test]
    fn one_lane_per_track_with_class_colored_bars() {
        let layout = TimelineLayout::default();
        let intervals = [
            merged(4, "CT", 0.0, 5.0),
            merged(9, "T_HEAD", 5.0, 10.0),
            merged(4, "CT", 7.0, 8.0),
        ];
        let canvas = render_timeline(&intervals, &layout).unwrap();

        assert_eq!(canvas.width(), layout.width);
        assert_eq!(canvas.height(), 2 * layout.margin + 2 * layout.lane_height);

        let mid_lane = |lane: u32| layout.margin + lane * layout.lane_height + layout.lane_height / 2;
        let plot = layout.width - 2 * layout.margin;
        let x_at = |t: f64| layout.margin + (t / 10.0 * plot as f64) as u32;

        assert_eq!(*canvas.get_pixel(x_at(2.5), mid_lane(0)), CT_COLOR);
        assert_eq!(*canvas.get_pixel(x_at(7.5), mid_lane(1)), T_HEAD_COLOR);
        assert_ne!(*canvas.get_pixel(x_at(6.0), mid_lane(0)), CT_COLOR);
    }

    #[test]
    fn grid_is_thinned_for_long_spans() {
        let layout = TimelineLayout::default();
        let canvas = render_timeline(&[merged(1, "T", 1e9 - 1.0, 1e9)], &layout).unwrap();

        let row = layout.margin;
        let grid_pixels = (0..canvas.width())
            .filter(|&x| *canvas.get_pixel(x, row) == GRID)
            .count() as u32;
        let plot = layout.width - 2 * layout.margin;
        assert!(grid_pixels >= 2);
        assert!(grid_pixels <= plot / MIN_GRID_SPACING + 1);
    }

    #[test]
    fn saves_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exposure_timeline.png");
        let intervals = [merged(1, "T", 0.0, 1.0)];

        assert!(save_timeline(&intervals, &TimelineLayout::default(), &path).unwrap());
        assert!(path.exists());
        assert!(!save_timeline(std::iter::empty(), &TimelineLayout::default(), &path.with_file_name("none.png")).unwrap());
    }
}
