use exposure_lens::{
    merge, Detection, ExposurePipeline, ExposureTracker, FrameClock, FrameRecord, GapThreshold,
    PipelineConfig, ReplaySource, TacticalCategory,
};
use std::fs::File;
use std::io::{BufReader, Write};

fn record(time: f64, detections: Vec<Detection>) -> FrameRecord {
    FrameRecord { time, detections }
}

/// 30 fps video sampled every other frame; a body target that blinks out for
/// one sample, and a head target that flashes once.
fn recorded_stream(clock: &FrameClock) -> Vec<FrameRecord> {
    let mut records = Vec::new();
    for frame in (0..60).filter(|f| clock.samples(*f)) {
        let time = clock.time_of(frame);
        let mut detections = Vec::new();
        if frame != 20 {
            detections.push(Detection::new(3, "T", 0.7));
        }
        if frame == 40 {
            detections.push(Detection::new(8, "CT_HEAD", 0.55));
        }
        records.push(record(time, detections));
    }
    records
}

#[test]
fn replay_file_produces_merged_report() {
    let clock = FrameClock::new(30.0, 2).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("detections.jsonl");
    {
        let mut file = File::create(&path).unwrap();
        for record in recorded_stream(&clock) {
            writeln!(file, "{}", serde_json::to_string(&record).unwrap()).unwrap();
        }
    }

    let replay = ReplaySource::new(BufReader::new(File::open(&path).unwrap()));
    let report = ExposurePipeline::new(PipelineConfig::default())
        .unwrap()
        .run_replay(replay)
        .unwrap();

    assert_eq!(report.summary.raw_fragments, 3);
    assert_eq!(report.summary.distinct_targets, 2);

    let body: Vec<_> = report.body().collect();
    assert_eq!(body.len(), 1);
    assert_eq!(body[0].interval.track_id, 3);
    assert_eq!(body[0].interval.start_time, 0.0);
    assert!((body[0].interval.end_time - clock.time_of(58)).abs() < 1e-9);
    assert_eq!(body[0].category, TacticalCategory::HighVulnerability);

    let head: Vec<_> = report.head().collect();
    assert_eq!(head.len(), 1);
    assert_eq!(head[0].interval.class_label, "CT_HEAD");
    assert!((head[0].interval.duration - clock.sample_step()).abs() < 1e-9);
    assert_eq!(head[0].category, TacticalCategory::FlashNoise);
}

#[test]
fn tracker_and_merger_compose_without_pipeline() {
    let clock = FrameClock::new(30.0, 2).unwrap();
    let mut tracker = ExposureTracker::new();
    for record in recorded_stream(&clock) {
        tracker.observe(record.time, &record.detections).unwrap();
    }
    tracker.finalize(clock.end_time(60)).unwrap();

    let fragments = tracker.closed_intervals();
    assert_eq!(fragments.iter().filter(|i| i.track_id == 3).count(), 2);

    let tight = merge(fragments, GapThreshold::new(0.0).unwrap());
    let loose = merge(fragments, GapThreshold::default());
    assert_eq!(tight.len(), 3);
    assert_eq!(loose.len(), 2);
    assert_eq!(loose[0].end_time, 2.0);
}
