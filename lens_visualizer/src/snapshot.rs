use anyhow::{Context, Result, ensure};
use exposure_lens::WindowOpened;
use image::ImageEncoder;
use std::path::{Path, PathBuf};

/// File name used for the frame that first showed a target.
pub fn snapshot_file_name(event: &WindowOpened) -> String {
    format!("engagement_id_{}_time_{:.2}s.png", event.track_id, event.time)
}

pub fn snapshot_path(output_dir: &Path, event: &WindowOpened) -> PathBuf {
    output_dir.join(snapshot_file_name(event))
}

/// Writes an RGBA8 buffer as a PNG.
pub fn save_png(path: &Path, width: u32, height: u32, rgba: &[u8]) -> Result<()> {
    let expected = width as usize * height as usize * 4;
    ensure!(
        rgba.len() == expected,
        "snapshot buffer holds {} bytes, expected {} for {}x{} RGBA",
        rgba.len(),
        expected,
        width,
        height
    );

    let output = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let encoder = image::codecs::png::PngEncoder::new(output);
    encoder
        .write_image(rgba, width, height, image::ExtendedColorType::Rgba8)
        .with_context(|| format!("failed to encode {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(track_id: u64, time: f64) -> WindowOpened {
        WindowOpened {
            track_id,
            class_label: "T".into(),
            time,
        }
    }

    #[test]
    fn names_follow_engagement_pattern() {
        assert_eq!(
            snapshot_file_name(&event(12, 3.456)),
            "engagement_id_12_time_3.46s.png"
        );
    }

    #[test]
    fn save_gradient_file() {
        let dir = tempfile::tempdir().unwrap();
        let width = 64u32;
        let height = 32u32;
        let mut buffer = vec![255u8; (width * height * 4) as usize];
        let mut intensity = 0u8;
        for pixel in buffer.chunks_mut(4) {
            pixel[0] = intensity;
            pixel[1] = intensity;
            pixel[2] = intensity;
            intensity = intensity.wrapping_add(1);
        }

        let path = snapshot_path(dir.path(), &event(1, 0.5));
        save_png(&path, width, height, &buffer).expect("Error Saving File.");

        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (width, height));
    }

    #[test]
    fn rejects_mismatched_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.png");
        assert!(save_png(&path, 10, 10, &[0u8; 12]).is_err());
        assert!(!path.exists());
    }
}
