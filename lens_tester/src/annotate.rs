use crate::identity::{IdentityAssigner, TrackedTarget};
use anyhow::{Context, Result};
use lens_visualizer::{class_color, save_png};
use opencv::{
    core::{Mat, Point, Scalar},
    imgproc,
    prelude::*,
};
use std::path::Path;

/// Draws every visible target on a copy of `image` and saves it as a PNG.
pub fn save_engagement_snapshot(
    image: &Mat,
    targets: &[&TrackedTarget],
    identities: &IdentityAssigner,
    path: &Path,
) -> Result<()> {
    let mut annotated = image.try_clone()?;
    for target in targets {
        let class_label = identities.class_name(target.class_id).unwrap_or("?");
        let [r, g, b] = class_color(class_label).0;
        let color = Scalar::new(b as f64, g as f64, r as f64, 0.0);
        let rect = target.bbox.to_rect();

        imgproc::rectangle(&mut annotated, rect, color, 2, imgproc::LINE_8, 0)?;
        imgproc::put_text(
            &mut annotated,
            &format!("ID {} {} {:.2}", target.id, class_label, target.confidence),
            Point::new(rect.x, (rect.y - 6).max(12)),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.5,
            color,
            1,
            imgproc::LINE_8,
            false,
        )?;
    }

    // Convert the OpenCV Mat (BGR) to an RGBA buffer for the PNG encoder.
    let mut rgba = Mat::default();
    imgproc::cvt_color(&annotated, &mut rgba, imgproc::COLOR_BGR2RGBA, 0)?;
    let bytes = rgba.data_bytes().context("snapshot frame is not contiguous")?;
    save_png(path, rgba.cols() as u32, rgba.rows() as u32, bytes)
}
