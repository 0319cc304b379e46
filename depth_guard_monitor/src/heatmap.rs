// THEORY:
// A heat map makes an anomaly frame readable at a glance. Each sample is mapped to a
// 0..10 heat score and then onto a blue -> yellow -> red ramp; samples that match the
// floor exactly stay black so the obstacle stands out against an empty scene.

use depth_guard::AnomalyFrame;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};
use std::path::Path;

/// Colour for one anomaly sample.
pub fn heat_color(anomaly: u8) -> Rgb<u8> {
    if anomaly == 0 {
        return Rgb([0, 0, 0]);
    }

    let score = f64::from(anomaly) / 255.0 * 10.0;
    let (r, g, b) = if score <= 5.0 {
        // Blue to yellow
        let ratio = score / 5.0;
        (0.0, 255.0 * ratio, 255.0 * (1.0 - ratio))
    } else {
        // Yellow to red
        let ratio = (score - 5.0) / 5.0;
        (255.0 * ratio, 255.0 * (1.0 - ratio), 0.0)
    };
    Rgb([r as u8, g as u8, b as u8])
}

pub fn render(anomaly: &AnomalyFrame) -> RgbImage {
    RgbImage::from_fn(anomaly.width(), anomaly.height(), |x, y| {
        heat_color(anomaly.get(x, y).unwrap_or_default())
    })
}

/// Renders `anomaly` and writes it as an RGB PNG.
pub fn save_heatmap<P: AsRef<Path>>(
    anomaly: &AnomalyFrame,
    path: P,
) -> Result<(), image::ImageError> {
    let image = render(anomaly);
    let output = std::fs::File::create(path)?;
    let encoder = PngEncoder::new(output);
    encoder.write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(())
}
