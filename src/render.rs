// src/render.rs
// Still preview of bob-2 paths, one colour per pendulum, drawn into an in-memory RGB buffer with plotters,
// encoded to PNG with `image` and wrapped as a base64 data URL for JSON transport.
// No text is drawn (no caption or tick labels), so rendering never depends on system fonts being installed.

use crate::error::{SimError, SimResult};
use base64::{engine::general_purpose, Engine as _};
use image::ImageFormat;
use plotters::prelude::*;
use plotters::style::Palette99;
use std::io::Cursor;

/// Square plot half-extent that fits every pendulum's full reach with a margin.
pub fn axis_limit<I>(reaches: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let reach = reaches
        .into_iter()
        .filter(|r| r.is_finite())
        .fold(0.0_f64, f64::max);
    reach + 0.5
}

/// Draws each trace into a `width × height` PNG spanning `[-limit, limit]²`.
pub fn trace_png(traces: &[Vec<(f64, f64)>], limit: f64, width: u32, height: u32) -> SimResult<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(SimError::render("image size must be non-zero"));
    }
    let mut pixel_buffer = vec![0u8; (width as usize) * (height as usize) * 3]; // RGB, 3 bytes per pixel.

    {
        let root = BitMapBackend::with_buffer(&mut pixel_buffer, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| SimError::render(e.to_string()))?;

        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .build_cartesian_2d(-limit..limit, -limit..limit)
            .map_err(|e| SimError::render(e.to_string()))?;

        // Faint crosshair through the pivot.
        let axis_style = BLACK.mix(0.2).stroke_width(1);
        chart
            .draw_series(LineSeries::new([(-limit, 0.0), (limit, 0.0)], axis_style))
            .map_err(|e| SimError::render(e.to_string()))?;
        chart
            .draw_series(LineSeries::new([(0.0, -limit), (0.0, limit)], axis_style))
            .map_err(|e| SimError::render(e.to_string()))?;

        let mut colors: Vec<ShapeStyle> = vec![
            BLUE.mix(0.75).stroke_width(1),
            RED.mix(0.75).stroke_width(1),
            GREEN.mix(0.75).stroke_width(1),
            CYAN.mix(0.75).stroke_width(1),
            MAGENTA.mix(0.75).stroke_width(1),
        ];
        for i in colors.len()..traces.len() {
            colors.push(Palette99::pick(i).stroke_width(1));
        }

        for (k, trace) in traces.iter().enumerate() {
            chart
                .draw_series(LineSeries::new(trace.iter().copied(), colors[k % colors.len()]))
                .map_err(|e| SimError::render(e.to_string()))?;
        }

        chart
            .draw_series(std::iter::once(Circle::new((0.0, 0.0), 3, BLACK.filled())))
            .map_err(|e| SimError::render(e.to_string()))?;

        root.present().map_err(|e| SimError::render(e.to_string()))?;
    }

    let img_buffer = image::RgbImage::from_raw(width, height, pixel_buffer)
        .ok_or_else(|| SimError::render("pixel buffer does not match image size"))?;
    let mut png = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img_buffer)
        .write_to(&mut png, ImageFormat::Png)
        .map_err(|e| SimError::render(e.to_string()))?;
    Ok(png.into_inner())
}

/// `data:image/png;base64,...` form of a PNG.
pub fn to_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(png))
}
