//! Log-perplexity density histogram rendered to PNG with plotters.
//!
//! Every recorded method gets its own normalized histogram of `ln(perplexity)`
//! drawn as translucent bars on a shared x axis. A dashed vertical line marks
//! `ln(threshold)`.

use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use pplgate_core::{EvaluationRun, PplGateError, Result};
use std::path::Path;

/// Method colours. Indexing wraps when there are more methods than colours.
pub const PALETTE: [RGBColor; 6] = [
    RGBColor(0xe4, 0x1a, 0x1c),
    RGBColor(0x37, 0x7e, 0xb8),
    RGBColor(0x4d, 0xaf, 0x4a),
    RGBColor(0x98, 0x4e, 0xa3),
    RGBColor(0xff, 0x7f, 0x00),
    RGBColor(0xff, 0xff, 0x33),
];

/// Colour for the method at position `index`.
pub fn palette_color(index: usize) -> RGBColor {
    PALETTE[index % PALETTE.len()]
}

/// Rendering options.
#[derive(Debug, Clone)]
pub struct HistogramOptions {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Bins per method.
    pub bins: usize,
    /// Bar fill opacity.
    pub opacity: f64,
}

impl Default for HistogramOptions {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 600,
            bins: 20,
            opacity: 0.5,
        }
    }
}

/// One histogram bin: `[start, end)` in log space with its density.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub density: f64,
}

/// Normalized histogram of `ln(values)` over the values' own range.
///
/// Densities integrate to 1. The last bin is closed on the right. When every
/// value is identical a single unit-width bin centred on it is returned.
pub fn log_density_bins(values: &[f64], bins: usize) -> Vec<Bin> {
    let logs: Vec<f64> = values
        .iter()
        .filter(|v| **v > 0.0)
        .map(|v| v.ln())
        .collect();
    if logs.is_empty() || bins == 0 {
        return Vec::new();
    }

    let lo = logs.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = logs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let n = logs.len() as f64;

    if hi - lo <= f64::EPSILON {
        return vec![Bin {
            start: lo - 0.5,
            end: lo + 0.5,
            density: 1.0,
        }];
    }

    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for l in &logs {
        let idx = (((l - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, c)| Bin {
            start: lo + i as f64 * width,
            end: lo + (i + 1) as f64 * width,
            density: c as f64 / (n * width),
        })
        .collect()
}

/// Render the histogram to `path`.
///
/// # Errors
///
/// Returns [`PplGateError::Report`] if the image cannot be drawn or written.
pub fn render_histogram(
    run: &EvaluationRun,
    path: &Path,
    options: &HistogramOptions,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    draw(run, path, options)
        .map_err(|e| PplGateError::Report(format!("Failed to render {}: {e}", path.display())))?;
    tracing::info!(path = %path.display(), "histogram saved");
    Ok(())
}

fn draw(
    run: &EvaluationRun,
    path: &Path,
    options: &HistogramOptions,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let series: Vec<(&str, Vec<Bin>)> = run
        .results()
        .iter()
        .map(|r| (r.method(), log_density_bins(r.values(), options.bins)))
        .collect();

    let threshold_x = run.threshold().value().ln();
    let (mut x_min, mut x_max) = (threshold_x, threshold_x);
    let mut y_max = 0.0f64;
    for (_, bins) in &series {
        for bin in bins {
            x_min = x_min.min(bin.start);
            x_max = x_max.max(bin.end);
            y_max = y_max.max(bin.density);
        }
    }
    if !x_min.is_finite() || !x_max.is_finite() {
        return Err("threshold is not positive".into());
    }
    let pad = ((x_max - x_min) * 0.05).max(0.1);
    if y_max <= 0.0 {
        y_max = 1.0;
    }

    let root = BitMapBackend::new(path, (options.width, options.height)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d((x_min - pad)..(x_max + pad), 0.0..(y_max * 1.1))?;

    chart
        .configure_mesh()
        .x_desc("Log(Perplexity)")
        .y_desc("Density")
        .light_line_style(BLACK.mix(0.05))
        .draw()?;

    for (i, (method, bins)) in series.iter().enumerate() {
        let color = palette_color(i);
        let fill = color.mix(options.opacity);
        chart
            .draw_series(
                bins.iter()
                    .map(|b| Rectangle::new([(b.start, 0.0), (b.end, b.density)], fill.filled())),
            )?
            .label(*method)
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], fill.filled()));
        chart.draw_series(bins.iter().map(|b| {
            Rectangle::new([(b.start, 0.0), (b.end, b.density)], color.stroke_width(1))
        }))?;
    }

    chart
        .draw_series(DashedLineSeries::new(
            vec![(threshold_x, 0.0), (threshold_x, y_max * 1.1)],
            8,
            6,
            BLACK.stroke_width(2),
        ))?
        .label("Threshold")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 15, y)], BLACK.stroke_width(2)));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}
