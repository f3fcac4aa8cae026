//! Visualization utilities for tours and annealing runs.
//!
//! Generates SVG drawings of tours and convergence curves. PNG output needs
//! the `png` feature, which renders natively through resvg.

use crate::annealing::{HistoryPoint, ProgressSink};
use crate::error::{Error, Result};
use crate::tour::Tour;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
#[cfg(feature = "png")]
use resvg::tiny_skia::{Pixmap, Transform};
#[cfg(feature = "png")]
use resvg::usvg::{self, TreeParsing};

/// SVG visualization generator
#[derive(Debug, Clone)]
pub struct Visualizer {
    /// Canvas width
    pub width: f64,
    /// Canvas height
    pub height: f64,
    /// Margin
    pub margin: f64,
    /// City marker radius
    pub node_radius: f64,
}

impl Default for Visualizer {
    fn default() -> Self {
        Visualizer {
            width: 800.0,
            height: 800.0,
            margin: 50.0,
            node_radius: 6.0,
        }
    }
}

impl Visualizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw `tour` as a closed path with labeled cities.
    pub fn generate_svg(&self, title: &str, tour: &Tour) -> String {
        let mut svg = String::new();

        let (min_x, max_x, min_y, max_y) = bounds(tour);

        let scale_x = (self.width - 2.0 * self.margin) / (max_x - min_x).max(1.0);
        let scale_y = (self.height - 2.0 * self.margin) / (max_y - min_y).max(1.0);
        let scale = scale_x.min(scale_y);

        svg.push_str(&format!(
            r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">
<style>
    .city {{ fill: #3498db; stroke: #2c3e50; stroke-width: 2; }}
    .start {{ fill: #e74c3c; stroke: #c0392b; stroke-width: 2; }}
    .edge {{ stroke: #34495e; stroke-width: 2; fill: none; }}
    .label {{ font-family: Arial; font-size: 10px; fill: #2c3e50; }}
    .title {{ font-family: Arial; font-size: 14px; fill: #2c3e50; font-weight: bold; }}
</style>
<rect width="100%" height="100%" fill="#ecf0f1"/>
"##,
            self.width, self.height, self.width, self.height
        ));

        svg.push_str(&format!(
            r##"<text x="{}" y="25" class="title">{} | Cities: {} | Length: {:.2}</text>
"##,
            self.margin,
            escape(title),
            tour.len(),
            tour.total_length()
        ));

        let transform = |x: f64, y: f64| -> (f64, f64) {
            let tx = self.margin + (x - min_x) * scale;
            let ty = self.height - self.margin - (y - min_y) * scale;
            (tx, ty)
        };

        let cities = tour.cities();
        if cities.len() > 1 {
            let points: Vec<String> = cities
                .iter()
                .map(|c| {
                    let (x, y) = transform(c.x(), c.y());
                    format!("{:.2},{:.2}", x, y)
                })
                .collect();
            svg.push_str(&format!(
                r#"<polygon points="{}" class="edge"/>
"#,
                points.join(" ")
            ));
        }

        for (i, city) in cities.iter().enumerate() {
            let (x, y) = transform(city.x(), city.y());
            let class = if i == 0 { "start" } else { "city" };

            svg.push_str(&format!(
                r##"<circle cx="{:.2}" cy="{:.2}" r="{}" class="{}"/>
<text x="{:.2}" y="{:.2}" class="label" text-anchor="middle">{}</text>
"##,
                x,
                y,
                self.node_radius,
                class,
                x,
                y - self.node_radius - 3.0,
                escape(city.label())
            ));
        }

        svg.push_str("</svg>");

        svg
    }

    /// Plot sampled tour length (blue) and temperature (red, log scale)
    /// against iteration.
    pub fn generate_convergence_svg(&self, history: &[HistoryPoint]) -> String {
        let mut svg = String::new();

        let width = self.width;
        let height = 300.0;
        let margin = 50.0;

        svg.push_str(&format!(
            r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">
<style>
    .length {{ stroke: #3498db; stroke-width: 2; fill: none; }}
    .temperature {{ stroke: #e74c3c; stroke-width: 1; stroke-dasharray: 5,5; fill: none; }}
    .axis {{ stroke: #2c3e50; stroke-width: 1; }}
    .title {{ font-family: Arial; font-size: 14px; fill: #2c3e50; font-weight: bold; }}
</style>
<rect width="100%" height="100%" fill="#ecf0f1"/>
"##,
            width, height, width, height
        ));

        svg.push_str(&format!(
            r#"<text x="{}" y="25" class="title">Convergence ({} samples)</text>
"#,
            margin,
            history.len()
        ));

        svg.push_str(&format!(
            r##"<line x1="{}" y1="{}" x2="{}" y2="{}" class="axis"/>
<line x1="{}" y1="{}" x2="{}" y2="{}" class="axis"/>
"##,
            margin,
            height - margin,
            width - margin,
            height - margin,
            margin,
            margin,
            margin,
            height - margin
        ));

        if let (Some(first), Some(last)) = (history.first(), history.last()) {
            let plot_width = width - 2.0 * margin;
            let plot_height = height - 2.0 * margin;
            let span = (last.iteration.saturating_sub(first.iteration)).max(1) as f64;

            let x_of = |it: u64| margin + (it - first.iteration) as f64 / span * plot_width;

            let (min_len, max_len) = history
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                    (lo.min(p.length), hi.max(p.length))
                });
            let len_range = (max_len - min_len).max(1e-9);

            let log_temps: Vec<f64> = history
                .iter()
                .map(|p| p.temperature.max(1e-12).ln())
                .collect();
            let (min_t, max_t) = log_temps
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &t| (lo.min(t), hi.max(t)));
            let t_range = (max_t - min_t).max(1e-9);

            let mut length_path = String::new();
            let mut temp_path = String::new();
            for (i, (point, log_t)) in history.iter().zip(&log_temps).enumerate() {
                let x = x_of(point.iteration);
                let y_len = height - margin - (point.length - min_len) / len_range * plot_height;
                let y_temp = height - margin - (log_t - min_t) / t_range * plot_height;
                let op = if i == 0 { "M" } else { " L" };
                length_path.push_str(&format!("{} {:.2} {:.2}", op, x, y_len));
                temp_path.push_str(&format!("{} {:.2} {:.2}", op, x, y_temp));
            }

            svg.push_str(&format!(
                r#"<path d="{}" class="temperature"/>
<path d="{}" class="length"/>
"#,
                temp_path, length_path
            ));
        }

        svg.push_str("</svg>");

        svg
    }

    /// Save SVG to file
    pub fn save_svg<P: AsRef<Path>>(&self, svg: &str, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(svg.as_bytes())?;
        Ok(())
    }

    /// Render SVG to a PNG file with resvg.
    #[cfg(feature = "png")]
    pub fn save_png<P: AsRef<Path>>(&self, svg: &str, path: P) -> Result<()> {
        let opt = usvg::Options::default();
        let tree = usvg::Tree::from_str(svg, &opt)
            .map_err(|e| Error::Render(format!("usvg parse error: {}", e)))?;

        let w = svg_dimension(svg, "width=\"").unwrap_or(self.width) as u32;
        let h = svg_dimension(svg, "height=\"").unwrap_or(self.height) as u32;
        let mut pixmap = Pixmap::new(w.max(1), h.max(1))
            .ok_or_else(|| Error::Render("failed to create pixmap".to_string()))?;
        resvg::render(&tree, resvg::FitTo::Original, Transform::default(), pixmap.as_mut())
            .ok_or_else(|| Error::Render("resvg render failed".to_string()))?;
        pixmap
            .save_png(path.as_ref())
            .map_err(|e| Error::Render(format!("save_png failed: {}", e)))?;
        Ok(())
    }

    /// PNG output is unavailable without the `png` feature.
    #[cfg(not(feature = "png"))]
    pub fn save_png<P: AsRef<Path>>(&self, _svg: &str, _path: P) -> Result<()> {
        Err(Error::Render("built without the `png` feature".to_string()))
    }

    /// Export tour data for external plotting (e.g., matplotlib)
    pub fn export_plot_data(&self, tour: &Tour) -> String {
        let mut data = String::new();

        data.push_str("# Tour Data\n");
        data.push_str(&format!("# Cities: {}\n", tour.len()));
        data.push_str(&format!("# Length: {:.2}\n\n", tour.total_length()));

        data.push_str("# Visiting order: position, label, x, y\n");
        for (i, city) in tour.cities().iter().enumerate() {
            data.push_str(&format!("{},{},{},{}\n", i, city.label(), city.x(), city.y()));
        }

        data
    }
}

/// Writes an SVG snapshot of the working tour every `every` iterations,
/// the file equivalent of redrawing a window every few steps.
pub struct SvgFrameSink {
    visualizer: Visualizer,
    dir: PathBuf,
    every: u64,
    frames_written: usize,
    failures: usize,
}

impl SvgFrameSink {
    pub fn new<P: Into<PathBuf>>(dir: P, every: u64) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(SvgFrameSink {
            visualizer: Visualizer::new(),
            dir,
            every: every.max(1),
            frames_written: 0,
            failures: 0,
        })
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    pub fn failures(&self) -> usize {
        self.failures
    }
}

impl ProgressSink for SvgFrameSink {
    fn on_iteration(&mut self, tour: &Tour, temperature: f64, iteration: u64) {
        if iteration % self.every != 0 {
            return;
        }
        let title = format!("Iteration {} | T={:.3}", iteration, temperature);
        let svg = self.visualizer.generate_svg(&title, tour);
        let path = self.dir.join(format!("frame_{:08}.svg", iteration));
        match self.visualizer.save_svg(&svg, &path) {
            Ok(()) => self.frames_written += 1,
            Err(e) => {
                self.failures += 1;
                log::warn!("Failed to write frame {:?}: {}", path, e);
            }
        }
    }
}

/// Get coordinate bounds
fn bounds(tour: &Tour) -> (f64, f64, f64, f64) {
    let mut min_x = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    for city in tour.cities() {
        min_x = min_x.min(city.x());
        max_x = max_x.max(city.x());
        min_y = min_y.min(city.y());
        max_y = max_y.max(city.y());
    }

    if tour.is_empty() {
        return (0.0, 1.0, 0.0, 1.0);
    }

    (min_x, max_x, min_y, max_y)
}

/// Read a numeric attribute from the first tag that carries it.
#[cfg(feature = "png")]
fn svg_dimension(svg: &str, attr: &str) -> Option<f64> {
    let (_, rest) = svg.split_once(attr)?;
    let (value, _) = rest.split_once('"')?;
    value.parse().ok()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
