//! Visualization utilities for TSP tours.
//!
//! Generates SVG drawings of tours and of the best-length trace of a run,
//! plus plain-text exports for external plotting.

use crate::error::Result;
use crate::instance::TspInstance;
use crate::solution::Solution;
use std::fs::File;
use std::io::{Error as IoError, ErrorKind, Write};
use std::path::Path;
#[cfg(feature = "resvg")]
use resvg::tiny_skia::{Pixmap, Transform};
#[cfg(feature = "resvg")]
use resvg::usvg;
#[cfg(feature = "resvg")]
use resvg::usvg::TreeParsing;

/// Point labels are skipped above this many points.
const MAX_LABELLED_POINTS: usize = 200;

/// SVG visualization generator
pub struct Visualizer {
    /// Canvas width
    pub width: f64,
    /// Canvas height
    pub height: f64,
    /// Margin
    pub margin: f64,
    /// Point radius
    pub node_radius: f64,
}

impl Default for Visualizer {
    fn default() -> Self {
        Visualizer {
            width: 800.0,
            height: 800.0,
            margin: 50.0,
            node_radius: 4.0,
        }
    }
}

impl Visualizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate SVG visualization of a tour
    pub fn generate_svg(&self, instance: &TspInstance, solution: &Solution) -> String {
        let mut svg = String::new();

        let (min_x, max_x, min_y, max_y) = self.get_bounds(instance);

        let scale_x = (self.width - 2.0 * self.margin) / (max_x - min_x).max(1e-9);
        let scale_y = (self.height - 2.0 * self.margin) / (max_y - min_y).max(1e-9);
        let scale = scale_x.min(scale_y);

        svg.push_str(&format!(
            r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">
<style>
    .node {{ fill: #3498db; stroke: #2c3e50; stroke-width: 1; }}
    .start {{ fill: #e74c3c; stroke: #c0392b; stroke-width: 1; }}
    .edge {{ stroke: #34495e; stroke-width: 1.5; fill: none; }}
    .label {{ font-family: Arial; font-size: 10px; fill: #2c3e50; }}
    .title {{ font-family: Arial; font-size: 14px; fill: #2c3e50; font-weight: bold; }}
</style>
<rect width="100%" height="100%" fill="#ecf0f1"/>
"##,
            self.width, self.height, self.width, self.height
        ));

        svg.push_str(&format!(
            r##"<text x="{}" y="25" class="title">Instance: {} | Points: {} | Length: {:.2} | {}</text>
"##,
            self.margin,
            instance.name,
            instance.dimension(),
            solution.cost,
            solution.algorithm
        ));

        let transform = |x: f64, y: f64| -> (f64, f64) {
            let tx = self.margin + (x - min_x) * scale;
            let ty = self.height - self.margin - (y - min_y) * scale;
            (tx, ty)
        };

        if solution.tour.len() > 1 {
            let mut points = String::new();
            for &p in solution.tour.iter().chain(solution.tour.first()) {
                let point = &instance.points[p];
                let (x, y) = transform(point.x, point.y);
                points.push_str(&format!("{:.2},{:.2} ", x, y));
            }
            svg.push_str(&format!(
                r#"<polyline points="{}" class="edge"/>
"#,
                points.trim_end()
            ));
        }

        let start = solution.tour.first().copied();
        let labelled = instance.dimension() <= MAX_LABELLED_POINTS;
        for point in &instance.points {
            let (x, y) = transform(point.x, point.y);
            let class = if Some(point.id) == start { "start" } else { "node" };

            svg.push_str(&format!(
                r##"<circle cx="{:.2}" cy="{:.2}" r="{}" class="{}"/>
"##,
                x, y, self.node_radius, class
            ));

            if labelled {
                svg.push_str(&format!(
                    r##"<text x="{:.2}" y="{:.2}" class="label" text-anchor="middle">{}</text>
"##,
                    x,
                    y - self.node_radius - 3.0,
                    point.id
                ));
            }
        }

        svg.push_str("</svg>");

        svg
    }

    /// Generate a step plot of the best length over time
    pub fn generate_trace_svg(&self, trace: &[(f64, f64)]) -> String {
        let mut svg = String::new();

        let width = self.width;
        let height = 300.0;
        let margin = 50.0;

        svg.push_str(&format!(
            r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">
<style>
    .line {{ stroke: #3498db; stroke-width: 2; fill: none; }}
    .axis {{ stroke: #2c3e50; stroke-width: 1; }}
    .label {{ font-family: Arial; font-size: 12px; fill: #2c3e50; }}
    .title {{ font-family: Arial; font-size: 14px; fill: #2c3e50; font-weight: bold; }}
</style>
<rect width="100%" height="100%" fill="#ecf0f1"/>
"##,
            width, height, width, height
        ));

        svg.push_str(&format!(
            r#"<text x="{}" y="25" class="title">Best length over time</text>
"#,
            margin
        ));

        let plot_width = width - 2.0 * margin;
        let plot_height = height - 2.0 * margin;

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

        if let (Some(&(_, first)), Some(&(t_end, last))) = (trace.first(), trace.last()) {
            let x_scale = plot_width / t_end.max(1e-9);
            let y_span = (first - last).max(1e-9);
            let to_xy = |t: f64, length: f64| -> (f64, f64) {
                (
                    margin + t * x_scale,
                    margin + (first - length) / y_span * plot_height,
                )
            };

            let mut path = String::new();
            for (i, &(t, length)) in trace.iter().enumerate() {
                let (x, y) = to_xy(t, length);
                if i == 0 {
                    path.push_str(&format!("M {:.2} {:.2}", x, y));
                } else {
                    // Horizontal at the previous best, then drop.
                    let (_, prev_y) = to_xy(t, trace[i - 1].1);
                    path.push_str(&format!(" L {:.2} {:.2} L {:.2} {:.2}", x, prev_y, x, y));
                }
            }

            svg.push_str(&format!(
                r##"<path d="{}" class="line"/>
<text x="{}" y="{}" class="label">{:.2}</text>
<text x="{}" y="{}" class="label">{:.2}</text>
<text x="{}" y="{}" class="label">{:.2}s</text>
"##,
                path,
                5.0,
                margin + 4.0,
                first,
                5.0,
                height - margin,
                last,
                width - margin - 20.0,
                height - margin + 15.0,
                t_end
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

    /// Save SVG as PNG. Uses the native renderer when the `resvg` feature is
    /// enabled, otherwise tries `rsvg-convert`, `magick convert` and `inkscape`.
    pub fn save_png<P: AsRef<Path>>(&self, svg: &str, path: P) -> Result<()> {
        let fallback_size = (self.width as u32, self.height as u32);
        render_png(svg, path.as_ref(), fallback_size)
    }

    /// Get coordinate bounds
    fn get_bounds(&self, instance: &TspInstance) -> (f64, f64, f64, f64) {
        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for point in &instance.points {
            min_x = min_x.min(point.x);
            max_x = max_x.max(point.x);
            min_y = min_y.min(point.y);
            max_y = max_y.max(point.y);
        }

        if instance.points.is_empty() {
            return (0.0, 1.0, 0.0, 1.0);
        }
        (min_x, max_x, min_y, max_y)
    }

    /// Export data for external plotting (e.g., matplotlib)
    pub fn export_plot_data(&self, instance: &TspInstance, solution: &Solution) -> String {
        let mut data = String::new();

        data.push_str("# TSP Solution Data\n");
        data.push_str(&format!("# Instance: {}\n", instance.name));
        data.push_str(&format!("# Algorithm: {}\n", solution.algorithm));
        data.push_str(&format!("# Length: {:.2}\n\n", solution.cost));

        data.push_str("# Points: id, x, y\n");
        for point in &instance.points {
            data.push_str(&format!("{},{},{}\n", point.id, point.x, point.y));
        }

        data.push_str("\n# Tour: sequence of point ids\n");
        let tour_str: Vec<String> = solution.tour.iter().map(|n| n.to_string()).collect();
        data.push_str(&tour_str.join(","));
        data.push('\n');

        data
    }
}

#[cfg(feature = "resvg")]
fn render_png(svg: &str, path: &Path, fallback_size: (u32, u32)) -> Result<()> {
    let opt = usvg::Options::default();
    let utree = usvg::Tree::from_str(svg, &opt)
        .map_err(|e| IoError::new(ErrorKind::Other, format!("usvg parse error: {}", e)))?;
    let (w, h) = canvas_size(svg).unwrap_or(fallback_size);
    let mut pixmap = Pixmap::new(w.max(1), h.max(1))
        .ok_or_else(|| IoError::new(ErrorKind::Other, "failed to create pixmap"))?;
    resvg::Tree::from_usvg(&utree).render(Transform::default(), &mut pixmap.as_mut());
    pixmap
        .save_png(path)
        .map_err(|e| IoError::new(ErrorKind::Other, format!("save_png failed: {}", e)))?;
    Ok(())
}

/// Width and height attributes of the root `<svg>` element.
#[cfg(feature = "resvg")]
fn canvas_size(svg: &str) -> Option<(u32, u32)> {
    let attr = |name: &str| -> Option<u32> {
        let (_, rest) = svg.split_once(&format!(" {}=\"", name))?;
        let (value, _) = rest.split_once('"')?;
        value.parse::<f64>().ok().map(|v| v as u32)
    };
    Some((attr("width")?, attr("height")?))
}

#[cfg(not(feature = "resvg"))]
fn render_png(svg: &str, path: &Path, _fallback_size: (u32, u32)) -> Result<()> {
    use std::process::Command;

    let tmp_svg = path.with_extension("svg.tmp");
    std::fs::write(&tmp_svg, svg)?;
    let out = path.to_string_lossy().to_string();
    let input = tmp_svg.to_string_lossy().to_string();

    let attempts: [(&str, Vec<&str>); 3] = [
        ("rsvg-convert", vec!["-o", out.as_str(), input.as_str()]),
        ("magick", vec!["convert", input.as_str(), out.as_str()]),
        (
            "inkscape",
            vec![input.as_str(), "--export-type=png", "--export-filename", out.as_str()],
        ),
    ];

    for (program, args) in attempts.iter() {
        if let Ok(status) = Command::new(program).args(args).status() {
            if status.success() {
                let _ = std::fs::remove_file(&tmp_svg);
                return Ok(());
            }
        }
        log::debug!("{} could not convert {:?}", program, tmp_svg);
    }

    let _ = std::fs::remove_file(&tmp_svg);
    Err(IoError::new(
        ErrorKind::Other,
        "no SVG->PNG converter succeeded (tried rsvg-convert, magick, inkscape)",
    )
    .into())
}

/// Generate comparison plot data for multiple solutions
pub fn generate_comparison_data(solutions: &[Solution]) -> String {
    let mut data = String::new();

    data.push_str("# Algorithm Comparison\n");
    data.push_str("algorithm,cost,time,iterations\n");

    for sol in solutions {
        data.push_str(&format!(
            "{},{:.2},{:.4},{}\n",
            sol.algorithm,
            sol.cost,
            sol.computation_time,
            sol.iterations.map(|i| i.to_string()).unwrap_or_default()
        ));
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_instance() -> TspInstance {
        TspInstance::from_coordinates("test", &[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)])
    }

    #[test]
    fn test_visualizer() {
        let instance = create_test_instance();
        let solution = Solution::from_tour(&instance, vec![0, 1, 2], "test");

        let viz = Visualizer::new();
        let svg = viz.generate_svg(&instance, &solution);

        assert!(svg.starts_with("<?xml"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("Instance: test"));
        assert_eq!(svg.matches("<circle").count(), 3);
        assert_eq!(svg.matches("class=\"start\"").count(), 1);
        // Closed polyline: the first point is repeated at the end.
        let polyline = svg.lines().find(|l| l.starts_with("<polyline")).unwrap();
        assert_eq!(polyline.matches(',').count(), 4);
    }

    #[test]
    fn test_trace_svg() {
        let viz = Visualizer::new();
        let svg = viz.generate_trace_svg(&[(0.0, 120.0), (0.5, 100.0), (2.0, 95.0)]);
        assert!(svg.contains("<path d=\"M "));
        assert!(svg.contains("95.00"));

        let empty = viz.generate_trace_svg(&[]);
        assert!(!empty.contains("<path"));
    }

    #[test]
    fn test_plot_data_and_comparison() {
        let instance = create_test_instance();
        let solution = Solution::from_tour(&instance, vec![0, 2, 1], "NearestNeighbor");

        let viz = Visualizer::new();
        let data = viz.export_plot_data(&instance, &solution);
        assert!(data.contains("# Instance: test"));
        assert!(data.contains("\n0,2,1\n"));

        let table = generate_comparison_data(&[solution]);
        assert_eq!(table.lines().count(), 3);
        assert!(table.contains("NearestNeighbor,"));
    }
}
