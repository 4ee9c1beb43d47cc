//! SVG charts of aggregate results: bars, year trends and comparisons.
//!
//! A chart lives in a temporary file owned by its `ChartArtifact`; dropping
//! the artifact deletes the file.

use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use joebot_models::{AggregateEntry, FetchResult, FetchType};
use tempfile::TempPath;
use tracing::debug;

use crate::error::ChartError;

const WIDTH: usize = 800;
const LABEL_WIDTH: usize = 220;
const BAR_AREA: usize = WIDTH - LABEL_WIDTH - 80;
const ROW_HEIGHT: usize = 28;
const TOP: usize = 50;
const PLOT_HEIGHT: usize = 300;
const PLOT_MARGIN: usize = 60;
const BAR_COLOR: &str = "#4c72b0";
const PALETTE: [&str; 4] = ["#4c72b0", "#dd8452", "#55a868", "#c44e52"];

/// A rendered chart file, deleted on drop.
#[derive(Debug)]
pub struct ChartArtifact {
    path: TempPath,
}

impl ChartArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy the chart into `dir` so it outlives the artifact.
    pub fn persist_copy(&self, dir: &Path) -> Result<PathBuf, ChartError> {
        fs::create_dir_all(dir)?;
        let name = self
            .path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("chart.svg"));
        let target = dir.join(name);
        fs::copy(&self.path, &target)?;
        Ok(target)
    }
}

impl Drop for ChartArtifact {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "Removing chart artifact");
    }
}

/// Renders a fetch result as an image file.
pub trait ChartRenderer: Send + Sync {
    fn render(&self, result: &FetchResult, title: &str) -> Result<ChartArtifact, ChartError>;
}

/// Layout picked from the shape of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    /// Horizontal bars in aggregate order.
    Bar,
    /// Year trend, oldest year on the left.
    Line,
    /// One column per compared value, in the requested order.
    Comparison,
}

impl ChartKind {
    /// `compare` results get columns, `stats` by year with at least two
    /// dated groups gets a line, everything else gets bars.
    pub fn for_result(result: &FetchResult) -> Self {
        match (result.fetch_type, result.axis.as_deref()) {
            (FetchType::Compare, _) => ChartKind::Comparison,
            (FetchType::Stats, Some("year")) if year_points(&result.aggregate).len() >= 2 => {
                ChartKind::Line
            }
            _ => ChartKind::Bar,
        }
    }
}

/// Bar, line or comparison chart written as SVG.
pub struct SvgChartRenderer {
    max_bars: usize,
}

impl SvgChartRenderer {
    pub fn new(max_bars: usize) -> Self {
        Self {
            max_bars: max_bars.max(1),
        }
    }

    fn svg(&self, result: &FetchResult, title: &str) -> String {
        let entries = &result.aggregate[..result.aggregate.len().min(self.max_bars)];
        let (height, body) = match ChartKind::for_result(result) {
            ChartKind::Bar => bars(entries),
            ChartKind::Line => line(&year_points(entries)),
            ChartKind::Comparison => columns(entries),
        };

        let mut svg = String::new();
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{height}" viewBox="0 0 {WIDTH} {height}" font-family="sans-serif" font-size="13">"#
        );
        let _ = writeln!(
            svg,
            r#"<rect width="100%" height="100%" fill="white"/>"#
        );
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="28" text-anchor="middle" font-size="16" font-weight="bold">{}</text>"#,
            WIDTH / 2,
            escape(title)
        );
        svg.push_str(&body);
        svg.push_str("</svg>\n");
        svg
    }
}

fn bars(entries: &[AggregateEntry]) -> (usize, String) {
    let max = entries.iter().map(|e| e.count).max().unwrap_or(0).max(1);
    let mut body = String::new();
    for (i, entry) in entries.iter().enumerate() {
        let y = TOP + i * ROW_HEIGHT;
        let bar = (entry.count as f64 / max as f64 * BAR_AREA as f64).round() as usize;
        let _ = writeln!(
            body,
            r#"<text x="{}" y="{}" text-anchor="end">{}</text>"#,
            LABEL_WIDTH - 8,
            y + 17,
            escape(&truncate_label(&entry.key))
        );
        let _ = writeln!(
            body,
            r#"<rect x="{LABEL_WIDTH}" y="{}" width="{bar}" height="{}" fill="{BAR_COLOR}"/>"#,
            y + 4,
            ROW_HEIGHT - 8
        );
        let _ = writeln!(
            body,
            r#"<text x="{}" y="{}">{}</text>"#,
            LABEL_WIDTH + bar + 6,
            y + 17,
            entry.count
        );
    }
    (TOP + entries.len() * ROW_HEIGHT + 30, body)
}

/// Dated groups in chronological order. `Unknown` is dropped.
fn year_points(entries: &[AggregateEntry]) -> Vec<(i32, u64)> {
    let mut points: Vec<(i32, u64)> = entries
        .iter()
        .filter_map(|e| Some((e.key.parse().ok()?, e.count)))
        .collect();
    points.sort_unstable();
    points
}

fn line(points: &[(i32, u64)]) -> (usize, String) {
    let max = points.iter().map(|p| p.1).max().unwrap_or(0).max(1);
    let bottom = TOP + PLOT_HEIGHT;
    let step = (WIDTH - 2 * PLOT_MARGIN) as f64 / points.len().saturating_sub(1).max(1) as f64;
    let coords: Vec<(f64, f64)> = points
        .iter()
        .enumerate()
        .map(|(i, (_, count))| {
            let x = PLOT_MARGIN as f64 + i as f64 * step;
            let y = bottom as f64 - *count as f64 / max as f64 * (PLOT_HEIGHT - 20) as f64;
            (x, y)
        })
        .collect();

    let mut body = String::new();
    let _ = writeln!(
        body,
        r##"<line x1="{PLOT_MARGIN}" y1="{bottom}" x2="{}" y2="{bottom}" stroke="#333"/>"##,
        WIDTH - PLOT_MARGIN
    );
    let polyline: Vec<String> = coords.iter().map(|(x, y)| format!("{x:.1},{y:.1}")).collect();
    let _ = writeln!(
        body,
        r#"<polyline points="{}" fill="none" stroke="{BAR_COLOR}" stroke-width="2"/>"#,
        polyline.join(" ")
    );
    for ((year, count), (x, y)) in points.iter().zip(&coords) {
        let _ = writeln!(
            body,
            r#"<circle cx="{x:.1}" cy="{y:.1}" r="4" fill="{BAR_COLOR}"/>"#
        );
        let _ = writeln!(
            body,
            r#"<text x="{x:.1}" y="{:.1}" text-anchor="middle">{count}</text>"#,
            y - 9.0
        );
        let _ = writeln!(
            body,
            r#"<text x="{x:.1}" y="{}" text-anchor="middle">{year}</text>"#,
            bottom + 18
        );
    }
    (bottom + 40, body)
}

fn columns(entries: &[AggregateEntry]) -> (usize, String) {
    let max = entries.iter().map(|e| e.count).max().unwrap_or(0).max(1);
    let top = TOP + 30;
    let bottom = top + PLOT_HEIGHT;
    let slot = (WIDTH - 2 * PLOT_MARGIN) / entries.len().max(1);
    let width = (slot * 2 / 3).min(140);

    let mut body = String::new();
    if let [first, second] = entries {
        let diff = second.count as i64 - first.count as i64;
        let _ = writeln!(
            body,
            r#"<text x="{}" y="{}" text-anchor="middle">Change from {} to {}: {diff:+}</text>"#,
            WIDTH / 2,
            TOP + 4,
            escape(&first.key),
            escape(&second.key)
        );
    }
    for (i, entry) in entries.iter().enumerate() {
        let center = PLOT_MARGIN + slot * i + slot / 2;
        let column = (entry.count as f64 / max as f64 * (PLOT_HEIGHT - 20) as f64).round() as usize;
        let color = PALETTE[i % PALETTE.len()];
        let _ = writeln!(
            body,
            r#"<rect x="{}" y="{}" width="{width}" height="{column}" fill="{color}"/>"#,
            center - width / 2,
            bottom - column
        );
        let _ = writeln!(
            body,
            r#"<text x="{center}" y="{}" text-anchor="middle">{}</text>"#,
            bottom - column - 6,
            entry.count
        );
        let _ = writeln!(
            body,
            r#"<text x="{center}" y="{}" text-anchor="middle">{}</text>"#,
            bottom + 18,
            escape(&truncate_label(&entry.key))
        );
    }
    (bottom + 40, body)
}

impl ChartRenderer for SvgChartRenderer {
    fn render(&self, result: &FetchResult, title: &str) -> Result<ChartArtifact, ChartError> {
        if !result.has_aggregate() {
            return Err(ChartError::Empty(format!(
                "{} result has no aggregate",
                result.fetch_type
            )));
        }

        let mut file = tempfile::Builder::new()
            .prefix("joebot-chart-")
            .suffix(".svg")
            .tempfile()?;
        file.write_all(self.svg(result, title).as_bytes())?;
        file.flush()?;
        let path = file.into_temp_path();
        debug!(
            path = %path.display(),
            kind = ?ChartKind::for_result(result),
            groups = result.aggregate.len().min(self.max_bars),
            "Chart rendered"
        );
        Ok(ChartArtifact { path })
    }
}

fn truncate_label(label: &str) -> String {
    const MAX: usize = 32;
    if label.chars().count() <= MAX {
        label.to_string()
    } else {
        let mut short: String = label.chars().take(MAX - 1).collect();
        short.push('…');
        short
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}
