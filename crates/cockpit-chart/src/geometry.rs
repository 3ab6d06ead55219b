//! Chart geometry.
//!
//! Output is resolution independent: every coordinate is in layout pixels and
//! a renderer draws the parts in field order (grid, area, line, markers,
//! labels).

use crate::error::{ChartError, ChartResult};
use crate::scale::{LinearScale, ValueRange};
use cockpit_core::EquityPoint;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Canvas size, margins and decoration sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartLayout {
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
    #[serde(default = "default_margin_left")]
    pub margin_left: f64,
    #[serde(default = "default_margin_right")]
    pub margin_right: f64,
    #[serde(default = "default_margin_top")]
    pub margin_top: f64,
    #[serde(default = "default_margin_bottom")]
    pub margin_bottom: f64,
    /// Horizontal grid divisions.
    #[serde(default = "default_divisions")]
    pub grid_rows: usize,
    /// Vertical grid divisions.
    #[serde(default = "default_divisions")]
    pub grid_cols: usize,
    #[serde(default = "default_marker_radius")]
    pub marker_radius: f64,
    #[serde(default = "default_hover_radius")]
    pub hover_radius: f64,
}

fn default_width() -> f64 {
    800.0
}

fn default_height() -> f64 {
    300.0
}

fn default_margin_left() -> f64 {
    60.0
}

fn default_margin_right() -> f64 {
    20.0
}

fn default_margin_top() -> f64 {
    20.0
}

fn default_margin_bottom() -> f64 {
    30.0
}

fn default_divisions() -> usize {
    5
}

fn default_marker_radius() -> f64 {
    3.0
}

fn default_hover_radius() -> f64 {
    6.0
}

impl Default for ChartLayout {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            margin_left: default_margin_left(),
            margin_right: default_margin_right(),
            margin_top: default_margin_top(),
            margin_bottom: default_margin_bottom(),
            grid_rows: default_divisions(),
            grid_cols: default_divisions(),
            marker_radius: default_marker_radius(),
            hover_radius: default_hover_radius(),
        }
    }
}

impl ChartLayout {
    pub fn plot_left(&self) -> f64 {
        self.margin_left
    }

    pub fn plot_right(&self) -> f64 {
        self.width - self.margin_right
    }

    pub fn plot_top(&self) -> f64 {
        self.margin_top
    }

    pub fn plot_bottom(&self) -> f64 {
        self.height - self.margin_bottom
    }

    pub fn plot_width(&self) -> f64 {
        self.plot_right() - self.plot_left()
    }

    pub fn plot_height(&self) -> f64 {
        self.plot_bottom() - self.plot_top()
    }

    pub fn validate(&self) -> ChartResult<()> {
        if !(self.plot_width() > 0.0 && self.plot_height() > 0.0) {
            return Err(ChartError::InvalidLayout(format!(
                "plot area {}x{} is empty",
                self.plot_width(),
                self.plot_height()
            )));
        }
        if self.grid_rows == 0 || self.grid_cols == 0 {
            return Err(ChartError::InvalidLayout(
                "grid needs at least one division".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridLine {
    pub from: Point,
    pub to: Point,
}

/// One data point marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Marker {
    pub index: usize,
    pub center: Point,
    pub value: f64,
    pub radius: f64,
    pub highlighted: bool,
}

/// Value label on the left axis, at a horizontal grid line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisLabel {
    pub position: Point,
    pub value: f64,
    pub text: String,
}

/// Everything needed to draw one series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartGeometry {
    pub layout: ChartLayout,
    pub range: ValueRange,
    pub grid: Vec<GridLine>,
    /// Closed path from the line down to the plot baseline. None for a single point.
    pub area_path: Option<String>,
    /// None for a single point.
    pub line_path: Option<String>,
    pub markers: Vec<Marker>,
    pub labels: Vec<AxisLabel>,
}

impl ChartGeometry {
    /// Index of the marker horizontally nearest to `x`.
    pub fn hit_test(&self, x: f64) -> Option<usize> {
        self.markers
            .iter()
            .min_by(|a, b| {
                let da = (a.center.x - x).abs();
                let db = (b.center.x - x).abs();
                da.total_cmp(&db)
            })
            .map(|m| m.index)
    }
}

/// Compute geometry for `values` drawn into `layout`.
///
/// `hover` selects the marker drawn in its enlarged, highlighted variant.
pub fn render(values: &[f64], layout: &ChartLayout, hover: Option<usize>) -> ChartResult<ChartGeometry> {
    layout.validate()?;
    let range = ValueRange::padded(values)?;
    let scale = LinearScale::new(range, layout.plot_top(), layout.plot_bottom());

    let n = values.len();
    let x_at = |i: usize| {
        if n == 1 {
            layout.plot_left() + layout.plot_width() / 2.0
        } else {
            layout.plot_left() + i as f64 * layout.plot_width() / (n - 1) as f64
        }
    };

    let points: Vec<Point> = values
        .iter()
        .enumerate()
        .map(|(i, v)| Point {
            x: x_at(i),
            y: scale.y(*v),
        })
        .collect();

    let (line_path, area_path) = if n >= 2 {
        let line = line_path(&points);
        let area = area_path(&line, &points, layout.plot_bottom());
        (Some(line), Some(area))
    } else {
        (None, None)
    };

    let markers = points
        .iter()
        .zip(values)
        .enumerate()
        .map(|(index, (center, value))| {
            let highlighted = hover == Some(index);
            Marker {
                index,
                center: *center,
                value: *value,
                radius: if highlighted {
                    layout.hover_radius
                } else {
                    layout.marker_radius
                },
                highlighted,
            }
        })
        .collect();

    Ok(ChartGeometry {
        layout: layout.clone(),
        range,
        grid: grid_lines(layout),
        area_path,
        line_path,
        markers,
        labels: axis_labels(layout, &scale),
    })
}

/// [`render`] over the values of an equity curve.
pub fn render_equity(
    points: &[EquityPoint],
    layout: &ChartLayout,
    hover: Option<usize>,
) -> ChartResult<ChartGeometry> {
    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    render(&values, layout, hover)
}

fn grid_lines(layout: &ChartLayout) -> Vec<GridLine> {
    let mut grid = Vec::with_capacity(layout.grid_rows + layout.grid_cols + 2);
    for row in 0..=layout.grid_rows {
        let y = layout.plot_top() + row as f64 * layout.plot_height() / layout.grid_rows as f64;
        grid.push(GridLine {
            from: Point {
                x: layout.plot_left(),
                y,
            },
            to: Point {
                x: layout.plot_right(),
                y,
            },
        });
    }
    for col in 0..=layout.grid_cols {
        let x = layout.plot_left() + col as f64 * layout.plot_width() / layout.grid_cols as f64;
        grid.push(GridLine {
            from: Point {
                x,
                y: layout.plot_top(),
            },
            to: Point {
                x,
                y: layout.plot_bottom(),
            },
        });
    }
    grid
}

fn axis_labels(layout: &ChartLayout, scale: &LinearScale) -> Vec<AxisLabel> {
    (0..=layout.grid_rows)
        .map(|row| {
            let y = layout.plot_top() + row as f64 * layout.plot_height() / layout.grid_rows as f64;
            let value = scale.value_at(y);
            AxisLabel {
                position: Point {
                    x: layout.plot_left() - 8.0,
                    y,
                },
                value,
                text: format_value(value),
            }
        })
        .collect()
}

fn line_path(points: &[Point]) -> String {
    let mut path = String::new();
    for (i, p) in points.iter().enumerate() {
        let cmd = if i == 0 { "M" } else { " L" };
        let _ = write!(path, "{cmd} {:.2} {:.2}", p.x, p.y);
    }
    path
}

fn area_path(line: &str, points: &[Point], baseline: f64) -> String {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return String::new();
    };
    format!(
        "{line} L {:.2} {baseline:.2} L {:.2} {baseline:.2} Z",
        last.x, first.x
    )
}

/// Axis label text: whole numbers for large values, more digits for small ones.
pub fn format_value(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1000.0 {
        format!("{value:.0}")
    } else if abs >= 1.0 {
        format!("{value:.2}")
    } else {
        format!("{value:.4}")
    }
}
