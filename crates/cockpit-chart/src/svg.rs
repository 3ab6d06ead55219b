//! SVG serialization of chart geometry.

use crate::geometry::ChartGeometry;
use std::fmt::Write;

const GRID_STROKE: &str = "#2a2f3a";
const LINE_STROKE: &str = "#4f9cf9";
const AREA_FILL: &str = "rgba(79,156,249,0.15)";
const MARKER_FILL: &str = "#4f9cf9";
const HOVER_FILL: &str = "#ffd166";
const LABEL_FILL: &str = "#8b93a7";

impl ChartGeometry {
    /// Standalone SVG document, drawn in geometry order.
    pub fn to_svg(&self) -> String {
        let layout = &self.layout;
        let mut svg = String::new();
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = layout.width,
            h = layout.height
        );

        let _ = writeln!(svg, r#"<g class="grid" stroke="{GRID_STROKE}" stroke-width="1">"#);
        for line in &self.grid {
            let _ = writeln!(
                svg,
                r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}"/>"#,
                line.from.x, line.from.y, line.to.x, line.to.y
            );
        }
        svg.push_str("</g>\n");

        if let Some(area) = &self.area_path {
            let _ = writeln!(svg, r#"<path class="area" d="{area}" fill="{AREA_FILL}"/>"#);
        }
        if let Some(line) = &self.line_path {
            let _ = writeln!(
                svg,
                r#"<path class="line" d="{line}" fill="none" stroke="{LINE_STROKE}" stroke-width="2"/>"#
            );
        }

        for marker in &self.markers {
            let fill = if marker.highlighted {
                HOVER_FILL
            } else {
                MARKER_FILL
            };
            let _ = writeln!(
                svg,
                r#"<circle class="marker" data-index="{}" cx="{:.2}" cy="{:.2}" r="{}" fill="{fill}"/>"#,
                marker.index, marker.center.x, marker.center.y, marker.radius
            );
        }

        for label in &self.labels {
            let _ = writeln!(
                svg,
                r#"<text class="label" x="{:.2}" y="{:.2}" text-anchor="end" dominant-baseline="middle" fill="{LABEL_FILL}" font-size="11">{}</text>"#,
                label.position.x, label.position.y, label.text
            );
        }

        svg.push_str("</svg>\n");
        svg
    }
}
