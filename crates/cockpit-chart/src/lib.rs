//! Chart pipeline: a value series in, scaled vector geometry out.
//!
//! - [`scale`]: padded value range and linear value-to-pixel mapping
//! - [`geometry`]: grid, area, line, markers and axis labels for a layout
//! - [`svg`]: serialization of the geometry to an SVG document

pub mod error;
pub mod geometry;
pub mod scale;
pub mod svg;

pub use error::{ChartError, ChartResult};
pub use geometry::{render, render_equity, AxisLabel, ChartGeometry, ChartLayout, GridLine, Marker, Point};
pub use scale::{LinearScale, ValueRange};
