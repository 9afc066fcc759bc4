//! Georeferenced factor grids
//!
//! Provides the in-memory raster model used across the pipeline:
//! - [`GeoTransform`] - affine mapping between grid cells and map coordinates
//! - [`FactorGrid`] - one explanatory variable (slope, rainfall, ...) on a grid
//! - [`FactorStore`] - loading factors from GeoTIFF files
//! - [`check_alignment`] - opt-in consistency check across factors

mod alignment;
mod geotiff;
mod store;

pub use alignment::{check_alignment, AlignmentIssue, AlignmentReport, ORIGIN_TOLERANCE, RESOLUTION_TOLERANCE};
pub use geotiff::{read_geotiff, write_geotiff, GeoTiffRaster};
pub use store::{discover_factors, FactorStore};

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Affine transform in GDAL coefficient order.
///
/// ```text
/// x = c + a * col + b * row
/// y = f + d * col + e * row
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GeoTransform {
    /// North-up transform from the upper-left corner and cell size
    pub fn north_up(origin_x: f64, origin_y: f64, cell_width: f64, cell_height: f64) -> Self {
        Self {
            a: cell_width,
            b: 0.0,
            c: origin_x,
            d: 0.0,
            e: -cell_height.abs(),
            f: origin_y,
        }
    }

    /// Map coordinates of a fractional (row, col) position
    pub fn apply(&self, row: f64, col: f64) -> (f64, f64) {
        (
            self.c + self.a * col + self.b * row,
            self.f + self.d * col + self.e * row,
        )
    }

    /// Map coordinates of a cell center
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.apply(row as f64 + 0.5, col as f64 + 0.5)
    }

    /// Fractional (row, col) of a map coordinate, or `None` for a degenerate transform
    pub fn invert(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let det = self.a * self.e - self.b * self.d;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let dx = x - self.c;
        let dy = y - self.f;
        let col = (self.e * dx - self.b * dy) / det;
        let row = (-self.d * dx + self.a * dy) / det;
        Some((row, col))
    }

    /// Integer cell containing a map coordinate (floor of the inverse transform).
    ///
    /// May be negative or beyond the grid; callers bound-check against their shape.
    pub fn row_col(&self, x: f64, y: f64) -> Option<(i64, i64)> {
        let (row, col) = self.invert(x, y)?;
        if !row.is_finite() || !col.is_finite() {
            return None;
        }
        Some((row.floor() as i64, col.floor() as i64))
    }

    /// Absolute X cell size
    pub fn resolution_x(&self) -> f64 {
        (self.a * self.a + self.d * self.d).sqrt()
    }

    /// Absolute Y cell size
    pub fn resolution_y(&self) -> f64 {
        (self.b * self.b + self.e * self.e).sqrt()
    }

    /// True when the grid has no rotation terms
    pub fn is_north_up(&self) -> bool {
        self.b == 0.0 && self.d == 0.0
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::north_up(0.0, 0.0, 1.0, 1.0)
    }
}

/// Coordinate reference system identified by an EPSG code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crs {
    pub epsg: u16,
    /// Geographic (lat/lon) rather than projected
    pub geographic: bool,
}

impl Crs {
    pub fn projected(epsg: u16) -> Self {
        Self { epsg, geographic: false }
    }

    pub fn geographic(epsg: u16) -> Self {
        Self { epsg, geographic: true }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

/// Spatial extent of a grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

/// Spatial reference shared by a grid and any raster derived from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialReference {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    pub crs: Option<Crs>,
}

impl SpatialReference {
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn bounds(&self) -> Bounds {
        let corners = [
            self.transform.apply(0.0, 0.0),
            self.transform.apply(0.0, self.cols as f64),
            self.transform.apply(self.rows as f64, 0.0),
            self.transform.apply(self.rows as f64, self.cols as f64),
        ];
        let xs = corners.iter().map(|p| p.0);
        let ys = corners.iter().map(|p| p.1);
        Bounds {
            left: xs.clone().fold(f64::INFINITY, f64::min),
            right: xs.fold(f64::NEG_INFINITY, f64::max),
            bottom: ys.clone().fold(f64::INFINITY, f64::min),
            top: ys.fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// One explanatory factor loaded from a raster.
///
/// Immutable after construction. Cells equal to the no-data sentinel (exact
/// floating-point equality) or non-finite are reported as missing.
#[derive(Debug, Clone)]
pub struct FactorGrid {
    name: String,
    data: Array2<f64>,
    transform: GeoTransform,
    crs: Option<Crs>,
    nodata: Option<f64>,
}

impl FactorGrid {
    pub fn new(
        name: impl Into<String>,
        data: Array2<f64>,
        transform: GeoTransform,
        crs: Option<Crs>,
        nodata: Option<f64>,
    ) -> Self {
        Self {
            name: name.into(),
            data,
            transform,
            crs,
            nodata,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> Option<Crs> {
        self.crs
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn bounds(&self) -> Bounds {
        self.spatial_reference().bounds()
    }

    pub fn spatial_reference(&self) -> SpatialReference {
        let (rows, cols) = self.shape();
        SpatialReference {
            rows,
            cols,
            transform: self.transform,
            crs: self.crs,
        }
    }

    /// Whether a raw cell value counts as missing for this factor
    #[inline]
    pub fn is_missing(&self, value: f64) -> bool {
        !value.is_finite() || self.nodata.map_or(false, |nd| value == nd)
    }

    /// Valid value at a cell index, `None` when outside the grid or missing
    #[inline]
    pub fn value_at(&self, row: usize, col: usize) -> Option<f64> {
        let value = *self.data.get((row, col))?;
        if self.is_missing(value) {
            None
        } else {
            Some(value)
        }
    }

    /// Valid value at the cell containing a map coordinate
    pub fn sample(&self, x: f64, y: f64) -> Option<f64> {
        let (row, col) = self.transform.row_col(x, y)?;
        if row < 0 || col < 0 {
            return None;
        }
        self.value_at(row as usize, col as usize)
    }
}
