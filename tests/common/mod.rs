//! Shared fixtures: a small factor stack written as GeoTIFFs plus point CSVs

#![allow(dead_code)]

use landslide_susceptibility::raster::{write_geotiff, Crs, GeoTransform};
use ndarray::Array2;
use std::fs;
use std::path::{Path, PathBuf};

pub const ROWS: usize = 10;
pub const COLS: usize = 10;
pub const NODATA: f64 = -9999.0;

pub fn transform() -> GeoTransform {
    GeoTransform::north_up(500_000.0, 4_000_010.0, 1.0, 1.0)
}

pub fn crs() -> Option<Crs> {
    Some(Crs::projected(32633))
}

/// Map coordinate of a cell center
pub fn center(row: usize, col: usize) -> (f64, f64) {
    transform().cell_center(row, col)
}

pub struct Fixture {
    pub factors: Vec<PathBuf>,
    pub positive: PathBuf,
    pub negative: PathBuf,
}

/// Three 10x10 factors. Susceptibility rises with row (slope, wetness) and
/// falls with elevation. With `missing_origin`, cell (0, 0) of `elevation`
/// holds the no-data value.
pub fn write_factors(dir: &Path, missing_origin: bool) -> Vec<PathBuf> {
    let slope = Array2::from_shape_fn((ROWS, COLS), |(r, c)| r as f64 * 4.0 + c as f64 * 0.5);
    let wetness = Array2::from_shape_fn((ROWS, COLS), |(r, c)| ((r * 7 + c * 3) % 11) as f64 + r as f64);
    let mut elevation = Array2::from_shape_fn((ROWS, COLS), |(r, c)| 900.0 - r as f64 * 25.0 + c as f64 * 2.0);
    if missing_origin {
        elevation[[0, 0]] = NODATA;
    }

    let mut paths = Vec::new();
    for (name, data) in [("slope", slope), ("wetness", wetness), ("elevation", elevation)] {
        let path = dir.join(format!("{}.tif", name));
        write_geotiff(&path, &data, &transform(), crs(), Some(NODATA)).unwrap();
        paths.push(path);
    }
    paths
}

pub fn write_points(path: &Path, cells: &[(usize, usize)]) -> PathBuf {
    let mut text = String::from("x,y\n");
    for &(row, col) in cells {
        let (x, y) = center(row, col);
        text.push_str(&format!("{},{}\n", x, y));
    }
    fs::write(path, text).unwrap();
    path.to_path_buf()
}

/// Five landslides in the lower rows and five stable points in the upper rows
pub fn fixture(dir: &Path, missing_origin: bool) -> Fixture {
    let factors = write_factors(dir, missing_origin);
    let positive = write_points(
        &dir.join("landslides.csv"),
        &[(9, 1), (8, 4), (9, 7), (7, 2), (8, 8)],
    );
    let negative = write_points(
        &dir.join("stable.csv"),
        &[(1, 2), (0, 5), (2, 8), (1, 9), (2, 3)],
    );
    Fixture {
        factors,
        positive,
        negative,
    }
}
