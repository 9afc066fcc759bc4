//! Loading factor grids from disk

use super::{read_geotiff, FactorGrid};
use crate::error::{Result, SusceptibilityError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Ordered collection of factor grids.
///
/// The first factor is the reference grid for prediction and export.
#[derive(Debug, Clone)]
pub struct FactorStore {
    factors: Vec<FactorGrid>,
}

impl FactorStore {
    /// Load one factor per GeoTIFF path, in order.
    ///
    /// Grids are not required to share a shape or transform here.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        if paths.is_empty() {
            return Err(SusceptibilityError::Format(
                "at least one factor raster is required".to_string(),
            ));
        }

        let mut factors = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            debug!(path = %path.display(), "Reading factor raster");
            let raster = read_geotiff(path)?;
            let grid = FactorGrid::new(
                factor_name(path),
                raster.data,
                raster.transform,
                raster.crs,
                raster.nodata,
            );

            let (rows, cols) = grid.shape();
            info!(
                factor = grid.name(),
                rows,
                cols,
                crs = %grid.crs().map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()),
                nodata = ?grid.nodata(),
                "Loaded factor"
            );
            factors.push(grid);
        }

        Ok(Self { factors })
    }

    /// Build a store from grids already in memory
    pub fn from_grids(factors: Vec<FactorGrid>) -> Result<Self> {
        if factors.is_empty() {
            return Err(SusceptibilityError::Format(
                "at least one factor grid is required".to_string(),
            ));
        }
        Ok(Self { factors })
    }

    pub fn factors(&self) -> &[FactorGrid] {
        &self.factors
    }

    /// Reference grid (the first factor)
    pub fn reference(&self) -> &FactorGrid {
        &self.factors[0]
    }

    pub fn names(&self) -> Vec<String> {
        self.factors.iter().map(|f| f.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}

fn factor_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Collect `.tif`/`.tiff` files from a directory, sorted by name
pub fn discover_factors(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{write_geotiff, Crs, GeoTransform};
    use ndarray::Array2;

    #[test]
    fn test_load_names_from_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let t = GeoTransform::north_up(0.0, 100.0, 10.0, 10.0);
        for name in ["slope", "rainfall"] {
            let path = dir.path().join(format!("{}.tif", name));
            write_geotiff(&path, &Array2::from_elem((3, 4), 1.0), &t, Some(Crs::projected(32650)), None)
                .unwrap();
        }

        let store = FactorStore::load(&[dir.path().join("slope.tif"), dir.path().join("rainfall.tif")])
            .unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.names(), vec!["slope", "rainfall"]);
        assert_eq!(store.reference().shape(), (3, 4));
    }

    #[test]
    fn test_load_empty_paths() {
        let paths: Vec<PathBuf> = Vec::new();
        assert!(matches!(FactorStore::load(&paths), Err(SusceptibilityError::Format(_))));
    }

    #[test]
    fn test_discover_factors_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.tif", "a.TIFF", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let found = discover_factors(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.TIFF", "b.tif"]);
    }
}
