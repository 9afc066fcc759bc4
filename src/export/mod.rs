//! Result export
//!
//! Writes three files into the output directory:
//! - `susceptibility_map.tif`: single-band f32 GeoTIFF, NaN no-data
//! - `susceptibility_data.csv`: `X,Y,Row,Col,Susceptibility` per valid cell
//! - `evaluation_report.txt`: factors, sample counts, test metrics

mod report;

pub use report::ReportContext;

use crate::error::Result;
use crate::prediction::SusceptibilityRaster;
use crate::raster::write_geotiff;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

pub const RASTER_FILE: &str = "susceptibility_map.tif";
pub const TABLE_FILE: &str = "susceptibility_data.csv";
pub const REPORT_FILE: &str = "evaluation_report.txt";

/// Where each output landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub raster: PathBuf,
    pub table: PathBuf,
    pub report: PathBuf,
}

impl ExportPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            raster: dir.join(RASTER_FILE),
            table: dir.join(TABLE_FILE),
            report: dir.join(REPORT_FILE),
        }
    }
}

/// Write the raster, the cell table and the report into `dir`, creating it if needed
pub fn export(raster: &SusceptibilityRaster, context: &ReportContext, dir: &Path) -> Result<ExportPaths> {
    fs::create_dir_all(dir)?;
    let paths = ExportPaths::in_dir(dir);

    write_raster(raster, &paths.raster)?;
    let rows = write_table(raster, &paths.table)?;
    fs::write(&paths.report, context.render())?;

    info!(
        dir = %dir.display(),
        table_rows = rows,
        "Exported susceptibility results"
    );
    Ok(paths)
}

/// Susceptibility as a GeoTIFF on the reference grid
pub fn write_raster(raster: &SusceptibilityRaster, path: &Path) -> Result<()> {
    let reference = raster.reference();
    write_geotiff(path, raster.data(), &reference.transform, reference.crs, Some(f64::NAN))
}

/// Every valid cell as one CSV row; returns the row count
pub fn write_table(raster: &SusceptibilityRaster, path: &Path) -> Result<usize> {
    let mut df = table_frame(raster)?;
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    Ok(df.height())
}

fn table_frame(raster: &SusceptibilityRaster) -> Result<DataFrame> {
    let n = raster.n_valid();
    let mut xs = Vec::with_capacity(n);
    let mut ys = Vec::with_capacity(n);
    let mut rows = Vec::with_capacity(n);
    let mut cols = Vec::with_capacity(n);
    let mut values = Vec::with_capacity(n);

    for cell in raster.cells() {
        xs.push(cell.x);
        ys.push(cell.y);
        rows.push(cell.row as u64);
        cols.push(cell.col as u64);
        values.push(cell.susceptibility);
    }

    let df = DataFrame::new(vec![
        Series::new("X".into(), xs).into(),
        Series::new("Y".into(), ys).into(),
        Series::new("Row".into(), rows).into(),
        Series::new("Col".into(), cols).into(),
        Series::new("Susceptibility".into(), values).into(),
    ])?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::{ClassificationMetrics, EvaluationReport};
    use crate::raster::{read_geotiff, Crs, GeoTransform, SpatialReference};
    use crate::training::ClassifierKind;
    use ndarray::array;
    use tempfile::tempdir;

    fn raster() -> SusceptibilityRaster {
        let reference = SpatialReference {
            rows: 2,
            cols: 3,
            transform: GeoTransform::north_up(100.0, 200.0, 10.0, 10.0),
            crs: Some(Crs::projected(32650)),
        };
        SusceptibilityRaster::new(array![[0.1, f64::NAN, 0.3], [0.4, 0.5, 0.6]], reference).unwrap()
    }

    fn context() -> ReportContext {
        let m = ClassificationMetrics::compute(&array![0.0, 1.0], &array![0.1, 0.9]).unwrap();
        ReportContext::new(
            vec!["slope".to_string()],
            7,
            3,
            ClassifierKind::RandomForest,
            EvaluationReport { train: m.clone(), test: m },
        )
    }

    #[test]
    fn test_export_writes_all_files() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("nested").join("output");
        let paths = export(&raster(), &context(), &out).unwrap();

        assert!(paths.raster.exists());
        assert!(paths.table.exists());
        assert!(paths.report.exists());

        let reloaded = read_geotiff(&paths.raster).unwrap();
        assert_eq!(reloaded.data.dim(), (2, 3));
        assert_eq!(reloaded.transform, GeoTransform::north_up(100.0, 200.0, 10.0, 10.0));
        assert_eq!(reloaded.crs, Some(Crs::projected(32650)));
        assert!(reloaded.data[[0, 1]].is_nan());
        assert!((reloaded.data[[1, 2]] - 0.6).abs() < 1e-6);
        assert!(reloaded.nodata.map_or(false, f64::is_nan));
    }

    #[test]
    fn test_table_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(TABLE_FILE);
        let n = write_table(&raster(), &path).unwrap();
        assert_eq!(n, 5);

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("X,Y,Row,Col,Susceptibility"));
        let first: Vec<f64> = lines
            .next()
            .unwrap()
            .split(',')
            .map(|v| v.parse().unwrap())
            .collect();
        assert_eq!(first, vec![105.0, 195.0, 0.0, 0.0, 0.1]);
        assert_eq!(lines.count(), 4);
    }
}
