//! Point CSV loading

use super::{ClassLabel, SamplePoint};
use crate::error::{Result, SusceptibilityError};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::info;

const X_ALIASES: &[&str] = &["x", "lon", "longitude", "easting"];
const Y_ALIASES: &[&str] = &["y", "lat", "latitude", "northing"];

/// Load points from a CSV file with x/y columns, all given the same label.
///
/// Column names are matched case-insensitively; `lon`/`lat` are accepted.
/// A blank or unparsable coordinate is a `Format` error naming the data row.
pub fn load_points_csv(path: &Path, label: ClassLabel) -> Result<Vec<SamplePoint>> {
    let file = File::open(path)?;
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .into_reader_with_file_handle(file)
        .finish()?;

    let x_col = find_column(&df, X_ALIASES).ok_or_else(|| missing_column(path, "x"))?;
    let y_col = find_column(&df, Y_ALIASES).ok_or_else(|| missing_column(path, "y"))?;

    let xs = column_f64(&df, &x_col)?;
    let ys = column_f64(&df, &y_col)?;

    let mut points = Vec::with_capacity(xs.len());
    for (i, (x, y)) in xs.into_iter().zip(ys).enumerate() {
        match (x, y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => {
                points.push(SamplePoint::new(x, y, label));
            }
            _ => {
                return Err(SusceptibilityError::Format(format!(
                    "{}: data row {} has a missing or invalid coordinate",
                    path.display(),
                    i + 1
                )));
            }
        }
    }

    info!(
        path = %path.display(),
        label = ?label,
        rows = df.height(),
        points = points.len(),
        "Loaded sample points"
    );
    Ok(points)
}

fn find_column(df: &DataFrame, aliases: &[&str]) -> Option<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .find(|name| aliases.iter().any(|a| name.trim().eq_ignore_ascii_case(a)))
}

fn column_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

fn missing_column(path: &Path, axis: &str) -> SusceptibilityError {
    SusceptibilityError::Format(format!(
        "{}: no {} coordinate column found",
        path.display(),
        axis
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_xy_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("landslides.csv");
        std::fs::write(&path, "id,X,Y\n1,10.5,20.5\n2,11.0,21.0\n").unwrap();

        let points = load_points_csv(&path, ClassLabel::Positive).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], SamplePoint::positive(10.5, 20.5));
    }

    #[test]
    fn test_lon_lat_aliases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stable.csv");
        std::fs::write(&path, "lon,lat\n100,30\n").unwrap();

        let points = load_points_csv(&path, ClassLabel::Negative).unwrap();
        assert_eq!(points, vec![SamplePoint::negative(100.0, 30.0)]);
    }

    #[test]
    fn test_missing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();
        assert!(matches!(
            load_points_csv(&path, ClassLabel::Negative),
            Err(SusceptibilityError::Format(_))
        ));
    }

    #[test]
    fn test_blank_coordinate_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gaps.csv");
        std::fs::write(&path, "x,y\n1.0,2.0\n,3.0\n4.0,5.0\n").unwrap();

        match load_points_csv(&path, ClassLabel::Positive) {
            Err(SusceptibilityError::Format(msg)) => assert!(msg.contains("data row 2"), "{}", msg),
            other => panic!("expected Format error, got {:?}", other),
        }
    }

    #[test]
    fn test_unparsable_coordinate_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typo.csv");
        std::fs::write(&path, "x,y\n1.0,2.0\n4.0,five\n").unwrap();

        assert!(matches!(
            load_points_csv(&path, ClassLabel::Negative),
            Err(SusceptibilityError::Format(_))
        ));
    }

    #[test]
    fn test_unreadable_file() {
        let err = load_points_csv(Path::new("/nonexistent/points.csv"), ClassLabel::Positive);
        assert!(matches!(err, Err(SusceptibilityError::Io(_))));
    }
}
