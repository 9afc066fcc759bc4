//! Consistency checks across factor grids
//!
//! Every factor is compared against the first one. Nothing is resampled or
//! corrected; the report only lists what differs.

use super::FactorGrid;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Allowed absolute difference in cell size
pub const RESOLUTION_TOLERANCE: f64 = 0.001;

/// Allowed absolute difference in grid origin, in map units
pub const ORIGIN_TOLERANCE: f64 = RESOLUTION_TOLERANCE;

/// One way a factor differs from the reference grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AlignmentIssue {
    Width { expected: usize, actual: usize },
    Height { expected: usize, actual: usize },
    Crs { expected: String, actual: String },
    ResolutionX { expected: f64, actual: f64 },
    ResolutionY { expected: f64, actual: f64 },
    /// Upper-left corner `(x, y)` of the grid
    Origin { expected: (f64, f64), actual: (f64, f64) },
}

impl fmt::Display for AlignmentIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignmentIssue::Width { expected, actual } => {
                write!(f, "width {} != {}", actual, expected)
            }
            AlignmentIssue::Height { expected, actual } => {
                write!(f, "height {} != {}", actual, expected)
            }
            AlignmentIssue::Crs { expected, actual } => write!(f, "crs {} != {}", actual, expected),
            AlignmentIssue::ResolutionX { expected, actual } => {
                write!(f, "x resolution {} != {}", actual, expected)
            }
            AlignmentIssue::ResolutionY { expected, actual } => {
                write!(f, "y resolution {} != {}", actual, expected)
            }
            AlignmentIssue::Origin { expected, actual } => write!(
                f,
                "origin ({}, {}) != ({}, {})",
                actual.0, actual.1, expected.0, expected.1
            ),
        }
    }
}

/// Issues found for each non-reference factor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlignmentReport {
    pub reference: String,
    /// (factor name, issues); factors without issues are omitted
    pub mismatches: Vec<(String, Vec<AlignmentIssue>)>,
}

impl AlignmentReport {
    pub fn is_aligned(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// One line per misaligned factor
    pub fn summary(&self) -> String {
        self.mismatches
            .iter()
            .map(|(name, issues)| {
                let parts: Vec<String> = issues.iter().map(|i| i.to_string()).collect();
                format!("{} vs {}: {}", name, self.reference, parts.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Compare every factor against the first
pub fn check_alignment(factors: &[FactorGrid]) -> AlignmentReport {
    let Some(reference) = factors.first() else {
        return AlignmentReport::default();
    };

    let (ref_rows, ref_cols) = reference.shape();
    let ref_crs = crs_label(reference);
    let ref_res_x = reference.transform().resolution_x();
    let ref_res_y = reference.transform().resolution_y();
    let ref_origin = origin(reference);

    let mut report = AlignmentReport {
        reference: reference.name().to_string(),
        mismatches: Vec::new(),
    };

    for factor in &factors[1..] {
        let (rows, cols) = factor.shape();
        let mut issues = Vec::new();

        if cols != ref_cols {
            issues.push(AlignmentIssue::Width { expected: ref_cols, actual: cols });
        }
        if rows != ref_rows {
            issues.push(AlignmentIssue::Height { expected: ref_rows, actual: rows });
        }
        let crs = crs_label(factor);
        if crs != ref_crs {
            issues.push(AlignmentIssue::Crs { expected: ref_crs.clone(), actual: crs });
        }
        let res_x = factor.transform().resolution_x();
        if (res_x - ref_res_x).abs() > RESOLUTION_TOLERANCE {
            issues.push(AlignmentIssue::ResolutionX { expected: ref_res_x, actual: res_x });
        }
        let res_y = factor.transform().resolution_y();
        if (res_y - ref_res_y).abs() > RESOLUTION_TOLERANCE {
            issues.push(AlignmentIssue::ResolutionY { expected: ref_res_y, actual: res_y });
        }
        let factor_origin = origin(factor);
        if (factor_origin.0 - ref_origin.0).abs() > ORIGIN_TOLERANCE
            || (factor_origin.1 - ref_origin.1).abs() > ORIGIN_TOLERANCE
        {
            issues.push(AlignmentIssue::Origin { expected: ref_origin, actual: factor_origin });
        }

        if !issues.is_empty() {
            report.mismatches.push((factor.name().to_string(), issues));
        }
    }

    report
}

fn origin(grid: &FactorGrid) -> (f64, f64) {
    (grid.transform().c, grid.transform().f)
}

fn crs_label(grid: &FactorGrid) -> String {
    grid.crs().map(|c| c.to_string()).unwrap_or_else(|| "none".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{Crs, GeoTransform};
    use ndarray::Array2;

    fn grid(name: &str, shape: (usize, usize), cell: f64, epsg: u16) -> FactorGrid {
        FactorGrid::new(
            name,
            Array2::zeros(shape),
            GeoTransform::north_up(0.0, 0.0, cell, cell),
            Some(Crs::projected(epsg)),
            None,
        )
    }

    #[test]
    fn test_aligned_factors() {
        let factors = vec![
            grid("slope", (10, 10), 30.0, 32650),
            grid("aspect", (10, 10), 30.0005, 32650),
        ];
        let report = check_alignment(&factors);
        assert!(report.is_aligned());
        assert_eq!(report.reference, "slope");
    }

    #[test]
    fn test_reports_each_difference() {
        let factors = vec![
            grid("slope", (10, 10), 30.0, 32650),
            grid("rain", (8, 12), 90.0, 4326),
        ];
        let report = check_alignment(&factors);
        assert!(!report.is_aligned());
        let (name, issues) = &report.mismatches[0];
        assert_eq!(name, "rain");
        assert_eq!(issues.len(), 5);
        assert!(report.summary().contains("rain vs slope"));
    }

    #[test]
    fn test_shifted_origin_is_reported() {
        let reference = grid("slope", (10, 10), 30.0, 32650);
        let shifted = FactorGrid::new(
            "rain",
            Array2::zeros((10, 10)),
            GeoTransform::north_up(5.0, 0.0, 30.0, 30.0),
            Some(Crs::projected(32650)),
            None,
        );
        let nudged = FactorGrid::new(
            "aspect",
            Array2::zeros((10, 10)),
            GeoTransform::north_up(0.0005, -0.0005, 30.0, 30.0),
            Some(Crs::projected(32650)),
            None,
        );

        let report = check_alignment(&[reference, shifted, nudged]);
        assert_eq!(report.mismatches.len(), 1);
        let (name, issues) = &report.mismatches[0];
        assert_eq!(name, "rain");
        assert_eq!(
            issues,
            &vec![AlignmentIssue::Origin { expected: (0.0, 0.0), actual: (5.0, 0.0) }]
        );
        assert!(report.summary().contains("origin (5, 0) != (0, 0)"));
    }

    #[test]
    fn test_empty_input() {
        assert!(check_alignment(&[]).is_aligned());
    }
}
