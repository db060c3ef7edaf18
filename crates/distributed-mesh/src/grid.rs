//! Gaussian grids constructed from their identifiers.
//!
//! Supported identifiers:
//! - `F<N>`: regular Gaussian grid, 4N points on each of 2N latitudes
//! - `O<N>`: octahedral reduced Gaussian grid, 4i+16 points on latitude i
//!   counted from the pole
//! - `N<N>`: classic reduced Gaussian grid, whose row lengths come from a
//!   table (the `pl` list of its GRIB messages)
//!
//! Points are numbered row by row from north to south, west to east starting
//! at longitude 0, which is the order GRIB2 values of these grids use.

use std::f64::consts::PI;

use crate::{MeshError, MeshResult};

/// Family of a Gaussian grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridFamily {
    Regular,
    Octahedral,
    Classic,
}

impl GridFamily {
    fn prefix(&self) -> char {
        match self {
            GridFamily::Regular => 'F',
            GridFamily::Octahedral => 'O',
            GridFamily::Classic => 'N',
        }
    }
}

/// A global Gaussian grid.
#[derive(Debug, Clone)]
pub struct Grid {
    family: GridFamily,
    n: usize,
    latitudes: Vec<f64>,
    points_per_row: Vec<usize>,
    row_offsets: Vec<usize>,
}

impl Grid {
    /// Build a grid from its identifier, e.g. `O1280` or `F128`.
    ///
    /// Classic `N<N>` grids have tabulated row lengths and need
    /// [`from_name_with_rows`](Self::from_name_with_rows).
    pub fn from_name(name: &str) -> MeshResult<Self> {
        let (family, n) = parse_name(name)?;
        let rows =
            derived_rows(family, n).ok_or_else(|| MeshError::GridResolution(name.to_string()))?;
        Ok(Self::with_rows(family, n, rows))
    }

    /// Build a grid from its identifier and the number of points on each
    /// latitude, north to south.
    ///
    /// For `F` and `O` grids the rows must be the ones the identifier implies.
    pub fn from_name_with_rows(name: &str, rows: &[usize]) -> MeshResult<Self> {
        let (family, n) = parse_name(name)?;
        if rows.len() != 2 * n {
            return Err(MeshError::SizeMismatch {
                what: format!("latitudes of grid {}", name),
                expected: 2 * n,
                found: rows.len(),
            });
        }
        if rows.iter().any(|p| *p == 0) {
            return Err(MeshError::GridResolution(name.to_string()));
        }
        if let Some(derived) = derived_rows(family, n) {
            if derived != rows {
                return Err(MeshError::GridResolution(name.to_string()));
            }
        }
        Ok(Self::with_rows(family, n, rows.to_vec()))
    }

    fn with_rows(family: GridFamily, n: usize, points_per_row: Vec<usize>) -> Self {
        let latitudes = gaussian_latitudes(n);

        let mut row_offsets = Vec::with_capacity(points_per_row.len() + 1);
        row_offsets.push(0);
        for p in &points_per_row {
            row_offsets.push(row_offsets[row_offsets.len() - 1] + p);
        }

        Self {
            family,
            n,
            latitudes,
            points_per_row,
            row_offsets,
        }
    }

    pub fn name(&self) -> String {
        format!("{}{}", self.family.prefix(), self.n)
    }

    pub fn family(&self) -> GridFamily {
        self.family
    }

    /// Number of latitudes between a pole and the equator.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Total number of grid points.
    pub fn size(&self) -> usize {
        self.row_offsets[self.row_offsets.len() - 1]
    }

    pub fn rows(&self) -> usize {
        self.points_per_row.len()
    }

    pub fn points_in_row(&self, row: usize) -> usize {
        self.points_per_row[row]
    }

    /// Global index of the first point of `row`.
    pub fn row_offset(&self, row: usize) -> usize {
        self.row_offsets[row]
    }

    pub fn latitude(&self, row: usize) -> f64 {
        self.latitudes[row]
    }

    /// Longitude in degrees of point `i` in `row`.
    pub fn longitude(&self, row: usize, i: usize) -> f64 {
        360.0 * i as f64 / self.points_per_row[row] as f64
    }

    /// Row and position within the row of a global index.
    pub fn row_col(&self, index: usize) -> (usize, usize) {
        let row = self.row_offsets.partition_point(|off| *off <= index) - 1;
        (row, index - self.row_offsets[row])
    }

    /// Longitude and latitude in degrees of a global index.
    pub fn lonlat(&self, index: usize) -> (f64, f64) {
        let (row, col) = self.row_col(index);
        (self.longitude(row, col), self.latitude(row))
    }
}

/// Gaussian latitudes in degrees, north to south: the arcsines of the roots of
/// the Legendre polynomial of degree 2N, found with Newton iteration.
pub fn gaussian_latitudes(n: usize) -> Vec<f64> {
    let degree = 2 * n;
    let mut north = Vec::with_capacity(n);

    for i in 1..=n {
        // Initial guess for the i-th root counted from x = 1
        let mut x = (PI * (i as f64 - 0.25) / (degree as f64 + 0.5)).cos();
        for _ in 0..100 {
            let (p, dp) = legendre_with_derivative(degree, x);
            let dx = p / dp;
            x -= dx;
            if dx.abs() < 1e-15 {
                break;
            }
        }
        north.push(x.asin().to_degrees());
    }

    let south = north.iter().rev().map(|lat| -lat);
    north.iter().copied().chain(south).collect()
}

/// P_n(x) and its derivative via the three-term recurrence.
fn legendre_with_derivative(degree: usize, x: f64) -> (f64, f64) {
    let mut p_prev = 1.0;
    let mut p = x;
    for k in 2..=degree {
        let k = k as f64;
        let p_next = ((2.0 * k - 1.0) * x * p - (k - 1.0) * p_prev) / k;
        p_prev = p;
        p = p_next;
    }
    let dp = degree as f64 * (x * p - p_prev) / (x * x - 1.0);
    (p, dp)
}

fn parse_name(name: &str) -> MeshResult<(GridFamily, usize)> {
    let unresolved = || MeshError::GridResolution(name.to_string());

    let mut chars = name.chars();
    let family = match chars.next() {
        Some('F') => GridFamily::Regular,
        Some('O') => GridFamily::Octahedral,
        Some('N') => GridFamily::Classic,
        _ => return Err(unresolved()),
    };
    let digits = chars.as_str();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(unresolved());
    }
    let n: usize = digits.parse().map_err(|_| unresolved())?;
    if n == 0 {
        return Err(unresolved());
    }
    Ok((family, n))
}

/// Row lengths implied by the identifier; `None` for classic grids.
fn derived_rows(family: GridFamily, n: usize) -> Option<Vec<usize>> {
    match family {
        GridFamily::Regular => Some(vec![4 * n; 2 * n]),
        GridFamily::Octahedral => {
            let north: Vec<usize> = (1..=n).map(|i| 4 * i + 16).collect();
            Some(north.iter().chain(north.iter().rev()).copied().collect())
        }
        GridFamily::Classic => None,
    }
}
