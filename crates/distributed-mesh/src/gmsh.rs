//! Gmsh ASCII (format 2.2) output of a global grid and its fields.
//!
//! The mesh is triangulated by zipping each pair of adjacent latitudes
//! together. Fields are appended to the same file as `$NodeData` blocks.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::{Field, Grid, MeshError, MeshResult};

/// Coordinate system of the written node positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Coordinates {
    /// Projection coordinates, longitude and latitude for Gaussian grids.
    #[default]
    Xy,
    LonLat,
    /// Cartesian coordinates on the unit sphere.
    Xyz,
}

impl Coordinates {
    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "xy" => Some(Self::Xy),
            "lonlat" => Some(Self::LonLat),
            "xyz" => Some(Self::Xyz),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xy => "xy",
            Self::LonLat => "lonlat",
            Self::Xyz => "xyz",
        }
    }

    fn position(&self, lon: f64, lat: f64) -> [f64; 3] {
        match self {
            Self::Xy | Self::LonLat => [lon, lat, 0.0],
            Self::Xyz => {
                let (lon, lat) = (lon.to_radians(), lat.to_radians());
                [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
            }
        }
    }

    /// On the sphere the triangulation closes across the 360 degree seam;
    /// in the plane those triangles would span the whole map.
    fn wraps(&self) -> bool {
        matches!(self, Self::Xyz)
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct GmshWriter {
    path: PathBuf,
    coordinates: Coordinates,
}

impl GmshWriter {
    pub fn new(path: impl Into<PathBuf>, coordinates: Coordinates) -> Self {
        Self {
            path: path.into(),
            coordinates,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the nodes and triangles of `grid`, replacing any existing file.
    pub fn write_mesh(&self, grid: &Grid) -> MeshResult<()> {
        let mut out = BufWriter::new(File::create(&self.path)?);
        writeln!(out, "$MeshFormat\n2.2 0 8\n$EndMeshFormat")?;

        writeln!(out, "$Nodes\n{}", grid.size())?;
        for index in 0..grid.size() {
            let (lon, lat) = grid.lonlat(index);
            let [x, y, z] = self.coordinates.position(lon, lat);
            writeln!(out, "{} {} {} {}", index + 1, x, y, z)?;
        }
        writeln!(out, "$EndNodes")?;

        let triangles = triangulate(grid, self.coordinates.wraps());
        writeln!(out, "$Elements\n{}", triangles.len())?;
        for (id, [a, b, c]) in triangles.iter().enumerate() {
            // type 2 = 3-node triangle, tags: physical and elementary entity
            writeln!(out, "{} 2 2 1 1 {} {} {}", id + 1, a + 1, b + 1, c + 1)?;
        }
        writeln!(out, "$EndElements")?;
        out.flush()?;

        info!(
            path = %self.path.display(),
            coordinates = %self.coordinates,
            nodes = grid.size(),
            elements = triangles.len(),
            "Wrote gmsh mesh"
        );
        Ok(())
    }

    /// Append one `$NodeData` block per global field.
    pub fn write_fields<'a>(
        &self,
        grid: &Grid,
        fields: impl IntoIterator<Item = &'a Field>,
    ) -> MeshResult<()> {
        let file = OpenOptions::new().append(true).create(true).open(&self.path)?;
        let mut out = BufWriter::new(file);
        let mut written = 0usize;

        for field in fields {
            if field.len() != grid.size() {
                return Err(MeshError::SizeMismatch {
                    what: format!("gmsh field {}", field.name()),
                    expected: grid.size(),
                    found: field.len(),
                });
            }
            writeln!(out, "$NodeData")?;
            writeln!(out, "1\n\"{}\"", field.name())?;
            writeln!(out, "1\n0.0")?;
            // time step, components, node count
            writeln!(out, "3\n0\n1\n{}", field.len())?;
            for (index, value) in field.values().iter().enumerate() {
                writeln!(out, "{} {}", index + 1, value)?;
            }
            writeln!(out, "$EndNodeData")?;
            written += 1;
        }
        out.flush()?;

        info!(path = %self.path.display(), fields = written, "Wrote gmsh fields");
        Ok(())
    }
}

/// Triangles joining each pair of adjacent latitudes, as global indices.
pub fn triangulate(grid: &Grid, wrap: bool) -> Vec<[usize; 3]> {
    let mut triangles = Vec::new();

    for row in 0..grid.rows().saturating_sub(1) {
        let (north, south) = (row, row + 1);
        let (n1, n2) = (grid.points_in_row(north), grid.points_in_row(south));
        let (o1, o2) = (grid.row_offset(north), grid.row_offset(south));

        let (mut i, mut j) = (0usize, 0usize);
        let (end_i, end_j) = if wrap { (n1, n2) } else { (n1 - 1, n2 - 1) };
        let node1 = |i: usize| o1 + i % n1;
        let node2 = |j: usize| o2 + j % n2;

        // Advance along whichever row has the nearer next longitude
        while i < end_i || j < end_j {
            let next_lon1 = (i + 1) as f64 / n1 as f64;
            let next_lon2 = (j + 1) as f64 / n2 as f64;
            let advance_north = j >= end_j || (i < end_i && next_lon1 <= next_lon2);
            if advance_north {
                triangles.push([node1(i), node2(j), node1(i + 1)]);
                i += 1;
            } else {
                triangles.push([node1(i), node2(j), node2(j + 1)]);
                j += 1;
            }
        }
    }

    triangles
}
