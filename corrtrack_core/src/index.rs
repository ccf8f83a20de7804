//! Spatial candidate index over the matcher's 3-D embedding.
//!
//! Earlier-run anomalies are embedded as (corrected distance, cos clock,
//! sin clock) and bucketed into a uniform grid, so a radius query touches a
//! bounded set of cells instead of scanning the whole run. The query is a
//! superset filter; exact tolerance gates run afterwards.

use nalgebra::Vector3;
use std::collections::HashMap;

/// 3-D grid cell key for spatial hashing.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
struct GridCell {
    x: i64,
    y: i64,
    z: i64,
}

impl GridCell {
    fn containing(point: &Vector3<f64>, cell_size: f64) -> Self {
        Self {
            x: (point.x / cell_size).floor() as i64,
            y: (point.y / cell_size).floor() as i64,
            z: (point.z / cell_size).floor() as i64,
        }
    }

    /// All cells within `radius` cells of this one, in a fixed scan order.
    fn neighbors(&self, radius: i64) -> Vec<GridCell> {
        let mut cells = Vec::new();
        for dx in -radius..=radius {
            for dy in -radius..=radius {
                for dz in -radius..=radius {
                    cells.push(GridCell {
                        x: self.x + dx,
                        y: self.y + dy,
                        z: self.z + dz,
                    });
                }
            }
        }
        cells
    }
}

/// Grid-bucketed point set supporting Euclidean radius queries.
///
/// Points are identified by insertion order, which the matcher uses as the
/// earlier-run anomaly index.
pub struct CandidateIndex {
    points: Vec<Vector3<f64>>,
    cells: HashMap<GridCell, Vec<usize>>,
    cell_size: f64,
}

impl CandidateIndex {
    /// Create an index whose grid cells are `cell_size` on a side.
    /// Choosing the query radius as the cell size keeps every radius query
    /// within one ring of neighbor cells.
    pub fn new(cell_size: f64) -> Self {
        Self {
            points: Vec::new(),
            cells: HashMap::new(),
            cell_size,
        }
    }

    /// Insert a point and return its index.
    pub fn insert(&mut self, point: Vector3<f64>) -> usize {
        let id = self.points.len();
        let cell = GridCell::containing(&point, self.cell_size);
        self.cells.entry(cell).or_default().push(id);
        self.points.push(point);
        id
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Indices of all points within Euclidean `radius` of `center`,
    /// sorted ascending.
    pub fn query_radius(&self, center: &Vector3<f64>, radius: f64) -> Vec<usize> {
        let cell_radius = (radius / self.cell_size).ceil() as i64;
        let center_cell = GridCell::containing(center, self.cell_size);

        let mut hits = Vec::new();
        for cell in center_cell.neighbors(cell_radius) {
            if let Some(ids) = self.cells.get(&cell) {
                for &id in ids {
                    if (self.points[id] - center).norm_squared() <= radius * radius {
                        hits.push(id);
                    }
                }
            }
        }
        hits.sort_unstable();
        hits
    }
}
