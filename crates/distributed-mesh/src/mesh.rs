//! Partitioned mesh over a global grid.
//!
//! The grid points are split into contiguous, near-equal ranges of global
//! indices, one per rank. Each rank stores its owned nodes followed by a halo
//! of non-owned nodes adjacent to them. Adjacency joins neighbouring points
//! along a latitude (periodic in longitude) and each point to the two points
//! bracketing its longitude on the rows directly north and south.
//!
//! The halo layout and the send/receive lists are computed the same way on
//! every rank, so the lists of two ranks always agree without communication.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::comm::check_rank;
use crate::{Grid, MeshResult};

/// Contiguous partition of `0..size` into `parts` ranges.
#[derive(Debug, Clone)]
pub struct Partition {
    starts: Vec<usize>,
}

impl Partition {
    pub fn new(size: usize, parts: usize) -> Self {
        let parts = parts.max(1);
        let starts = (0..=parts).map(|p| p * size / parts).collect();
        Self { starts }
    }

    pub fn parts(&self) -> usize {
        self.starts.len() - 1
    }

    /// Global index range owned by `part`.
    pub fn range(&self, part: usize) -> std::ops::Range<usize> {
        self.starts[part]..self.starts[part + 1]
    }

    pub fn owner(&self, index: usize) -> usize {
        // Last part whose range starts at or before `index`, skipping empty parts
        self.starts[1..].partition_point(|end| *end <= index)
    }
}

/// The part of a grid held by one rank.
#[derive(Debug, Clone)]
pub struct Mesh {
    grid: Grid,
    rank: usize,
    partition: Partition,
    /// Global index of every local node: owned nodes, then halo nodes.
    global_index: Vec<usize>,
    /// Local indices of owned nodes to send, per peer.
    send_lists: BTreeMap<usize, Vec<usize>>,
    /// Local indices of halo nodes to receive, per peer.
    recv_lists: BTreeMap<usize, Vec<usize>>,
}

impl Mesh {
    pub fn new(grid: Grid, rank: usize, parts: usize) -> MeshResult<Self> {
        check_rank(rank, parts.max(1))?;
        let partition = Partition::new(grid.size(), parts);
        let halos = halo_sets(&grid, &partition);

        let owned = partition.range(rank);
        let mut global_index: Vec<usize> = owned.clone().collect();
        let halo = &halos[rank];
        global_index.extend(halo.iter().copied());

        // Halo nodes are sorted by global index, hence grouped by owner
        let mut recv_lists: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (offset, g) in halo.iter().enumerate() {
            recv_lists
                .entry(partition.owner(*g))
                .or_default()
                .push(owned.len() + offset);
        }

        let mut send_lists: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (peer, peer_halo) in halos.iter().enumerate() {
            if peer == rank {
                continue;
            }
            let list: Vec<usize> = peer_halo
                .range(owned.clone())
                .map(|g| g - owned.start)
                .collect();
            if !list.is_empty() {
                send_lists.insert(peer, list);
            }
        }

        debug!(
            grid = %grid.name(),
            rank,
            parts = partition.parts(),
            owned = owned.len(),
            halo = halo.len(),
            peers = send_lists.len(),
            "Built mesh partition"
        );

        Ok(Self {
            grid,
            rank,
            partition,
            global_index,
            send_lists,
            recv_lists,
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Number of local nodes, owned plus halo.
    pub fn local_size(&self) -> usize {
        self.global_index.len()
    }

    pub fn owned_size(&self) -> usize {
        self.partition.range(self.rank).len()
    }

    pub fn halo_size(&self) -> usize {
        self.local_size() - self.owned_size()
    }

    /// Global indices of the local nodes.
    pub fn global_index(&self) -> &[usize] {
        &self.global_index
    }

    pub fn send_lists(&self) -> &BTreeMap<usize, Vec<usize>> {
        &self.send_lists
    }

    pub fn recv_lists(&self) -> &BTreeMap<usize, Vec<usize>> {
        &self.recv_lists
    }
}

/// Global indices adjacent to `index`.
pub fn neighbours(grid: &Grid, index: usize) -> Vec<usize> {
    let (row, col) = grid.row_col(index);
    let n_row = grid.points_in_row(row);
    let mut out = Vec::with_capacity(6);

    if n_row > 1 {
        out.push(grid.row_offset(row) + (col + 1) % n_row);
        out.push(grid.row_offset(row) + (col + n_row - 1) % n_row);
    }

    let lon = grid.longitude(row, col);
    let adjacent = [row.checked_sub(1), Some(row + 1).filter(|r| *r < grid.rows())];
    for other in adjacent.into_iter().flatten() {
        let n_other = grid.points_in_row(other);
        let west = ((lon / 360.0 * n_other as f64).floor() as usize).min(n_other - 1);
        out.push(grid.row_offset(other) + west);
        out.push(grid.row_offset(other) + (west + 1) % n_other);
    }

    out.sort_unstable();
    out.dedup();
    out.retain(|g| *g != index);
    out
}

/// Halo of every part: non-owned neighbours of its owned nodes.
fn halo_sets(grid: &Grid, partition: &Partition) -> Vec<BTreeSet<usize>> {
    let mut halos = vec![BTreeSet::new(); partition.parts()];
    if partition.parts() == 1 {
        return halos;
    }
    for (part, halo) in halos.iter_mut().enumerate() {
        let owned = partition.range(part);
        for g in owned.clone() {
            for h in neighbours(grid, g) {
                if !owned.contains(&h) {
                    halo.insert(h);
                }
            }
        }
    }
    halos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_ranges_cover_everything() {
        let partition = Partition::new(10, 3);
        assert_eq!(partition.range(0), 0..3);
        assert_eq!(partition.range(1), 3..6);
        assert_eq!(partition.range(2), 6..10);
        assert_eq!(partition.owner(0), 0);
        assert_eq!(partition.owner(5), 1);
        assert_eq!(partition.owner(6), 2);
        assert_eq!(partition.owner(9), 2);
    }

    #[test]
    fn test_partition_more_parts_than_points() {
        let partition = Partition::new(2, 4);
        let total: usize = (0..4).map(|p| partition.range(p).len()).sum();
        assert_eq!(total, 2);
        assert_eq!(partition.range(partition.owner(0)), 0..1);
        assert!(partition.range(partition.owner(1)).contains(&1));
    }

    #[test]
    fn test_neighbours_wrap_in_longitude() {
        let grid = Grid::from_name("O2").unwrap();
        // Row 0 has 20 points, row 1 has 24
        let n = neighbours(&grid, 0);
        assert!(n.contains(&1));
        assert!(n.contains(&19));
        assert!(n.contains(&20));
        assert!(n.contains(&21));
        assert!(!n.contains(&0));
    }

    #[test]
    fn test_single_part_has_no_halo() {
        let mesh = Mesh::new(Grid::from_name("F4").unwrap(), 0, 1).unwrap();
        assert_eq!(mesh.local_size(), 128);
        assert_eq!(mesh.halo_size(), 0);
        assert!(mesh.send_lists().is_empty());
    }

    #[test]
    fn test_send_and_recv_lists_agree() {
        let parts = 3;
        let meshes: Vec<Mesh> = (0..parts)
            .map(|r| Mesh::new(Grid::from_name("O4").unwrap(), r, parts).unwrap())
            .collect();

        for a in 0..parts {
            for b in 0..parts {
                let sent: Vec<usize> = meshes[a]
                    .send_lists()
                    .get(&b)
                    .map(|l| l.iter().map(|i| meshes[a].global_index()[*i]).collect())
                    .unwrap_or_default();
                let received: Vec<usize> = meshes[b]
                    .recv_lists()
                    .get(&a)
                    .map(|l| l.iter().map(|i| meshes[b].global_index()[*i]).collect())
                    .unwrap_or_default();
                assert_eq!(sent, received, "lists of ranks {} and {} disagree", a, b);
            }
        }
        assert!(meshes.iter().all(|m| m.halo_size() > 0));
    }

    #[test]
    fn test_rank_out_of_range() {
        assert!(Mesh::new(Grid::from_name("F2").unwrap(), 2, 2).is_err());
    }
}
