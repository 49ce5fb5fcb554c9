//! Topology geometry: mesh and torus in two or three dimensions, node
//! coordinates in row-major order, and the relative-offset computation that
//! seeds head-flit headers.

pub mod builder;

use serde::{Deserialize, Serialize};

use crate::error::{NocError, Result};
use crate::flit::{header, Header, Sign};
use crate::network::NodeId;

/// Shape selector as it appears in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopologyLayout {
    Mesh2d,
    Torus2d,
    Mesh3d,
    Torus3d,
}

impl TopologyLayout {
    pub fn dimensions(self) -> usize {
        match self {
            TopologyLayout::Mesh2d | TopologyLayout::Torus2d => 2,
            TopologyLayout::Mesh3d | TopologyLayout::Torus3d => 3,
        }
    }

    pub fn is_torus(self) -> bool {
        matches!(self, TopologyLayout::Torus2d | TopologyLayout::Torus3d)
    }
}

/// A concrete topology: layout plus per-dimension sizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyKind {
    layout: TopologyLayout,
    sizes: Vec<u32>,
}

impl TopologyKind {
    pub fn new(layout: TopologyLayout, sizes: Vec<u32>) -> Result<Self> {
        if sizes.len() != layout.dimensions() {
            return Err(NocError::config(format!(
                "{:?} needs {} dimension sizes, got {}",
                layout,
                layout.dimensions(),
                sizes.len()
            )));
        }
        if sizes.iter().any(|&s| s == 0) {
            return Err(NocError::config("dimension sizes must be positive"));
        }
        Ok(TopologyKind { layout, sizes })
    }

    pub fn layout(&self) -> TopologyLayout {
        self.layout
    }

    pub fn dimensions(&self) -> usize {
        self.sizes.len()
    }

    pub fn sizes(&self) -> &[u32] {
        &self.sizes
    }

    pub fn is_torus(&self) -> bool {
        self.layout.is_torus()
    }

    pub fn node_count(&self) -> u32 {
        self.sizes.iter().product()
    }

    /// Header bytes: one offset byte and one source byte per dimension.
    pub fn header_size_bytes(&self) -> u32 {
        2 * self.dimensions() as u32
    }

    /// Row-major coordinates: `id = (z * height + y) * width + x`.
    pub fn coordinates_of(&self, node: NodeId) -> Vec<u32> {
        let mut rest = node.0 as u32;
        let mut coords = Vec::with_capacity(self.dimensions());
        for &size in &self.sizes {
            coords.push(rest % size);
            rest /= size;
        }
        coords
    }

    pub fn node_at(&self, coords: &[u32]) -> NodeId {
        debug_assert_eq!(coords.len(), self.dimensions());
        let mut id = 0u32;
        for (dim, &c) in coords.iter().enumerate().rev() {
            id = id * self.sizes[dim] + c;
        }
        NodeId(id as usize)
    }

    /// Neighbor of `node` one step along `dimension`; `forward` means
    /// increasing coordinate. `None` past a mesh edge; tori wrap.
    pub fn neighbor(&self, node: NodeId, dimension: usize, forward: bool) -> Option<NodeId> {
        let mut coords = self.coordinates_of(node);
        let size = self.sizes[dimension];
        let c = coords[dimension];
        let next = if forward {
            if c + 1 < size {
                c + 1
            } else if self.is_torus() {
                0
            } else {
                return None;
            }
        } else if c > 0 {
            c - 1
        } else if self.is_torus() {
            size - 1
        } else {
            return None;
        };
        coords[dimension] = next;
        Some(self.node_at(&coords))
    }

    /// Build the head header for a message from `src` to `dst`.
    pub fn relative_header(&self, src: NodeId, dst: NodeId, data_flit_count: u16) -> Result<Header> {
        let src_coords = self.coordinates_of(src);
        let dst_coords = self.coordinates_of(dst);
        let mut offsets = Vec::with_capacity(self.dimensions());
        let mut source = Vec::with_capacity(self.dimensions());
        for dim in 0..self.dimensions() {
            let (sign, magnitude) = relative_offset(
                src_coords[dim],
                dst_coords[dim],
                self.sizes[dim],
                self.is_torus(),
            );
            if magnitude as u32 > header::MAX_OFFSET as u32 {
                return Err(NocError::config(format!(
                    "dimension {} offset {} does not fit the 7-bit header field",
                    dim, magnitude
                )));
            }
            offsets.push((sign, magnitude as u8));
            source.push(src_coords[dim] as u8);
        }
        Header::new(&offsets, &source, data_flit_count)
    }
}

/// Relative offset from `src` to `dst` along a dimension of `dim_size`
/// positions. On a torus the wrap-around is taken whenever it shortens the
/// path; an exact tie goes BACK.
pub fn relative_offset(src: u32, dst: u32, dim_size: u32, wraparound: bool) -> (Sign, u32) {
    if src == dst {
        return (Sign::Forward, 0);
    }
    if !wraparound {
        return if dst > src {
            (Sign::Forward, dst - src)
        } else {
            (Sign::Back, src - dst)
        };
    }
    // Forward distance around the ring.
    let ahead = (dst + dim_size - src) % dim_size;
    if 2 * ahead >= dim_size {
        (Sign::Back, dim_size - ahead)
    } else {
        (Sign::Forward, ahead)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh4x4() -> TopologyKind {
        TopologyKind::new(TopologyLayout::Mesh2d, vec![4, 4]).unwrap()
    }

    #[test]
    fn test_row_major_coordinates() {
        let topo = mesh4x4();
        assert_eq!(topo.coordinates_of(NodeId(0)), vec![0, 0]);
        assert_eq!(topo.coordinates_of(NodeId(5)), vec![1, 1]);
        assert_eq!(topo.coordinates_of(NodeId(15)), vec![3, 3]);
        assert_eq!(topo.node_at(&[3, 3]), NodeId(15));
        for id in 0..16 {
            let node = NodeId(id);
            assert_eq!(topo.node_at(&topo.coordinates_of(node)), node);
        }
    }

    #[test]
    fn test_mesh_edges_have_no_neighbor() {
        let topo = mesh4x4();
        assert_eq!(topo.neighbor(NodeId(0), 0, false), None);
        assert_eq!(topo.neighbor(NodeId(0), 0, true), Some(NodeId(1)));
        assert_eq!(topo.neighbor(NodeId(3), 0, true), None);
        assert_eq!(topo.neighbor(NodeId(0), 1, true), Some(NodeId(4)));
    }

    #[test]
    fn test_torus_wraps() {
        let topo = TopologyKind::new(TopologyLayout::Torus2d, vec![4, 4]).unwrap();
        assert_eq!(topo.neighbor(NodeId(3), 0, true), Some(NodeId(0)));
        assert_eq!(topo.neighbor(NodeId(0), 0, false), Some(NodeId(3)));
        assert_eq!(topo.neighbor(NodeId(0), 1, false), Some(NodeId(12)));
    }

    #[test]
    fn test_mesh_relative_offset() {
        assert_eq!(relative_offset(0, 3, 4, false), (Sign::Forward, 3));
        assert_eq!(relative_offset(3, 1, 4, false), (Sign::Back, 2));
        assert_eq!(relative_offset(2, 2, 4, false), (Sign::Forward, 0));
    }

    #[test]
    fn test_torus_offset_minimized() {
        // 0 -> 4 on a ring of 5: one step back beats four forward.
        assert_eq!(relative_offset(0, 4, 5, true), (Sign::Back, 1));
        assert_eq!(relative_offset(4, 0, 5, true), (Sign::Forward, 1));
        assert_eq!(relative_offset(0, 2, 5, true), (Sign::Forward, 2));
    }

    #[test]
    fn test_torus_tie_breaks_back() {
        // Either way is two hops on a ring of 4; ties go BACK.
        assert_eq!(relative_offset(0, 2, 4, true), (Sign::Back, 2));
    }

    #[test]
    fn test_torus_offset_bound() {
        // |offset| < dim_size/2 + 1 for every pair.
        for size in [2u32, 3, 4, 5, 8] {
            for src in 0..size {
                for dst in 0..size {
                    let (_, mag) = relative_offset(src, dst, size, true);
                    assert!(mag < size / 2 + 1, "size {} {}->{} gave {}", size, src, dst, mag);
                }
            }
        }
    }

    #[test]
    fn test_relative_header_2d() {
        let topo = mesh4x4();
        let h = topo.relative_header(NodeId(0), NodeId(15), 2).unwrap();
        assert_eq!(h.offset(0), 3);
        assert_eq!(h.sign(0), Sign::Forward);
        assert_eq!(h.offset(1), 3);
        assert_eq!(h.sign(1), Sign::Forward);
        assert_eq!(h.source_coordinate(0), 0);
        assert_eq!(h.remaining_hops(), 6);
    }

    #[test]
    fn test_header_size_by_dimensions() {
        assert_eq!(mesh4x4().header_size_bytes(), 4);
        let topo3 = TopologyKind::new(TopologyLayout::Mesh3d, vec![2, 2, 2]).unwrap();
        assert_eq!(topo3.header_size_bytes(), 6);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        assert!(TopologyKind::new(TopologyLayout::Mesh3d, vec![4, 4]).is_err());
        assert!(TopologyKind::new(TopologyLayout::Mesh2d, vec![4, 0]).is_err());
    }
}
