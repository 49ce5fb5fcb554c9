//! Named traffic patterns: per-coordinate bitwise transforms of the source
//! coordinates, plus uniform-random and explicit-destination selection.

use serde::{Deserialize, Serialize};

use crate::engine::DeterministicRng;
use crate::network::NodeId;
use crate::topology::TopologyKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrafficPattern {
    UniformRandom,
    BitMatrixTranspose,
    BitComplement,
    BitReverse,
    DestinationSpecified,
}

/// Bits needed to index `size` positions; coordinate transforms operate on
/// this width. Sizes that are not powers of two use the floor, matching the
/// usual restriction of bit patterns to power-of-two meshes.
pub fn coordinate_bits(size: u32) -> u32 {
    if size <= 1 {
        0
    } else {
        31 - size.leading_zeros()
    }
}

pub fn complement_bits(value: u32, bits: u32) -> u32 {
    if bits == 0 {
        return value;
    }
    !value & ((1 << bits) - 1)
}

pub fn reverse_bits(value: u32, bits: u32) -> u32 {
    let mut out = 0;
    for i in 0..bits {
        if value & (1 << i) != 0 {
            out |= 1 << (bits - 1 - i);
        }
    }
    out
}

/// Rotate the low `bits` of `value` left by half their width, the
/// per-coordinate form of the matrix-transpose pattern.
pub fn transpose_bits(value: u32, bits: u32) -> u32 {
    if bits < 2 {
        return value;
    }
    let half = bits / 2;
    let mask = (1 << bits) - 1;
    ((value << half) | (value >> (bits - half))) & mask
}

/// Destination node for `src` under `pattern`. `None` when the pattern maps
/// a node onto itself (the caller aborts that injection attempt) or when
/// `DestinationSpecified` has no target configured.
pub fn destination_for(
    pattern: TrafficPattern,
    topology: &TopologyKind,
    src: NodeId,
    specified: Option<NodeId>,
    rng: &mut DeterministicRng,
) -> Option<NodeId> {
    let sizes = topology.sizes();
    let src_coords = topology.coordinates_of(src);

    let dst = match pattern {
        TrafficPattern::DestinationSpecified => specified?,
        TrafficPattern::UniformRandom => {
            let coords: Vec<u32> = sizes
                .iter()
                .map(|&size| rng.gen_range(0, size as u64) as u32)
                .collect();
            topology.node_at(&coords)
        }
        TrafficPattern::BitMatrixTranspose => {
            transform(topology, &src_coords, transpose_bits)
        }
        TrafficPattern::BitComplement => transform(topology, &src_coords, complement_bits),
        TrafficPattern::BitReverse => transform(topology, &src_coords, reverse_bits),
    };

    if dst == src {
        None
    } else {
        Some(dst)
    }
}

fn transform(topology: &TopologyKind, src_coords: &[u32], f: fn(u32, u32) -> u32) -> NodeId {
    let coords: Vec<u32> = src_coords
        .iter()
        .zip(topology.sizes())
        .map(|(&c, &size)| f(c, coordinate_bits(size)) % size)
        .collect();
    topology.node_at(&coords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::TopologyLayout;

    #[test]
    fn test_complement() {
        assert_eq!(complement_bits(0b00, 2), 0b11);
        assert_eq!(complement_bits(0b01, 2), 0b10);
        assert_eq!(complement_bits(0b101, 3), 0b010);
    }

    #[test]
    fn test_reverse() {
        assert_eq!(reverse_bits(0b100, 3), 0b001);
        assert_eq!(reverse_bits(0b110, 3), 0b011);
        assert_eq!(reverse_bits(0b01, 2), 0b10);
    }

    #[test]
    fn test_transpose_rotates_half() {
        assert_eq!(transpose_bits(0b01, 2), 0b10);
        assert_eq!(transpose_bits(0b0011, 4), 0b1100);
    }

    #[test]
    fn test_bit_complement_on_4x4() {
        let topo = TopologyKind::new(TopologyLayout::Mesh2d, vec![4, 4]).unwrap();
        let mut rng = DeterministicRng::new(0);
        // (0,0) -> (3,3)
        let dst = destination_for(
            TrafficPattern::BitComplement,
            &topo,
            NodeId(0),
            None,
            &mut rng,
        );
        assert_eq!(dst, Some(NodeId(15)));
        // (1,2) -> (2,1): node 9 -> node 6
        let dst = destination_for(
            TrafficPattern::BitComplement,
            &topo,
            NodeId(9),
            None,
            &mut rng,
        );
        assert_eq!(dst, Some(NodeId(6)));
    }

    #[test]
    fn test_self_destination_aborts() {
        let topo = TopologyKind::new(TopologyLayout::Mesh2d, vec![4, 4]).unwrap();
        let mut rng = DeterministicRng::new(0);
        // Bit-reverse fixes palindromic coordinates; (0,0) maps to itself.
        let dst = destination_for(
            TrafficPattern::BitReverse,
            &topo,
            NodeId(0),
            None,
            &mut rng,
        );
        assert_eq!(dst, None);
    }

    #[test]
    fn test_uniform_random_in_bounds() {
        let topo = TopologyKind::new(TopologyLayout::Mesh2d, vec![4, 4]).unwrap();
        let mut rng = DeterministicRng::new(99);
        for _ in 0..200 {
            if let Some(dst) =
                destination_for(TrafficPattern::UniformRandom, &topo, NodeId(5), None, &mut rng)
            {
                assert!(dst.0 < 16);
                assert_ne!(dst, NodeId(5));
            }
        }
    }
}
