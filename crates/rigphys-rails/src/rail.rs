//! Rail geometry: ordered chains of beams a slide node can ride along.
//! Segments link to their neighbors by index into the group's segment
//! vector; a chain whose first and last node coincide closes into a
//! loop so nearest-point tracking can wrap around.

use rigphys_core::{BeamId, NodeId, RailGroupId, Scalar, Vec3};
use rigphys_softbody::Rig;

/// One beam of a rail chain.
#[derive(Clone, Copy, Debug)]
pub struct RailSegment {
    pub beam: BeamId,
    pub prev: Option<usize>,
    pub next: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct RailGroup {
    pub id: RailGroupId,
    pub segments: Vec<RailSegment>,
}

impl RailGroup {
    /// Chain consecutive node references into linked segments. A pair
    /// with no beam between it aborts the whole rail, since a rail with
    /// a hole would let the constraint jump across the gap.
    pub fn from_node_chain(rig: &mut Rig, id: RailGroupId, chain: &[u32]) -> Option<Self> {
        if chain.len() < 2 {
            rig.log.error(format!("rail group {id}: needs at least two nodes"));
            return None;
        }

        let mut segments = Vec::with_capacity(chain.len() - 1);
        for pair in chain.windows(2) {
            let (a, b) = (resolve_rail_node(rig, pair[0])?, resolve_rail_node(rig, pair[1])?);
            let Some(beam) = find_beam(rig, a, b) else {
                rig.log.error(format!(
                    "rail group {id}: no beam between nodes {} and {}",
                    pair[0], pair[1]
                ));
                return None;
            };
            segments.push(RailSegment { beam, prev: None, next: None });
        }

        let count = segments.len();
        for (i, seg) in segments.iter_mut().enumerate() {
            seg.prev = i.checked_sub(1);
            seg.next = (i + 1 < count).then_some(i + 1);
        }
        if count > 1 && chain.first() == chain.last() {
            segments[0].prev = Some(count - 1);
            segments[count - 1].next = Some(0);
        }
        Some(Self { id, segments })
    }

    /// Full scan for the segment closest to `point`. O(n), used when
    /// (re)attaching; per-tick tracking steps neighbor by neighbor
    /// instead.
    pub fn closest_segment(&self, rig: &Rig, point: Vec3) -> Option<(usize, Scalar)> {
        let mut best: Option<(usize, Scalar)> = None;
        for (i, seg) in self.segments.iter().enumerate() {
            let dist = beam_distance(rig, seg.beam, point);
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((i, dist));
            }
        }
        best
    }

    /// One tracking step: move to a neighbor when it is closer to
    /// `point` than the current segment. A node cannot outrun the rail
    /// by more than one segment per tick, so one step keeps up.
    pub(crate) fn step_closer(&self, rig: &Rig, current: usize, point: Vec3) -> usize {
        let seg = self.segments[current];
        let len_here = beam_distance(rig, seg.beam, point);
        let len_to = |i: Option<usize>| {
            i.map_or(Scalar::INFINITY, |i| beam_distance(rig, self.segments[i].beam, point))
        };
        let len_prev = len_to(seg.prev);
        let len_next = len_to(seg.next);
        if len_here > len_prev || len_here > len_next {
            if len_prev < len_next {
                return seg.prev.unwrap_or(current);
            }
            return seg.next.unwrap_or(current);
        }
        current
    }
}

/// Beam joining two nodes, in either orientation.
pub fn find_beam(rig: &Rig, a: NodeId, b: NodeId) -> Option<BeamId> {
    rig.beams
        .iter()
        .position(|bm| (bm.p1 == a && bm.p2 == b) || (bm.p1 == b && bm.p2 == a))
        .map(|i| BeamId(i as u32))
}

/// Distance from `point` to the beam treated as a finite segment.
pub fn beam_distance(rig: &Rig, beam: BeamId, point: Vec3) -> Scalar {
    let b = &rig.beams[beam.idx()];
    let p1 = rig.nodes[b.p1.idx()].abs_pos;
    let p2 = rig.nodes[b.p2.idx()].abs_pos;
    (nearest_point_on_segment(p1, p2, point) - point).length()
}

pub(crate) fn nearest_point_on_segment(p1: Vec3, p2: Vec3, point: Vec3) -> Vec3 {
    let b = p2 - p1;
    let len = b.length();
    if len == 0.0 {
        return p1;
    }
    let b = b / len;
    p1 + b * (point - p1).dot(b).clamp(0.0, len)
}

fn resolve_rail_node(rig: &mut Rig, index: u32) -> Option<NodeId> {
    if (index as usize) < rig.nodes.len() {
        Some(NodeId(index))
    } else {
        rig.log.error(format!(
            "rail: node reference {index} out of range ({} nodes)",
            rig.nodes.len()
        ));
        None
    }
}
