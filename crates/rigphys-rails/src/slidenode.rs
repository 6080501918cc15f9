//! A slide node rides a rail: every tick the nearest point on the
//! current rail is tracked and a spring pulls the node toward it, with
//! the reaction spread over the carrying beam's end nodes. The spring
//! only acts beyond a threshold that decays while attaching, and the
//! whole constraint snaps when the corrective force exceeds the break
//! force.

use rigphys_core::{BeamId, NodeId, Scalar, Vec3};
use rigphys_softbody::constants::DEFAULT_SPRING;
use rigphys_softbody::Rig;

use crate::rail::{beam_distance, nearest_point_on_segment, RailGroup};

/// Rail group address within a scene: vehicle slot plus the group's
/// position in that vehicle's rail list.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RailRef {
    pub vehicle: usize,
    pub group: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct SlideNode {
    pub node: NodeId,
    org_rail: Option<RailRef>,
    cur_rail: Option<RailRef>,
    /// Segment currently slid along, index into the rail group.
    sliding_segment: Option<usize>,
    sliding_beam: Option<BeamId>,
    /// Position of the ideal point along the sliding beam, 0 at p1.
    ratio: Scalar,
    ideal_position: Vec3,
    init_threshold: Scalar,
    cur_threshold: Scalar,
    spring_rate: Scalar,
    break_force: Scalar,
    attach_rate: Scalar,
    attach_distance: Scalar,
    pub attach_self: bool,
    pub attach_foreign: bool,
    slide_broken: bool,
}

impl SlideNode {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            org_rail: None,
            cur_rail: None,
            sliding_segment: None,
            sliding_beam: None,
            ratio: 0.0,
            ideal_position: Vec3::ZERO,
            init_threshold: 0.0,
            cur_threshold: 0.0,
            spring_rate: DEFAULT_SPRING,
            break_force: Scalar::INFINITY,
            attach_rate: 1.0,
            attach_distance: 0.1,
            attach_self: false,
            attach_foreign: false,
            slide_broken: false,
        }
    }

    /// Distance from the rail before corrective forces take effect.
    pub fn set_threshold(&mut self, threshold: Scalar) {
        self.init_threshold = threshold.abs();
        self.cur_threshold = self.init_threshold;
    }

    pub fn set_spring_rate(&mut self, rate: Scalar) {
        self.spring_rate = rate.abs();
    }

    pub fn set_break_force(&mut self, force: Scalar) {
        self.break_force = force.abs();
    }

    /// How fast the attach threshold decays back to its resting value.
    pub fn set_attachment_rate(&mut self, rate: Scalar) {
        self.attach_rate = rate.abs();
    }

    /// Maximum reach when scanning for a rail to attach to.
    pub fn set_attachment_distance(&mut self, dist: Scalar) {
        self.attach_distance = dist.abs();
    }

    pub fn attachment_distance(&self) -> Scalar { self.attach_distance }
    pub fn threshold(&self) -> Scalar { self.cur_threshold }
    pub fn rail(&self) -> Option<RailRef> { self.cur_rail }
    pub fn default_rail(&self) -> Option<RailRef> { self.org_rail }
    pub fn sliding_beam(&self) -> Option<BeamId> { self.sliding_beam }
    pub fn ideal_position(&self) -> Vec3 { self.ideal_position }
    pub fn ratio(&self) -> Scalar { self.ratio }
    pub fn is_broken(&self) -> bool { self.slide_broken }

    /// Rail the node starts on when spawned or reset. Seeks the closest
    /// segment right away.
    pub fn set_default_rail(
        &mut self,
        rail: Option<RailRef>,
        node_pos: Vec3,
        ctx: Option<(&RailGroup, &Rig)>,
    ) {
        self.org_rail = rail;
        self.cur_rail = rail;
        self.reset_positions(node_pos, ctx);
    }

    /// Switch to another rail group (or detach with `None`) and re-seek.
    /// The threshold starts at the current distance to the rail so the
    /// spring ramps in smoothly as it decays.
    pub fn attach_to_rail(
        &mut self,
        rail: Option<RailRef>,
        node_pos: Vec3,
        ctx: Option<(&RailGroup, &Rig)>,
    ) {
        self.cur_rail = rail;
        self.reset_positions(node_pos, ctx);
        self.cur_threshold = match (self.sliding_beam, ctx) {
            (Some(beam), Some((_, rig))) => beam_distance(rig, beam, node_pos),
            _ => self.init_threshold,
        };
    }

    /// Back to the spawn rail, unbroken. `ctx` must resolve the default
    /// rail.
    pub fn reset(&mut self, node_pos: Vec3, ctx: Option<(&RailGroup, &Rig)>) {
        self.cur_rail = self.org_rail;
        self.slide_broken = false;
        self.reset_positions(node_pos, ctx);
    }

    /// Full-scan re-seek of the closest segment on the current rail,
    /// then a position refresh.
    pub fn reset_positions(&mut self, node_pos: Vec3, ctx: Option<(&RailGroup, &Rig)>) {
        self.sliding_segment = None;
        self.sliding_beam = None;
        if let Some((group, rig)) = ctx {
            if let Some((seg, _)) = group.closest_segment(rig, node_pos) {
                self.sliding_segment = Some(seg);
                self.sliding_beam = Some(group.segments[seg].beam);
            }
        }
        self.update_position(node_pos, ctx);
    }

    /// Track the nearest point on the rail. Steps at most one segment
    /// per call; positions move little enough per tick that the closest
    /// segment is always the current one or a neighbor.
    pub fn update_position(&mut self, node_pos: Vec3, ctx: Option<(&RailGroup, &Rig)>) {
        let (Some((group, rig)), Some(seg)) = (ctx, self.sliding_segment) else {
            self.ideal_position = node_pos;
            return;
        };
        let beam = group.segments[seg].beam;
        if rig.beams[beam.idx()].broken {
            self.ideal_position = node_pos;
            return;
        }

        let seg = group.step_closer(rig, seg, node_pos);
        let beam = group.segments[seg].beam;
        self.sliding_segment = Some(seg);
        self.sliding_beam = Some(beam);

        let b = &rig.beams[beam.idx()];
        let p1 = rig.nodes[b.p1.idx()].abs_pos;
        let p2 = rig.nodes[b.p2.idx()].abs_pos;
        self.ideal_position = nearest_point_on_segment(p1, p2, node_pos);
        let len = (p2 - p1).length();
        self.ratio = if len > 0.0 { (self.ideal_position - p1).length() / len } else { 0.0 };
    }

    /// Threshold decay plus the corrective spring, with the break
    /// check. Returns the force to distribute over the beam ends, or
    /// `None` while detached or broken. A force that exceeds the break
    /// limit still applies on the tick it breaks.
    pub fn update_forces(&mut self, node_pos: Vec3, beam_broken: bool, dt: Scalar) -> Option<Vec3> {
        if self.sliding_beam.is_none() || beam_broken || self.slide_broken {
            return None;
        }
        // threshold above the resting value means we are still attaching
        if self.cur_threshold > self.init_threshold {
            self.cur_threshold -= self.attach_rate * dt;
        }
        let perp = self.corrective_force(node_pos);
        if perp.length() > self.break_force {
            self.slide_broken = true;
        }
        Some(perp)
    }

    /// Spring force between the ideal position and the node, less the
    /// threshold slack. Points away from the rail; the node gets the
    /// negation.
    fn corrective_force(&self, node_pos: Vec3) -> Vec3 {
        let offset = self.ideal_position - node_pos;
        let slack = (offset.length() - self.cur_threshold).max(0.0);
        offset.normalize_or_zero() * (-self.spring_rate * slack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigphys_core::{vec3, RailGroupId};
    use rigphys_softbody::{BeamDef, NodeDef, RigBuilder, RigDef};

    fn rail_rig() -> (Rig, RailGroup) {
        let def = RigDef {
            name: "slide test".into(),
            dry_mass: 3000.0,
            nodes: vec![
                NodeDef { position: vec3(0.0, 0.0, 0.0), ..Default::default() },
                NodeDef { position: vec3(2.0, 0.0, 0.0), ..Default::default() },
                NodeDef { position: vec3(4.0, 0.0, 0.0), ..Default::default() },
                // the sliding node, off the rail
                NodeDef { position: vec3(1.0, 1.0, 0.0), ..Default::default() },
            ],
            beams: vec![
                BeamDef { nodes: [0, 1], ..Default::default() },
                BeamDef { nodes: [1, 2], ..Default::default() },
            ],
            ..Default::default()
        };
        let mut rig = RigBuilder::new(&def).build().unwrap();
        let rail = RailGroup::from_node_chain(&mut rig, RailGroupId(1), &[0, 1, 2]).unwrap();
        (rig, rail)
    }

    fn rail_ref() -> RailRef {
        RailRef { vehicle: 0, group: 0 }
    }

    #[test]
    fn detached_node_tracks_itself() {
        let (rig, _) = rail_rig();
        let mut sn = SlideNode::new(NodeId(3));
        let pos = rig.nodes[3].abs_pos;
        sn.update_position(pos, None);
        assert_eq!(sn.ideal_position(), pos);
        assert_eq!(sn.update_forces(pos, false, 0.001), None);
    }

    #[test]
    fn default_rail_seeks_closest_segment() {
        let (rig, rail) = rail_rig();
        let mut sn = SlideNode::new(NodeId(3));
        let pos = rig.nodes[3].abs_pos;
        sn.set_default_rail(Some(rail_ref()), pos, Some((&rail, &rig)));
        assert_eq!(sn.sliding_beam(), Some(rail.segments[0].beam));
        assert_eq!(sn.ideal_position(), vec3(1.0, 0.0, 0.0));
        assert!((sn.ratio() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn corrective_force_pulls_toward_rail() {
        let (rig, rail) = rail_rig();
        let mut sn = SlideNode::new(NodeId(3));
        let pos = rig.nodes[3].abs_pos;
        sn.set_default_rail(Some(rail_ref()), pos, Some((&rail, &rig)));
        // node hangs 1m above the rail, no threshold
        let perp = sn.update_forces(pos, false, 0.001).unwrap();
        assert!((perp.y - DEFAULT_SPRING).abs() < 1.0);
        assert_eq!(perp.x, 0.0);
        // the node receives -perp, pointing down toward the rail
        assert!((-perp).y < 0.0);
    }

    #[test]
    fn threshold_gates_the_spring() {
        let (rig, rail) = rail_rig();
        let mut sn = SlideNode::new(NodeId(3));
        sn.set_threshold(1.5);
        let pos = rig.nodes[3].abs_pos;
        sn.set_default_rail(Some(rail_ref()), pos, Some((&rail, &rig)));
        // offset 1.0 is inside the 1.5 threshold
        let perp = sn.update_forces(pos, false, 0.001).unwrap();
        assert_eq!(perp, Vec3::ZERO);
    }

    #[test]
    fn attach_threshold_decays_at_attach_rate() {
        let (rig, rail) = rail_rig();
        let mut sn = SlideNode::new(NodeId(3));
        sn.set_attachment_rate(2.0);
        let pos = rig.nodes[3].abs_pos;
        sn.attach_to_rail(Some(rail_ref()), pos, Some((&rail, &rig)));
        // attaching starts the threshold at the current distance
        assert!((sn.threshold() - 1.0).abs() < 1e-6);
        sn.update_forces(pos, false, 0.25);
        assert!((sn.threshold() - 0.5).abs() < 1e-6);
        sn.update_forces(pos, false, 0.25);
        // stops at the resting threshold
        let perp = sn.update_forces(pos, false, 0.25).unwrap();
        assert!(sn.threshold() <= 0.0 + 1e-6);
        assert!(perp.length() > 0.0);
    }

    #[test]
    fn excessive_force_breaks_the_constraint() {
        let (rig, rail) = rail_rig();
        let mut sn = SlideNode::new(NodeId(3));
        sn.set_break_force(1000.0);
        let pos = rig.nodes[3].abs_pos;
        sn.set_default_rail(Some(rail_ref()), pos, Some((&rail, &rig)));
        // breaking tick still returns the force
        let perp = sn.update_forces(pos, false, 0.001);
        assert!(perp.is_some());
        assert!(sn.is_broken());
        assert_eq!(sn.update_forces(pos, false, 0.001), None);
        // reset restores the default rail and clears the break
        sn.reset(pos, Some((&rail, &rig)));
        assert!(!sn.is_broken());
        assert_eq!(sn.rail(), sn.default_rail());
    }

    #[test]
    fn setters_take_magnitudes() {
        let mut sn = SlideNode::new(NodeId(0));
        sn.set_spring_rate(-100.0);
        sn.set_threshold(-2.0);
        sn.set_attachment_distance(-0.5);
        assert_eq!(sn.threshold(), 2.0);
        assert_eq!(sn.attachment_distance(), 0.5);
    }
}
