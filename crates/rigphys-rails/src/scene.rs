//! Scene-level passes. Slide nodes may ride rails on other vehicles,
//! so the per-tick update and the lock toggle work over the whole
//! vehicle list; everything runs on the single simulation thread.

use rigphys_core::{NodeId, Scalar, Vec3};
use rigphys_softbody::Rig;
use tracing::debug;

use crate::build::VehicleRails;
use crate::rail::RailGroup;
use crate::slidenode::{RailRef, SlideNode};

fn rail_ctx<'a>(
    rails: &'a [VehicleRails],
    rigs: &'a [Rig],
    rail: Option<RailRef>,
) -> Option<(&'a RailGroup, &'a Rig)> {
    rail.map(|r| (&rails[r.vehicle].rail_groups[r.group], &rigs[r.vehicle]))
}

/// Per-tick pass for one vehicle: track each slide node's nearest rail
/// point, then pull the node in and push the reaction onto the carrying
/// beam's ends, split by the cached position ratio. Runs before the
/// position integrator so all forces land in the same accumulation
/// phase.
pub fn update_slide_node_forces(
    rails: &mut [VehicleRails],
    rigs: &mut [Rig],
    vehicle: usize,
    dt: Scalar,
) {
    for s in 0..rails[vehicle].slide_nodes.len() {
        let mut sn = rails[vehicle].slide_nodes[s];
        let node_pos = rigs[vehicle].nodes[sn.node.idx()].abs_pos;

        let ctx = rail_ctx(rails, rigs, sn.rail());
        sn.update_position(node_pos, ctx);

        let mut carrier: Option<(usize, NodeId, NodeId, bool)> = None;
        if let (Some(beam), Some(r)) = (sn.sliding_beam(), sn.rail()) {
            let b = &rigs[r.vehicle].beams[beam.idx()];
            carrier = Some((r.vehicle, b.p1, b.p2, b.broken));
        }
        if let Some((rail_vehicle, p1, p2, beam_broken)) = carrier {
            if let Some(perp) = sn.update_forces(node_pos, beam_broken, dt) {
                let ratio = sn.ratio();
                rigs[vehicle].nodes[sn.node.idx()].forces -= perp;
                rigs[rail_vehicle].nodes[p1.idx()].forces += perp * (1.0 - ratio);
                rigs[rail_vehicle].nodes[p2.idx()].forces += perp * ratio;
            }
        }
        rails[vehicle].slide_nodes[s] = sn;
    }
}

/// Lock toggle for one vehicle. Unlocking scans every vehicle each
/// slide node may attach to and grabs the overall closest rail within
/// the node's reach; locking detaches everything. O(vehicles x nodes x
/// segments), acceptable for a discrete user action.
pub fn toggle_slide_node_lock(rails: &mut [VehicleRails], rigs: &[Rig], vehicle: usize) {
    let locked = rails[vehicle].slide_nodes_locked;
    for s in 0..rails[vehicle].slide_nodes.len() {
        let mut sn = rails[vehicle].slide_nodes[s];
        if !sn.attach_self && !sn.attach_foreign {
            continue;
        }
        let node_pos = rigs[vehicle].nodes[sn.node.idx()].abs_pos;
        if locked {
            sn.attach_to_rail(None, node_pos, None);
        } else {
            let mut closest: Option<(RailRef, Scalar)> = None;
            for (w, vr) in rails.iter().enumerate() {
                let eligible = if w == vehicle { sn.attach_self } else { sn.attach_foreign };
                if !eligible {
                    continue;
                }
                if let Some((rail, dist)) = closest_rail_on_vehicle(vr, &rigs[w], w, &sn, node_pos)
                {
                    if closest.map_or(true, |(_, d)| dist < d) {
                        closest = Some((rail, dist));
                    }
                }
            }
            let rail = closest.map(|(r, _)| r);
            let ctx = rail_ctx(rails, rigs, rail);
            sn.attach_to_rail(rail, node_pos, ctx);
        }
        rails[vehicle].slide_nodes[s] = sn;
    }
    rails[vehicle].slide_nodes_locked = !locked;
    debug!(vehicle, locked = !locked, "slide node lock toggled");
}

/// Closest rail group of one vehicle within the node's attachment
/// reach.
fn closest_rail_on_vehicle(
    vr: &VehicleRails,
    rig: &Rig,
    vehicle: usize,
    sn: &SlideNode,
    point: Vec3,
) -> Option<(RailRef, Scalar)> {
    let mut closest: Option<(RailRef, Scalar)> = None;
    for (g, group) in vr.rail_groups.iter().enumerate() {
        let Some((_, dist)) = group.closest_segment(rig, point) else {
            continue;
        };
        if dist < sn.attachment_distance() && closest.map_or(true, |(_, d)| dist < d) {
            closest = Some((RailRef { vehicle, group: g }, dist));
        }
    }
    closest
}

/// Re-seek every slide node of a vehicle on its current rail, keeping
/// attachments. Used after teleports and resets, when positions jumped
/// further than the one-segment-per-tick tracker can follow.
pub fn reset_slide_node_positions(rails: &mut [VehicleRails], rigs: &[Rig], vehicle: usize) {
    for s in 0..rails[vehicle].slide_nodes.len() {
        let mut sn = rails[vehicle].slide_nodes[s];
        let node_pos = rigs[vehicle].nodes[sn.node.idx()].abs_pos;
        let ctx = rail_ctx(rails, rigs, sn.rail());
        sn.reset_positions(node_pos, ctx);
        rails[vehicle].slide_nodes[s] = sn;
    }
}

/// Put every slide node of a vehicle back on its spawn rail and clear
/// breaks.
pub fn reset_slide_nodes(rails: &mut [VehicleRails], rigs: &[Rig], vehicle: usize) {
    for s in 0..rails[vehicle].slide_nodes.len() {
        let mut sn = rails[vehicle].slide_nodes[s];
        let node_pos = rigs[vehicle].nodes[sn.node.idx()].abs_pos;
        let ctx = rail_ctx(rails, rigs, sn.default_rail());
        sn.reset(node_pos, ctx);
        rails[vehicle].slide_nodes[s] = sn;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{build_vehicle_rails, AttachConstraint, RailGroupDef, RailsDef, SlideNodeDef};
    use rigphys_core::vec3;
    use rigphys_softbody::constants::DEFAULT_SPRING;
    use rigphys_softbody::{BeamDef, NodeDef, RigBuilder, RigDef};

    fn rail_carrier_rig() -> Rig {
        let def = RigDef {
            name: "carrier".into(),
            dry_mass: 3000.0,
            nodes: vec![
                NodeDef { position: vec3(0.0, 0.0, 0.0), ..Default::default() },
                NodeDef { position: vec3(2.0, 0.0, 0.0), ..Default::default() },
                NodeDef { position: vec3(4.0, 0.0, 0.0), ..Default::default() },
            ],
            beams: vec![
                BeamDef { nodes: [0, 1], ..Default::default() },
                BeamDef { nodes: [1, 2], ..Default::default() },
            ],
            ..Default::default()
        };
        RigBuilder::new(&def).build().unwrap()
    }

    fn rider_rig() -> Rig {
        let def = RigDef {
            name: "rider".into(),
            dry_mass: 3000.0,
            nodes: vec![
                NodeDef { position: vec3(1.0, 1.0, 0.0), ..Default::default() },
                NodeDef { position: vec3(1.0, 2.0, 0.0), ..Default::default() },
            ],
            beams: vec![BeamDef { nodes: [0, 1], ..Default::default() }],
            ..Default::default()
        };
        RigBuilder::new(&def).build().unwrap()
    }

    // vehicle 0 carries the rail, vehicle 1 carries the slide node
    fn two_vehicle_scene() -> (Vec<VehicleRails>, Vec<Rig>) {
        let mut carrier = rail_carrier_rig();
        let mut rider = rider_rig();
        let carrier_def = RailsDef {
            rail_groups: vec![RailGroupDef { id: 1, node_chain: vec![0, 1, 2] }],
            slide_nodes: vec![],
        };
        let rider_def = RailsDef {
            rail_groups: vec![],
            slide_nodes: vec![SlideNodeDef {
                node: 0,
                constraint: AttachConstraint::Foreign,
                max_attach_dist: Some(2.0),
                node_chain: vec![],
                ..Default::default()
            }],
        };
        let rails = vec![
            build_vehicle_rails(&mut carrier, &carrier_def, 0),
            build_vehicle_rails(&mut rider, &rider_def, 1),
        ];
        (rails, vec![carrier, rider])
    }

    #[test]
    fn toggle_attaches_to_foreign_rail() {
        let (mut rails, rigs) = two_vehicle_scene();
        assert_eq!(rails[1].slide_nodes[0].rail(), None);

        toggle_slide_node_lock(&mut rails, &rigs, 1);
        let sn = &rails[1].slide_nodes[0];
        assert_eq!(sn.rail(), Some(RailRef { vehicle: 0, group: 0 }));
        assert!(sn.sliding_beam().is_some());
        assert!(rails[1].slide_nodes_locked);
        // attach threshold starts at the current distance to the rail
        assert!((sn.threshold() - 1.0).abs() < 1e-5);

        // second toggle detaches
        toggle_slide_node_lock(&mut rails, &rigs, 1);
        assert_eq!(rails[1].slide_nodes[0].rail(), None);
        assert!(!rails[1].slide_nodes_locked);
    }

    #[test]
    fn attachment_distance_bounds_the_scan() {
        let (mut rails, rigs) = two_vehicle_scene();
        rails[1].slide_nodes[0].set_attachment_distance(0.1);
        toggle_slide_node_lock(&mut rails, &rigs, 1);
        // rail is 1m away, out of reach
        assert_eq!(rails[1].slide_nodes[0].rail(), None);
        assert!(rails[1].slide_nodes_locked);
    }

    #[test]
    fn self_only_nodes_ignore_foreign_rails() {
        let (mut rails, rigs) = two_vehicle_scene();
        rails[1].slide_nodes[0].attach_foreign = false;
        rails[1].slide_nodes[0].attach_self = true;
        toggle_slide_node_lock(&mut rails, &rigs, 1);
        // the rider itself has no rail groups
        assert_eq!(rails[1].slide_nodes[0].rail(), None);
    }

    #[test]
    fn forces_span_both_vehicles() {
        let (mut rails, mut rigs) = two_vehicle_scene();
        toggle_slide_node_lock(&mut rails, &rigs, 1);

        // one long step decays the attach threshold to zero, so the
        // full 1m offset drives the spring
        update_slide_node_forces(&mut rails, &mut rigs, 1, 1.0);

        let node_force = rigs[1].nodes[0].forces;
        assert!((node_force.y - (-DEFAULT_SPRING)).abs() < 1.0);
        // reaction splits evenly, the ideal point sits mid-beam
        let p1_force = rigs[0].nodes[0].forces;
        let p2_force = rigs[0].nodes[1].forces;
        assert!((p1_force.y - DEFAULT_SPRING / 2.0).abs() < 1.0);
        assert!((p2_force.y - DEFAULT_SPRING / 2.0).abs() < 1.0);
    }

    #[test]
    fn broken_carrier_beam_suspends_forces() {
        let (mut rails, mut rigs) = two_vehicle_scene();
        toggle_slide_node_lock(&mut rails, &rigs, 1);
        rigs[0].beams[0].broken = true;

        update_slide_node_forces(&mut rails, &mut rigs, 1, 1.0);
        assert_eq!(rigs[1].nodes[0].forces, rigphys_core::Vec3::ZERO);
        // a broken beam also stops position tracking
        let sn = &rails[1].slide_nodes[0];
        assert_eq!(sn.ideal_position(), rigs[1].nodes[0].abs_pos);
    }

    #[test]
    fn reset_returns_to_spawn_rail() {
        let mut rig = rail_carrier_rig();
        let def = RailsDef {
            rail_groups: vec![RailGroupDef { id: 1, node_chain: vec![0, 1, 2] }],
            slide_nodes: vec![SlideNodeDef {
                node: 2,
                railgroup_id: Some(1),
                constraint: AttachConstraint::SelfOnly,
                ..Default::default()
            }],
        };
        let mut rails = vec![build_vehicle_rails(&mut rig, &def, 0)];
        let rigs = vec![rig];

        // locking the vehicle detaches the node from its spawn rail
        rails[0].slide_nodes_locked = true;
        toggle_slide_node_lock(&mut rails, &rigs, 0);
        assert_eq!(rails[0].slide_nodes[0].rail(), None);

        reset_slide_nodes(&mut rails, &rigs, 0);
        let sn = &rails[0].slide_nodes[0];
        assert_eq!(sn.rail(), Some(RailRef { vehicle: 0, group: 0 }));
        assert!(!sn.is_broken());
    }
}
