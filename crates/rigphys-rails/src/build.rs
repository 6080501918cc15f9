//! Rail and slide-node definition processing. Declared rail groups are
//! built first so slide nodes can reference them by id; a slide node
//! may instead carry its own node chain, which becomes an anonymous
//! rail group appended to the vehicle's list.

use rigphys_core::{NodeId, RailGroupId, Scalar};
use rigphys_softbody::Rig;

use crate::rail::RailGroup;
use crate::slidenode::{RailRef, SlideNode};

/// Anonymous rails get ids from here up; declared groups stay below.
const ANONYMOUS_RAIL_ID_BASE: u32 = 7_000_000;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum AttachConstraint {
    All,
    SelfOnly,
    Foreign,
    #[default]
    None,
}

#[derive(Clone, Debug)]
pub struct RailGroupDef {
    pub id: u32,
    pub node_chain: Vec<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct SlideNodeDef {
    pub node: u32,
    pub spring_rate: Option<Scalar>,
    pub break_force: Option<Scalar>,
    pub tolerance: Option<Scalar>,
    pub attachment_rate: Option<Scalar>,
    pub max_attach_dist: Option<Scalar>,
    pub constraint: AttachConstraint,
    /// Declared rail group to start on.
    pub railgroup_id: Option<u32>,
    /// Inline rail, used when no group id is given.
    pub node_chain: Vec<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct RailsDef {
    pub rail_groups: Vec<RailGroupDef>,
    pub slide_nodes: Vec<SlideNodeDef>,
}

/// One vehicle's share of the rail subsystem.
#[derive(Debug, Default)]
pub struct VehicleRails {
    pub rail_groups: Vec<RailGroup>,
    pub slide_nodes: Vec<SlideNode>,
    pub slide_nodes_locked: bool,
}

/// Build a vehicle's rails and slide nodes against its finished rig.
/// `vehicle` is the rig's slot in the scene, baked into the default
/// rail references. Reference mistakes skip the declaration and land
/// in the rig's log.
pub fn build_vehicle_rails(rig: &mut Rig, def: &RailsDef, vehicle: usize) -> VehicleRails {
    let mut rail_groups = Vec::with_capacity(def.rail_groups.len());
    for g in &def.rail_groups {
        if let Some(group) = RailGroup::from_node_chain(rig, RailGroupId(g.id), &g.node_chain) {
            rail_groups.push(group);
        }
    }

    let mut anonymous = 0u32;
    let mut slide_nodes = Vec::with_capacity(def.slide_nodes.len());
    for d in &def.slide_nodes {
        if (d.node as usize) >= rig.nodes.len() {
            rig.log.error(format!(
                "slidenode: node reference {} out of range ({} nodes)",
                d.node,
                rig.nodes.len()
            ));
            continue;
        }
        let mut sn = SlideNode::new(NodeId(d.node));
        if let Some(v) = d.spring_rate {
            sn.set_spring_rate(v);
        }
        if let Some(v) = d.break_force {
            sn.set_break_force(v);
        }
        if let Some(v) = d.tolerance {
            sn.set_threshold(v);
        }
        if let Some(v) = d.attachment_rate {
            sn.set_attachment_rate(v);
        }
        if let Some(v) = d.max_attach_dist {
            sn.set_attachment_distance(v);
        }
        match d.constraint {
            AttachConstraint::All => {
                sn.attach_self = true;
                sn.attach_foreign = true;
            }
            AttachConstraint::SelfOnly => sn.attach_self = true,
            AttachConstraint::Foreign => sn.attach_foreign = true,
            AttachConstraint::None => {}
        }

        let group = if let Some(id) = d.railgroup_id {
            match rail_groups.iter().position(|g| g.id.0 == id) {
                Some(i) => Some(i),
                None => {
                    rig.log.error(format!(
                        "slidenode: rail group id {id} not found, ignoring slidenode"
                    ));
                    continue;
                }
            }
        } else if !d.node_chain.is_empty() {
            let id = RailGroupId(ANONYMOUS_RAIL_ID_BASE + anonymous);
            anonymous += 1;
            RailGroup::from_node_chain(rig, id, &d.node_chain).map(|g| {
                rail_groups.push(g);
                rail_groups.len() - 1
            })
        } else {
            rig.log.error(format!("slidenode: no rail group for node {}", d.node));
            None
        };

        // a slide node without a rail still spawns; the lock toggle can
        // attach it later
        let rail = group.map(|g| RailRef { vehicle, group: g });
        let node_pos = rig.nodes[d.node as usize].abs_pos;
        let ctx = match group {
            Some(g) => Some((&rail_groups[g], &*rig)),
            None => None,
        };
        sn.set_default_rail(rail, node_pos, ctx);
        slide_nodes.push(sn);
    }

    VehicleRails { rail_groups, slide_nodes, slide_nodes_locked: false }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigphys_core::vec3;
    use rigphys_softbody::{BeamDef, NodeDef, RigBuilder, RigDef};

    fn track_rig() -> Rig {
        let def = RigDef {
            name: "track".into(),
            dry_mass: 3000.0,
            nodes: vec![
                NodeDef { position: vec3(0.0, 0.0, 0.0), ..Default::default() },
                NodeDef { position: vec3(2.0, 0.0, 0.0), ..Default::default() },
                NodeDef { position: vec3(4.0, 0.0, 0.0), ..Default::default() },
                NodeDef { position: vec3(1.0, 1.0, 0.0), ..Default::default() },
            ],
            beams: vec![
                BeamDef { nodes: [0, 1], ..Default::default() },
                BeamDef { nodes: [1, 2], ..Default::default() },
            ],
            ..Default::default()
        };
        RigBuilder::new(&def).build().unwrap()
    }

    #[test]
    fn declared_group_resolves_by_id() {
        let mut rig = track_rig();
        let def = RailsDef {
            rail_groups: vec![RailGroupDef { id: 5, node_chain: vec![0, 1, 2] }],
            slide_nodes: vec![SlideNodeDef {
                node: 3,
                railgroup_id: Some(5),
                constraint: AttachConstraint::All,
                ..Default::default()
            }],
        };
        let rails = build_vehicle_rails(&mut rig, &def, 0);
        assert_eq!(rails.rail_groups.len(), 1);
        assert_eq!(rails.slide_nodes.len(), 1);
        let sn = &rails.slide_nodes[0];
        assert_eq!(sn.default_rail(), Some(RailRef { vehicle: 0, group: 0 }));
        assert!(sn.attach_self && sn.attach_foreign);
        // spawn seek already found the carrying beam
        assert!(sn.sliding_beam().is_some());
    }

    #[test]
    fn unknown_group_id_skips_the_slidenode() {
        let mut rig = track_rig();
        let def = RailsDef {
            rail_groups: vec![],
            slide_nodes: vec![SlideNodeDef {
                node: 3,
                railgroup_id: Some(9),
                ..Default::default()
            }],
        };
        let rails = build_vehicle_rails(&mut rig, &def, 0);
        assert!(rails.slide_nodes.is_empty());
        assert!(rig.log.has_errors());
    }

    #[test]
    fn inline_chain_builds_anonymous_group() {
        let mut rig = track_rig();
        let def = RailsDef {
            rail_groups: vec![],
            slide_nodes: vec![SlideNodeDef {
                node: 3,
                node_chain: vec![0, 1, 2],
                constraint: AttachConstraint::SelfOnly,
                ..Default::default()
            }],
        };
        let rails = build_vehicle_rails(&mut rig, &def, 0);
        assert_eq!(rails.rail_groups.len(), 1);
        assert_eq!(rails.rail_groups[0].id.0, ANONYMOUS_RAIL_ID_BASE);
        let sn = &rails.slide_nodes[0];
        assert!(sn.attach_self && !sn.attach_foreign);
        assert_eq!(sn.default_rail(), Some(RailRef { vehicle: 0, group: 0 }));
    }

    #[test]
    fn railless_slidenode_spawns_detached() {
        let mut rig = track_rig();
        let def = RailsDef {
            rail_groups: vec![],
            slide_nodes: vec![SlideNodeDef { node: 3, ..Default::default() }],
        };
        let rails = build_vehicle_rails(&mut rig, &def, 0);
        assert_eq!(rails.slide_nodes.len(), 1);
        assert_eq!(rails.slide_nodes[0].default_rail(), None);
        assert!(rig.log.has_errors());
    }

    #[test]
    fn bad_node_reference_is_skipped() {
        let mut rig = track_rig();
        let def = RailsDef {
            rail_groups: vec![],
            slide_nodes: vec![SlideNodeDef { node: 40, ..Default::default() }],
        };
        let rails = build_vehicle_rails(&mut rig, &def, 0);
        assert!(rails.slide_nodes.is_empty());
        assert!(rig.log.has_errors());
    }
}
