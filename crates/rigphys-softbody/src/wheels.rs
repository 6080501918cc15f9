//! Wheel construction. Four wheel kinds share the same skeleton: fetch
//! and canonicalize the axis pair, ring the nodes around it, then lace
//! the rings with spoke, reinforcement and (for dual-ring wheels)
//! sidewall beams. Bounded spoke beams use a 0.66 short bound so the
//! tyre stiffens before it reaches the axis.

use std::f32::consts::PI;

use glam::Quat;
use rigphys_core::{BeamId, NodeId, Scalar, Vec3, WheelId};

use crate::builder::RigBuilder;
use crate::constants::*;
use crate::defs::*;
use crate::error::SoftbodyError;
use crate::types::*;

/// Any unit vector orthogonal to `v` (`v` must be normalized). The
/// choice is arbitrary but deterministic; the ring closes regardless of
/// the starting direction.
fn perpendicular(v: Vec3) -> Vec3 {
    let p = v.cross(Vec3::X);
    if p.length_squared() < 1e-12 {
        v.cross(Vec3::Y).normalize()
    } else {
        p.normalize()
    }
}

fn rotate(q: Quat, v: Vec3) -> Vec3 {
    Vec3::from(q * glam::Vec3::from(v))
}

impl<'d> RigBuilder<'d> {
    pub(crate) fn process_wheels(&mut self) -> Result<(), SoftbodyError> {
        let def = self.def;
        for d in &def.wheels {
            self.process_wheel(d)?;
        }
        for d in &def.wheels2 {
            self.process_wheel2(d)?;
        }
        for d in &def.meshwheels {
            self.process_meshwheel(d)?;
        }
        for d in &def.flexbodywheels {
            self.process_flexbodywheel(d)?;
        }
        Ok(())
    }

    pub(crate) fn translate_braking(&self, braking: WheelBraking) -> BrakeCombo {
        match braking {
            WheelBraking::No => BrakeCombo::None,
            WheelBraking::Yes => BrakeCombo::FootHand,
            WheelBraking::DirectionalLeft => BrakeCombo::FootHandSkidLeft,
            WheelBraking::DirectionalRight => BrakeCombo::FootHandSkidRight,
            WheelBraking::OnlyFoot => BrakeCombo::FootOnly,
        }
    }

    /// Resolve the axis pair and enforce the "second node has the larger
    /// world Z" convention every ring builder relies on.
    pub(crate) fn fetch_axis_nodes(
        &mut self,
        refs: [u32; 2],
        section: &str,
    ) -> Option<(NodeId, NodeId)> {
        let n1 = self.resolve_node(refs[0], section)?;
        let n2 = self.resolve_node(refs[1], section)?;
        if self.node_abs(n1).z > self.node_abs(n2).z {
            Some((n2, n1))
        } else {
            Some((n1, n2))
        }
    }

    fn wheel_node(
        &mut self,
        position: Vec3,
        mass: Scalar,
        defaults: &NodeDefaults,
    ) -> Result<NodeId, SoftbodyError> {
        let mut node = self.init_node(position, defaults);
        node.mass = mass;
        self.push_node(node)
    }

    /// Spoke/reinforcement beam; a positive `max_contraction` turns it
    /// into a bump-stop bounded beam.
    pub(crate) fn add_wheel_beam(
        &mut self,
        n1: NodeId,
        n2: NodeId,
        spring: Scalar,
        damp: Scalar,
        max_contraction: Scalar,
        max_extension: Scalar,
        defaults: &BeamDefaults,
    ) -> Result<BeamId, SoftbodyError> {
        let id = self.add_beam(n1, n2, defaults)?;
        let beam = &mut self.beams[id.idx()];
        beam.spring = spring;
        beam.damp = damp;
        if max_contraction > 0.0 {
            beam.short_bound = max_contraction;
            beam.long_bound = max_extension;
            beam.bounded = BoundedMode::Shock1;
        }
        self.calc_beam_length(id);
        Ok(id)
    }

    fn plain_wheel_beam(
        &mut self,
        n1: NodeId,
        n2: NodeId,
        spring: Scalar,
        damp: Scalar,
        defaults: &BeamDefaults,
    ) -> Result<BeamId, SoftbodyError> {
        self.add_wheel_beam(n1, n2, spring, damp, -1.0, -1.0, defaults)
    }

    /// Build the wheel record and its single tyre ring: `2 * num_rays`
    /// contacter nodes, outer ring offset half a step from the inner.
    #[allow(clippy::too_many_arguments)]
    fn build_wheel_object_and_nodes(
        &mut self,
        num_rays: u32,
        axis0: NodeId,
        axis1: NodeId,
        arm_node: NodeId,
        radius: Scalar,
        propulsion: WheelPropulsion,
        braking: WheelBraking,
        mass: Scalar,
        width: Scalar,
        node_defaults: &NodeDefaults,
    ) -> Result<WheelId, SoftbodyError> {
        let axis = self.node_rel(axis1) - self.node_rel(axis0);
        let axis_length = axis.length();
        let axis = axis / axis_length;

        let near_attach = {
            let arm = self.node_rel(arm_node);
            let d0 = (self.node_rel(axis0) - arm).length();
            let d1 = (self.node_rel(axis1) - arm).length();
            if d0 < d1 { axis0 } else { axis1 }
        };

        let mut wheel = Wheel {
            axis0,
            axis1,
            arm_node,
            near_attach,
            radius,
            rim_radius: 0.0,
            width: if width < 0.0 { axis_length } else { width },
            propelled: propulsion.is_propelled(),
            braking: self.translate_braking(braking),
            nodes: Vec::with_capacity(num_rays as usize * 2),
            rim_nodes: Vec::new(),
            mass: 0.0,
        };

        let wheel_id = WheelId(self.wheels.len() as u32);
        if propulsion.is_propelled() {
            // consumed later by the inter-differential wiring
            self.propelled_wheels.push(wheel_id);
        }

        let mut ray = perpendicular(axis) * radius;
        let rotator = Quat::from_axis_angle(axis.into(), -PI / num_rays as Scalar);
        let node_mass = mass / (2.0 * num_rays as Scalar);

        for _ in 0..num_rays {
            let outer_pos = self.node_rel(axis0) + ray;
            ray = rotate(rotator, ray);
            let outer = self.wheel_node(outer_pos, node_mass, node_defaults)?;
            self.nodes[outer.idx()].contacter = true;
            self.nodes[outer.idx()].tyre_node = true;

            let inner_pos = self.node_rel(axis1) + ray;
            ray = rotate(rotator, ray);
            let inner = self.wheel_node(inner_pos, node_mass, node_defaults)?;
            self.nodes[inner.idx()].contacter = true;
            self.nodes[inner.idx()].tyre_node = true;

            wheel.nodes.push(outer);
            wheel.nodes.push(inner);
        }

        self.wheels.push(wheel);
        Ok(wheel_id)
    }

    /// Lace one tyre ring to its axis: two bounded and two free spokes
    /// per ray, a reinforcement quad, and an optional virtual rigidity
    /// beam to whichever axis side sits closer to the rigidity node.
    #[allow(clippy::too_many_arguments)]
    fn build_wheel_beams(
        &mut self,
        num_rays: u32,
        ring: &[NodeId],
        axis0: NodeId,
        axis1: NodeId,
        tyre_spring: Scalar,
        tyre_damp: Scalar,
        rim_spring: Scalar,
        rim_damp: Scalar,
        rigidity_ref: Option<u32>,
        max_extension: Scalar,
        defaults: &BeamDefaults,
    ) -> Result<(), SoftbodyError> {
        let mut rigidity = None;
        if let Some(index) = rigidity_ref {
            if let Some(node) = self.resolve_node(index, "wheels") {
                let d0 = (self.node_rel(node) - self.node_rel(axis0)).length();
                let d1 = (self.node_rel(node) - self.node_rel(axis1)).length();
                rigidity = Some((node, d0 < d1));
            }
        }

        let r = num_rays as usize;
        for i in 0..r {
            let outer = ring[i * 2];
            let inner = ring[i * 2 + 1];

            self.add_wheel_beam(axis0, outer, tyre_spring, tyre_damp, 0.66, max_extension, defaults)?;
            self.add_wheel_beam(axis1, inner, tyre_spring, tyre_damp, 0.66, max_extension, defaults)?;
            self.plain_wheel_beam(axis1, outer, tyre_spring, tyre_damp, defaults)?;
            self.plain_wheel_beam(axis0, inner, tyre_spring, tyre_damp, defaults)?;

            let next_outer = ring[((i + 1) % r) * 2];
            let next_inner = ring[((i + 1) % r) * 2 + 1];
            self.plain_wheel_beam(outer, inner, rim_spring, rim_damp, defaults)?;
            self.plain_wheel_beam(outer, next_outer, rim_spring, rim_damp, defaults)?;
            self.plain_wheel_beam(inner, next_inner, rim_spring, rim_damp, defaults)?;
            self.plain_wheel_beam(inner, next_outer, rim_spring, rim_damp, defaults)?;

            if let Some((node, side0)) = rigidity {
                let target = if side0 { outer } else { inner };
                let id = self.plain_wheel_beam(node, target, tyre_spring, tyre_damp, defaults)?;
                self.beams[id.idx()].kind = BeamKind::Virtual;
            }
        }
        Ok(())
    }

    fn process_wheel(&mut self, d: &WheelDef) -> Result<(), SoftbodyError> {
        let Some((axis0, axis1)) = self.fetch_axis_nodes(d.nodes, "wheels") else {
            return Ok(());
        };
        let Some(arm) = self.resolve_node(d.reference_arm_node, "wheels") else {
            return Ok(());
        };
        let wheel_id = self.build_wheel_object_and_nodes(
            d.num_rays,
            axis0,
            axis1,
            arm,
            d.radius,
            d.propulsion,
            d.braking,
            d.mass,
            -1.0, // width comes from the axis length
            &d.node_defaults,
        )?;
        let ring = self.wheels[wheel_id.idx()].nodes.clone();
        self.build_wheel_beams(
            d.num_rays,
            &ring,
            axis0,
            axis1,
            d.springiness,
            d.damping,
            d.springiness,
            d.damping,
            d.rigidity_node,
            0.0,
            &d.defaults,
        )
    }

    fn process_meshwheel(&mut self, d: &MeshWheelDef) -> Result<(), SoftbodyError> {
        let Some((axis0, axis1)) = self.fetch_axis_nodes(d.nodes, "meshwheels") else {
            return Ok(());
        };
        let Some(arm) = self.resolve_node(d.reference_arm_node, "meshwheels") else {
            return Ok(());
        };
        let wheel_id = self.build_wheel_object_and_nodes(
            d.num_rays,
            axis0,
            axis1,
            arm,
            d.tyre_radius,
            d.propulsion,
            d.braking,
            d.mass,
            -1.0,
            &d.node_defaults,
        )?;
        self.wheels[wheel_id.idx()].rim_radius = d.rim_radius;
        let ring = self.wheels[wheel_id.idx()].nodes.clone();
        self.build_wheel_beams(
            d.num_rays,
            &ring,
            axis0,
            axis1,
            d.spring,
            d.damping,
            d.spring,
            d.damping,
            d.rigidity_node,
            0.0,
            &d.defaults,
        )
    }

    /// Rim or tyre beam of a dual-ring wheel. These beams break at the
    /// deformation threshold rather than the breaking threshold.
    fn add_wheel2_beam(
        &mut self,
        n1: NodeId,
        n2: NodeId,
        spring: Scalar,
        damp: Scalar,
        defaults: &BeamDefaults,
    ) -> Result<BeamId, SoftbodyError> {
        let id = self.add_beam(n1, n2, defaults)?;
        let beam = &mut self.beams[id.idx()];
        beam.strength = Self::deformation_threshold(defaults);
        beam.spring = spring;
        beam.damp = damp;
        self.calc_beam_length(id);
        Ok(id)
    }

    fn process_wheel2(&mut self, d: &Wheel2Def) -> Result<(), SoftbodyError> {
        let Some((axis0, axis1)) = self.fetch_axis_nodes(d.nodes, "wheels2") else {
            return Ok(());
        };
        let Some(arm) = self.resolve_node(d.reference_arm_node, "wheels2") else {
            return Ok(());
        };

        let mut rigidity = None;
        if let Some(index) = d.rigidity_node {
            if let Some(node) = self.resolve_node(index, "wheels2") {
                let d0 = (self.node_rel(node) - self.node_rel(axis0)).length();
                let d1 = (self.node_rel(node) - self.node_rel(axis1)).length();
                rigidity = Some((node, d0 < d1));
            }
        }

        let axis = self.node_rel(axis1) - self.node_rel(axis0);
        let width = axis.length();
        let axis = axis / width;
        let r = d.num_rays as usize;

        // Rim ring: both nodes of a ray share one angle.
        let rim_rotator = Quat::from_axis_angle(axis.into(), -2.0 * PI / d.num_rays as Scalar);
        let mut rim_ray = perpendicular(axis) * d.rim_radius;
        let rim_mass = d.mass / (4.0 * d.num_rays as Scalar);
        let mut rim_nodes = Vec::with_capacity(r * 2);
        for _ in 0..d.num_rays {
            let outer = self.wheel_node(self.node_rel(axis0) + rim_ray, rim_mass, &d.node_defaults)?;
            self.nodes[outer.idx()].rim_node = true;
            let inner = self.wheel_node(self.node_rel(axis1) + rim_ray, rim_mass, &d.node_defaults)?;
            self.nodes[inner.idx()].rim_node = true;
            rim_nodes.push(outer);
            rim_nodes.push(inner);
            rim_ray = rotate(rim_rotator, rim_ray);
        }

        // Tyre ring, offset half a rim step; the outer ring carries
        // two thirds of the tyre mass.
        let half_step = Quat::from_axis_angle(axis.into(), -PI / d.num_rays as Scalar);
        let mut tyre_ray = rotate(half_step, perpendicular(axis) * d.tyre_radius);
        let tyre_friction = width * WHEEL_FRICTION_COEF;
        let mut tyre_nodes = Vec::with_capacity(r * 2);
        for _ in 0..d.num_rays {
            let outer_mass = (0.67 * d.mass) / (2.0 * d.num_rays as Scalar);
            let inner_mass = (0.33 * d.mass) / (2.0 * d.num_rays as Scalar);
            let outer =
                self.wheel_node(self.node_rel(axis0) + tyre_ray, outer_mass, &d.node_defaults)?;
            let inner =
                self.wheel_node(self.node_rel(axis1) + tyre_ray, inner_mass, &d.node_defaults)?;
            for id in [outer, inner] {
                let node = &mut self.nodes[id.idx()];
                node.friction_coef = tyre_friction;
                node.volume_coef = d.node_defaults.surface;
                node.surface_coef = d.node_defaults.surface;
                node.contacter = true;
                node.tyre_node = true;
            }
            tyre_nodes.push(outer);
            tyre_nodes.push(inner);
            tyre_ray = rotate(rim_rotator, tyre_ray);
        }

        let (rim_k, rim_d) = (d.rim_springiness, d.rim_damping);
        let (tyre_k, tyre_d) = (d.tyre_springiness, d.tyre_damping);

        for i in 0..r {
            let rim_outer = rim_nodes[i * 2];
            let rim_inner = rim_nodes[i * 2 + 1];
            let rim_next_outer = rim_nodes[((i + 1) % r) * 2];
            let rim_next_inner = rim_nodes[((i + 1) % r) * 2 + 1];

            // Axis spokes; the short bound stiffens them near full
            // compression without a bump-stop interpolation.
            let id = self.add_wheel2_beam(axis0, rim_outer, rim_k, rim_d, &d.defaults)?;
            self.beams[id.idx()].short_bound = 0.66;
            let id = self.add_wheel2_beam(axis1, rim_inner, rim_k, rim_d, &d.defaults)?;
            self.beams[id.idx()].short_bound = 0.66;
            self.add_wheel2_beam(axis1, rim_outer, rim_k, rim_d, &d.defaults)?;
            self.add_wheel2_beam(axis0, rim_inner, rim_k, rim_d, &d.defaults)?;

            // Reinforcement, including a second outer spoke.
            self.add_wheel2_beam(axis0, rim_outer, rim_k, rim_d, &d.defaults)?;
            self.add_wheel2_beam(rim_outer, rim_inner, rim_k, rim_d, &d.defaults)?;
            self.add_wheel2_beam(rim_outer, rim_next_outer, rim_k, rim_d, &d.defaults)?;
            self.add_wheel2_beam(rim_inner, rim_next_inner, rim_k, rim_d, &d.defaults)?;
            self.add_wheel2_beam(rim_outer, rim_next_inner, rim_k, rim_d, &d.defaults)?;
            self.add_wheel2_beam(rim_inner, rim_next_outer, rim_k, rim_d, &d.defaults)?;

            if let Some((node, side0)) = rigidity {
                let target = if side0 { rim_outer } else { rim_inner };
                let id = self.add_wheel2_beam(node, target, rim_k, rim_d, &d.defaults)?;
                self.beams[id.idx()].kind = BeamKind::Virtual;
            }

            let tyre_outer = tyre_nodes[i * 2];
            let tyre_inner = tyre_nodes[i * 2 + 1];
            let tyre_next_outer = tyre_nodes[((i + 1) % r) * 2];
            let tyre_next_inner = tyre_nodes[((i + 1) % r) * 2 + 1];

            // Tyre band
            self.add_wheel2_beam(tyre_outer, tyre_next_outer, tyre_k, tyre_d, &d.defaults)?;
            self.add_wheel2_beam(tyre_outer, tyre_next_inner, tyre_k, tyre_d, &d.defaults)?;
            self.add_wheel2_beam(tyre_inner, tyre_next_outer, tyre_k, tyre_d, &d.defaults)?;
            self.add_wheel2_beam(tyre_inner, tyre_next_inner, tyre_k, tyre_d, &d.defaults)?;
            // Sidewalls
            self.add_wheel2_beam(tyre_outer, rim_outer, tyre_k, tyre_d, &d.defaults)?;
            self.add_wheel2_beam(tyre_outer, rim_next_outer, tyre_k, tyre_d, &d.defaults)?;
            self.add_wheel2_beam(tyre_inner, rim_inner, tyre_k, tyre_d, &d.defaults)?;
            self.add_wheel2_beam(tyre_inner, rim_next_inner, tyre_k, tyre_d, &d.defaults)?;
            // Crossed reinforcement
            self.add_wheel2_beam(tyre_outer, rim_inner, tyre_k, tyre_d, &d.defaults)?;
            self.add_wheel2_beam(tyre_outer, rim_next_inner, tyre_k, tyre_d, &d.defaults)?;
            self.add_wheel2_beam(tyre_inner, rim_outer, tyre_k, tyre_d, &d.defaults)?;
            self.add_wheel2_beam(tyre_inner, rim_next_outer, tyre_k, tyre_d, &d.defaults)?;
            // Backpressure
            self.add_wheel2_beam(axis0, tyre_outer, tyre_k, tyre_d, &d.defaults)?;
            self.add_wheel2_beam(axis1, tyre_inner, tyre_k, tyre_d, &d.defaults)?;
        }

        let near_attach = {
            let arm_pos = self.node_rel(arm);
            let d0 = (self.node_rel(axis0) - arm_pos).length();
            let d1 = (self.node_rel(axis1) - arm_pos).length();
            if d0 < d1 { axis0 } else { axis1 }
        };
        let wheel_id = WheelId(self.wheels.len() as u32);
        if d.propulsion.is_propelled() {
            self.propelled_wheels.push(wheel_id);
        }
        self.wheels.push(Wheel {
            axis0,
            axis1,
            arm_node: arm,
            near_attach,
            radius: d.tyre_radius,
            rim_radius: d.rim_radius,
            width,
            propelled: d.propulsion.is_propelled(),
            braking: self.translate_braking(d.braking),
            nodes: tyre_nodes,
            rim_nodes,
            mass: 0.0,
        });
        Ok(())
    }

    fn process_flexbodywheel(&mut self, d: &FlexBodyWheelDef) -> Result<(), SoftbodyError> {
        let Some((axis0, axis1)) = self.fetch_axis_nodes(d.nodes, "flexbodywheels") else {
            return Ok(());
        };
        let Some(arm) = self.resolve_node(d.reference_arm_node, "flexbodywheels") else {
            return Ok(());
        };

        let mut rigidity = None;
        if let Some(index) = d.rigidity_node {
            if let Some(node) = self.resolve_node(index, "flexbodywheels") {
                let d0 = (self.node_rel(node) - self.node_rel(axis0)).length();
                let d1 = (self.node_rel(node) - self.node_rel(axis1)).length();
                rigidity = Some((node, d0 < d1));
            }
        }

        let axis = self.node_rel(axis1) - self.node_rel(axis0);
        let width = axis.length();
        let axis = axis / width;
        let r = d.num_rays as usize;
        let node_mass = d.mass / (4.0 * d.num_rays as Scalar);

        // Both rings use the same half-step rotator; the tyre ring is
        // advanced one extra step so its rays interleave with the rim's.
        let rotator = Quat::from_axis_angle(axis.into(), -PI / d.num_rays as Scalar);

        let mut rim_ray = perpendicular(axis) * d.rim_radius;
        let mut rim_nodes = Vec::with_capacity(r * 2);
        for _ in 0..d.num_rays {
            let outer = self.wheel_node(self.node_rel(axis0) + rim_ray, node_mass, &d.node_defaults)?;
            rim_ray = rotate(rotator, rim_ray);
            self.nodes[outer.idx()].rim_node = true;
            let inner = self.wheel_node(self.node_rel(axis1) + rim_ray, node_mass, &d.node_defaults)?;
            rim_ray = rotate(rotator, rim_ray);
            self.nodes[inner.idx()].rim_node = true;
            rim_nodes.push(outer);
            rim_nodes.push(inner);
        }

        let mut tyre_ray = rotate(rotator, perpendicular(axis) * d.tyre_radius);
        let mut tyre_nodes = Vec::with_capacity(r * 2);
        for _ in 0..d.num_rays {
            let outer =
                self.wheel_node(self.node_rel(axis0) + tyre_ray, node_mass, &d.node_defaults)?;
            tyre_ray = rotate(rotator, tyre_ray);
            let inner =
                self.wheel_node(self.node_rel(axis1) + tyre_ray, node_mass, &d.node_defaults)?;
            tyre_ray = rotate(rotator, tyre_ray);
            for id in [outer, inner] {
                let node = &mut self.nodes[id.idx()];
                node.contacter = true;
                node.tyre_node = true;
            }
            tyre_nodes.push(outer);
            tyre_nodes.push(inner);
        }

        let rim_k = d.rim_springiness;
        let rim_d = d.rim_damping;
        let tyre_k = d.tyre_springiness;
        let tyre_d = d.tyre_damping;

        // Rim lattice, same shape as a single-ring wheel but unbounded.
        for i in 0..r {
            let rim_outer = rim_nodes[i * 2];
            let rim_inner = rim_nodes[i * 2 + 1];
            let rim_next_outer = rim_nodes[((i + 1) % r) * 2];
            let rim_next_inner = rim_nodes[((i + 1) % r) * 2 + 1];

            self.plain_wheel_beam(axis0, rim_outer, rim_k, rim_d, &d.defaults)?;
            self.plain_wheel_beam(axis1, rim_inner, rim_k, rim_d, &d.defaults)?;
            self.plain_wheel_beam(axis1, rim_outer, rim_k, rim_d, &d.defaults)?;
            self.plain_wheel_beam(axis0, rim_inner, rim_k, rim_d, &d.defaults)?;

            self.plain_wheel_beam(rim_outer, rim_inner, rim_k, rim_d, &d.defaults)?;
            self.plain_wheel_beam(rim_outer, rim_next_outer, rim_k, rim_d, &d.defaults)?;
            self.plain_wheel_beam(rim_inner, rim_next_inner, rim_k, rim_d, &d.defaults)?;
            self.plain_wheel_beam(rim_inner, rim_next_outer, rim_k, rim_d, &d.defaults)?;
        }

        // Rim-to-tyre web and tyre tread. The tyre ring is indexed
        // circularly; ray 0 wraps backwards to the last ray.
        let mut rigidity_outer = rigidity.map(|(_, side0)| side0).unwrap_or(false);
        for i in 0..r {
            let rim_outer = rim_nodes[i * 2];
            let rim_inner = rim_nodes[i * 2 + 1];
            let tyre_outer = tyre_nodes[i * 2];
            let tyre_inner = tyre_nodes[i * 2 + 1];
            let prev_tyre_inner = if i == 0 { tyre_nodes[r * 2 - 1] } else { tyre_nodes[i * 2 - 1] };
            let prev_tyre_outer = if i == 0 { tyre_nodes[r * 2 - 2] } else { tyre_nodes[i * 2 - 2] };

            self.plain_wheel_beam(rim_outer, tyre_outer, tyre_k / 2.0, tyre_d, &d.defaults)?;
            self.plain_wheel_beam(rim_outer, prev_tyre_inner, tyre_k / 2.0, tyre_d, &d.defaults)?;
            self.plain_wheel_beam(rim_outer, prev_tyre_outer, tyre_k / 2.0, tyre_d, &d.defaults)?;

            self.plain_wheel_beam(rim_inner, tyre_outer, tyre_k / 2.0, tyre_d, &d.defaults)?;
            self.plain_wheel_beam(rim_inner, tyre_inner, tyre_k / 2.0, tyre_d, &d.defaults)?;
            self.plain_wheel_beam(rim_inner, prev_tyre_inner, tyre_k / 2.0, tyre_d, &d.defaults)?;

            let tyre_next_outer = tyre_nodes[((i + 1) % r) * 2];
            let tyre_next_inner = tyre_nodes[((i + 1) % r) * 2 + 1];
            self.plain_wheel_beam(tyre_outer, tyre_inner, DEFAULT_SPRING, DEFAULT_DAMP, &d.defaults)?;
            self.plain_wheel_beam(tyre_outer, tyre_next_outer, DEFAULT_SPRING, DEFAULT_DAMP, &d.defaults)?;
            self.plain_wheel_beam(tyre_inner, tyre_next_inner, DEFAULT_SPRING, DEFAULT_DAMP, &d.defaults)?;
            self.plain_wheel_beam(tyre_inner, tyre_next_outer, DEFAULT_SPRING, DEFAULT_DAMP, &d.defaults)?;

            if let Some((node, _)) = rigidity {
                // only the first ray can attach to the outer ring
                let target = if rigidity_outer { tyre_outer } else { tyre_inner };
                rigidity_outer = false;
                let id = self.plain_wheel_beam(node, target, tyre_k, tyre_d, &d.defaults)?;
                self.beams[id.idx()].kind = BeamKind::Virtual;
            }
        }

        // Anti-collapse supports: stiffen just before the tread reaches
        // the rim, with a 5% margin.
        let support_short_bound = 1.0 - (d.rim_radius / d.tyre_radius) * 0.95;
        for i in 0..r {
            let tyre_outer = tyre_nodes[i * 2];
            let tyre_inner = tyre_nodes[i * 2 + 1];
            self.add_wheel_beam(
                axis0, tyre_outer, tyre_k / 2.0, tyre_d, support_short_bound, 0.0, &d.defaults,
            )?;
            self.add_wheel_beam(
                axis1, tyre_inner, tyre_k / 2.0, tyre_d, support_short_bound, 0.0, &d.defaults,
            )?;
        }

        let near_attach = {
            let arm_pos = self.node_rel(arm);
            let d0 = (self.node_rel(axis0) - arm_pos).length();
            let d1 = (self.node_rel(axis1) - arm_pos).length();
            if d0 < d1 { axis0 } else { axis1 }
        };
        let wheel_id = WheelId(self.wheels.len() as u32);
        if d.propulsion.is_propelled() {
            self.propelled_wheels.push(wheel_id);
        }
        self.wheels.push(Wheel {
            axis0,
            axis1,
            arm_node: arm,
            near_attach,
            radius: d.tyre_radius,
            rim_radius: d.rim_radius,
            width,
            propelled: d.propulsion.is_propelled(),
            braking: self.translate_braking(d.braking),
            nodes: tyre_nodes,
            rim_nodes,
            mass: 0.0,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::{Rig, RigBuilder};
    use crate::defs::*;
    use rigphys_core::vec3;

    fn chassis_def() -> RigDef {
        RigDef {
            name: "wheeltest".into(),
            dry_mass: 2000.0,
            nodes: vec![
                // axis pair along Z, arm ahead of the first
                NodeDef { position: vec3(0.0, 1.0, -0.3), ..Default::default() },
                NodeDef { position: vec3(0.0, 1.0, 0.3), ..Default::default() },
                NodeDef { position: vec3(1.0, 1.0, -0.3), ..Default::default() },
            ],
            ..Default::default()
        }
    }

    fn build(def: &RigDef) -> Rig {
        RigBuilder::new(def).build().unwrap()
    }

    #[test]
    fn wheel_node_and_beam_counts() {
        let mut def = chassis_def();
        def.wheels.push(WheelDef {
            radius: 0.5,
            num_rays: 8,
            nodes: [0, 1],
            reference_arm_node: 2,
            mass: 160.0,
            springiness: 600_000.0,
            damping: 4_000.0,
            propulsion: WheelPropulsion::Forward,
            ..Default::default()
        });
        let rig = build(&def);
        assert_eq!(rig.nodes.len(), 3 + 16);
        assert_eq!(rig.beams.len(), 8 * 8);
        assert_eq!(rig.wheels.len(), 1);
        let wheel = &rig.wheels[0];
        assert_eq!(wheel.nodes.len(), 16);
        assert!(wheel.rim_nodes.is_empty());
        assert!(wheel.propelled);
        assert_eq!(rig.propelled_wheels.len(), 1);
        // per-node mass is the wheel mass split over the ring
        assert_eq!(rig.nodes[3].mass, 10.0);
        assert!((wheel.mass - 160.0).abs() < 1e-3);
        // width falls back to the axis length
        assert!((wheel.width - 0.6).abs() < 1e-5);
    }

    #[test]
    fn wheel_rigidity_node_adds_virtual_beams() {
        let mut def = chassis_def();
        def.wheels.push(WheelDef {
            radius: 0.5,
            num_rays: 6,
            nodes: [0, 1],
            rigidity_node: Some(2),
            reference_arm_node: 2,
            mass: 120.0,
            springiness: 600_000.0,
            damping: 4_000.0,
            ..Default::default()
        });
        let rig = build(&def);
        assert_eq!(rig.beams.len(), 6 * 9);
        let virtuals = rig
            .beams
            .iter()
            .filter(|b| b.kind == crate::types::BeamKind::Virtual)
            .count();
        assert_eq!(virtuals, 6);
    }

    #[test]
    fn wheel_axis_swapped_to_ascending_z() {
        let mut def = chassis_def();
        def.wheels.push(WheelDef {
            radius: 0.5,
            num_rays: 4,
            // declared backwards
            nodes: [1, 0],
            reference_arm_node: 2,
            mass: 80.0,
            springiness: 600_000.0,
            damping: 4_000.0,
            ..Default::default()
        });
        let rig = build(&def);
        let wheel = &rig.wheels[0];
        assert!(rig.nodes[wheel.axis0.idx()].rel_pos.z < rig.nodes[wheel.axis1.idx()].rel_pos.z);
        // the arm sits next to the first axis node
        assert_eq!(wheel.near_attach, wheel.axis0);
    }

    #[test]
    fn wheel_ring_sits_on_the_radius() {
        let mut def = chassis_def();
        def.wheels.push(WheelDef {
            radius: 0.5,
            num_rays: 8,
            nodes: [0, 1],
            reference_arm_node: 2,
            mass: 160.0,
            springiness: 600_000.0,
            damping: 4_000.0,
            ..Default::default()
        });
        let rig = build(&def);
        let wheel = &rig.wheels[0];
        let axis0 = rig.nodes[wheel.axis0.idx()].rel_pos;
        let axis1 = rig.nodes[wheel.axis1.idx()].rel_pos;
        for (i, &id) in wheel.nodes.iter().enumerate() {
            let center = if i % 2 == 0 { axis0 } else { axis1 };
            let node = &rig.nodes[id.idx()];
            assert!(((node.rel_pos - center).length() - 0.5).abs() < 1e-4);
            assert!(node.contacter);
            assert!(node.tyre_node);
        }
    }

    #[test]
    fn meshwheel_records_rim_radius() {
        let mut def = chassis_def();
        def.meshwheels.push(MeshWheelDef {
            rim_radius: 0.3,
            tyre_radius: 0.6,
            num_rays: 6,
            nodes: [0, 1],
            reference_arm_node: 2,
            mass: 120.0,
            spring: 500_000.0,
            damping: 3_000.0,
            ..Default::default()
        });
        let rig = build(&def);
        assert_eq!(rig.wheels[0].rim_radius, 0.3);
        assert_eq!(rig.wheels[0].radius, 0.6);
        assert_eq!(rig.beams.len(), 6 * 8);
    }

    #[test]
    fn wheel2_counts_and_masses() {
        let mut def = chassis_def();
        def.wheels2.push(Wheel2Def {
            rim_radius: 0.3,
            tyre_radius: 0.6,
            num_rays: 6,
            nodes: [0, 1],
            reference_arm_node: 2,
            mass: 240.0,
            rim_springiness: 800_000.0,
            rim_damping: 4_000.0,
            tyre_springiness: 300_000.0,
            tyre_damping: 2_500.0,
            ..Default::default()
        });
        let rig = build(&def);
        assert_eq!(rig.nodes.len(), 3 + 24);
        assert_eq!(rig.beams.len(), 6 * 24);
        let wheel = &rig.wheels[0];
        assert_eq!(wheel.rim_nodes.len(), 12);
        assert_eq!(wheel.nodes.len(), 12);
        // rim node: m/(4r); tyre outer 0.67m/(2r), inner 0.33m/(2r)
        assert!((rig.nodes[wheel.rim_nodes[0].idx()].mass - 10.0).abs() < 1e-4);
        assert!((rig.nodes[wheel.nodes[0].idx()].mass - 13.4).abs() < 1e-4);
        assert!((rig.nodes[wheel.nodes[1].idx()].mass - 6.6).abs() < 1e-4);
        // tyre friction scales with the wheel width
        let friction = rig.nodes[wheel.nodes[0].idx()].friction_coef;
        assert!((friction - 0.6 * 2.0).abs() < 1e-4);
        assert!(rig.nodes[wheel.rim_nodes[0].idx()].rim_node);
        assert!(!rig.nodes[wheel.rim_nodes[0].idx()].contacter);
    }

    #[test]
    fn flexbodywheel_counts() {
        let mut def = chassis_def();
        def.flexbodywheels.push(FlexBodyWheelDef {
            rim_radius: 0.3,
            tyre_radius: 0.6,
            num_rays: 6,
            nodes: [0, 1],
            rigidity_node: Some(2),
            reference_arm_node: 2,
            mass: 240.0,
            rim_springiness: 800_000.0,
            rim_damping: 4_000.0,
            tyre_springiness: 300_000.0,
            tyre_damping: 2_500.0,
            ..Default::default()
        });
        let rig = build(&def);
        assert_eq!(rig.nodes.len(), 3 + 24);
        assert_eq!(rig.beams.len(), 6 * 21);
        // every ring node carries the same quarter share
        let wheel = &rig.wheels[0];
        for &id in wheel.rim_nodes.iter().chain(&wheel.nodes) {
            assert!((rig.nodes[id.idx()].mass - 10.0).abs() < 1e-4);
        }
        // anti-collapse supports engage before the tread hits the rim
        let expected = 1.0 - (0.3 / 0.6) * 0.95;
        let support = rig
            .beams
            .iter()
            .filter(|b| b.bounded == crate::types::BoundedMode::Shock1)
            .find(|b| (b.short_bound - expected).abs() < 1e-5);
        assert!(support.is_some());
    }
}
