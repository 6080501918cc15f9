//! Rig construction. One builder consumes one definition and produces a
//! `Rig`; reference mistakes in the definition skip the declaration and
//! are recorded in the message log, while capacity overflow and
//! degenerate topology abort the build.

use rigphys_core::{BeamId, NodeId, Scalar, ShockId, Vec3, WheelId};

use crate::arena::{Arena, MemoryEstimate};
use crate::constants::*;
use crate::defs::*;
use crate::error::SoftbodyError;
use crate::messages::MessageLog;
use crate::types::*;

const INIT_NODE_MASS: Scalar = 10.0;
const EXTRA_BUOYANCY: Scalar = 10_000.0;

/// Built vehicle, ready for per-tick force accumulation.
#[derive(Debug)]
pub struct Rig {
    pub name: String,
    pub dry_mass: Scalar,
    pub nodes: Arena<Node>,
    pub beams: Arena<Beam>,
    pub shocks: Arena<Shock>,
    pub wheels: Vec<Wheel>,
    pub rotators: Vec<Rotator>,
    pub hydros: Vec<HydroBeam>,
    /// Indexed by command key; slot 0 is unused.
    pub command_keys: Vec<CommandKey>,
    pub ties: Vec<Tie>,
    pub cinecam_nodes: Vec<NodeId>,
    /// Propelled wheels in construction order, consumed by the
    /// drivetrain wiring.
    pub propelled_wheels: Vec<WheelId>,
    pub log: MessageLog,
}

pub struct RigBuilder<'d> {
    pub(crate) def: &'d RigDef,
    pub(crate) nodes: Arena<Node>,
    pub(crate) beams: Arena<Beam>,
    pub(crate) shocks: Arena<Shock>,
    pub(crate) wheels: Vec<Wheel>,
    pub(crate) rotators: Vec<Rotator>,
    pub(crate) hydros: Vec<HydroBeam>,
    pub(crate) command_keys: Vec<CommandKey>,
    pub(crate) ties: Vec<Tie>,
    pub(crate) cinecam_nodes: Vec<NodeId>,
    pub(crate) propelled_wheels: Vec<WheelId>,
    pub(crate) log: MessageLog,
}

impl<'d> RigBuilder<'d> {
    pub fn new(def: &'d RigDef) -> Self {
        let est = MemoryEstimate::scan(def);
        Self {
            def,
            nodes: Arena::with_capacity("node", est.nodes),
            beams: Arena::with_capacity("beam", est.beams),
            shocks: Arena::with_capacity("shock", est.shocks),
            wheels: Vec::with_capacity(est.wheels),
            rotators: Vec::with_capacity(est.rotators),
            hydros: Vec::with_capacity(def.hydros.len()),
            command_keys: vec![CommandKey::default(); MAX_COMMANDS as usize + 1],
            ties: Vec::with_capacity(def.ties.len()),
            cinecam_nodes: Vec::with_capacity(def.cinecams.len()),
            propelled_wheels: Vec::new(),
            log: MessageLog::new(),
        }
    }

    pub fn build(mut self) -> Result<Rig, SoftbodyError> {
        self.process_nodes()?;
        self.process_beams()?;
        self.process_shocks()?;
        self.process_shocks2()?;
        self.process_shocks3()?;
        self.process_triggers()?;
        self.process_hydros()?;
        self.process_commands()?;
        self.process_ropes()?;
        self.process_ties()?;
        self.process_contacters();
        self.process_cinecams()?;
        self.process_wheels()?;
        self.process_rotators();
        self.finalize_wheel_masses();
        Ok(Rig {
            name: self.def.name.clone(),
            dry_mass: self.def.dry_mass,
            nodes: self.nodes,
            beams: self.beams,
            shocks: self.shocks,
            wheels: self.wheels,
            rotators: self.rotators,
            hydros: self.hydros,
            command_keys: self.command_keys,
            ties: self.ties,
            cinecam_nodes: self.cinecam_nodes,
            propelled_wheels: self.propelled_wheels,
            log: self.log,
        })
    }

    // ----- nodes -----

    pub(crate) fn init_node(&self, position: Vec3, defaults: &NodeDefaults) -> Node {
        Node {
            rel_pos: position,
            abs_pos: position,
            velocity: Vec3::ZERO,
            forces: Vec3::ZERO,
            mass: INIT_NODE_MASS,
            buoyancy: self.def.dry_mass / 15.0,
            friction_coef: defaults.friction,
            volume_coef: defaults.volume,
            surface_coef: defaults.surface,
            contacter: false,
            contactable: false,
            no_ground_contact: false,
            rim_node: false,
            tyre_node: false,
            hook: false,
            loaded_mass: false,
            override_mass: None,
            lockgroup: None,
        }
    }

    pub(crate) fn push_node(&mut self, node: Node) -> Result<NodeId, SoftbodyError> {
        Ok(NodeId(self.nodes.try_push(node)? as u32))
    }

    fn process_nodes(&mut self) -> Result<(), SoftbodyError> {
        let def = self.def;
        for d in &def.nodes {
            let mut node = self.init_node(d.position, &d.defaults);
            if d.extra_buoyancy {
                node.buoyancy = EXTRA_BUOYANCY;
            }
            node.hook = d.hook;
            node.no_ground_contact = d.no_ground_contact;
            if d.defaults.load_weight >= 0.0 {
                node.loaded_mass = true;
                node.override_mass = Some(d.defaults.load_weight);
            }
            if d.has_load_weight {
                node.loaded_mass = true;
            }
            if let Some(weight) = d.load_weight_override {
                node.loaded_mass = true;
                node.override_mass = Some(weight);
            }
            self.push_node(node)?;
        }
        Ok(())
    }

    /// Resolve a definition node reference. Generated nodes are not
    /// addressable from definitions, so the valid range is the node
    /// section alone.
    pub(crate) fn resolve_node(&mut self, index: u32, section: &str) -> Option<NodeId> {
        if (index as usize) < self.def.nodes.len() {
            Some(NodeId(index))
        } else {
            self.log.error(format!(
                "{section}: node reference {index} out of range ({} nodes defined)",
                self.def.nodes.len()
            ));
            None
        }
    }

    #[inline]
    pub(crate) fn node_rel(&self, id: NodeId) -> Vec3 { self.nodes[id.idx()].rel_pos }

    #[inline]
    pub(crate) fn node_abs(&self, id: NodeId) -> Vec3 { self.nodes[id.idx()].abs_pos }

    // ----- beams -----

    /// Deformation threshold precedence: preset value (floored at
    /// `BEAM_DEFORM` unless advanced deformation is enabled), then the
    /// creak floor (zeroed by a non-negative user plastic coefficient),
    /// then the preset scale multiplier.
    pub(crate) fn deformation_threshold(defaults: &BeamDefaults) -> Scalar {
        let mut deform = BEAM_DEFORM;
        let mut creak = BEAM_CREAK_DEFAULT;
        if defaults.user_defined {
            deform = defaults.deformation_threshold;
            if !defaults.advanced_deformation && deform < BEAM_DEFORM {
                deform = BEAM_DEFORM;
            }
            if defaults.plastic_coef_user_defined && defaults.plastic_coef >= 0.0 {
                creak = 0.0;
            }
        }
        if deform < creak {
            deform = creak;
        }
        deform * defaults.scale.deformation_threshold
    }

    pub(crate) fn add_beam(
        &mut self,
        p1: NodeId,
        p2: NodeId,
        defaults: &BeamDefaults,
    ) -> Result<BeamId, SoftbodyError> {
        if p1 == p2 {
            return Err(SoftbodyError::DegenerateBeam(p1));
        }
        let threshold = Self::deformation_threshold(defaults);
        let beam = Beam {
            p1,
            p2,
            length: 0.0,
            ref_length: 0.0,
            spring: 0.0,
            damp: 0.0,
            strength: defaults.scaled_breaking_threshold(),
            plastic_coef: defaults.plastic_coef,
            min_max_pos_neg_stress: threshold,
            max_pos_stress: threshold,
            max_neg_stress: -threshold,
            bounded: BoundedMode::Free,
            kind: BeamKind::Normal,
            short_bound: 0.0,
            long_bound: 0.0,
            shock: None,
            stress: 0.0,
            broken: false,
            disabled: false,
        };
        Ok(BeamId(self.beams.try_push(beam)? as u32))
    }

    pub(crate) fn calc_beam_length(&mut self, id: BeamId) {
        let beam = &self.beams[id.idx()];
        let length = (self.nodes[beam.p1.idx()].abs_pos - self.nodes[beam.p2.idx()].abs_pos)
            .length();
        let beam = &mut self.beams[id.idx()];
        beam.length = length;
        beam.ref_length = length;
    }

    fn process_beams(&mut self) -> Result<(), SoftbodyError> {
        let def = self.def;
        for d in &def.beams {
            let (Some(n1), Some(n2)) = (
                self.resolve_node(d.nodes[0], "beams"),
                self.resolve_node(d.nodes[1], "beams"),
            ) else {
                continue;
            };
            let id = self.add_beam(n1, n2, &d.defaults)?;
            let beam = &mut self.beams[id.idx()];
            beam.spring = d.defaults.scaled_spring();
            beam.damp = d.defaults.scaled_damp();
            if d.rope {
                beam.bounded = BoundedMode::Rope;
            }
            if d.support {
                beam.bounded = BoundedMode::Support;
                // zero long bound means "use SUPPORT_BEAM_LIMIT_DEFAULT"
                beam.long_bound = d.extension_break_limit.unwrap_or(0.0);
            }
            self.calc_beam_length(id);
        }
        Ok(())
    }

    // ----- shocks -----

    fn push_shock(&mut self, shock: Shock) -> Result<ShockId, SoftbodyError> {
        Ok(ShockId(self.shocks.try_push(shock)? as u32))
    }

    fn process_shocks(&mut self) -> Result<(), SoftbodyError> {
        let def = self.def;
        for d in &def.shocks {
            let (Some(n1), Some(n2)) = (
                self.resolve_node(d.nodes[0], "shocks"),
                self.resolve_node(d.nodes[1], "shocks"),
            ) else {
                continue;
            };
            let id = self.add_beam(n1, n2, &d.defaults)?;
            self.calc_beam_length(id);

            let mut short_bound = d.short_bound;
            let mut long_bound = d.long_bound;
            let beam_length = self.beams[id.idx()].length;
            if d.metric {
                short_bound /= beam_length;
                long_bound /= beam_length;
            }

            let shock = self.push_shock(Shock {
                beam: id,
                kind: ShockKind::Shock1 {
                    left_active: d.left_active,
                    right_active: d.right_active,
                },
                spring_in: d.spring_rate,
                damp_in: d.damping,
                spring_out: d.spring_rate,
                damp_out: d.damping,
                sbd_spring: d.defaults.scaled_spring(),
                sbd_damp: d.defaults.scaled_damp(),
            })?;

            let beam = &mut self.beams[id.idx()];
            beam.kind = BeamKind::Hydro;
            beam.bounded = BoundedMode::Shock1;
            beam.spring = d.spring_rate;
            beam.damp = d.damping;
            beam.strength = d.defaults.scaled_breaking_threshold() * 4.0;
            beam.short_bound = short_bound;
            beam.long_bound = long_bound;
            beam.length *= d.precompression;
            beam.ref_length *= d.precompression;
            beam.shock = Some(shock);
        }
        Ok(())
    }

    /// Convert short/long bounds to fractions of the beam length,
    /// honoring the metric and absolute-metric declaration options.
    fn shock_bounds(
        &mut self,
        short_in: Scalar,
        long_in: Scalar,
        metric: bool,
        absolute_metric: bool,
        beam_length: Scalar,
        section: &str,
    ) -> (Scalar, Scalar) {
        let mut short_bound = short_in;
        let mut long_bound = long_in;
        if metric {
            short_bound /= beam_length;
            long_bound /= beam_length;
        } else if absolute_metric {
            short_bound = (beam_length - short_bound) / beam_length;
            long_bound = (long_bound - beam_length) / beam_length;
            if long_bound < 0.0 {
                self.log.warning(format!(
                    "{section}: absolute longbound shorter than beam, using beam length"
                ));
                long_bound = 0.0;
            }
            if short_bound > 1.0 {
                self.log.warning(format!(
                    "{section}: absolute shortbound longer than beam, using beam length"
                ));
                short_bound = 1.0;
            }
        }
        (short_bound, long_bound)
    }

    fn process_shocks2(&mut self) -> Result<(), SoftbodyError> {
        let def = self.def;
        for d in &def.shocks2 {
            let (Some(n1), Some(n2)) = (
                self.resolve_node(d.nodes[0], "shocks2"),
                self.resolve_node(d.nodes[1], "shocks2"),
            ) else {
                continue;
            };
            let id = self.add_beam(n1, n2, &d.defaults)?;
            self.calc_beam_length(id);
            let beam_length = self.beams[id.idx()].length;
            let (short_bound, long_bound) = self.shock_bounds(
                d.short_bound,
                d.long_bound,
                d.metric,
                d.absolute_metric,
                beam_length,
                "shocks2",
            );

            let shock = self.push_shock(Shock {
                beam: id,
                kind: ShockKind::Shock2 {
                    soft_bump: d.soft_bump,
                    spring_prog_in: d.spring_prog_in,
                    damp_prog_in: d.damp_prog_in,
                    spring_prog_out: d.spring_prog_out,
                    damp_prog_out: d.damp_prog_out,
                },
                spring_in: d.spring_in,
                damp_in: d.damp_in,
                spring_out: d.spring_out,
                damp_out: d.damp_out,
                sbd_spring: d.defaults.scaled_spring(),
                sbd_damp: d.defaults.scaled_damp(),
            })?;

            let beam = &mut self.beams[id.idx()];
            beam.kind = BeamKind::Hydro;
            beam.bounded = BoundedMode::Shock2;
            beam.spring = d.spring_in;
            beam.damp = d.damp_in;
            beam.strength = d.defaults.scaled_breaking_threshold();
            beam.short_bound = short_bound;
            beam.long_bound = long_bound;
            beam.length *= d.precompression;
            beam.ref_length = beam.length;
            beam.shock = Some(shock);
        }
        Ok(())
    }

    fn process_shocks3(&mut self) -> Result<(), SoftbodyError> {
        let def = self.def;
        for d in &def.shocks3 {
            let (Some(n1), Some(n2)) = (
                self.resolve_node(d.nodes[0], "shocks3"),
                self.resolve_node(d.nodes[1], "shocks3"),
            ) else {
                continue;
            };
            let id = self.add_beam(n1, n2, &d.defaults)?;
            self.calc_beam_length(id);
            let beam_length = self.beams[id.idx()].length;
            let (short_bound, long_bound) = self.shock_bounds(
                d.short_bound,
                d.long_bound,
                d.metric,
                d.absolute_metric,
                beam_length,
                "shocks3",
            );

            let shock = self.push_shock(Shock {
                beam: id,
                kind: ShockKind::Shock3 {
                    split_in: d.split_vel_in,
                    damp_slow_in: d.damp_in_slow,
                    damp_fast_in: d.damp_in_fast,
                    split_out: d.split_vel_out,
                    damp_slow_out: d.damp_out_slow,
                    damp_fast_out: d.damp_out_fast,
                },
                spring_in: d.spring_in,
                damp_in: d.damp_in,
                spring_out: d.spring_out,
                damp_out: d.damp_out,
                sbd_spring: d.defaults.scaled_spring(),
                sbd_damp: d.defaults.scaled_damp(),
            })?;

            let beam = &mut self.beams[id.idx()];
            beam.kind = BeamKind::Hydro;
            beam.bounded = BoundedMode::Shock3;
            beam.spring = d.spring_in;
            beam.damp = d.damp_in;
            beam.strength = d.defaults.scaled_breaking_threshold();
            beam.short_bound = short_bound;
            beam.long_bound = long_bound;
            beam.length *= d.precompression;
            beam.ref_length = beam.length;
            beam.shock = Some(shock);
        }
        Ok(())
    }

    // ----- triggers -----

    fn process_triggers(&mut self) -> Result<(), SoftbodyError> {
        let def = self.def;
        for d in &def.triggers {
            let hook_toggle = d.hook_lock || d.hook_unlock;
            if !d.blocker && !d.inverted_blocker && !hook_toggle && !d.engine {
                let action = d.shortbound_action;
                if action < 1 || action > MAX_COMMANDS as i32 {
                    self.log.error(format!(
                        "triggers: invalid shortbound command key {action}, skipping"
                    ));
                    continue;
                }
            }
            if (d.blocker || d.inverted_blocker)
                && (d.shortbound_action < 0 || d.longbound_action < 0)
            {
                self.log.error(
                    "triggers: blocker requires non-negative trigger actions, skipping",
                );
                continue;
            }
            if d.engine && (d.blocker || d.inverted_blocker || hook_toggle || d.cmd_switch) {
                self.log.error(
                    "triggers: engine trigger can't combine with blocker/hook/switch, skipping",
                );
                continue;
            }

            let (Some(n1), Some(n2)) = (
                self.resolve_node(d.nodes[0], "triggers"),
                self.resolve_node(d.nodes[1], "triggers"),
            ) else {
                continue;
            };

            let mut short_limit = d.contraction_limit;
            let mut long_limit = d.expansion_limit;
            if d.command_style {
                // bounds given as command lengths rather than limits
                short_limit = (short_limit - 1.0).abs();
                long_limit -= 1.0;
            }

            let mut flags = TriggerFlags {
                blocker: d.blocker,
                inverted_blocker: d.inverted_blocker,
                cmd_switch: d.cmd_switch,
                cmd_blocker: false,
                hook_lock: d.hook_lock,
                hook_unlock: d.hook_unlock,
                continuous: d.continuous,
                engine: d.engine,
            };

            let cmd_short;
            let mut cmd_long = 0;
            if !d.blocker && !d.inverted_blocker {
                cmd_short = d.shortbound_action;
                if d.longbound_action != -1 || hook_toggle {
                    cmd_long = d.longbound_action;
                } else {
                    flags.cmd_blocker = true;
                }
            } else {
                cmd_short = d.shortbound_action;
                cmd_long = d.longbound_action;
            }

            let id = self.add_beam(n1, n2, &d.defaults)?;
            self.calc_beam_length(id);

            let shock = self.push_shock(Shock {
                beam: id,
                kind: ShockKind::Trigger(TriggerState {
                    flags,
                    cmd_short,
                    cmd_long,
                    boundary_timer: d.boundary_timer,
                    switch_state: 0.0,
                    enabled: !d.start_disabled,
                }),
                spring_in: 0.0,
                damp_in: 0.0,
                spring_out: 0.0,
                damp_out: 0.0,
                sbd_spring: d.defaults.scaled_spring(),
                sbd_damp: d.defaults.scaled_damp(),
            })?;

            let beam = &mut self.beams[id.idx()];
            beam.kind = BeamKind::Hydro;
            beam.bounded = BoundedMode::Trigger;
            beam.spring = 0.0;
            beam.damp = 0.0;
            beam.strength = d.defaults.scaled_breaking_threshold();
            beam.short_bound = short_limit;
            beam.long_bound = long_limit;
            beam.shock = Some(shock);
        }
        Ok(())
    }

    // ----- hydros -----

    pub(crate) fn resolve_inertia(&self, d: &InertiaDef) -> Option<InertiaSettings> {
        fn real_name(name: &str) -> &str {
            match name {
                "" | "/" | "-" => "",
                other => other,
            }
        }
        if d.start_delay != 0.0 && d.stop_delay != 0.0 {
            return Some(InertiaSettings {
                start_delay: d.start_delay,
                stop_delay: d.stop_delay,
                start_function: real_name(&d.start_function).to_owned(),
                stop_function: real_name(&d.stop_function).to_owned(),
            });
        }
        let defaults = &self.def.inertia_defaults;
        if defaults.start_delay > 0.0 || defaults.stop_delay > 0.0 {
            return Some(InertiaSettings {
                start_delay: defaults.start_delay,
                stop_delay: defaults.stop_delay,
                start_function: real_name(&defaults.start_function).to_owned(),
                stop_function: real_name(&defaults.stop_function).to_owned(),
            });
        }
        None
    }

    fn parse_hydro_flags(&mut self, options: &str) -> HydroFlags {
        let mut flags = HydroFlags::default();
        let mut invisible_only = !options.is_empty();
        for c in options.chars() {
            match c {
                'i' => {} // visual-only
                'n' => flags.dir = true,
                's' => flags.speed = true,
                'a' => flags.aileron = true,
                'r' => flags.rudder = true,
                'e' => flags.elevator = true,
                'u' => { flags.aileron = true; flags.elevator = true }
                'v' => { flags.rev_aileron = true; flags.rev_elevator = true }
                'x' => { flags.aileron = true; flags.rudder = true }
                'y' => { flags.rev_aileron = true; flags.rev_rudder = true }
                'g' => { flags.elevator = true; flags.rudder = true }
                'h' => { flags.rev_elevator = true; flags.rev_rudder = true }
                other => self.log.warning(format!("hydros: ignoring option '{other}'")),
            }
            if c != 'i' {
                invisible_only = false;
            }
        }
        // no options, or invisible alone, means a plain steering hydro
        if options.is_empty() || invisible_only {
            flags.dir = true;
        }
        flags
    }

    fn process_hydros(&mut self) -> Result<(), SoftbodyError> {
        let def = self.def;
        for d in &def.hydros {
            let (Some(n1), Some(n2)) = (
                self.resolve_node(d.nodes[0], "hydros"),
                self.resolve_node(d.nodes[1], "hydros"),
            ) else {
                continue;
            };
            let flags = self.parse_hydro_flags(&d.options);
            let id = self.add_beam(n1, n2, &d.defaults)?;
            let beam = &mut self.beams[id.idx()];
            beam.kind = BeamKind::Hydro;
            beam.spring = d.defaults.scaled_spring();
            beam.damp = d.defaults.scaled_damp();
            self.calc_beam_length(id);

            let ref_length = self.beams[id.idx()].ref_length;
            let inertia = self.resolve_inertia(&d.inertia);
            self.hydros.push(HydroBeam {
                beam: id,
                flags,
                speed: d.lengthening_factor,
                ref_length,
                inertia,
            });
        }
        Ok(())
    }

    // ----- commands -----

    fn valid_command_key(&mut self, key: u32, section: &str) -> bool {
        if key >= 1 && key <= MAX_COMMANDS {
            true
        } else {
            self.log.error(format!("{section}: command key {key} out of range 1..={MAX_COMMANDS}"));
            false
        }
    }

    fn process_commands(&mut self) -> Result<(), SoftbodyError> {
        let def = self.def;
        for d in &def.commands {
            if !self.valid_command_key(d.contract_key, "commands")
                || !self.valid_command_key(d.extend_key, "commands")
            {
                continue;
            }
            let (Some(n1), Some(n2)) = (
                self.resolve_node(d.nodes[0], "commands"),
                self.resolve_node(d.nodes[1], "commands"),
            ) else {
                continue;
            };
            let id = self.add_beam(n1, n2, &d.defaults)?;
            let beam = &mut self.beams[id.idx()];
            beam.kind = BeamKind::Hydro;
            beam.spring = d.defaults.scaled_spring();
            beam.damp = d.defaults.scaled_damp();
            if d.rope {
                beam.bounded = BoundedMode::Rope;
            }
            self.calc_beam_length(id);

            let ref_length = self.beams[id.idx()].ref_length;
            let center_length = ref_length * (d.max_contraction + d.max_extension) / 2.0;
            let common = |is_contraction: bool, speed: Scalar, boundary: Scalar| CommandBeam {
                beam: id,
                is_contraction,
                speed,
                boundary,
                center_length,
                not_faster: d.not_faster,
                auto_center: d.auto_center,
                press_once: d.press_once,
                press_once_center: d.press_once_center,
                needs_engine: d.needs_engine,
                plays_sound: d.plays_sound,
                affect_engine: d.affect_engine,
            };
            let contract = common(true, d.shorten_rate, d.max_contraction);
            let extend = common(false, d.lengthen_rate, d.max_extension);
            let inertia = self.resolve_inertia(&d.inertia);
            for (key, cmd) in [(d.contract_key, contract), (d.extend_key, extend)] {
                let slot = &mut self.command_keys[key as usize];
                slot.beams.push(cmd);
                if !d.description.is_empty() {
                    slot.description = d.description.clone();
                }
                if slot.inertia.is_none() {
                    slot.inertia = inertia.clone();
                }
            }
        }
        Ok(())
    }

    // ----- ropes and ties -----

    fn process_ropes(&mut self) -> Result<(), SoftbodyError> {
        let def = self.def;
        for d in &def.ropes {
            let (Some(n1), Some(n2)) = (
                self.resolve_node(d.nodes[0], "ropes"),
                self.resolve_node(d.nodes[1], "ropes"),
            ) else {
                continue;
            };
            let id = self.add_beam(n1, n2, &d.defaults)?;
            let beam = &mut self.beams[id.idx()];
            beam.kind = BeamKind::Hydro;
            beam.bounded = BoundedMode::Rope;
            beam.spring = d.defaults.scaled_spring();
            beam.damp = d.defaults.scaled_damp();
            self.calc_beam_length(id);
        }
        Ok(())
    }

    fn process_ties(&mut self) -> Result<(), SoftbodyError> {
        let def = self.def;
        for d in &def.ties {
            let Some(root) = self.resolve_node(d.root_node, "ties") else {
                continue;
            };
            // the far end is retargeted at lock time; any distinct node
            // serves as the placeholder
            let placeholder = if root == NodeId(0) { NodeId(1) } else { NodeId(0) };
            if placeholder.idx() >= self.nodes.len() {
                self.log.error("ties: rig needs at least two nodes for a tie");
                continue;
            }
            let id = self.add_beam(root, placeholder, &d.defaults)?;
            let beam = &mut self.beams[id.idx()];
            beam.kind = BeamKind::Hydro;
            beam.bounded = BoundedMode::Rope;
            beam.spring = d.defaults.scaled_spring();
            beam.damp = d.defaults.scaled_damp();
            beam.length = d.max_reach_length;
            beam.ref_length = d.max_reach_length;
            beam.disabled = true;
            self.ties.push(Tie {
                group: d.group,
                tying: false,
                tied: false,
                beam: id,
                contract_speed: d.auto_shorten_rate,
                max_stress: d.max_stress,
                min_length: d.min_length,
                no_self_lock: d.no_self_lock,
            });
        }
        Ok(())
    }

    fn process_contacters(&mut self) {
        let def = self.def;
        for &index in &def.contacters {
            let Some(id) = self.resolve_node(index, "contacters") else {
                continue;
            };
            self.nodes[id.idx()].contacter = true;
        }
    }

    // ----- cinecams -----

    fn process_cinecams(&mut self) -> Result<(), SoftbodyError> {
        let def = self.def;
        for d in &def.cinecams {
            let mut anchors = Vec::with_capacity(8);
            let mut ok = true;
            for &index in &d.nodes {
                match self.resolve_node(index, "cinecam") {
                    Some(id) => anchors.push(id),
                    None => ok = false,
                }
            }
            if !ok {
                continue;
            }
            let mut node = self.init_node(d.position, &NodeDefaults::default());
            node.no_ground_contact = true;
            let camera = self.push_node(node)?;
            self.cinecam_nodes.push(camera);
            for anchor in anchors {
                let id = self.add_beam(camera, anchor, &BeamDefaults::default())?;
                let beam = &mut self.beams[id.idx()];
                beam.spring = d.spring;
                beam.damp = d.damping;
                self.calc_beam_length(id);
            }
        }
        Ok(())
    }

    // ----- rotators -----

    fn process_rotators(&mut self) {
        let def = self.def;
        for d in &def.rotators {
            self.add_rotator(d, ROTATOR_FORCE_DEFAULT, ROTATOR_TOLERANCE_DEFAULT, "");
        }
        for d in &def.rotators2 {
            self.add_rotator(&d.base, d.rotating_force, d.tolerance, &d.description);
        }
    }

    fn add_rotator(
        &mut self,
        d: &RotatorDef,
        force: Scalar,
        tolerance: Scalar,
        description: &str,
    ) {
        let mut resolve4 = |this: &mut Self, refs: &[u32; 4]| -> Option<[NodeId; 4]> {
            let mut out = [NodeId(0); 4];
            for (slot, &index) in out.iter_mut().zip(refs) {
                *slot = this.resolve_node(index, "rotators")?;
            }
            Some(out)
        };
        let (Some(ax1), Some(ax2)) = (
            self.resolve_node(d.axis_nodes[0], "rotators"),
            self.resolve_node(d.axis_nodes[1], "rotators"),
        ) else {
            return;
        };
        let Some(base_plate) = resolve4(self, &d.base_plate_nodes) else { return };
        let Some(rotating_plate) = resolve4(self, &d.rotating_plate_nodes) else { return };

        if !self.valid_command_key(d.spin_left_key, "rotators")
            || !self.valid_command_key(d.spin_right_key, "rotators")
        {
            return;
        }

        let rotator = Rotator {
            axis: [ax1, ax2],
            base_plate,
            rotating_plate,
            rate: d.rate,
            force,
            tolerance,
            engine_coupling: d.engine_coupling,
            needs_engine: d.needs_engine,
        };
        let display_number = self.rotators.len() + 1;
        self.validate_rotator(display_number, &rotator);

        // spin commands carry the 1-based rotator number, negative = left
        let inertia = self.resolve_inertia(&d.inertia);
        for (key, signed, default_desc) in [
            (d.spin_left_key, -(display_number as i32), "Rotate_Left/Right"),
            (d.spin_right_key, display_number as i32, "Rotate_Left/Right"),
        ] {
            let slot = &mut self.command_keys[key as usize];
            slot.rotators.push(signed);
            if slot.description.is_empty() {
                slot.description = if description.is_empty() {
                    default_desc.to_owned()
                } else {
                    description.to_owned()
                };
            }
            if slot.inertia.is_none() {
                slot.inertia = inertia.clone();
            }
        }
        self.rotators.push(rotator);
    }

    /// Geometry diagnostics: both plates should be centered on the axis
    /// and mutually aligned within 0.1%.
    fn validate_rotator(&mut self, number: usize, rotator: &Rotator) {
        const EPS: Scalar = 0.001;
        let ax1 = self.node_rel(rotator.axis[0]);
        let ax2 = self.node_rel(rotator.axis[1]);
        let normal = (ax1 - ax2).normalize();

        let project = |point: Vec3, origin: Vec3| -> (Vec3, Scalar) {
            let v = origin - point;
            let planar = v - normal * v.dot(normal);
            let len = planar.length();
            (planar / len, len)
        };

        let mut a = [Vec3::ZERO; 4];
        let mut a_len = [0.0; 4];
        for i in 0..4 {
            let (dir, len) = project(self.node_rel(rotator.base_plate[i]), ax1);
            a[i] = dir;
            a_len[i] = len;
        }
        let off_center = |l1: Scalar, l2: Scalar| l1.max(l2) / l1.min(l2) > 1.0 + EPS;
        if off_center(a_len[0], a_len[2]) || off_center(a_len[1], a_len[3]) {
            self.log
                .warning(format!("Off-centered axis on base plate of rotator {number}"));
        }

        let mut b = [Vec3::ZERO; 4];
        let mut b_len = [0.0; 4];
        for i in 0..4 {
            let (dir, len) = project(self.node_rel(rotator.rotating_plate[i]), ax2);
            b[i] = dir;
            b_len[i] = len;
        }
        if off_center(b_len[0], b_len[2]) || off_center(b_len[1], b_len[3]) {
            self.log.warning(format!(
                "Off-centered axis on rotating plate of rotator {number}"
            ));
        }

        let rot: Vec<Scalar> = (0..4).map(|i| a[i].dot(b[i])).collect();
        let misaligned = [(0, 1), (1, 2), (2, 3), (3, 0)]
            .iter()
            .any(|&(i, j)| off_center(rot[i], rot[j]));
        if misaligned {
            self.log
                .warning(format!("Misaligned plates on rotator {number}"));
        }
    }

    // ----- finalization -----

    fn finalize_wheel_masses(&mut self) {
        for wheel in &mut self.wheels {
            wheel.mass = wheel
                .nodes
                .iter()
                .map(|id| self.nodes[id.idx()].mass)
                .sum();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigphys_core::vec3;

    fn two_node_def() -> RigDef {
        RigDef {
            name: "test".into(),
            dry_mass: 3000.0,
            nodes: vec![
                NodeDef { position: vec3(0.0, 0.0, 0.0), ..Default::default() },
                NodeDef { position: vec3(2.0, 0.0, 0.0), ..Default::default() },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn deformation_threshold_precedence() {
        let builtin = BeamDefaults::default();
        assert_eq!(RigBuilder::deformation_threshold(&builtin), BEAM_DEFORM);

        // user preset below the floor gets clamped unless advanced
        let mut preset = BeamDefaults {
            user_defined: true,
            deformation_threshold: 100_000.0,
            ..Default::default()
        };
        assert_eq!(RigBuilder::deformation_threshold(&preset), BEAM_DEFORM);
        // advanced deformation skips the clamp; 100k sits exactly at the
        // creak floor and survives
        preset.advanced_deformation = true;
        assert_eq!(RigBuilder::deformation_threshold(&preset), BEAM_CREAK_DEFAULT);
        preset.deformation_threshold = 50_000.0;
        // creak floor still applies
        assert_eq!(RigBuilder::deformation_threshold(&preset), BEAM_CREAK_DEFAULT);
        preset.plastic_coef_user_defined = true;
        preset.plastic_coef = 0.2;
        assert_eq!(RigBuilder::deformation_threshold(&preset), 50_000.0);
    }

    #[test]
    fn plain_beam_build() {
        let mut def = two_node_def();
        def.beams.push(BeamDef { nodes: [0, 1], ..Default::default() });
        let rig = RigBuilder::new(&def).build().unwrap();
        assert_eq!(rig.nodes.len(), 2);
        assert_eq!(rig.beams.len(), 1);
        let beam = &rig.beams[0];
        assert_eq!(beam.length, 2.0);
        assert_eq!(beam.spring, DEFAULT_SPRING);
        assert_eq!(beam.strength, BEAM_BREAK);
        assert_eq!(beam.bounded, BoundedMode::Free);
        // buoyancy derives from the dry mass
        assert_eq!(rig.nodes[0].buoyancy, 200.0);
    }

    #[test]
    fn bad_node_reference_skips_beam() {
        let mut def = two_node_def();
        def.beams.push(BeamDef { nodes: [0, 7], ..Default::default() });
        let rig = RigBuilder::new(&def).build().unwrap();
        assert_eq!(rig.beams.len(), 0);
        assert!(rig.log.has_errors());
    }

    #[test]
    fn shock_precompression_and_strength() {
        let mut def = two_node_def();
        def.shocks.push(ShockDef {
            nodes: [0, 1],
            spring_rate: 50_000.0,
            damping: 3_000.0,
            short_bound: 0.3,
            long_bound: 0.4,
            precompression: 1.1,
            ..Default::default()
        });
        let rig = RigBuilder::new(&def).build().unwrap();
        let beam = &rig.beams[0];
        assert_eq!(beam.bounded, BoundedMode::Shock1);
        assert_eq!(beam.kind, BeamKind::Hydro);
        assert!((beam.length - 2.2).abs() < 1e-5);
        assert_eq!(beam.strength, BEAM_BREAK * 4.0);
        assert_eq!(rig.shocks.len(), 1);
    }

    #[test]
    fn shock_metric_bounds_divide_by_length() {
        let mut def = two_node_def();
        def.shocks.push(ShockDef {
            nodes: [0, 1],
            spring_rate: 50_000.0,
            damping: 3_000.0,
            short_bound: 0.5,
            long_bound: 1.0,
            metric: true,
            ..Default::default()
        });
        let rig = RigBuilder::new(&def).build().unwrap();
        let beam = &rig.beams[0];
        assert!((beam.short_bound - 0.25).abs() < 1e-6);
        assert!((beam.long_bound - 0.5).abs() < 1e-6);
    }

    #[test]
    fn trigger_rejects_bad_command_key() {
        let mut def = two_node_def();
        def.triggers.push(TriggerDef {
            nodes: [0, 1],
            shortbound_action: 0,
            longbound_action: 3,
            ..Default::default()
        });
        let rig = RigBuilder::new(&def).build().unwrap();
        assert_eq!(rig.beams.len(), 0);
        assert!(rig.log.has_errors());
    }

    #[test]
    fn trigger_cmd_blocker_on_unset_longbound() {
        let mut def = two_node_def();
        def.triggers.push(TriggerDef {
            nodes: [0, 1],
            contraction_limit: 0.2,
            expansion_limit: 0.5,
            shortbound_action: 3,
            longbound_action: -1,
            ..Default::default()
        });
        let rig = RigBuilder::new(&def).build().unwrap();
        assert_eq!(rig.beams.len(), 1);
        let beam = &rig.beams[0];
        assert_eq!(beam.bounded, BoundedMode::Trigger);
        assert_eq!(beam.spring, 0.0);
        let shock = &rig.shocks[0];
        let ShockKind::Trigger(state) = &shock.kind else { panic!() };
        assert!(state.flags.cmd_blocker);
        assert_eq!(state.cmd_short, 3);
    }

    #[test]
    fn hydro_flag_parsing() {
        let mut def = two_node_def();
        def.hydros.push(HydroDef {
            nodes: [0, 1],
            lengthening_factor: 0.2,
            options: String::new(),
            ..Default::default()
        });
        def.hydros.push(HydroDef {
            nodes: [0, 1],
            lengthening_factor: 0.1,
            options: "i".into(),
            ..Default::default()
        });
        def.hydros.push(HydroDef {
            nodes: [0, 1],
            lengthening_factor: 0.1,
            options: "su".into(),
            ..Default::default()
        });
        let rig = RigBuilder::new(&def).build().unwrap();
        assert_eq!(rig.hydros.len(), 3);
        assert!(rig.hydros[0].flags.dir);
        // invisible alone still means a steering hydro
        assert!(rig.hydros[1].flags.dir);
        let flags = rig.hydros[2].flags;
        assert!(!flags.dir);
        assert!(flags.speed && flags.aileron && flags.elevator);
    }

    #[test]
    fn command_beams_land_on_both_keys() {
        let mut def = two_node_def();
        def.commands.push(CommandDef {
            nodes: [0, 1],
            shorten_rate: 0.4,
            lengthen_rate: 0.6,
            max_contraction: 0.5,
            max_extension: 1.5,
            contract_key: 2,
            extend_key: 3,
            description: "boom".into(),
            ..Default::default()
        });
        let rig = RigBuilder::new(&def).build().unwrap();
        let contract = &rig.command_keys[2];
        let extend = &rig.command_keys[3];
        assert_eq!(contract.beams.len(), 1);
        assert_eq!(extend.beams.len(), 1);
        assert!(contract.beams[0].is_contraction);
        assert!(!extend.beams[0].is_contraction);
        // midpoint of the commanded range
        assert!((contract.beams[0].center_length - 2.0).abs() < 1e-5);
        assert_eq!(contract.description, "boom");
    }

    #[test]
    fn command_key_out_of_range() {
        let mut def = two_node_def();
        def.commands.push(CommandDef {
            nodes: [0, 1],
            contract_key: 0,
            extend_key: 3,
            ..Default::default()
        });
        let rig = RigBuilder::new(&def).build().unwrap();
        assert_eq!(rig.beams.len(), 0);
        assert!(rig.log.has_errors());
    }

    #[test]
    fn cinecam_adds_node_and_eight_beams() {
        let mut def = RigDef {
            name: "cam".into(),
            dry_mass: 1500.0,
            ..Default::default()
        };
        for i in 0..8 {
            def.nodes.push(NodeDef {
                position: vec3(i as f32, 0.0, 0.0),
                ..Default::default()
            });
        }
        def.cinecams.push(CinecamDef {
            position: vec3(3.5, 1.0, 0.0),
            nodes: [0, 1, 2, 3, 4, 5, 6, 7],
            ..Default::default()
        });
        let rig = RigBuilder::new(&def).build().unwrap();
        assert_eq!(rig.nodes.len(), 9);
        assert_eq!(rig.beams.len(), 8);
        assert_eq!(rig.cinecam_nodes.len(), 1);
        assert!(rig.nodes[8].no_ground_contact);
        assert_eq!(rig.beams[0].spring, 8000.0);
    }

    #[test]
    fn load_weight_override_marks_node() {
        let mut def = two_node_def();
        def.nodes[1].load_weight_override = Some(140.0);
        let rig = RigBuilder::new(&def).build().unwrap();
        assert!(!rig.nodes[0].loaded_mass);
        assert!(rig.nodes[1].loaded_mass);
        assert_eq!(rig.nodes[1].override_mass, Some(140.0));
    }

    #[test]
    fn rotator_spin_commands_are_signed() {
        let mut def = RigDef {
            name: "rot".into(),
            dry_mass: 1000.0,
            ..Default::default()
        };
        // axis along Y, both plates square around it
        def.nodes.push(NodeDef { position: vec3(0.0, 0.0, 0.0), ..Default::default() });
        def.nodes.push(NodeDef { position: vec3(0.0, 1.0, 0.0), ..Default::default() });
        for (x, z) in [(1.0, 0.0), (0.0, 1.0), (-1.0, 0.0), (0.0, -1.0)] {
            def.nodes.push(NodeDef { position: vec3(x, 0.0, z), ..Default::default() });
        }
        for (x, z) in [(1.0, 0.0), (0.0, 1.0), (-1.0, 0.0), (0.0, -1.0)] {
            def.nodes.push(NodeDef { position: vec3(x, 1.0, z), ..Default::default() });
        }
        def.rotators.push(RotatorDef {
            axis_nodes: [0, 1],
            base_plate_nodes: [2, 3, 4, 5],
            rotating_plate_nodes: [6, 7, 8, 9],
            rate: 1.0,
            spin_left_key: 1,
            spin_right_key: 2,
            ..Default::default()
        });
        let rig = RigBuilder::new(&def).build().unwrap();
        assert_eq!(rig.rotators.len(), 1);
        assert_eq!(rig.rotators[0].force, ROTATOR_FORCE_DEFAULT);
        assert_eq!(rig.command_keys[1].rotators, vec![-1]);
        assert_eq!(rig.command_keys[2].rotators, vec![1]);
        // symmetric plates produce no geometry warnings
        assert_eq!(rig.log.count(crate::messages::MessageKind::Warning), 0);
    }
}
