//! Runtime soft-body data model: nodes, beams, shocks, wheels, rotators
//! and the smaller records (hydros, command beams, ties) the builder
//! produces alongside them.

use rigphys_core::{BeamId, NodeId, Scalar, ShockId, Vec3};

/// Point mass. Positions are kept both relative to the rig origin and in
/// world space; forces accumulate over a tick and are consumed by the
/// integrator.
#[derive(Clone, Debug)]
pub struct Node {
    pub rel_pos: Vec3,
    pub abs_pos: Vec3,
    pub velocity: Vec3,
    pub forces: Vec3,
    pub mass: Scalar,
    pub buoyancy: Scalar,
    pub friction_coef: Scalar,
    pub volume_coef: Scalar,
    pub surface_coef: Scalar,
    pub contacter: bool,
    pub contactable: bool,
    pub no_ground_contact: bool,
    pub rim_node: bool,
    pub tyre_node: bool,
    pub hook: bool,
    pub loaded_mass: bool,
    pub override_mass: Option<Scalar>,
    pub lockgroup: Option<u32>,
}

/// How a beam's short/long bounds are interpreted, if at all.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BoundedMode {
    Free,
    /// Slack under compression, taut under extension.
    Rope,
    /// Beyond the bounds, spring/damp interpolate toward the shock's
    /// bump-stop values (or the rig defaults when no shock is attached).
    Shock1,
    /// Progressive spring/damp, optionally soft-bump.
    Shock2,
    /// Split slow/fast damping by velocity.
    Shock3,
    /// Fires command/blocker events at the bounds, carries no force.
    Trigger,
    /// No force under extension until the break limit.
    Support,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BeamKind {
    Normal,
    /// Actuated beam (shock, hydro, command, rope, tie, trigger).
    Hydro,
    /// Exerts forces but is exempt from deformation and collision.
    Virtual,
}

/// Spring/damper between two distinct nodes.
#[derive(Clone, Debug)]
pub struct Beam {
    pub p1: NodeId,
    pub p2: NodeId,
    /// Current rest length; plastic deformation moves it.
    pub length: Scalar,
    /// Rest length at build time.
    pub ref_length: Scalar,
    pub spring: Scalar,
    pub damp: Scalar,
    /// Stress above this breaks the beam.
    pub strength: Scalar,
    pub plastic_coef: Scalar,
    pub min_max_pos_neg_stress: Scalar,
    pub max_pos_stress: Scalar,
    pub max_neg_stress: Scalar,
    pub bounded: BoundedMode,
    pub kind: BeamKind,
    /// Fraction of `length` (or absolute trigger limit) on contraction.
    pub short_bound: Scalar,
    /// Fraction of `length` (or absolute trigger limit) on extension.
    pub long_bound: Scalar,
    pub shock: Option<ShockId>,
    /// Signed spring force from the last tick.
    pub stress: Scalar,
    pub broken: bool,
    pub disabled: bool,
}

/// Behavior variants for the shock attached to a bounded beam.
#[derive(Clone, Debug)]
pub enum ShockKind {
    /// Plain bump-stop shock; spring/damp live on the beam.
    Shock1 { left_active: bool, right_active: bool },
    /// Progressive rate shock.
    Shock2 {
        soft_bump: bool,
        spring_prog_in: Scalar,
        damp_prog_in: Scalar,
        spring_prog_out: Scalar,
        damp_prog_out: Scalar,
    },
    /// Velocity-split damping shock.
    Shock3 {
        split_in: Scalar,
        damp_slow_in: Scalar,
        damp_fast_in: Scalar,
        split_out: Scalar,
        damp_slow_out: Scalar,
        damp_fast_out: Scalar,
    },
    Trigger(TriggerState),
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TriggerFlags {
    pub blocker: bool,
    pub inverted_blocker: bool,
    pub cmd_switch: bool,
    pub cmd_blocker: bool,
    pub hook_lock: bool,
    pub hook_unlock: bool,
    pub continuous: bool,
    pub engine: bool,
}

#[derive(Clone, Debug)]
pub struct TriggerState {
    pub flags: TriggerFlags,
    /// Command key (or blocker span) fired at the short bound.
    pub cmd_short: i32,
    /// Command key (or blocker span) fired at the long bound.
    pub cmd_long: i32,
    pub boundary_timer: Scalar,
    /// Counts down while a switch sits past a boundary.
    pub switch_state: Scalar,
    pub enabled: bool,
}

#[derive(Clone, Debug)]
pub struct Shock {
    pub beam: BeamId,
    pub kind: ShockKind,
    pub spring_in: Scalar,
    pub damp_in: Scalar,
    pub spring_out: Scalar,
    pub damp_out: Scalar,
    /// Bump-stop spring/damp, from the beam defaults in effect.
    pub sbd_spring: Scalar,
    pub sbd_damp: Scalar,
}

/// Brake circuits a wheel participates in.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BrakeCombo {
    None,
    FootHand,
    FootHandSkidLeft,
    FootHandSkidRight,
    FootOnly,
}

#[derive(Clone, Debug)]
pub struct Wheel {
    /// Canonical axis pair; `axis0` has the smaller world Z at build time.
    pub axis0: NodeId,
    pub axis1: NodeId,
    pub arm_node: NodeId,
    /// Axis node geometrically closer to the arm node.
    pub near_attach: NodeId,
    pub radius: Scalar,
    pub rim_radius: Scalar,
    pub width: Scalar,
    pub propelled: bool,
    pub braking: BrakeCombo,
    /// Tyre ring, outer/inner interleaved per ray.
    pub nodes: Vec<NodeId>,
    /// Rim ring for dual-ring wheels, empty otherwise.
    pub rim_nodes: Vec<NodeId>,
    /// Sum of tyre node masses, filled after construction.
    pub mass: Scalar,
}

#[derive(Clone, Debug)]
pub struct Rotator {
    pub axis: [NodeId; 2],
    pub base_plate: [NodeId; 4],
    pub rotating_plate: [NodeId; 4],
    pub rate: Scalar,
    pub force: Scalar,
    pub tolerance: Scalar,
    pub engine_coupling: Scalar,
    pub needs_engine: bool,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HydroFlags {
    /// Steering-wheel coupled.
    pub dir: bool,
    /// Effect scales down at speed.
    pub speed: bool,
    pub aileron: bool,
    pub rudder: bool,
    pub elevator: bool,
    pub rev_aileron: bool,
    pub rev_rudder: bool,
    pub rev_elevator: bool,
}

/// Delays and response-curve names for the command-key inertia filter.
/// Resolved at build time; applied by the input layer.
#[derive(Clone, Debug)]
pub struct InertiaSettings {
    pub start_delay: Scalar,
    pub stop_delay: Scalar,
    pub start_function: String,
    pub stop_function: String,
}

#[derive(Clone, Debug)]
pub struct HydroBeam {
    pub beam: BeamId,
    pub flags: HydroFlags,
    /// Lengthening factor per unit input.
    pub speed: Scalar,
    pub ref_length: Scalar,
    pub inertia: Option<InertiaSettings>,
}

#[derive(Clone, Debug)]
pub struct CommandBeam {
    pub beam: BeamId,
    pub is_contraction: bool,
    /// Rate of length change (m/s at full input).
    pub speed: Scalar,
    /// Bound ratio this command drives toward.
    pub boundary: Scalar,
    /// Midpoint length between the contraction and extension bounds.
    pub center_length: Scalar,
    pub not_faster: bool,
    pub auto_center: bool,
    pub press_once: bool,
    pub press_once_center: bool,
    pub needs_engine: bool,
    pub plays_sound: bool,
    pub affect_engine: Scalar,
}

/// One command key (1-based, up to `MAX_COMMANDS`).
#[derive(Clone, Debug, Default)]
pub struct CommandKey {
    pub beams: Vec<CommandBeam>,
    /// Signed 1-based rotator indices; negative spins left.
    pub rotators: Vec<i32>,
    pub description: String,
    pub inertia: Option<InertiaSettings>,
}

#[derive(Clone, Debug)]
pub struct Tie {
    pub group: i32,
    pub tying: bool,
    pub tied: bool,
    pub beam: BeamId,
    pub contract_speed: Scalar,
    pub max_stress: Scalar,
    pub min_length: Scalar,
    pub no_self_lock: bool,
}
