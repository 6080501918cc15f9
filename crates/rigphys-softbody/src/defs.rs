//! Declarative vehicle definition. Node references are indices into
//! `RigDef::nodes`; generated nodes (wheel rings, cinecam) are never
//! referenced from a definition. Every section carries the beam/node
//! preset values that were in effect when it was declared.

use rigphys_core::{Scalar, Vec3};

use crate::constants::*;

/// Scale multipliers applied on top of the preset values.
#[derive(Clone, Copy, Debug)]
pub struct BeamDefaultsScale {
    pub spring: Scalar,
    pub damp: Scalar,
    pub deformation_threshold: Scalar,
    pub breaking_threshold: Scalar,
}

impl Default for BeamDefaultsScale {
    fn default() -> Self {
        Self { spring: 1.0, damp: 1.0, deformation_threshold: 1.0, breaking_threshold: 1.0 }
    }
}

/// Beam preset group. `user_defined` distinguishes an explicit preset
/// from the built-in defaults; the deformation-threshold precedence
/// rules key off it.
#[derive(Clone, Copy, Debug)]
pub struct BeamDefaults {
    pub spring: Scalar,
    pub damp: Scalar,
    pub deformation_threshold: Scalar,
    pub breaking_threshold: Scalar,
    pub plastic_coef: Scalar,
    pub scale: BeamDefaultsScale,
    /// Allows deformation thresholds below `BEAM_DEFORM`.
    pub advanced_deformation: bool,
    pub user_defined: bool,
    pub plastic_coef_user_defined: bool,
}

impl Default for BeamDefaults {
    fn default() -> Self {
        Self {
            spring: DEFAULT_SPRING,
            damp: DEFAULT_DAMP,
            deformation_threshold: BEAM_DEFORM,
            breaking_threshold: BEAM_BREAK,
            plastic_coef: 0.0,
            scale: BeamDefaultsScale::default(),
            advanced_deformation: false,
            user_defined: false,
            plastic_coef_user_defined: false,
        }
    }
}

impl BeamDefaults {
    #[inline] pub fn scaled_spring(&self) -> Scalar { self.spring * self.scale.spring }
    #[inline] pub fn scaled_damp(&self) -> Scalar { self.damp * self.scale.damp }
    #[inline] pub fn scaled_breaking_threshold(&self) -> Scalar {
        self.breaking_threshold * self.scale.breaking_threshold
    }
}

#[derive(Clone, Copy, Debug)]
pub struct NodeDefaults {
    pub load_weight: Scalar,
    pub friction: Scalar,
    pub volume: Scalar,
    pub surface: Scalar,
}

impl Default for NodeDefaults {
    fn default() -> Self {
        Self {
            load_weight: -1.0,
            friction: NODE_FRICTION_COEF_DEFAULT,
            volume: NODE_VOLUME_COEF_DEFAULT,
            surface: NODE_SURFACE_COEF_DEFAULT,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NodeDef {
    pub position: Vec3,
    pub hook: bool,
    pub no_ground_contact: bool,
    pub has_load_weight: bool,
    pub load_weight_override: Option<Scalar>,
    pub extra_buoyancy: bool,
    pub defaults: NodeDefaults,
}

impl Default for NodeDef {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            hook: false,
            no_ground_contact: false,
            has_load_weight: false,
            load_weight_override: None,
            extra_buoyancy: false,
            defaults: NodeDefaults::default(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct BeamDef {
    pub nodes: [u32; 2],
    pub rope: bool,
    pub support: bool,
    /// Extension break limit for support beams, in multiples of `L`.
    pub extension_break_limit: Option<Scalar>,
    pub defaults: BeamDefaults,
}

#[derive(Clone, Debug)]
pub struct ShockDef {
    pub nodes: [u32; 2],
    pub spring_rate: Scalar,
    pub damping: Scalar,
    pub short_bound: Scalar,
    pub long_bound: Scalar,
    pub precompression: Scalar,
    pub left_active: bool,
    pub right_active: bool,
    /// Bounds given in meters rather than as fractions of `L`.
    pub metric: bool,
    pub defaults: BeamDefaults,
}

impl Default for ShockDef {
    fn default() -> Self {
        Self {
            nodes: [0, 0],
            spring_rate: 0.0,
            damping: 0.0,
            short_bound: 0.0,
            long_bound: 0.0,
            precompression: 1.0,
            left_active: false,
            right_active: false,
            metric: false,
            defaults: BeamDefaults::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Shock2Def {
    pub nodes: [u32; 2],
    pub spring_in: Scalar,
    pub damp_in: Scalar,
    pub spring_prog_in: Scalar,
    pub damp_prog_in: Scalar,
    pub spring_out: Scalar,
    pub damp_out: Scalar,
    pub spring_prog_out: Scalar,
    pub damp_prog_out: Scalar,
    pub short_bound: Scalar,
    pub long_bound: Scalar,
    pub precompression: Scalar,
    pub soft_bump: bool,
    pub metric: bool,
    /// Bounds given as absolute lengths in meters.
    pub absolute_metric: bool,
    pub defaults: BeamDefaults,
}

impl Default for Shock2Def {
    fn default() -> Self {
        Self {
            nodes: [0, 0],
            spring_in: 0.0,
            damp_in: 0.0,
            spring_prog_in: 0.0,
            damp_prog_in: 0.0,
            spring_out: 0.0,
            damp_out: 0.0,
            spring_prog_out: 0.0,
            damp_prog_out: 0.0,
            short_bound: 0.0,
            long_bound: 0.0,
            precompression: 1.0,
            soft_bump: false,
            metric: false,
            absolute_metric: false,
            defaults: BeamDefaults::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Shock3Def {
    pub nodes: [u32; 2],
    pub spring_in: Scalar,
    pub damp_in: Scalar,
    pub damp_in_slow: Scalar,
    pub split_vel_in: Scalar,
    pub damp_in_fast: Scalar,
    pub spring_out: Scalar,
    pub damp_out: Scalar,
    pub damp_out_slow: Scalar,
    pub split_vel_out: Scalar,
    pub damp_out_fast: Scalar,
    pub short_bound: Scalar,
    pub long_bound: Scalar,
    pub precompression: Scalar,
    pub metric: bool,
    pub absolute_metric: bool,
    pub defaults: BeamDefaults,
}

impl Default for Shock3Def {
    fn default() -> Self {
        Self {
            nodes: [0, 0],
            spring_in: 0.0,
            damp_in: 0.0,
            damp_in_slow: 1.0,
            split_vel_in: 0.0,
            damp_in_fast: 1.0,
            spring_out: 0.0,
            damp_out: 0.0,
            damp_out_slow: 1.0,
            split_vel_out: 0.0,
            damp_out_fast: 1.0,
            short_bound: 0.0,
            long_bound: 0.0,
            precompression: 1.0,
            metric: false,
            absolute_metric: false,
            defaults: BeamDefaults::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TriggerDef {
    pub nodes: [u32; 2],
    pub contraction_limit: Scalar,
    pub expansion_limit: Scalar,
    pub shortbound_action: i32,
    pub longbound_action: i32,
    pub boundary_timer: Scalar,
    pub start_disabled: bool,
    pub blocker: bool,
    pub inverted_blocker: bool,
    pub cmd_switch: bool,
    pub command_style: bool,
    pub hook_lock: bool,
    pub hook_unlock: bool,
    pub continuous: bool,
    pub engine: bool,
    pub defaults: BeamDefaults,
}

impl Default for TriggerDef {
    fn default() -> Self {
        Self {
            nodes: [0, 0],
            contraction_limit: 0.0,
            expansion_limit: 0.0,
            shortbound_action: 0,
            longbound_action: 0,
            boundary_timer: 1.0,
            start_disabled: false,
            blocker: false,
            inverted_blocker: false,
            cmd_switch: false,
            command_style: false,
            hook_lock: false,
            hook_unlock: false,
            continuous: false,
            engine: false,
            defaults: BeamDefaults::default(),
        }
    }
}

/// Inertia override attached to a hydro/command/rotator declaration.
/// Zero delays mean "use the rig-wide defaults"; the function names
/// `"/"`, `"-"` and `""` are placeholders for "none".
#[derive(Clone, Debug, Default)]
pub struct InertiaDef {
    pub start_delay: Scalar,
    pub stop_delay: Scalar,
    pub start_function: String,
    pub stop_function: String,
}

/// Rig-wide inertia defaults (`set_inertia_defaults`).
#[derive(Clone, Debug, Default)]
pub struct InertiaDefaults {
    pub start_delay: Scalar,
    pub stop_delay: Scalar,
    pub start_function: String,
    pub stop_function: String,
}

#[derive(Clone, Debug, Default)]
pub struct HydroDef {
    pub nodes: [u32; 2],
    pub lengthening_factor: Scalar,
    /// Raw option characters, e.g. `"is"`.
    pub options: String,
    pub inertia: InertiaDef,
    pub defaults: BeamDefaults,
}

#[derive(Clone, Debug)]
pub struct CommandDef {
    pub nodes: [u32; 2],
    pub shorten_rate: Scalar,
    pub lengthen_rate: Scalar,
    pub max_contraction: Scalar,
    pub max_extension: Scalar,
    pub contract_key: u32,
    pub extend_key: u32,
    pub description: String,
    pub rope: bool,
    pub not_faster: bool,
    pub auto_center: bool,
    pub press_once: bool,
    pub press_once_center: bool,
    pub needs_engine: bool,
    pub plays_sound: bool,
    pub affect_engine: Scalar,
    pub inertia: InertiaDef,
    pub defaults: BeamDefaults,
}

impl Default for CommandDef {
    fn default() -> Self {
        Self {
            nodes: [0, 0],
            shorten_rate: 0.0,
            lengthen_rate: 0.0,
            max_contraction: 0.0,
            max_extension: 0.0,
            contract_key: 0,
            extend_key: 0,
            description: String::new(),
            rope: false,
            not_faster: false,
            auto_center: false,
            press_once: false,
            press_once_center: false,
            needs_engine: true,
            plays_sound: true,
            affect_engine: 1.0,
            inertia: InertiaDef::default(),
            defaults: BeamDefaults::default(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RopeDef {
    pub nodes: [u32; 2],
    pub defaults: BeamDefaults,
}

#[derive(Clone, Debug)]
pub struct TieDef {
    pub root_node: u32,
    pub max_reach_length: Scalar,
    pub auto_shorten_rate: Scalar,
    pub min_length: Scalar,
    pub max_stress: Scalar,
    pub group: i32,
    pub no_self_lock: bool,
    pub defaults: BeamDefaults,
}

impl Default for TieDef {
    fn default() -> Self {
        Self {
            root_node: 0,
            max_reach_length: 0.0,
            auto_shorten_rate: 0.0,
            min_length: 0.0,
            max_stress: 100_000.0,
            group: -1,
            no_self_lock: false,
            defaults: BeamDefaults::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CinecamDef {
    pub position: Vec3,
    pub nodes: [u32; 8],
    pub spring: Scalar,
    pub damping: Scalar,
}

impl Default for CinecamDef {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            nodes: [0; 8],
            spring: 8000.0,
            damping: 800.0,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum WheelPropulsion {
    #[default]
    None,
    Forward,
    Backward,
}

impl WheelPropulsion {
    #[inline] pub fn is_propelled(self) -> bool { self != WheelPropulsion::None }
}

/// Braking declaration; translated 1:1 to `BrakeCombo`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum WheelBraking {
    #[default]
    No,
    Yes,
    DirectionalLeft,
    DirectionalRight,
    OnlyFoot,
}

#[derive(Clone, Debug, Default)]
pub struct WheelDef {
    pub radius: Scalar,
    pub width: Scalar,
    pub num_rays: u32,
    pub nodes: [u32; 2],
    pub rigidity_node: Option<u32>,
    pub braking: WheelBraking,
    pub propulsion: WheelPropulsion,
    pub reference_arm_node: u32,
    pub mass: Scalar,
    pub springiness: Scalar,
    pub damping: Scalar,
    pub defaults: BeamDefaults,
    pub node_defaults: NodeDefaults,
}

#[derive(Clone, Debug, Default)]
pub struct Wheel2Def {
    pub rim_radius: Scalar,
    pub tyre_radius: Scalar,
    pub width: Scalar,
    pub num_rays: u32,
    pub nodes: [u32; 2],
    pub rigidity_node: Option<u32>,
    pub braking: WheelBraking,
    pub propulsion: WheelPropulsion,
    pub reference_arm_node: u32,
    pub mass: Scalar,
    pub rim_springiness: Scalar,
    pub rim_damping: Scalar,
    pub tyre_springiness: Scalar,
    pub tyre_damping: Scalar,
    pub defaults: BeamDefaults,
    pub node_defaults: NodeDefaults,
}

#[derive(Clone, Debug, Default)]
pub struct MeshWheelDef {
    pub rim_radius: Scalar,
    pub tyre_radius: Scalar,
    pub width: Scalar,
    pub num_rays: u32,
    pub nodes: [u32; 2],
    pub rigidity_node: Option<u32>,
    pub braking: WheelBraking,
    pub propulsion: WheelPropulsion,
    pub reference_arm_node: u32,
    pub mass: Scalar,
    pub spring: Scalar,
    pub damping: Scalar,
    pub defaults: BeamDefaults,
    pub node_defaults: NodeDefaults,
}

#[derive(Clone, Debug, Default)]
pub struct FlexBodyWheelDef {
    pub rim_radius: Scalar,
    pub tyre_radius: Scalar,
    pub num_rays: u32,
    pub nodes: [u32; 2],
    pub rigidity_node: Option<u32>,
    pub braking: WheelBraking,
    pub propulsion: WheelPropulsion,
    pub reference_arm_node: u32,
    pub mass: Scalar,
    pub rim_springiness: Scalar,
    pub rim_damping: Scalar,
    pub tyre_springiness: Scalar,
    pub tyre_damping: Scalar,
    pub defaults: BeamDefaults,
    pub node_defaults: NodeDefaults,
}

#[derive(Clone, Debug)]
pub struct RotatorDef {
    pub axis_nodes: [u32; 2],
    pub base_plate_nodes: [u32; 4],
    pub rotating_plate_nodes: [u32; 4],
    pub rate: Scalar,
    pub spin_left_key: u32,
    pub spin_right_key: u32,
    pub engine_coupling: Scalar,
    pub needs_engine: bool,
    pub inertia: InertiaDef,
}

impl Default for RotatorDef {
    fn default() -> Self {
        Self {
            axis_nodes: [0, 0],
            base_plate_nodes: [0; 4],
            rotating_plate_nodes: [0; 4],
            rate: 0.0,
            spin_left_key: 0,
            spin_right_key: 0,
            engine_coupling: 1.0,
            needs_engine: false,
            inertia: InertiaDef::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Rotator2Def {
    pub base: RotatorDef,
    pub rotating_force: Scalar,
    pub tolerance: Scalar,
    pub description: String,
}

impl Default for Rotator2Def {
    fn default() -> Self {
        Self {
            base: RotatorDef::default(),
            rotating_force: ROTATOR_FORCE_DEFAULT,
            tolerance: ROTATOR_TOLERANCE_DEFAULT,
            description: String::new(),
        }
    }
}

/// Complete vehicle definition consumed by `RigBuilder`. Drivetrain and
/// rail sections are carried here as well; their processing lives in the
/// respective downstream crates.
#[derive(Clone, Debug, Default)]
pub struct RigDef {
    pub name: String,
    pub dry_mass: Scalar,
    pub load_mass: Scalar,
    pub nodes: Vec<NodeDef>,
    pub beams: Vec<BeamDef>,
    pub shocks: Vec<ShockDef>,
    pub shocks2: Vec<Shock2Def>,
    pub shocks3: Vec<Shock3Def>,
    pub triggers: Vec<TriggerDef>,
    pub hydros: Vec<HydroDef>,
    pub commands: Vec<CommandDef>,
    pub ropes: Vec<RopeDef>,
    pub ties: Vec<TieDef>,
    /// Node indices flagged as collision contacters.
    pub contacters: Vec<u32>,
    pub cinecams: Vec<CinecamDef>,
    pub wheels: Vec<WheelDef>,
    pub wheels2: Vec<Wheel2Def>,
    pub meshwheels: Vec<MeshWheelDef>,
    pub flexbodywheels: Vec<FlexBodyWheelDef>,
    pub rotators: Vec<RotatorDef>,
    pub rotators2: Vec<Rotator2Def>,
    pub inertia_defaults: InertiaDefaults,
}
