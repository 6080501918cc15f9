//! Normative soft-body constants. Changing any of these changes vehicle
//! handling across the board, so they are centralized and referenced
//! everywhere instead of being repeated inline.

use rigphys_core::Scalar;

pub const DEFAULT_SPRING: Scalar = 9_000_000.0;
pub const DEFAULT_DAMP: Scalar = 12_000.0;

/// Default breaking threshold (N).
pub const BEAM_BREAK: Scalar = 1_000_000.0;
/// Default deformation threshold (N).
pub const BEAM_DEFORM: Scalar = 400_000.0;
/// Deformation floor applied when no user plastic coefficient exists.
pub const BEAM_CREAK_DEFAULT: Scalar = 100_000.0;

/// Plastic deformation never shortens a beam below this (m).
pub const MIN_BEAM_LENGTH: Scalar = 0.1;

/// Support beams break once stretched past `L * limit` (unitless).
pub const SUPPORT_BEAM_LIMIT_DEFAULT: Scalar = 4.0;

pub const ROTATOR_FORCE_DEFAULT: Scalar = 10_000_000.0;
pub const ROTATOR_TOLERANCE_DEFAULT: Scalar = 0.0;

/// Tyre node friction is `wheel_width * WHEEL_FRICTION_COEF`.
pub const WHEEL_FRICTION_COEF: Scalar = 2.0;

/// Viscous drag per node, scaled by speed.
pub const NODE_DRAG_COEF: Scalar = 0.05;

pub const NODE_FRICTION_COEF_DEFAULT: Scalar = 1.0;
pub const NODE_VOLUME_COEF_DEFAULT: Scalar = 1.0;
pub const NODE_SURFACE_COEF_DEFAULT: Scalar = 1.0;

/// Highest addressable command key (keys are 1-based).
pub const MAX_COMMANDS: u32 = 84;
