//! Drivetrain coupling over the soft-body wheel topology: per-axle and
//! inter-axle differentials, the transfer case, torque curves, and the
//! auto-build wiring that fills in undeclared differential levels.

pub mod differential;
pub mod torque_curve;
pub mod transfer_case;
pub mod wiring;

pub use differential::{DiffMode, Differential, DifferentialData};
pub use torque_curve::{TorqueCurve, TorqueCurveError, CUSTOM_MODEL, DEFAULT_MODEL};
pub use transfer_case::TransferCase;
pub use wiring::{
    assign_wheel_to_axle, AxleDef, Drivetrain, DrivetrainDef, InterAxleDef, TransferCaseDef,
};
