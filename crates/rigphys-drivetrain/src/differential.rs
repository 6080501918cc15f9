//! Torque-splitting differentials. A differential couples two wheel
//! indices (or two downstream differential indices) and carries an
//! ordered list of selectable behaviors; the list head is the active
//! one and toggling rotates the list.

use rigphys_core::Scalar;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DiffMode {
    /// Fixed 50/50 split, no coupling.
    Split,
    /// Torque follows the normalized wheel speeds.
    Open,
    /// Viscous coupling damps speed differences.
    Viscous,
    /// Torsion spring holds both sides in lockstep.
    Locked,
}

/// Per-tick exchange record between the drivetrain and one differential.
#[derive(Clone, Copy, Debug, Default)]
pub struct DifferentialData {
    pub speed: [Scalar; 2],
    /// Accumulated rotation difference while locked.
    pub delta_rotation: Scalar,
    pub out_torque: [Scalar; 2],
    pub in_torque: Scalar,
    pub dt: Scalar,
}

#[derive(Clone, Debug)]
pub struct Differential {
    /// Wheel indices for a per-axle diff, axle-diff indices for an
    /// inter-axle diff.
    pub connections: [usize; 2],
    modes: Vec<DiffMode>,
}

const VISCOUS_TORSION_DAMP: Scalar = 10_000.0;
const LOCKED_TORSION_RATE: Scalar = 1_000_000.0;

impl Differential {
    pub fn new(idx_1: usize, idx_2: usize) -> Self {
        Self { connections: [idx_1, idx_2], modes: Vec::new() }
    }

    pub fn add_mode(&mut self, mode: DiffMode) {
        self.modes.push(mode);
    }

    pub fn with_modes(idx_1: usize, idx_2: usize, modes: &[DiffMode]) -> Self {
        Self { connections: [idx_1, idx_2], modes: modes.to_vec() }
    }

    pub fn available_modes(&self) -> &[DiffMode] { &self.modes }

    pub fn active_mode(&self) -> Option<DiffMode> { self.modes.first().copied() }

    pub fn toggle_mode(&mut self) {
        if self.modes.len() > 1 {
            self.modes.rotate_left(1);
        }
    }

    pub fn mode_name(&self) -> &'static str {
        match self.modes.first() {
            Some(DiffMode::Split) => "Split",
            Some(DiffMode::Open) => "Open",
            Some(DiffMode::Viscous) => "Viscous",
            Some(DiffMode::Locked) => "Locked",
            None => "invalid",
        }
    }

    pub fn calc_axle_torque(&self, data: &mut DifferentialData) {
        match self.modes.first() {
            Some(DiffMode::Split) => Self::calc_split(data),
            Some(DiffMode::Open) => Self::calc_open(data),
            Some(DiffMode::Viscous) => Self::calc_viscous(data),
            Some(DiffMode::Locked) => Self::calc_locked(data),
            None => {}
        }
    }

    fn calc_split(data: &mut DifferentialData) {
        data.out_torque = [data.in_torque / 2.0; 2];
    }

    /// Torque goes where the rotation goes, normalized over both wheel
    /// speeds. Below 1 m/s the split is even, and the ratio is clamped
    /// so the slower side always receives some drive.
    fn calc_open(data: &mut DifferentialData) {
        let sum_of_vel = data.speed[0].abs() + data.speed[1].abs();
        let min_of_vel = data.speed[0].abs().min(data.speed[1].abs());
        let power_ratio = if min_of_vel > 1.0 {
            data.speed[0].abs() / sum_of_vel
        } else {
            0.5
        };
        data.out_torque[0] = data.in_torque * power_ratio.clamp(0.1, 0.9);
        data.out_torque[1] = data.in_torque * (1.0 - power_ratio).clamp(0.1, 0.9);
    }

    fn calc_viscous(data: &mut DifferentialData) {
        let delta_speed = data.speed[0] - data.speed[1];
        data.out_torque = [data.in_torque / 2.0; 2];
        data.out_torque[0] -= delta_speed * VISCOUS_TORSION_DAMP;
        data.out_torque[1] += delta_speed * VISCOUS_TORSION_DAMP;
    }

    /// Torsion spring keeps both sides at the relative rotation they had
    /// when locked; `delta_rotation` integrates the drift.
    fn calc_locked(data: &mut DifferentialData) {
        let torsion_damp = LOCKED_TORSION_RATE / 100.0;
        let delta_speed = data.speed[0] - data.speed[1];
        data.out_torque = [data.in_torque / 2.0; 2];
        data.delta_rotation += delta_speed * data.dt;
        data.out_torque[0] -= data.delta_rotation * LOCKED_TORSION_RATE + delta_speed * torsion_damp;
        data.out_torque[1] += data.delta_rotation * LOCKED_TORSION_RATE + delta_speed * torsion_damp;
    }
}
