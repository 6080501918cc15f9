//! Input smoothing for command keys, hydros and rotator actuators.
//!
//! Digital inputs snap between 0 and 1 instantly; real actuators ramp.
//! Each key carries a start response curve (used while the input magnitude
//! grows) and a stop curve (while it shrinks). Per tick the filter samples
//! the curve at `delay * elapsed`, scales by 0.001 and steps the last
//! output toward the target, clamped so it never overshoots.

use std::collections::BTreeMap;

use rigphys_core::{Scalar, Spline};
use rigphys_io::PresetTable;
use tracing::warn;

/// Named response curves, built once from a preset table and shared
/// read-only by every vehicle.
#[derive(Clone, Debug, Default)]
pub struct InertiaConfig {
    splines: BTreeMap<String, Spline>,
}

impl InertiaConfig {
    pub fn from_presets(presets: &PresetTable) -> Self {
        let mut splines = BTreeMap::new();
        for curve in presets.curves() {
            let mut s = Spline::new();
            for p in &curve.points {
                s.add_point(*p);
            }
            splines.insert(curve.name.clone(), s);
        }
        Self { splines }
    }

    pub fn spline(&self, name: &str) -> Option<&Spline> {
        self.splines.get(name)
    }
}

#[derive(Clone, Debug, Default)]
struct KeyState {
    start_delay: Scalar,
    stop_delay: Scalar,
    start_spline: Option<Spline>,
    stop_spline: Option<Spline>,
    last_output: Scalar,
    time: Scalar,
}

/// Per-vehicle smoothing state, one entry per command key.
#[derive(Clone, Debug, Default)]
pub struct CmdKeyInertia {
    keys: BTreeMap<u32, KeyState>,
}

impl CmdKeyInertia {
    pub fn new() -> Self { Self::default() }

    /// Step the smoothed output for `key` toward `cmd_input` over `dt`.
    /// Keys with no configured response curves pass the input through.
    pub fn calc_cmd_key_delay(&mut self, cmd_input: Scalar, key: u32, dt: Scalar) -> Scalar {
        let state = self.keys.entry(key).or_default();
        if state.start_spline.is_none() || state.stop_spline.is_none() {
            return cmd_input;
        }

        let last_output = state.last_output;
        // magnitude growing picks the start curve, shrinking the stop curve
        let rel_diff = cmd_input.abs() - last_output.abs();
        let abs_diff = cmd_input - last_output;
        if abs_diff.abs() < 0.002 {
            state.time = 0.0;
        }
        // accumulating after the reset keeps the motion from stalling at 0.002
        state.time += dt;

        let start_factor = state.start_delay * state.time;
        let stop_factor = state.stop_delay * state.time;
        let mut calculated = last_output;
        if abs_diff > 0.0 {
            if rel_diff > 0.0 {
                calculated = last_output + sample(state.start_spline.as_ref(), start_factor);
            }
            if rel_diff < 0.0 {
                calculated = last_output + sample(state.stop_spline.as_ref(), stop_factor);
            }
            if calculated > cmd_input {
                calculated = cmd_input;
            }
        }
        if abs_diff < 0.0 {
            if rel_diff > 0.0 {
                calculated = last_output - sample(state.start_spline.as_ref(), start_factor);
            }
            if rel_diff < 0.0 {
                calculated = last_output - sample(state.stop_spline.as_ref(), stop_factor);
            }
            if calculated < cmd_input {
                calculated = cmd_input;
            }
        }
        state.last_output = calculated;
        calculated
    }

    /// Configure delays and response curves for one key. Non-positive
    /// delays and unknown curve names are warned about and left unset.
    pub fn set_cmd_key_delay(
        &mut self,
        key: u32,
        start_delay: Scalar,
        stop_delay: Scalar,
        start_function: &str,
        stop_function: &str,
        config: &InertiaConfig,
    ) {
        let state = self.keys.entry(key).or_default();

        if start_delay > 0.0 {
            state.start_delay = start_delay;
        } else {
            warn!(key, start_delay, "inertia start delay should be > 0");
        }
        if stop_delay > 0.0 {
            state.stop_delay = stop_delay;
        } else {
            warn!(key, stop_delay, "inertia stop delay should be > 0");
        }

        match config.spline(start_function) {
            Some(s) => state.start_spline = Some(s.clone()),
            None => warn!(key, start_function, "inertia start function not found"),
        }
        match config.spline(stop_function) {
            Some(s) => state.stop_spline = Some(s.clone()),
            None => warn!(key, stop_function, "inertia stop function not found"),
        }
    }

    /// Zero the outputs and timers of every key, keeping the configured
    /// delays and curves. Used on vehicle reset.
    pub fn reset_cmd_key_delay(&mut self) {
        for state in self.keys.values_mut() {
            state.last_output = 0.0;
            state.time = 0.0;
        }
    }

    pub fn last_output(&self, key: u32) -> Scalar {
        self.keys.get(&key).map(|s| s.last_output).unwrap_or(0.0)
    }
}

fn sample(spline: Option<&Spline>, time: Scalar) -> Scalar {
    match spline {
        Some(s) => s.interpolate(time.min(1.0)).y * 0.001,
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_config() -> InertiaConfig {
        let mut presets = PresetTable::new();
        presets.add_point("linear", rigphys_core::Vec2::new(0.0, 0.0));
        presets.add_point("linear", rigphys_core::Vec2::new(1.0, 1000.0));
        InertiaConfig::from_presets(&presets)
    }

    #[test] fn passes_through_without_curves() {
        let mut inertia = CmdKeyInertia::new();
        assert_eq!(inertia.calc_cmd_key_delay(0.7, 0, 0.01), 0.7);
    }

    #[test] fn converges_without_overshoot() {
        let config = linear_config();
        let mut inertia = CmdKeyInertia::new();
        inertia.set_cmd_key_delay(0, 2.0, 2.0, "linear", "linear", &config);
        let mut out = 0.0;
        for _ in 0..10_000 {
            out = inertia.calc_cmd_key_delay(1.0, 0, 0.01);
            assert!(out <= 1.0);
        }
        assert_eq!(out, 1.0);
    }

    #[test] fn negative_targets_clamp_too() {
        let config = linear_config();
        let mut inertia = CmdKeyInertia::new();
        inertia.set_cmd_key_delay(3, 2.0, 2.0, "linear", "linear", &config);
        let mut out = 0.0;
        for _ in 0..10_000 {
            out = inertia.calc_cmd_key_delay(-1.0, 3, 0.01);
            assert!(out >= -1.0);
        }
        assert_eq!(out, -1.0);
    }

    #[test] fn reset_zeroes_output_but_keeps_curves() {
        let config = linear_config();
        let mut inertia = CmdKeyInertia::new();
        inertia.set_cmd_key_delay(0, 2.0, 2.0, "linear", "linear", &config);
        for _ in 0..100 {
            inertia.calc_cmd_key_delay(1.0, 0, 0.01);
        }
        assert!(inertia.last_output(0) > 0.0);
        inertia.reset_cmd_key_delay();
        assert_eq!(inertia.last_output(0), 0.0);
        // still filtered, not pass-through
        let out = inertia.calc_cmd_key_delay(1.0, 0, 0.01);
        assert!(out < 1.0);
    }

    #[test] fn missing_curve_name_stays_pass_through() {
        let config = linear_config();
        let mut inertia = CmdKeyInertia::new();
        inertia.set_cmd_key_delay(0, 2.0, 2.0, "nope", "nope", &config);
        assert_eq!(inertia.calc_cmd_key_delay(0.5, 0, 0.01), 0.5);
    }
}
