//! Engine torque curves: named (rpm, torque-percent) splines with one
//! active selection. Preset curves come in as a parsed table; the
//! `CustomModel` curve is reserved for per-vehicle points and becomes
//! active as soon as it exists.

use rigphys_core::{Scalar, Spline};
use rigphys_io::PresetTable;
use thiserror::Error;
use tracing::warn;

pub const CUSTOM_MODEL: &str = "CustomModel";
pub const DEFAULT_MODEL: &str = "default";

#[derive(Debug, Error, Eq, PartialEq)]
pub enum TorqueCurveError {
    #[error("torque model {0:?} not found")]
    UnknownModel(String),
    #[error("rpm points of model {0:?} are not in ascending order")]
    DescendingRpm(String),
}

#[derive(Clone, Debug, Default)]
pub struct TorqueCurve {
    curves: Vec<(String, Spline)>,
    active: Option<usize>,
}

impl TorqueCurve {
    pub fn new() -> Self { Self::default() }

    /// Load every preset curve and activate the default model if the
    /// table carries one.
    pub fn from_presets(table: &PresetTable) -> Self {
        let mut tc = Self::new();
        for preset in table.curves() {
            let mut spline = Spline::new();
            for p in &preset.points {
                spline.add_point(*p);
            }
            tc.curves.push((preset.name.clone(), spline));
        }
        let _ = tc.set_torque_model(DEFAULT_MODEL);
        tc
    }

    /// Torque percentage at `rpm` on the active curve. The rpm is
    /// normalized over the curve's X span and clamped to it.
    pub fn get_engine_torque(&self, rpm: Scalar) -> Scalar {
        let Some(spline) = self.active.map(|i| &self.curves[i].1) else {
            return 0.0;
        };
        if spline.len() == 1 {
            return spline.point(0).y;
        }
        let min_rpm = spline.point(0).x;
        let max_rpm = spline.point(spline.len() - 1).x;
        if min_rpm == max_rpm {
            return spline.point(0).y;
        }
        let t = ((rpm - min_rpm) / (max_rpm - min_rpm)).clamp(0.0, 1.0);
        spline.interpolate(t).y
    }

    /// Returns false when the name is already taken.
    pub fn create_new_curve(&mut self, name: &str) -> bool {
        if self.index_of(name).is_some() {
            return false;
        }
        self.curves.push((name.to_owned(), Spline::new()));
        if name == CUSTOM_MODEL {
            let _ = self.set_torque_model(CUSTOM_MODEL);
        }
        true
    }

    pub fn add_curve_sample(&mut self, rpm: Scalar, progress: Scalar, model: &str) {
        let index = match self.index_of(model) {
            Some(i) => i,
            None => {
                self.curves.push((model.to_owned(), Spline::new()));
                if model == CUSTOM_MODEL {
                    self.active = Some(self.curves.len() - 1);
                }
                self.curves.len() - 1
            }
        };
        self.curves[index].1.add_point(rigphys_core::Vec2::new(rpm, progress));
    }

    /// Unknown names are ignored with a warning, keeping the current
    /// selection.
    pub fn set_torque_model(&mut self, name: &str) -> Result<(), TorqueCurveError> {
        match self.index_of(name) {
            Some(i) => {
                self.active = Some(i);
                Ok(())
            }
            None => {
                warn!(model = name, "torque model not found, keeping current");
                Err(TorqueCurveError::UnknownModel(name.to_owned()))
            }
        }
    }

    pub fn active_model(&self) -> Option<&str> {
        self.active.map(|i| self.curves[i].0.as_str())
    }

    pub fn curve(&self, name: &str) -> Option<&Spline> {
        self.index_of(name).map(|i| &self.curves[i].1)
    }

    /// Resample a curve at its minimum rpm spacing so spline parameter
    /// steps correspond to even rpm steps. If the last original point is
    /// missed by the stride it is re-added, provided the overshoot stays
    /// under 1% of the maximum rpm.
    pub fn space_curve_evenly(&mut self, name: &str) -> Result<(), TorqueCurveError> {
        let index = self
            .index_of(name)
            .ok_or_else(|| TorqueCurveError::UnknownModel(name.to_owned()))?;
        let old = self.curves[index].1.clone();
        let points = old.len();
        if points <= 1 {
            return Ok(());
        }

        let mut min_distance = old.point(1).x - old.point(0).x;
        for i in 2..points {
            min_distance = min_distance.min(old.point(i).x - old.point(i - 1).x);
        }
        if min_distance < 0.0 {
            return Err(TorqueCurveError::DescendingRpm(name.to_owned()));
        }

        let min_point = old.point(0);
        let max_point = old.point(points - 1);
        let spline = &mut self.curves[index].1;
        spline.clear();

        let mut rpm = min_point.x;
        let mut seg = 1;
        while rpm <= max_point.x && seg < points {
            if rpm > old.point(seg).x {
                seg += 1;
            }
            let (p0, p1) = (old.point(seg - 1), old.point(seg));
            let y = p0.y + (p1.y - p0.y) / (p1.x - p0.x) * (rpm - p0.x);
            spline.add_point(rigphys_core::Vec2::new(rpm, y));
            rpm += min_distance;
        }
        if spline.point(spline.len() - 1).x < max_point.x && (rpm - max_point.x) < 0.01 * max_point.x
        {
            spline.add_point(rigphys_core::Vec2::new(rpm, max_point.y));
        }
        Ok(())
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.curves.iter().position(|(n, _)| n == name)
    }
}
