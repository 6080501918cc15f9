//! Drivetrain wiring: resolves axle declarations against the built
//! wheel set, validates the transfer case, and auto-builds any
//! differential level the definition left out. Differential indices are
//! positional, so construction and auto-build preserve insertion order.

use rigphys_core::{NodeId, Scalar};
use rigphys_softbody::Rig;

use crate::differential::{DiffMode, Differential};
use crate::transfer_case::TransferCase;

/// One `axles` declaration: two wheels identified by their axis node
/// pairs, plus the selectable differential behaviors.
#[derive(Clone, Debug, Default)]
pub struct AxleDef {
    pub wheels: [[u32; 2]; 2],
    pub modes: Vec<DiffMode>,
}

/// One `interaxle` declaration over two per-wheel differential indices.
#[derive(Clone, Debug, Default)]
pub struct InterAxleDef {
    pub axles: [i32; 2],
    pub modes: Vec<DiffMode>,
}

#[derive(Clone, Debug)]
pub struct TransferCaseDef {
    pub axle_1: i32,
    /// Negative means no 4WD axle.
    pub axle_2: i32,
    pub has_2wd: bool,
    pub has_2wd_lo: bool,
    pub gear_ratios: Vec<Scalar>,
}

impl Default for TransferCaseDef {
    fn default() -> Self {
        Self { axle_1: 0, axle_2: -1, has_2wd: true, has_2wd_lo: false, gear_ratios: vec![1.0] }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DrivetrainDef {
    pub axles: Vec<AxleDef>,
    pub interaxles: Vec<InterAxleDef>,
    pub transfer_case: Option<TransferCaseDef>,
}

#[derive(Debug, Default)]
pub struct Drivetrain {
    /// Couples two wheel indices each.
    pub wheel_diffs: Vec<Differential>,
    /// Couples two `wheel_diffs` indices each.
    pub axle_diffs: Vec<Differential>,
    pub transfer_case: Option<TransferCase>,
}

/// Wheels match on their axis node pair in either order.
pub fn assign_wheel_to_axle(rig: &Rig, node_1: NodeId, node_2: NodeId) -> Option<usize> {
    rig.wheels.iter().position(|w| {
        (w.axis0 == node_1 && w.axis1 == node_2) || (w.axis0 == node_2 && w.axis1 == node_1)
    })
}

impl Drivetrain {
    pub fn build(rig: &mut Rig, def: &DrivetrainDef) -> Self {
        let mut dt = Self::default();
        for axle in &def.axles {
            dt.process_axle(rig, axle);
        }
        if let Some(tcase) = &def.transfer_case {
            dt.process_transfer_case(rig, tcase);
        }
        for interaxle in &def.interaxles {
            dt.process_interaxle(rig, interaxle);
        }
        dt.auto_build(rig);
        dt
    }

    fn resolve_node(&self, rig: &mut Rig, index: u32) -> Option<NodeId> {
        if (index as usize) < rig.nodes.len() {
            Some(NodeId(index))
        } else {
            rig.log.error(format!("axles: node reference {index} out of range"));
            None
        }
    }

    fn process_axle(&mut self, rig: &mut Rig, def: &AxleDef) {
        let mut wheel_indices = [0usize; 2];
        for (slot, refs) in wheel_indices.iter_mut().zip(&def.wheels) {
            let (Some(n1), Some(n2)) = (
                self.resolve_node(rig, refs[0]),
                self.resolve_node(rig, refs[1]),
            ) else {
                return;
            };
            match assign_wheel_to_axle(rig, n1, n2) {
                Some(index) => *slot = index,
                None => {
                    rig.log.warning(format!(
                        "axles: no wheel with axis nodes {} and {}, skipping",
                        refs[0], refs[1]
                    ));
                    return;
                }
            }
        }

        let mut diff = Differential::new(wheel_indices[0], wheel_indices[1]);
        if def.modes.is_empty() {
            rig.log.info("axles: no differential defined, defaulting to Open & Locked");
            diff.add_mode(DiffMode::Open);
            diff.add_mode(DiffMode::Locked);
        } else {
            for &mode in &def.modes {
                diff.add_mode(mode);
            }
        }
        self.wheel_diffs.push(diff);
    }

    fn process_interaxle(&mut self, rig: &mut Rig, def: &InterAxleDef) {
        let [a1, a2] = def.axles;
        if a1 == a2 || a1.min(a2) < 0 || a1.max(a2) as usize >= self.wheel_diffs.len() {
            rig.log.error("interaxle: invalid axle ids, skipping");
            return;
        }
        if let Some(tcase) = &self.transfer_case {
            let pair = (tcase.axle_1 as i32, tcase.axle_2.map_or(-1, |a| a as i32));
            if pair == (a1, a2) || pair == (a2, a1) {
                rig.log.error(
                    "interaxle: same axle pair as the transfer case, skipping",
                );
                return;
            }
        }

        let mut diff = Differential::new(a1 as usize, a2 as usize);
        if def.modes.is_empty() {
            rig.log.info("interaxle: no differential defined, defaulting to Locked");
            diff.add_mode(DiffMode::Locked);
        } else {
            for &mode in &def.modes {
                diff.add_mode(mode);
            }
        }
        self.axle_diffs.push(diff);
    }

    fn process_transfer_case(&mut self, rig: &mut Rig, def: &TransferCaseDef) {
        if def.axle_1 == def.axle_2
            || def.axle_1 < 0
            || def.axle_1.max(def.axle_2) as usize >= self.wheel_diffs.len()
        {
            rig.log.error("transfercase: invalid axle ids, skipping");
            return;
        }
        if def.axle_2 < 0 {
            if !def.has_2wd {
                rig.log.error(
                    "transfercase: define an alternate axle or allow 2WD, skipping",
                );
                return;
            }
            rig.log.info("transfercase: no alternate axle defined, defaulting to 2WD only");
        }

        let axle_2 = (def.axle_2 >= 0).then_some(def.axle_2 as usize);
        let mut tcase = TransferCase::new(
            def.axle_1 as usize,
            axle_2,
            def.has_2wd,
            def.has_2wd_lo,
            def.gear_ratios.clone(),
        );

        // re-derive propulsion from the transfer case wiring
        for wheel in &mut rig.wheels {
            wheel.propelled = false;
        }
        for index in self.wheel_diffs[def.axle_1 as usize].connections {
            rig.wheels[index].propelled = true;
        }
        if !def.has_2wd {
            for index in self.wheel_diffs[def.axle_2 as usize].connections {
                rig.wheels[index].propelled = true;
            }
            tcase.four_wd_mode = true;
        }
        self.transfer_case = Some(tcase);
    }

    /// Build the differential levels the definition left out: viscous
    /// coupling is never synthesized here, declared-or-default behavior
    /// lists are.
    fn auto_build(&mut self, rig: &Rig) {
        if self.wheel_diffs.is_empty() {
            for pair in rig.propelled_wheels.chunks_exact(2) {
                self.wheel_diffs.push(Differential::with_modes(
                    pair[0].idx(),
                    pair[1].idx(),
                    &[DiffMode::Locked, DiffMode::Open],
                ));
            }
        }

        if self.axle_diffs.is_empty() {
            let tcase_pair = self.transfer_case.as_ref().and_then(|t| {
                t.axle_2.map(|a2| (t.axle_1.min(a2), t.axle_1.max(a2)))
            });
            for i in 1..self.wheel_diffs.len() {
                if tcase_pair == Some((i - 1, i)) {
                    continue;
                }
                self.axle_diffs.push(Differential::with_modes(i - 1, i, &[DiffMode::Locked]));
            }
        }

        // the transfer case itself couples its two axles when engaged
        if let Some(tcase) = &self.transfer_case {
            if let Some(axle_2) = tcase.axle_2 {
                self.axle_diffs.push(Differential::with_modes(
                    tcase.axle_1,
                    axle_2,
                    &[DiffMode::Locked],
                ));
            }
        }
    }

    /// Switch between 2WD and 4WD. Leaving 4WD on a case without 2WD low
    /// first shifts back to the direct ratio.
    pub fn toggle_transfer_case_mode(&mut self, rig: &mut Rig) {
        let Some(tcase) = self.transfer_case.as_mut() else { return };
        let Some(axle_2) = tcase.axle_2 else { return };
        if !tcase.has_2wd {
            return;
        }

        if tcase.four_wd_mode && !tcase.has_2wd_lo {
            for _ in 0..tcase.gear_ratios.len() {
                tcase.toggle_gear_ratio();
                if tcase.gear_ratios[0] == 1.0 {
                    break;
                }
            }
        }

        tcase.four_wd_mode = !tcase.four_wd_mode;
        for index in self.wheel_diffs[axle_2].connections {
            rig.wheels[index].propelled = tcase.four_wd_mode;
        }
    }

    pub fn toggle_transfer_case_gear_ratio(&mut self) -> Option<Scalar> {
        self.transfer_case.as_mut()?.toggle_gear_ratio()
    }
}
