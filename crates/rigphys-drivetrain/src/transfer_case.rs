//! Transfer case: selects 2WD/4WD power distribution between two axle
//! differentials and carries a rotating low-range gear table. The
//! propulsion marking on wheels is handled by the drivetrain wiring.

use rigphys_core::Scalar;

#[derive(Clone, Debug)]
pub struct TransferCase {
    /// Always-driven axle differential index.
    pub axle_1: usize,
    /// 4WD axle differential index, if the case has one.
    pub axle_2: Option<usize>,
    pub has_2wd: bool,
    /// Low range available in 2WD.
    pub has_2wd_lo: bool,
    pub four_wd_mode: bool,
    /// Head of the list is the engaged ratio.
    pub gear_ratios: Vec<Scalar>,
}

impl TransferCase {
    pub fn new(
        axle_1: usize,
        axle_2: Option<usize>,
        has_2wd: bool,
        has_2wd_lo: bool,
        gear_ratios: Vec<Scalar>,
    ) -> Self {
        let gear_ratios = if gear_ratios.is_empty() { vec![1.0] } else { gear_ratios };
        Self { axle_1, axle_2, has_2wd, has_2wd_lo, four_wd_mode: false, gear_ratios }
    }

    pub fn active_ratio(&self) -> Scalar {
        self.gear_ratios[0]
    }

    /// Rotate to the next gear ratio. Low range is only selectable in
    /// 4WD unless the case supports 2WD low. Returns the newly engaged
    /// ratio when a shift happened.
    pub fn toggle_gear_ratio(&mut self) -> Option<Scalar> {
        if self.gear_ratios.len() < 2 {
            return None;
        }
        if self.four_wd_mode || self.has_2wd_lo {
            self.gear_ratios.rotate_left(1);
            return Some(self.gear_ratios[0]);
        }
        None
    }

    pub fn name(&self) -> String {
        let mode = if self.four_wd_mode { "4WD " } else { "2WD " };
        if self.gear_ratios[0] > 1.0 {
            format!("{mode}Lo ({}:1)", self.gear_ratios[0])
        } else {
            format!("{mode}Hi")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ratio_table_defaults_to_direct() {
        let tc = TransferCase::new(0, Some(1), true, false, vec![]);
        assert_eq!(tc.active_ratio(), 1.0);
        assert_eq!(tc.name(), "2WD Hi");
    }

    #[test]
    fn low_range_needs_4wd() {
        let mut tc = TransferCase::new(0, Some(1), true, false, vec![1.0, 2.5]);
        assert_eq!(tc.toggle_gear_ratio(), None);
        tc.four_wd_mode = true;
        assert_eq!(tc.toggle_gear_ratio(), Some(2.5));
        assert_eq!(tc.name(), "4WD Lo (2.5:1)");
        assert_eq!(tc.toggle_gear_ratio(), Some(1.0));
    }

    #[test]
    fn two_wd_low_allows_shifting() {
        let mut tc = TransferCase::new(0, Some(1), true, true, vec![1.0, 2.5]);
        assert_eq!(tc.toggle_gear_ratio(), Some(2.5));
        assert_eq!(tc.name(), "2WD Lo (2.5:1)");
    }
}
