//! Candidate ordering shared by selection and alignment.

use super::{EnforcedBlockedSeamPoint, SeamCandidate};
use crate::config::{SeamPlacerConfig, SeamPosition};
use crate::geometry::Vec3;
use crate::CoordF;

/// Bell shaped falloff: `mean_value` at `mean_x`, approaching 0 far away.
pub fn gauss(value: CoordF, mean_x: CoordF, mean_value: CoordF, falloff_speed: CoordF) -> CoordF {
    let shifted = value - mean_x;
    let denominator = falloff_speed * shifted * shifted + 1.0;
    let exponent = 1.0 / denominator;
    mean_value * (exponent.exp() - 1.0) / (std::f64::consts::E - 1.0)
}

/// Penalty of a turning angle. Sharp corners of either sign score lower than
/// straight runs, and concave corners lower than convex ones.
pub fn compute_angle_penalty(ccw_angle: CoordF) -> CoordF {
    gauss(ccw_angle, 0.0, 1.0, 3.0) + 1.0 / (2.0 + (-ccw_angle).exp())
}

/// Comparison rules for one strategy.
#[derive(Clone, Copy, Debug)]
pub struct SeamComparator {
    setup: SeamPosition,
    angle_importance: CoordF,
    overhang_threshold: CoordF,
    score_tolerance: CoordF,
    distance_falloff: CoordF,
}

impl SeamComparator {
    pub fn new(setup: SeamPosition, config: &SeamPlacerConfig) -> Self {
        Self {
            setup,
            angle_importance: config.angle_importance(setup),
            overhang_threshold: config.overhang_distance_threshold,
            score_tolerance: config.seam_align_score_tolerance,
            distance_falloff: config.nearest_distance_falloff,
        }
    }

    pub fn setup(&self) -> SeamPosition {
        self.setup
    }

    /// True if `a` is a strictly better seam than `b`. Ties return false, so a
    /// linear scan keeps the first of equal candidates.
    ///
    /// `preferred` only matters for [`SeamPosition::Nearest`]: candidates close
    /// to it in XY get a smaller penalty.
    pub fn is_first_better(
        &self,
        a: &SeamCandidate,
        b: &SeamCandidate,
        preferred: Option<&Vec3>,
    ) -> bool {
        if a.point_type != b.point_type {
            return a.point_type > b.point_type;
        }

        if let Some(a_wins) = self.overhang_decides(a, b) {
            return a_wins;
        }

        if self.setup == SeamPosition::Rear {
            return a.position.y > b.position.y;
        }

        let (distance_penalty_a, distance_penalty_b) = match (self.setup, preferred) {
            (SeamPosition::Nearest, Some(p)) => (
                self.distance_penalty(&a.position, p),
                self.distance_penalty(&b.position, p),
            ),
            _ => (1.0, 1.0),
        };

        self.score(a) * distance_penalty_a < self.score(b) * distance_penalty_b
    }

    /// True if `a` is better than `b` or worse by less than the score tolerance.
    pub fn is_first_not_much_worse(&self, a: &SeamCandidate, b: &SeamCandidate) -> bool {
        match a.point_type {
            EnforcedBlockedSeamPoint::Enforced => return true,
            EnforcedBlockedSeamPoint::Blocked => return false,
            EnforcedBlockedSeamPoint::Neutral => {}
        }

        if a.point_type != b.point_type {
            return a.point_type > b.point_type;
        }

        if let Some(a_wins) = self.overhang_decides(a, b) {
            return a_wins;
        }

        if self.setup == SeamPosition::Rear {
            return a.position.y + self.score_tolerance * 5.0 > b.position.y;
        }

        let penalty_a = self.score(a);
        let penalty_b = self.score(b);
        penalty_a <= penalty_b || (penalty_a - penalty_b).abs() < self.score_tolerance
    }

    pub fn are_similar(&self, a: &SeamCandidate, b: &SeamCandidate) -> bool {
        self.is_first_not_much_worse(a, b) && self.is_first_not_much_worse(b, a)
    }

    /// Scalar penalty of a candidate, lower is better. Under Rear this is the
    /// Y coordinate.
    pub fn get_penalty(&self, a: &SeamCandidate) -> CoordF {
        if self.setup == SeamPosition::Rear {
            return a.position.y;
        }
        self.score(a)
    }

    pub fn is_overhanging(&self, a: &SeamCandidate) -> bool {
        a.overhang > self.overhang_threshold
    }

    /// A candidate overhanging more than the threshold loses against any
    /// candidate that overhangs less.
    fn overhang_decides(&self, a: &SeamCandidate, b: &SeamCandidate) -> Option<bool> {
        if self.is_overhanging(a) && b.overhang < a.overhang {
            return Some(false);
        }
        if self.is_overhanging(b) && a.overhang < b.overhang {
            return Some(true);
        }
        None
    }

    fn score(&self, a: &SeamCandidate) -> CoordF {
        (a.visibility + self.angle_importance) * compute_angle_penalty(a.local_ccw_angle)
    }

    fn distance_penalty(&self, position: &Vec3, preferred: &Vec3) -> CoordF {
        let dx = position.x - preferred.x;
        let dy = position.y - preferred.y;
        1.1 - gauss((dx * dx + dy * dy).sqrt(), 0.0, 1.0, self.distance_falloff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(x: f64, y: f64, angle: f64) -> SeamCandidate {
        SeamCandidate::new(Vec3::new(x, y, 0.0), 0, angle)
    }

    fn comparator(setup: SeamPosition) -> SeamComparator {
        SeamComparator::new(setup, &SeamPlacerConfig::default())
    }

    #[test]
    fn test_gauss_peak_and_falloff() {
        assert!((gauss(2.0, 2.0, 3.5, 1.0) - 3.5).abs() < 1e-6);
        assert!(gauss(1.0, 2.0, 3.5, 1.0) < 3.5);
        assert!(gauss(1e6, 0.0, 1.0, 1.0) < 1e-6);
        assert!((gauss(-1.5, 0.0, 1.0, 3.0) - gauss(1.5, 0.0, 1.0, 3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_angle_penalty_prefers_concave() {
        let straight = compute_angle_penalty(0.0);
        let concave = compute_angle_penalty(-std::f64::consts::FRAC_PI_2);
        let convex = compute_angle_penalty(std::f64::consts::FRAC_PI_2);
        assert!(concave < convex);
        assert!(convex < straight);
    }

    #[test]
    fn test_type_priority() {
        let c = comparator(SeamPosition::Aligned);
        let mut enforced = candidate(0.0, 0.0, 0.0);
        enforced.point_type = EnforcedBlockedSeamPoint::Enforced;
        enforced.visibility = 1.0;
        let neutral = candidate(0.0, 0.0, -1.5);
        let mut blocked = candidate(0.0, 0.0, -1.5);
        blocked.point_type = EnforcedBlockedSeamPoint::Blocked;

        assert!(c.is_first_better(&enforced, &neutral, None));
        assert!(!c.is_first_better(&neutral, &enforced, None));
        assert!(c.is_first_better(&neutral, &blocked, None));
        assert!(!c.is_first_better(&blocked, &neutral, None));

        assert!(c.is_first_not_much_worse(&enforced, &neutral));
        assert!(!c.is_first_not_much_worse(&blocked, &blocked));
        assert!(!c.is_first_not_much_worse(&neutral, &enforced));
    }

    #[test]
    fn test_overhang_veto() {
        let c = comparator(SeamPosition::Aligned);
        let mut hidden_overhang = candidate(0.0, 0.0, -1.5);
        hidden_overhang.overhang = 0.5;
        let plain = candidate(0.0, 0.0, 0.0);
        assert!(!c.is_first_better(&hidden_overhang, &plain, None));
        assert!(c.is_first_better(&plain, &hidden_overhang, None));
        assert!(!c.is_first_not_much_worse(&hidden_overhang, &plain));
        assert!(c.is_first_not_much_worse(&plain, &hidden_overhang));
        assert!(c.is_overhanging(&hidden_overhang));
        assert!(!c.is_overhanging(&plain));

        // both over the threshold, the smaller overhang wins either way round
        let mut slight = plain.clone();
        slight.overhang = 0.2;
        assert!(c.is_first_better(&slight, &hidden_overhang, None));
        assert!(!c.is_first_better(&hidden_overhang, &slight, None));
    }

    #[test]
    fn test_rear_prefers_max_y() {
        let c = comparator(SeamPosition::Rear);
        let back = candidate(0.0, 10.0, 1.0);
        let front = candidate(0.0, 0.0, -1.5);
        assert!(c.is_first_better(&back, &front, None));
        assert!(!c.is_first_better(&front, &back, None));
        assert!(!c.is_first_better(&back, &back.clone(), None));
        assert!(c.is_first_not_much_worse(&candidate(0.0, 9.0, 0.0), &back));
        assert!((c.get_penalty(&back) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_nearest_uses_own_distance() {
        let c = comparator(SeamPosition::Nearest);
        let near = candidate(1.0, 0.0, 0.5);
        let far = candidate(30.0, 0.0, 0.5);
        let preferred = Vec3::new(0.0, 0.0, 0.0);
        assert!(c.is_first_better(&near, &far, Some(&preferred)));
        assert!(!c.is_first_better(&far, &near, Some(&preferred)));
        // without a preferred point the two are equal
        assert!(!c.is_first_better(&near, &far, None));
    }

    #[test]
    fn test_not_much_worse_tolerance() {
        let c = comparator(SeamPosition::Aligned);
        let a = candidate(0.0, 0.0, 0.0);
        let mut b = a.clone();
        b.visibility = 0.1;
        assert!(c.is_first_not_much_worse(&b, &a));
        assert!(c.are_similar(&a, &b));
        b.visibility = 1.0;
        assert!(!c.is_first_not_much_worse(&b, &a));
        assert!(c.is_first_not_much_worse(&a, &b));
        assert!(!c.are_similar(&a, &b));
    }
}
