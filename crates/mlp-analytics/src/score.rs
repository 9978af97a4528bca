//! Pure scoring functions

use crate::config::AnalyticsConfig;
use mlp_content::Theme;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Responders over members, clamped to `[0, 1]`; an empty team scores 0
#[must_use]
pub fn participation_rate(responders: usize, members: usize) -> f64 {
    if members == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let rate = responders as f64 / members as f64;
    rate.clamp(0.0, 1.0)
}

// 29/200 scales to 14.499999999999998; nudge so exact halves go up
const HALF_UP_SLACK: f64 = 1e-9;

/// Rate in `[0, 1]` as a whole percentage, halves rounded up
#[must_use]
pub fn percent(rate: f64) -> u8 {
    if !rate.is_finite() {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let pct = (rate.clamp(0.0, 1.0) * 100.0 + HALF_UP_SLACK).round() as u8;
    pct
}

/// Length component: average length over the target, capped at 1
#[must_use]
pub fn length_ratio(total_chars: u64, responses: u64, target_chars: u32) -> f64 {
    if responses == 0 || target_chars == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let avg = total_chars as f64 / responses as f64;
    (avg / f64::from(target_chars)).min(1.0)
}

/// Weighted engagement in `[0, 1]`
#[must_use]
pub fn engagement_score(participation: f64, length_ratio: f64, config: &AnalyticsConfig) -> f64 {
    let score = config.participation_weight * participation.clamp(0.0, 1.0)
        + config.length_weight * length_ratio.clamp(0.0, 1.0);
    score.clamp(0.0, 1.0)
}

/// Per-theme rollup inside a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeStat {
    pub theme: Theme,
    pub response_count: u64,
    pub participation_percent: u8,
    pub engagement_percent: u8,
}

impl ThemeStat {
    /// Ranking key: volume weighted by engagement
    #[inline]
    #[must_use]
    pub fn composite(&self) -> u64 {
        self.response_count * u64::from(self.engagement_percent)
    }
}

/// Highest composite first; equal composites by theme name
pub fn rank_themes(stats: &mut [ThemeStat]) {
    stats.sort_by(|a, b| match b.composite().cmp(&a.composite()) {
        Ordering::Equal => a.theme.as_str().cmp(b.theme.as_str()),
        other => other,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn stat(name: &str, responses: u64, engagement: u8) -> ThemeStat {
        ThemeStat {
            theme: Theme::new(name),
            response_count: responses,
            participation_percent: 0,
            engagement_percent: engagement,
        }
    }

    #[test]
    fn seven_of_eight_rounds_up() {
        let rate = participation_rate(7, 8);
        assert!((rate - 0.875).abs() < f64::EPSILON);
        assert_eq!(percent(rate), 88);
    }

    #[test]
    fn inexact_halves_round_up() {
        assert_eq!(percent(participation_rate(29, 200)), 15);
        assert_eq!(percent(participation_rate(1, 200)), 1);
        assert_eq!(percent(participation_rate(57, 400)), 14);
        assert_eq!(percent(participation_rate(1, 3)), 33);
        assert_eq!(percent(participation_rate(2, 3)), 67);
    }

    #[test]
    fn empty_team_scores_zero() {
        assert!(participation_rate(3, 0).abs() < f64::EPSILON);
        assert_eq!(percent(participation_rate(0, 0)), 0);
    }

    #[test]
    fn more_responders_than_members_is_clamped() {
        assert!((participation_rate(9, 8) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn engagement_uses_weights() {
        let config = AnalyticsConfig::default();
        let full = engagement_score(1.0, 1.0, &config);
        assert!((full - 1.0).abs() < 1e-9);
        let half = engagement_score(0.5, length_ratio(140, 1, 280), &config);
        assert!((half - 0.5).abs() < 1e-9);
        assert!((length_ratio(10_000, 2, 280) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn themes_rank_by_composite() {
        let mut stats = vec![stat("Trust", 38, 87), stat("Feedback", 45, 92)];
        rank_themes(&mut stats);
        assert_eq!(stats[0].theme.as_str(), "Feedback");
        assert_eq!(stats[0].composite(), 4140);
        assert_eq!(stats[1].composite(), 3306);
    }

    #[test]
    fn full_tie_breaks_alphabetically() {
        let mut stats = vec![stat("Candor", 10, 50), stat("Belonging", 10, 50), stat("Alpha", 5, 100)];
        rank_themes(&mut stats);
        let order: Vec<_> = stats.iter().map(|s| s.theme.as_str().to_string()).collect();
        assert_eq!(order, vec!["Alpha", "Belonging", "Candor"]);
    }

    proptest! {
        #[test]
        fn prop_participation_in_unit_interval(responders in 0usize..10_000, members in 0usize..10_000) {
            let rate = participation_rate(responders, members);
            prop_assert!((0.0..=1.0).contains(&rate));
            prop_assert!(percent(rate) <= 100);
        }

        #[test]
        fn prop_engagement_in_unit_interval(
            responders in 0usize..500,
            members in 0usize..500,
            chars in 0u64..1_000_000,
            responses in 0u64..1_000,
        ) {
            let config = AnalyticsConfig::default();
            let score = engagement_score(
                participation_rate(responders, members),
                length_ratio(chars, responses, config.target_response_chars),
                &config,
            );
            prop_assert!((0.0..=1.0).contains(&score));
        }
    }
}
