use crate::models::decision::{Decision, Recommendation};

use super::rain_windows::RainfallAggregate;

// Fixed policy constants, reproduced exactly for compatibility with
// historical decisions. Candidates for a config migration, but kept
// hard-coded until the thresholds have a documented rationale.
pub const RECENT_RAIN_SKIP_MM: f64 = 5.0;
pub const PAST_RAIN_SATURATION_MM: f64 = 40.0;
pub const FUTURE_RAIN_SKIP_MM: f64 = 20.0;
pub const DEAD_BAND_LITERS: f64 = 0.2;
pub const MIN_ESTIMATE_LITERS: f64 = 0.5;

const MIN_ET0_TARGET_LITERS: f64 = 1.0;
const HIGH_WIND_KMH: f64 = 20.0;
const HIGH_WIND_EXTRA_LITERS: f64 = 0.5;

/// Canonical irrigation target: the estimator's theoretical liters,
/// floored so rounding noise can never zero out a real need.
pub fn estimator_target(theoretical_liters: f64) -> f64 {
    theoretical_liters.max(MIN_ESTIMATE_LITERS)
}

/// Legacy ET0-only target: the ET0 floor plus a surcharge for drying
/// wind. Kept for pipelines running without an estimator; deprecated
/// in favor of [`estimator_target`].
pub fn legacy_et0_target(et0_mm: f64, wind_kmh: f64) -> f64 {
    let mut target = et0_mm.max(MIN_ET0_TARGET_LITERS);
    if wind_kmh > HIGH_WIND_KMH {
        target += HIGH_WIND_EXTRA_LITERS;
    }
    target
}

/// Everything the rule chain needs to settle one plant's decision.
#[derive(Debug, Clone)]
pub struct SupervisorInput {
    /// Target liters from [`estimator_target`] or [`legacy_et0_target`].
    pub target_liters: f64,
    /// Irrigation the user already logged today.
    pub water_today_liters: f64,
    pub rainfall: RainfallAggregate,
    /// Formatted recent-fertilization summary, if any.
    pub fertilization: Option<String>,
}

/// Ordered rule chain with two terminal states, IRRIGATE and SKIP.
///
/// The first matching rule wins and the order is significant: a
/// user-covered need takes precedence over every rain rule, and the
/// rain rules zero the target outright. A final dead-band check
/// downgrades IRRIGATE when the residual need is within rounding
/// noise.
pub fn decide(input: SupervisorInput) -> Decision {
    let rain = input.rainfall;
    let mut target = input.target_liters;
    let mut recommendation = Recommendation::Irrigate;
    let mut reason = format!("Estimated water need of {:.2}L.", target);

    if input.water_today_liters >= target {
        recommendation = Recommendation::Skip;
        reason = format!(
            "Need ({:.2}L) already covered by user-logged water.",
            target
        );
    } else if rain.recent_48h_mm > RECENT_RAIN_SKIP_MM {
        target = 0.0;
        recommendation = Recommendation::Skip;
        reason = format!("Recent rain ({:.1}mm).", rain.recent_48h_mm);
    } else if rain.past_5day_mm > PAST_RAIN_SATURATION_MM {
        target = 0.0;
        recommendation = Recommendation::Skip;
        reason = format!(
            "Soil saturated ({:.1}mm over the past 5 days).",
            rain.past_5day_mm
        );
    } else if rain.future_5day_mm > FUTURE_RAIN_SKIP_MM {
        target = 0.0;
        recommendation = Recommendation::Skip;
        reason = format!("Heavy rain forecast ({:.1}mm).", rain.future_5day_mm);
    }

    let delta = (target - input.water_today_liters).max(0.0);
    if recommendation == Recommendation::Irrigate && delta <= DEAD_BAND_LITERS {
        recommendation = Recommendation::Skip;
        reason = "Water need already satisfied.".to_string();
    }

    Decision {
        recommendation,
        reason,
        quantity_liters: round2(delta),
        estimated_liters: input.target_liters,
        water_today_liters: input.water_today_liters,
        past_rain_mm: rain.past_5day_mm,
        future_rain_mm: rain.future_5day_mm,
        recent_rain_mm: rain.recent_48h_mm,
        fertilization: input.fertilization,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(target: f64, water: f64, rain: RainfallAggregate) -> SupervisorInput {
        SupervisorInput {
            target_liters: target,
            water_today_liters: water,
            rainfall: rain,
            fertilization: None,
        }
    }

    #[test]
    fn dry_conditions_recommend_irrigation() {
        let decision = decide(input(3.0, 0.0, RainfallAggregate::default()));
        assert_eq!(decision.recommendation, Recommendation::Irrigate);
        assert_eq!(decision.quantity_liters, 3.0);
        assert!(decision.reason.contains("3.00L"));
    }

    #[test]
    fn recent_rain_skips_with_zero_quantity() {
        let rain = RainfallAggregate {
            recent_48h_mm: 8.0,
            ..Default::default()
        };
        let decision = decide(input(3.0, 0.0, rain));
        assert_eq!(decision.recommendation, Recommendation::Skip);
        assert_eq!(decision.quantity_liters, 0.0);
        assert!(decision.reason.contains("Recent rain"));
    }

    #[test]
    fn user_logged_water_covers_the_need() {
        let decision = decide(input(3.0, 5.0, RainfallAggregate::default()));
        assert_eq!(decision.recommendation, Recommendation::Skip);
        assert_eq!(decision.quantity_liters, 0.0);
        assert!(decision.reason.contains("covered"));
    }

    #[test]
    fn covered_need_takes_precedence_over_recent_rain() {
        let rain = RainfallAggregate {
            recent_48h_mm: 9.0,
            ..Default::default()
        };
        let decision = decide(input(2.0, 2.5, rain));
        assert_eq!(decision.recommendation, Recommendation::Skip);
        assert!(decision.reason.contains("covered"));
    }

    #[test]
    fn saturated_soil_and_forecast_rules_fire_in_order() {
        let saturated = RainfallAggregate {
            past_5day_mm: 45.0,
            ..Default::default()
        };
        let decision = decide(input(3.0, 0.0, saturated));
        assert!(decision.reason.contains("saturated"));
        assert_eq!(decision.quantity_liters, 0.0);

        let incoming = RainfallAggregate {
            future_5day_mm: 25.0,
            ..Default::default()
        };
        let decision = decide(input(3.0, 0.0, incoming));
        assert!(decision.reason.contains("forecast"));
        assert_eq!(decision.quantity_liters, 0.0);
    }

    #[test]
    fn dead_band_downgrades_marginal_irrigation() {
        let decision = decide(input(3.0, 2.9, RainfallAggregate::default()));
        assert_eq!(decision.recommendation, Recommendation::Skip);
        assert_eq!(decision.reason, "Water need already satisfied.");
        // The residual delta is still reported.
        assert!((decision.quantity_liters - 0.1).abs() < 1e-9);
    }

    #[test]
    fn quantity_is_non_negative_and_rounded() {
        let decision = decide(input(2.3333333, 1.0, RainfallAggregate::default()));
        assert_eq!(decision.quantity_liters, 1.33);

        let decision = decide(input(1.0, 10.0, RainfallAggregate::default()));
        assert!(decision.quantity_liters >= 0.0);
    }

    #[test]
    fn estimator_target_applies_minimum_floor() {
        assert_eq!(estimator_target(0.1), MIN_ESTIMATE_LITERS);
        assert_eq!(estimator_target(2.4), 2.4);
    }

    #[test]
    fn legacy_target_floors_et0_and_adds_wind_surcharge() {
        assert_eq!(legacy_et0_target(0.4, 5.0), 1.0);
        assert_eq!(legacy_et0_target(3.0, 10.0), 3.0);
        assert_eq!(legacy_et0_target(3.0, 25.0), 3.5);
    }
}
