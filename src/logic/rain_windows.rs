use crate::models::weather::RainDay;
use chrono::{Duration, NaiveDate};

/// Rainfall sums over the four fixed windows the supervisor reasons
/// about, relative to a reference "today". Recomputed on every
/// invocation, never persisted on their own.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RainfallAggregate {
    /// Accumulated rain strictly before today.
    pub past_5day_mm: f64,
    /// Accumulated rain strictly after today.
    pub future_5day_mm: f64,
    /// Accumulated rain for yesterday and today.
    pub recent_48h_mm: f64,
    /// Rain forecast for exactly tomorrow.
    pub tomorrow_mm: f64,
}

/// Classify a daily rainfall trend into accumulation windows.
///
/// Today contributes to neither the past nor the future window, only
/// to the 48h one. Comparison is day-precision; non-finite rain values
/// coerce to zero.
pub fn accumulate(trend: &[RainDay], today: NaiveDate) -> RainfallAggregate {
    let yesterday = today - Duration::days(1);
    let tomorrow = today + Duration::days(1);

    let mut agg = RainfallAggregate::default();
    for day in trend {
        let rain = if day.rain_mm.is_finite() { day.rain_mm } else { 0.0 };
        if day.date < today {
            agg.past_5day_mm += rain;
        } else if day.date > today {
            agg.future_5day_mm += rain;
        }
        if day.date == today || day.date == yesterday {
            agg.recent_48h_mm += rain;
        }
        if day.date == tomorrow {
            agg.tomorrow_mm = rain;
        }
    }
    agg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn day(s: &str, rain_mm: f64) -> RainDay {
        RainDay {
            date: date(s),
            rain_mm,
        }
    }

    #[test]
    fn empty_trend_yields_zero_aggregates() {
        let agg = accumulate(&[], date("2026-08-24"));
        assert_eq!(agg, RainfallAggregate::default());
    }

    #[test]
    fn today_counts_in_neither_past_nor_future() {
        let today = date("2026-08-24");
        let trend = vec![
            day("2026-08-22", 2.0),
            day("2026-08-24", 10.0),
            day("2026-08-26", 3.0),
        ];
        let agg = accumulate(&trend, today);
        assert_eq!(agg.past_5day_mm, 2.0);
        assert_eq!(agg.future_5day_mm, 3.0);
        // Today's 10mm only lands in the 48h window.
        assert_eq!(agg.recent_48h_mm, 10.0);
    }

    #[test]
    fn recent_window_is_exactly_yesterday_plus_today() {
        let today = date("2026-08-24");
        let trend = vec![
            day("2026-08-20", 50.0),
            day("2026-08-23", 4.0),
            day("2026-08-24", 1.5),
            day("2026-08-25", 50.0),
        ];
        let agg = accumulate(&trend, today);
        assert!((agg.recent_48h_mm - 5.5).abs() < 1e-9);
    }

    #[test]
    fn tomorrow_is_the_exact_next_day_or_zero() {
        let today = date("2026-08-24");
        let agg = accumulate(&[day("2026-08-25", 7.0)], today);
        assert_eq!(agg.tomorrow_mm, 7.0);

        let agg = accumulate(&[day("2026-08-26", 7.0)], today);
        assert_eq!(agg.tomorrow_mm, 0.0);
    }

    #[test]
    fn non_finite_rain_coerces_to_zero() {
        let today = date("2026-08-24");
        let trend = vec![day("2026-08-23", f64::NAN), day("2026-08-22", 1.0)];
        let agg = accumulate(&trend, today);
        assert_eq!(agg.past_5day_mm, 1.0);
        assert_eq!(agg.recent_48h_mm, 0.0);
    }
}
