use serde::Serialize;

/// Round to two decimals, exact ties going to the even neighbour.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round_ties_even() / 100.0
}

/// `round(100000 / population, 2)`.
///
/// Per-100k fields multiply this rounded constant by the raw value; the
/// product itself is never rounded.
pub fn per_100k_rate(population: u64) -> f64 {
    round2(100_000.0 / population as f64)
}

/// Trailing-window sums, today's value included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowTotals {
    pub past_14_days_new_cases: i64,
    pub past_14_days_new_deaths: i64,
    pub past_7_days_new_cases: i64,
}

impl WindowTotals {
    pub fn estimated_active_cases(&self) -> Option<i64> {
        self.past_14_days_new_cases
            .checked_sub(self.past_14_days_new_deaths)
    }

    /// Field-wise sum; `None` if any field overflows.
    pub fn checked_add(&self, other: &WindowTotals) -> Option<WindowTotals> {
        Some(WindowTotals {
            past_14_days_new_cases: self
                .past_14_days_new_cases
                .checked_add(other.past_14_days_new_cases)?,
            past_14_days_new_deaths: self
                .past_14_days_new_deaths
                .checked_add(other.past_14_days_new_deaths)?,
            past_7_days_new_cases: self
                .past_7_days_new_cases
                .checked_add(other.past_7_days_new_cases)?,
        })
    }
}

/// Raw daily figures for one entity before derivation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayCounts {
    pub cases: i64,
    pub new_cases: i64,
    pub deaths: i64,
    pub new_deaths: i64,
}

impl DayCounts {
    /// Field-wise sum; `None` if any field overflows.
    pub fn checked_add(&self, other: &DayCounts) -> Option<DayCounts> {
        Some(DayCounts {
            cases: self.cases.checked_add(other.cases)?,
            new_cases: self.new_cases.checked_add(other.new_cases)?,
            deaths: self.deaths.checked_add(other.deaths)?,
            new_deaths: self.new_deaths.checked_add(other.new_deaths)?,
        })
    }
}

/// One entity's figures for one date. Never modified once committed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyRecord {
    pub cases: i64,
    pub cases_per_100k: f64,
    pub new_cases: i64,
    pub new_cases_per_100k: f64,
    pub deaths: i64,
    pub deaths_per_100k: f64,
    pub new_deaths: i64,
    pub new_deaths_per_100k: f64,
    pub rolling_avg_new_cases: f64,
    pub rolling_avg_new_cases_per_100k: f64,
    pub estimated_active_cases: i64,
    pub estimated_active_cases_per_100k: f64,
    /// Only the statewide series carries its window sums.
    #[serde(flatten)]
    pub windows: Option<WindowTotals>,
}

impl DailyRecord {
    /// County record: the 7-day average floors. `None` if the active-case
    /// estimate overflows.
    pub fn county(counts: DayCounts, windows: &WindowTotals, population: u64) -> Option<Self> {
        let avg = windows.past_7_days_new_cases.div_euclid(7) as f64;
        Self::derive(counts, windows, population, avg, None)
    }

    /// Statewide record: the 7-day average rounds to two decimals.
    pub fn statewide(counts: DayCounts, windows: WindowTotals, population: u64) -> Option<Self> {
        let avg = round2(windows.past_7_days_new_cases as f64 / 7.0);
        Self::derive(counts, &windows, population, avg, Some(windows))
    }

    fn derive(
        counts: DayCounts,
        windows: &WindowTotals,
        population: u64,
        rolling_avg_new_cases: f64,
        carried: Option<WindowTotals>,
    ) -> Option<Self> {
        let rate = per_100k_rate(population);
        let estimated_active_cases = windows.estimated_active_cases()?;
        Some(Self {
            cases: counts.cases,
            cases_per_100k: rate * counts.cases as f64,
            new_cases: counts.new_cases,
            new_cases_per_100k: rate * counts.new_cases as f64,
            deaths: counts.deaths,
            deaths_per_100k: rate * counts.deaths as f64,
            new_deaths: counts.new_deaths,
            new_deaths_per_100k: rate * counts.new_deaths as f64,
            rolling_avg_new_cases,
            rolling_avg_new_cases_per_100k: rate * rolling_avg_new_cases,
            estimated_active_cases,
            estimated_active_cases_per_100k: rate * estimated_active_cases as f64,
            windows: carried,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_is_rounded_before_multiplying() {
        let rate = per_100k_rate(37_000);
        assert_eq!(rate, 2.70);
        let counts = DayCounts {
            cases: 5,
            ..Default::default()
        };
        let rec = DailyRecord::county(counts, &WindowTotals::default(), 37_000).unwrap();
        assert_eq!(rec.cases_per_100k, 2.70 * 5.0);
        assert!((rec.cases_per_100k - 13.5).abs() < 1e-9);
        // rounding the product instead would give 13.51
        assert_ne!(round2(100_000.0 / 37_000.0 * 5.0), rec.cases_per_100k);
    }

    #[test]
    fn test_rate_ties_round_to_even() {
        // 100000 / P lands exactly on a half-cent for these populations
        assert_eq!(per_100k_rate(32_000), 3.12);
        assert_eq!(per_100k_rate(160_000), 0.62);
        assert_eq!(per_100k_rate(800_000), 0.12);
        assert_eq!(per_100k_rate(40_000), 2.5);
        assert_eq!(round2(0.375), 0.38);
    }

    #[test]
    fn test_overflowing_sums_are_refused() {
        let big = DayCounts {
            cases: i64::MAX,
            ..Default::default()
        };
        assert!(big.checked_add(&big).is_none());
        assert_eq!(
            big.checked_add(&DayCounts::default()).map(|c| c.cases),
            Some(i64::MAX)
        );

        let windows = WindowTotals {
            past_14_days_new_cases: i64::MAX,
            past_14_days_new_deaths: -1,
            past_7_days_new_cases: 0,
        };
        assert!(windows.estimated_active_cases().is_none());
        assert!(DailyRecord::county(DayCounts::default(), &windows, 1_000).is_none());
        assert!(windows.checked_add(&windows).is_none());
    }

    #[test]
    fn test_county_average_floors_statewide_rounds() {
        let windows = WindowTotals {
            past_14_days_new_cases: 30,
            past_14_days_new_deaths: 4,
            past_7_days_new_cases: 10,
        };
        let county = DailyRecord::county(DayCounts::default(), &windows, 10_000).unwrap();
        assert_eq!(county.rolling_avg_new_cases, 1.0);
        assert_eq!(county.estimated_active_cases, 26);
        assert_eq!(county.estimated_active_cases_per_100k, 10.0 * 26.0);
        assert!(county.windows.is_none());

        let state = DailyRecord::statewide(DayCounts::default(), windows, 10_000).unwrap();
        assert_eq!(state.rolling_avg_new_cases, 1.43);
        assert_eq!(state.windows, Some(windows));
    }

    #[test]
    fn test_negative_window_floors_down() {
        let windows = WindowTotals {
            past_7_days_new_cases: -3,
            ..Default::default()
        };
        let rec = DailyRecord::county(DayCounts::default(), &windows, 100_000).unwrap();
        assert_eq!(rec.rolling_avg_new_cases, -1.0);
    }

    #[test]
    fn test_json_field_names() {
        let rec = DailyRecord::county(
            DayCounts {
                cases: 25,
                new_cases: 10,
                deaths: 1,
                new_deaths: 0,
            },
            &WindowTotals::default(),
            10_000,
        )
        .unwrap();
        let value = serde_json::to_value(rec).unwrap();
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "cases",
                "cases_per_100k",
                "deaths",
                "deaths_per_100k",
                "estimated_active_cases",
                "estimated_active_cases_per_100k",
                "new_cases",
                "new_cases_per_100k",
                "new_deaths",
                "new_deaths_per_100k",
                "rolling_avg_new_cases",
                "rolling_avg_new_cases_per_100k",
            ]
        );
        assert_eq!(value["cases"], 25);

        let state =
            DailyRecord::statewide(DayCounts::default(), WindowTotals::default(), 10).unwrap();
        let value = serde_json::to_value(state).unwrap();
        assert_eq!(value.as_object().unwrap().len(), 15);
        assert_eq!(value["past_7_days_new_cases"], 0);
    }
}
