//! Month grids and quick-date helpers for the date picker.

use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Days shown per month: six Monday-first weeks.
pub const GRID_DAYS: usize = 42;

/// Months the date picker renders at once.
pub const DEFAULT_MONTHS_SHOWN: usize = 6;

/// How a task date was chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateType {
    Today,
    Tomorrow,
    Weekend,
    Custom,
    None,
}

impl DateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateType::Today => "today",
            DateType::Tomorrow => "tomorrow",
            DateType::Weekend => "weekend",
            DateType::Custom => "custom",
            DateType::None => "none",
        }
    }
}

/// One cell of a month grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    pub date: NaiveDate,
    /// Falls inside the displayed month (otherwise a leading/trailing filler).
    pub in_month: bool,
    pub is_today: bool,
    pub is_selected: bool,
    pub is_weekend: bool,
}

/// A displayed month: its first day plus 42 cells.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthGrid {
    pub month: NaiveDate,
    pub days: Vec<CalendarDay>,
}

impl MonthGrid {
    /// The grid as six rows of seven days.
    pub fn weeks(&self) -> impl Iterator<Item = &[CalendarDay]> {
        self.days.chunks(7)
    }

    /// Short title, e.g. `Mar 2025`.
    pub fn title(&self) -> String {
        self.month.format("%b %Y").to_string()
    }
}

/// First day of the month containing `date`.
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Build the 42-day grid for the month containing `month`, starting on the
/// Monday on or before its first day.
pub fn month_grid(month: NaiveDate, today: NaiveDate, selected: Option<NaiveDate>) -> MonthGrid {
    let first = first_of_month(month);
    let offset = first.weekday().num_days_from_monday() as i64;
    let start = first - Duration::days(offset);

    let days = (0..GRID_DAYS as i64)
        .map(|i| {
            let date = start + Duration::days(i);
            CalendarDay {
                date,
                in_month: date.month() == first.month() && date.year() == first.year(),
                is_today: date == today,
                is_selected: selected == Some(date),
                is_weekend: is_weekend(date),
            }
        })
        .collect();

    MonthGrid { month: first, days }
}

/// `count` consecutive month grids beginning with the month of `start`.
pub fn months_from(
    start: NaiveDate,
    count: usize,
    today: NaiveDate,
    selected: Option<NaiveDate>,
) -> Vec<MonthGrid> {
    let first = first_of_month(start);
    (0..count)
        .map_while(|i| first.checked_add_months(Months::new(i as u32)))
        .map(|month| month_grid(month, today, selected))
        .collect()
}

/// Saturday or Sunday.
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The next Saturday strictly after `today` (a week out if today is Saturday).
pub fn next_weekend(today: NaiveDate) -> NaiveDate {
    let from_sunday = today.weekday().num_days_from_sunday() as i64;
    let days_until_saturday = (6 - from_sunday).rem_euclid(7);
    let days = if days_until_saturday == 0 { 7 } else { days_until_saturday };
    today + Duration::days(days)
}

/// Resolve a quick-pick option to a date. `Custom` has no intrinsic date.
pub fn quick_date(date_type: DateType, today: NaiveDate) -> Option<NaiveDate> {
    match date_type {
        DateType::Today => Some(today),
        DateType::Tomorrow => today.succ_opt(),
        DateType::Weekend => Some(next_weekend(today)),
        DateType::Custom | DateType::None => None,
    }
}

/// Which quick-pick option `selected` corresponds to, as highlighted by the picker.
pub fn classify(selected: Option<NaiveDate>, today: NaiveDate) -> DateType {
    match selected {
        None => DateType::None,
        Some(date) if date == today => DateType::Today,
        Some(date) if Some(date) == today.succ_opt() => DateType::Tomorrow,
        Some(date) if is_weekend(date) => DateType::Weekend,
        Some(_) => DateType::Custom,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_grid_starts_on_monday() {
        // 1 March 2025 is a Saturday.
        let grid = month_grid(ymd(2025, 3, 15), ymd(2025, 3, 10), None);
        assert_eq!(grid.month, ymd(2025, 3, 1));
        assert_eq!(grid.days.len(), GRID_DAYS);
        assert_eq!(grid.days[0].date, ymd(2025, 2, 24));
        assert_eq!(grid.days[0].date.weekday(), Weekday::Mon);
        assert!(!grid.days[0].in_month);
        assert!(grid.days[5].in_month);
        assert_eq!(grid.days[41].date, ymd(2025, 4, 6));
        assert_eq!(grid.weeks().count(), 6);
        assert_eq!(grid.title(), "Mar 2025");
    }

    #[test]
    fn test_grid_month_starting_monday_has_no_leading_filler() {
        // 1 September 2025 is a Monday.
        let grid = month_grid(ymd(2025, 9, 1), ymd(2025, 9, 1), None);
        assert_eq!(grid.days[0].date, ymd(2025, 9, 1));
        assert!(grid.days[0].in_month);
        assert!(grid.days[0].is_today);
    }

    #[test]
    fn test_grid_sunday_start_month() {
        // 1 June 2025 is a Sunday, so six leading days from May.
        let grid = month_grid(ymd(2025, 6, 1), ymd(2025, 1, 1), None);
        assert_eq!(grid.days[0].date, ymd(2025, 5, 26));
        assert_eq!(grid.days.iter().position(|d| d.in_month), Some(6));
    }

    #[test]
    fn test_grid_flags() {
        let selected = ymd(2025, 3, 20);
        let grid = month_grid(ymd(2025, 3, 1), ymd(2025, 3, 10), Some(selected));

        let flagged: Vec<_> = grid.days.iter().filter(|d| d.is_selected).collect();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].date, selected);

        let today: Vec<_> = grid.days.iter().filter(|d| d.is_today).collect();
        assert_eq!(today.len(), 1);

        // Columns 5 and 6 are Saturday and Sunday.
        for week in grid.weeks() {
            assert!(week[5].is_weekend && week[6].is_weekend);
            assert!(week[..5].iter().all(|d| !d.is_weekend));
        }
    }

    #[test]
    fn test_months_from_crosses_year() {
        let months = months_from(ymd(2025, 11, 20), DEFAULT_MONTHS_SHOWN, ymd(2025, 11, 20), None);
        let firsts: Vec<NaiveDate> = months.iter().map(|m| m.month).collect();
        assert_eq!(
            firsts,
            vec![
                ymd(2025, 11, 1),
                ymd(2025, 12, 1),
                ymd(2026, 1, 1),
                ymd(2026, 2, 1),
                ymd(2026, 3, 1),
                ymd(2026, 4, 1),
            ]
        );
    }

    #[test]
    fn test_next_weekend() {
        // Wednesday -> Saturday of the same week.
        assert_eq!(next_weekend(ymd(2025, 3, 12)), ymd(2025, 3, 15));
        // Saturday -> next Saturday.
        assert_eq!(next_weekend(ymd(2025, 3, 15)), ymd(2025, 3, 22));
        // Sunday -> following Saturday.
        assert_eq!(next_weekend(ymd(2025, 3, 16)), ymd(2025, 3, 22));
    }

    #[test]
    fn test_quick_date() {
        let today = ymd(2025, 12, 31);
        assert_eq!(quick_date(DateType::Today, today), Some(today));
        assert_eq!(quick_date(DateType::Tomorrow, today), Some(ymd(2026, 1, 1)));
        assert_eq!(quick_date(DateType::Weekend, today), Some(ymd(2026, 1, 3)));
        assert_eq!(quick_date(DateType::None, today), None);
        assert_eq!(quick_date(DateType::Custom, today), None);
    }

    #[test]
    fn test_classify() {
        let today = ymd(2025, 3, 12);
        assert_eq!(classify(None, today), DateType::None);
        assert_eq!(classify(Some(today), today), DateType::Today);
        assert_eq!(classify(Some(ymd(2025, 3, 13)), today), DateType::Tomorrow);
        assert_eq!(classify(Some(ymd(2025, 3, 16)), today), DateType::Weekend);
        assert_eq!(classify(Some(ymd(2025, 3, 18)), today), DateType::Custom);
    }

    #[test]
    fn test_date_type_serde() {
        assert_eq!(serde_json::to_string(&DateType::Weekend).unwrap(), "\"weekend\"");
        assert_eq!(DateType::Custom.as_str(), "custom");
    }
}
