// 📊 Reporting Views - Overview, Charts, Detailed data
// Every function here is a pure computation over the full set of readings.
// Nothing is cached: callers re-read storage and recompute on each render.

use crate::db::Reading;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// How many rows the overview lists under "Recent Entries"
pub const RECENT_LIMIT: usize = 5;

/// Unit shown next to water quantities
pub const VOLUME_UNIT: &str = "m³";

/// Sort newest first.
///
/// Rows with an unparseable date go last; ties keep the most recently
/// inserted row first.
pub fn sort_by_date_desc(readings: &mut [Reading]) {
    readings.sort_by(|a, b| {
        let (ta, tb) = (a.timestamp(), b.timestamp());
        match (ta, tb) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
        .then_with(|| b.id.cmp(&a.id))
    });
}

pub fn format_amount(value: f64) -> String {
    format!("{:.2}", value)
}

// ============================================================================
// OVERVIEW
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub total_houses: usize,
    pub total_usage: f64,
    pub average_usage: f64,
    pub total_revenue: f64,
    pub average_bill: f64,
    pub recent: Vec<Reading>,
}

/// One labelled key figure of the overview
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub label: &'static str,
    pub value: String,
    pub unit: String,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit.is_empty() {
            write!(f, "{}: {}", self.label, self.value)
        } else {
            write!(f, "{}: {} {}", self.label, self.value, self.unit)
        }
    }
}

impl Overview {
    /// Key metrics over all readings; `None` for an empty dataset
    pub fn from_readings(readings: &[Reading]) -> Option<Self> {
        if readings.is_empty() {
            return None;
        }

        let count = readings.len() as f64;
        let houses: HashSet<&str> = readings.iter().map(|r| r.house_number.as_str()).collect();
        let total_usage: f64 = readings.iter().map(|r| r.water_meter).sum();
        let total_revenue: f64 = readings.iter().map(|r| r.price).sum();

        let mut recent = readings.to_vec();
        sort_by_date_desc(&mut recent);
        recent.truncate(RECENT_LIMIT);

        Some(Overview {
            total_houses: houses.len(),
            total_usage,
            average_usage: total_usage / count,
            total_revenue,
            average_bill: total_revenue / count,
            recent,
        })
    }

    pub fn metrics(&self, currency: &str) -> Vec<Metric> {
        let metric = |label, value: String, unit: &str| Metric {
            label,
            value,
            unit: unit.to_string(),
        };

        vec![
            metric("Total Houses", self.total_houses.to_string(), ""),
            metric("Total Water Usage", format_amount(self.total_usage), VOLUME_UNIT),
            metric("Average Usage", format_amount(self.average_usage), VOLUME_UNIT),
            metric("Total Revenue", format_amount(self.total_revenue), currency),
            metric("Average Bill", format_amount(self.average_bill), currency),
        ]
    }
}

// ============================================================================
// CHARTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartKind {
    #[default]
    Bar,
    Pie,
    Line,
}

impl ChartKind {
    pub const ALL: [ChartKind; 3] = [ChartKind::Bar, ChartKind::Pie, ChartKind::Line];

    pub fn title(&self) -> &'static str {
        match self {
            ChartKind::Bar => "Bar Charts",
            ChartKind::Pie => "Pie Chart",
            ChartKind::Line => "Line Chart",
        }
    }
}

impl FromStr for ChartKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bar" | "bars" => Ok(ChartKind::Bar),
            "pie" => Ok(ChartKind::Pie),
            "line" | "time" => Ok(ChartKind::Line),
            other => Err(format!("unknown chart type '{}' (expected bar, pie or line)", other)),
        }
    }
}

/// Usage and revenue summed per house
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HouseTotal {
    pub house_number: String,
    pub usage: f64,
    pub revenue: f64,
    pub readings: usize,
}

/// A house's share of total usage, as a percentage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageShare {
    pub house_number: String,
    pub usage: f64,
    pub percent: f64,
}

/// Usage per calendar day for one house, oldest day first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSeries {
    pub house_number: String,
    pub points: Vec<(NaiveDate, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Chart {
    Bar(Vec<HouseTotal>),
    Pie(Vec<UsageShare>),
    Line(Vec<UsageSeries>),
}

pub fn build_chart(kind: ChartKind, readings: &[Reading]) -> Chart {
    match kind {
        ChartKind::Bar => Chart::Bar(house_totals(readings)),
        ChartKind::Pie => Chart::Pie(usage_shares(readings)),
        ChartKind::Line => Chart::Line(usage_series(readings)),
    }
}

/// Totals per house, ordered by house number
pub fn house_totals(readings: &[Reading]) -> Vec<HouseTotal> {
    let mut totals: BTreeMap<&str, HouseTotal> = BTreeMap::new();

    for r in readings {
        let entry = totals
            .entry(r.house_number.as_str())
            .or_insert_with(|| HouseTotal {
                house_number: r.house_number.clone(),
                usage: 0.0,
                revenue: 0.0,
                readings: 0,
            });
        entry.usage += r.water_meter;
        entry.revenue += r.price;
        entry.readings += 1;
    }

    totals.into_values().collect()
}

pub fn usage_shares(readings: &[Reading]) -> Vec<UsageShare> {
    let totals = house_totals(readings);
    let grand_total: f64 = totals.iter().map(|t| t.usage).sum();

    totals
        .into_iter()
        .map(|t| UsageShare {
            percent: if grand_total > 0.0 {
                t.usage / grand_total * 100.0
            } else {
                0.0
            },
            house_number: t.house_number,
            usage: t.usage,
        })
        .collect()
}

/// Daily usage per house. Readings without a parseable date are skipped.
pub fn usage_series(readings: &[Reading]) -> Vec<UsageSeries> {
    let mut by_house: BTreeMap<&str, BTreeMap<NaiveDate, f64>> = BTreeMap::new();

    for r in readings {
        if let Some(day) = r.day() {
            *by_house
                .entry(r.house_number.as_str())
                .or_default()
                .entry(day)
                .or_insert(0.0) += r.water_meter;
        }
    }

    by_house
        .into_iter()
        .map(|(house, days)| UsageSeries {
            house_number: house.to_string(),
            points: days.into_iter().collect(),
        })
        .collect()
}

// ============================================================================
// DETAILED DATA
// ============================================================================

/// Inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range, swapping the bounds if they are reversed
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    /// Span of the dates present in `readings`, clamped so it never ends after `today`.
    /// Falls back to `today..=today` when no reading has a usable date.
    pub fn observed(readings: &[Reading], today: NaiveDate) -> Self {
        let mut days = readings.iter().filter_map(|r| r.day());

        match days.next() {
            Some(first) => {
                let (min, max) = days.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
                Self::new(min, max).clamped(today)
            }
            None => Self { start: today, end: today },
        }
    }

    /// Pull the end back to `today`; the start never passes the end
    pub fn clamped(self, today: NaiveDate) -> Self {
        let end = self.end.min(today);
        let start = self.start.min(end);
        Self { start, end }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

/// Largest values in the current view, for highlighting
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ColumnMaxima {
    pub water_meter: Option<f64>,
    pub price: Option<f64>,
}

impl ColumnMaxima {
    pub fn of(readings: &[Reading]) -> Self {
        let max = |f: fn(&Reading) -> f64| {
            readings
                .iter()
                .map(f)
                .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
        };

        Self {
            water_meter: max(|r| r.water_meter),
            price: max(|r| r.price),
        }
    }
}

/// User-chosen filters for the detailed view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailFilter {
    /// Case-insensitive substring of the house number; empty matches all
    pub search: String,
    /// Explicit range; `None` means the full observed span
    pub range: Option<DateRange>,
}

#[derive(Debug, Clone)]
pub struct DetailedView {
    pub rows: Vec<Reading>,
    pub range: DateRange,
    pub maxima: ColumnMaxima,
}

impl DetailFilter {
    pub fn effective_range(&self, readings: &[Reading], today: NaiveDate) -> DateRange {
        match self.range {
            Some(range) => range.clamped(today),
            None => DateRange::observed(readings, today),
        }
    }

    pub fn matches_house(&self, house_number: &str) -> bool {
        self.search.is_empty()
            || house_number.to_lowercase().contains(&self.search.to_lowercase())
    }

    /// Filter and sort newest first
    pub fn apply(&self, readings: &[Reading], today: NaiveDate) -> DetailedView {
        let range = self.effective_range(readings, today);

        let mut rows: Vec<Reading> = readings
            .iter()
            .filter(|r| self.matches_house(&r.house_number))
            .filter(|r| r.day().is_some_and(|d| range.contains(d)))
            .cloned()
            .collect();
        sort_by_date_desc(&mut rows);

        let maxima = ColumnMaxima::of(&rows);
        DetailedView { rows, range, maxima }
    }
}
