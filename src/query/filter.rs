use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::models::{Application, Stage};

/// Table columns that can be filtered and sorted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Column {
    Position,
    Company,
    Location,
    Stage,
    DateApplied,
    Salary,
    Remote,
    Notes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Date,
}

impl Column {
    pub const ALL: [Column; 8] = [
        Column::Position,
        Column::Company,
        Column::Location,
        Column::Stage,
        Column::DateApplied,
        Column::Salary,
        Column::Remote,
        Column::Notes,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Company => "company",
            Self::Location => "location",
            Self::Stage => "stage",
            Self::DateApplied => "dateApplied",
            Self::Salary => "salary",
            Self::Remote => "remote",
            Self::Notes => "notes",
        }
    }

    pub fn kind(self) -> ColumnKind {
        match self {
            Self::DateApplied => ColumnKind::Date,
            _ => ColumnKind::Text,
        }
    }

    /// The column's value as it is shown in a table cell. Column filters match
    /// against this text.
    pub fn display(self, app: &Application) -> String {
        match self {
            Self::Position => app.position.clone(),
            Self::Company => app.company.name.clone(),
            Self::Location => app.location.clone(),
            Self::Stage => app.stage.as_str().to_string(),
            Self::DateApplied => format_date(app.date_applied),
            Self::Salary => app.salary.clone(),
            Self::Remote => (if app.remote { "Yes" } else { "No" }).to_string(),
            Self::Notes => app.notes.clone(),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace(['_', '-'], "");
        if wanted == "date" || wanted == "applied" {
            return Ok(Self::DateApplied);
        }
        Column::ALL
            .into_iter()
            .find(|c| c.as_str().to_lowercase() == wanted)
            .ok_or_else(|| format!("unknown column '{s}'"))
    }
}

/// `M/D/YYYY`, the form dates take in table cells.
pub fn format_date(date: DateTime<Utc>) -> String {
    date.format("%-m/%-d/%Y").to_string()
}

pub type ColumnFilters = BTreeMap<Column, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageFilter {
    #[default]
    All,
    Only(Stage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateRange {
    #[default]
    All,
    Last7Days,
    Last30Days,
    Last90Days,
    /// Inclusive on both ends, by calendar day.
    Custom { start: NaiveDate, end: NaiveDate },
}

impl DateRange {
    pub fn contains(&self, date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match *self {
            Self::All => true,
            Self::Last7Days => date >= now - Duration::days(7),
            Self::Last30Days => date >= now - Duration::days(30),
            Self::Last90Days => date >= now - Duration::days(90),
            Self::Custom { start, end } => {
                let day = date.date_naive();
                start <= day && day <= end
            }
        }
    }
}

impl FromStr for DateRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((start, end)) = s.trim().split_once("..") {
            let day = |text: &str| {
                NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
                    .map_err(|err| format!("invalid date '{}': {err}", text.trim()))
            };
            let (start, end) = (day(start)?, day(end)?);
            if start > end {
                return Err(format!("date range starts after it ends ({start}..{end})"));
            }
            return Ok(Self::Custom { start, end });
        }
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "7" | "7d" | "week" => Ok(Self::Last7Days),
            "30" | "30d" | "month" => Ok(Self::Last30Days),
            "90" | "90d" | "quarter" => Ok(Self::Last90Days),
            other => Err(format!("unknown date range '{other}' (expected 7d, 30d, 90d, all or YYYY-MM-DD..YYYY-MM-DD)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SalaryFilter {
    #[default]
    All,
    With,
    Without,
}

impl FromStr for SalaryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "with" => Ok(Self::With),
            "without" => Ok(Self::Without),
            other => Err(format!("unknown salary filter '{other}' (expected with, without or all)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuickFilter {
    pub stage: StageFilter,
    pub date_range: DateRange,
    pub salary: SalaryFilter,
}

impl QuickFilter {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Everything that decides whether an application is in the view.
#[derive(Debug, Clone, Copy)]
pub struct Criteria<'a> {
    pub search: &'a str,
    pub columns: &'a ColumnFilters,
    pub quick: &'a QuickFilter,
}

fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// All predicates combined with AND.
pub fn matches(app: &Application, criteria: &Criteria<'_>, now: DateTime<Utc>) -> bool {
    let search = criteria.search.trim().to_lowercase();
    if !search.is_empty() {
        let hit = [
            app.position.as_str(),
            app.company.name.as_str(),
            app.location.as_str(),
            app.notes.as_str(),
        ]
        .into_iter()
        .any(|field| contains_folded(field, &search));
        if !hit {
            return false;
        }
    }

    for (column, value) in criteria.columns {
        let needle = value.trim().to_lowercase();
        if needle.is_empty() {
            continue;
        }
        if !contains_folded(&column.display(app), &needle) {
            return false;
        }
    }

    if let StageFilter::Only(stage) = criteria.quick.stage {
        if app.stage != stage {
            return false;
        }
    }

    if !criteria.quick.date_range.contains(app.date_applied, now) {
        return false;
    }

    match criteria.quick.salary {
        SalaryFilter::All => true,
        SalaryFilter::With => app.has_salary(),
        SalaryFilter::Without => !app.has_salary(),
    }
}

/// Indices into `items` of every matching application, in collection order.
pub fn filter(items: &[Application], criteria: &Criteria<'_>, now: DateTime<Utc>) -> Vec<usize> {
    items
        .iter()
        .enumerate()
        .filter(|(_, app)| matches(app, criteria, now))
        .map(|(index, _)| index)
        .collect()
}
