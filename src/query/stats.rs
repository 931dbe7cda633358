use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{Application, Stage};

/// Aggregates over the whole collection. Independent of any active filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total: usize,
    pub by_stage: BTreeMap<Stage, usize>,
    pub applied_this_week: usize,
    pub applied_this_month: usize,
    pub pending_tasks: usize,
    pub overdue_tasks: usize,
    /// Interview entries not yet marked completed.
    pub interviews_scheduled: usize,
    pub shortlisted: usize,
    pub remote: usize,
    pub with_salary: usize,
    /// Share of applications that moved past "applied". 0 when empty.
    pub response_rate: f64,
    /// Share of applications that reached "offer". 0 when empty.
    pub success_rate: f64,
    pub active: usize,
}

impl Stats {
    pub fn count(&self, stage: Stage) -> usize {
        self.by_stage.get(&stage).copied().unwrap_or(0)
    }
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64
}

/// Full recount; there is no incremental maintenance.
pub fn compute_stats(items: &[Application], now: DateTime<Utc>) -> Stats {
    let week_start = now - Duration::days(7);
    let month_start = now - Duration::days(30);

    let mut by_stage: BTreeMap<Stage, usize> = Stage::ALL.into_iter().map(|s| (s, 0)).collect();
    let mut stats = Stats {
        total: items.len(),
        by_stage: BTreeMap::new(),
        applied_this_week: 0,
        applied_this_month: 0,
        pending_tasks: 0,
        overdue_tasks: 0,
        interviews_scheduled: 0,
        shortlisted: 0,
        remote: 0,
        with_salary: 0,
        response_rate: 0.0,
        success_rate: 0.0,
        active: 0,
    };

    for app in items {
        *by_stage.entry(app.stage).or_insert(0) += 1;
        if app.date_applied >= week_start {
            stats.applied_this_week += 1;
        }
        if app.date_applied >= month_start {
            stats.applied_this_month += 1;
        }
        for task in app.tasks.iter().filter(|t| !t.completed) {
            stats.pending_tasks += 1;
            if task.is_overdue(now) {
                stats.overdue_tasks += 1;
            }
        }
        stats.interviews_scheduled += app.interviews.iter().filter(|i| !i.completed).count();
        stats.shortlisted += usize::from(app.shortlisted);
        stats.remote += usize::from(app.remote);
        stats.with_salary += usize::from(app.has_salary());
    }

    let applied = by_stage[&Stage::Applied];
    let offers = by_stage[&Stage::Offer];
    let rejected = by_stage[&Stage::Rejected];
    stats.response_rate = ratio(stats.total - applied, stats.total);
    stats.success_rate = ratio(offers, stats.total);
    stats.active = stats.total - rejected;
    stats.by_stage = by_stage;
    stats
}
