use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde_json::Value;

use super::{Entity, EntityRepository, RepositoryOptions};
use crate::error::RecordError;
use crate::models::{MonthlyGoal, NewGoal};
use crate::seed;
use crate::store::Store;

impl Entity for MonthlyGoal {
    type New = NewGoal;
    const COLLECTION: &'static str = "goals";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_new(id: String, new: NewGoal) -> Self {
        Self {
            id,
            title: new.title,
            month: first_of_month(new.month),
            target: new.target,
            current: 0,
        }
    }

    fn seed() -> Vec<Self> {
        seed::goals()
    }

    fn validate(&self) -> Result<(), RecordError> {
        if self.id.trim().is_empty() {
            return Err(RecordError::Invalid("empty id".to_string()));
        }
        if self.month.day() != 1 {
            return Err(RecordError::Invalid(format!("goal month {} is not a month start", self.month)));
        }
        Ok(())
    }

    // Months were once stored as "YYYY-MM".
    fn migrate(raw: &mut Value) -> bool {
        let Some(Value::String(month)) = raw.get_mut("month") else {
            return false;
        };
        if NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d").is_ok() {
            month.push_str("-01");
            return true;
        }
        false
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub struct GoalRepository<'s> {
    inner: EntityRepository<'s, MonthlyGoal>,
}

impl<'s> GoalRepository<'s> {
    pub fn new(store: &'s Store, options: RepositoryOptions) -> Self {
        Self {
            inner: EntityRepository::new(store, options),
        }
    }

    pub fn get_all(&self) -> Vec<MonthlyGoal> {
        self.inner.get_all()
    }

    pub fn create(&self, new: NewGoal) -> MonthlyGoal {
        self.inner.create(new)
    }

    pub fn delete(&self, id: &str) -> bool {
        self.inner.delete(id)
    }

    pub fn for_month(&self, year: i32, month: u32) -> Vec<MonthlyGoal> {
        self.inner
            .get_all()
            .into_iter()
            .filter(|g| g.month.year() == year && g.month.month() == month)
            .collect()
    }

    pub fn current(&self, now: DateTime<Utc>) -> Vec<MonthlyGoal> {
        let today = now.date_naive();
        self.for_month(today.year(), today.month())
    }

    /// Add `amount` to the goal's progress counter.
    pub fn record_progress(&self, id: &str, amount: u32) -> Option<MonthlyGoal> {
        self.inner
            .update_with(id, |goal| goal.current = goal.current.saturating_add(amount))
    }

    pub fn set_target(&self, id: &str, target: u32) -> Option<MonthlyGoal> {
        self.inner.update_with(id, |goal| goal.target = target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn store() -> Store {
        let store = Store::open_in_memory().expect("open");
        store.init().expect("init");
        store
    }

    #[test]
    fn month_queries_and_progress() {
        let store = store();
        let repo = GoalRepository::new(&store, RepositoryOptions { seed_defaults: false });
        let goal = repo.create(NewGoal {
            title: "Applications".into(),
            month: NaiveDate::from_ymd_opt(2024, 6, 17).unwrap(),
            target: 4,
        });
        assert_eq!(goal.month, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());

        let now = Utc.with_ymd_and_hms(2024, 6, 20, 0, 0, 0).unwrap();
        assert_eq!(repo.current(now).len(), 1);
        assert!(repo.for_month(2024, 7).is_empty());

        let goal = repo.record_progress(&goal.id, 3).expect("progress");
        assert_eq!(goal.progress(), 0.75);
        let goal = repo.record_progress(&goal.id, 2).expect("progress");
        assert!(goal.is_met());
        assert_eq!(goal.progress(), 1.0);

        let goal = repo.set_target(&goal.id, 10).expect("target");
        assert!(!goal.is_met());
        assert_eq!(goal.progress(), 0.5);
        assert!(repo.set_target("missing", 3).is_none());
    }

    #[test]
    fn legacy_month_strings_are_migrated() {
        let store = store();
        store.set(
            "jobtrack:goals",
            &json!([{"id": "g1", "title": "Apply", "month": "2024-03", "target": 10}]),
        );
        let repo = GoalRepository::new(&store, RepositoryOptions::default());
        assert_eq!(repo.for_month(2024, 3).len(), 1);
    }
}
