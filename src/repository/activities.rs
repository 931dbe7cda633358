use serde_json::Value;

use super::{coerce_dates, Entity, EntityRepository, RepositoryOptions};
use crate::error::RecordError;
use crate::models::{Activity, ActivityKind, Application, NewActivity, Stage};
use crate::seed;
use crate::store::Store;

impl Entity for Activity {
    type New = NewActivity;
    const COLLECTION: &'static str = "activities";
    const DATE_FIELDS: &'static [&'static str] = &["timestamp"];

    fn id(&self) -> &str {
        &self.id
    }

    fn from_new(id: String, new: NewActivity) -> Self {
        Self {
            id,
            kind: new.kind,
            title: new.title,
            application_id: new.application_id,
            company: new.company,
            stage: new.stage,
            timestamp: new.timestamp,
            detail: new.detail,
        }
    }

    fn seed() -> Vec<Self> {
        seed::activities()
    }

    fn validate(&self) -> Result<(), RecordError> {
        if self.id.trim().is_empty() {
            return Err(RecordError::Invalid("empty id".to_string()));
        }
        if self.title.trim().is_empty() {
            return Err(RecordError::Invalid("activity title is empty".to_string()));
        }
        Ok(())
    }

    fn migrate(raw: &mut Value) -> bool {
        let mut changed = coerce_dates(raw, Self::DATE_FIELDS);
        // Older entries stored the type under "type".
        if let Value::Object(map) = raw {
            if !map.contains_key("kind") {
                if let Some(kind) = map.remove("type") {
                    map.insert("kind".to_string(), kind);
                    changed = true;
                }
            }
        }
        changed
    }
}

/// Append-only activity log; no update surface.
pub struct ActivityRepository<'s> {
    inner: EntityRepository<'s, Activity>,
}

impl<'s> ActivityRepository<'s> {
    pub fn new(store: &'s Store, options: RepositoryOptions) -> Self {
        Self {
            inner: EntityRepository::new(store, options),
        }
    }

    pub fn get_all(&self) -> Vec<Activity> {
        self.inner.get_all()
    }

    pub fn get_by_id(&self, id: &str) -> Option<Activity> {
        self.inner.get_by_id(id)
    }

    /// Append an entry. `None` means the entry could not be persisted.
    pub fn log(&self, new: NewActivity) -> Option<Activity> {
        let (activity, persisted) = self.inner.insert(new);
        persisted.then_some(activity)
    }

    pub fn log_stage_change(&self, app: &Application, from: Stage) -> Option<Activity> {
        self.log(NewActivity {
            kind: ActivityKind::StageChange,
            title: format!("Moved to {}", app.stage.label()),
            application_id: Some(app.id.clone()),
            company: Some(app.company.clone()),
            stage: Some(app.stage),
            timestamp: chrono::Utc::now(),
            detail: format!("{} at {}: {} -> {}", app.position, app.company.name, from, app.stage),
        })
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Vec<Activity> {
        let mut all = self.inner.get_all();
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        all.truncate(limit);
        all
    }

    pub fn for_application(&self, application_id: &str) -> Vec<Activity> {
        let mut matching: Vec<Activity> = self
            .inner
            .get_all()
            .into_iter()
            .filter(|a| a.application_id.as_deref() == Some(application_id))
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matching
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn store() -> Store {
        let store = Store::open_in_memory().expect("open");
        store.init().expect("init");
        store
    }

    fn entry(title: &str, app: Option<&str>, minutes_ago: i64) -> NewActivity {
        NewActivity {
            kind: ActivityKind::Note,
            title: title.to_string(),
            application_id: app.map(ToString::to_string),
            company: None,
            stage: None,
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            detail: String::new(),
        }
    }

    #[test]
    fn recent_sorts_newest_first_and_limits() {
        let store = store();
        let repo = ActivityRepository::new(&store, RepositoryOptions { seed_defaults: false });
        repo.log(entry("old", None, 30)).expect("logged");
        repo.log(entry("newest", None, 1)).expect("logged");
        repo.log(entry("middle", None, 10)).expect("logged");
        let recent = repo.recent(2);
        let titles: Vec<&str> = recent.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["newest", "middle"]);
    }

    #[test]
    fn filters_by_application() {
        let store = store();
        let repo = ActivityRepository::new(&store, RepositoryOptions { seed_defaults: false });
        repo.log(entry("a", Some("app-1"), 5)).expect("logged");
        repo.log(entry("b", Some("app-2"), 5)).expect("logged");
        assert_eq!(repo.for_application("app-1").len(), 1);
    }

    #[test]
    fn legacy_type_field_is_migrated() {
        let store = store();
        store.set(
            "jobtrack:activities",
            &json!([{"id": "x", "type": "note", "title": "legacy", "timestamp": "2024-01-02"}]),
        );
        let repo = ActivityRepository::new(&store, RepositoryOptions::default());
        let all = repo.get_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].kind, ActivityKind::Note);
    }

    #[test]
    fn log_reports_unpersisted_entries() {
        let store = Store::open_in_memory().expect("open");
        let repo = ActivityRepository::new(&store, RepositoryOptions { seed_defaults: false });
        assert!(repo.log(entry("lost", None, 0)).is_none());
    }
}
