use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use tracing::warn;

use super::shallow_merge;
use crate::models::{AppStats, UserProfile};
use crate::query::Stats;
use crate::store::{namespaced, Store};

/// An entity stored as a single JSON object rather than an array.
pub trait Singleton: Serialize + DeserializeOwned + Clone + Default {
    const COLLECTION: &'static str;
    const DATE_FIELDS: &'static [&'static str] = &[];
}

impl Singleton for AppStats {
    const COLLECTION: &'static str = "stats";
    const DATE_FIELDS: &'static [&'static str] = &["computedAt"];
}

impl Singleton for UserProfile {
    const COLLECTION: &'static str = "profile";
    const DATE_FIELDS: &'static [&'static str] = &["updatedAt"];
}

pub struct SingletonRepository<'s, T: Singleton> {
    store: &'s Store,
    key: String,
    _entity: PhantomData<T>,
}

impl<'s, T: Singleton> SingletonRepository<'s, T> {
    pub fn new(store: &'s Store) -> Self {
        Self {
            store,
            key: namespaced(T::COLLECTION),
            _entity: PhantomData,
        }
    }

    /// The stored value, or the default (persisted) when missing or unreadable.
    pub fn get(&self) -> T {
        let Some(mut raw) = self.store.get(&self.key) else {
            return self.reset();
        };
        if super::coerce_dates(&mut raw, T::DATE_FIELDS) {
            self.store.set(&self.key, &raw);
        }
        match serde_json::from_value(raw.clone()) {
            Ok(value) => value,
            Err(err) => {
                warn!(key = %self.key, error = %err, "stored value failed to parse; copying aside and resetting");
                self.store.set_aside(&self.key, &raw);
                self.reset()
            }
        }
    }

    pub fn set(&self, value: &T) -> bool {
        self.store.set(&self.key, value)
    }

    /// Shallow-merge `patch` onto the current value. Returns the merged value,
    /// or `None` (no write) if the result does not parse.
    pub fn update<P: Serialize + ?Sized>(&self, patch: &P) -> Option<T> {
        let mut merged = serde_json::to_value(self.get()).ok()?;
        match serde_json::to_value(patch) {
            Ok(Value::Object(map)) => shallow_merge(&mut merged, map),
            _ => {
                warn!(key = %self.key, "singleton patch is not an object; ignoring");
                return None;
            }
        }
        match serde_json::from_value::<T>(merged) {
            Ok(value) => {
                self.set(&value);
                Some(value)
            }
            Err(err) => {
                warn!(key = %self.key, error = %err, "singleton update would not parse; not applied");
                None
            }
        }
    }

    fn reset(&self) -> T {
        let value = T::default();
        self.set(&value);
        value
    }
}

pub type ProfileRepository<'s> = SingletonRepository<'s, UserProfile>;
pub type StatsRepository<'s> = SingletonRepository<'s, AppStats>;

impl StatsRepository<'_> {
    /// Persist a snapshot of freshly computed aggregates.
    pub fn record(&self, stats: &Stats, now: DateTime<Utc>) -> AppStats {
        let snapshot = AppStats {
            total_applications: stats.total,
            active_applications: stats.active,
            interviews_scheduled: stats.interviews_scheduled,
            offers_received: stats.count(crate::models::Stage::Offer),
            response_rate: stats.response_rate,
            success_rate: stats.success_rate,
            computed_at: Some(now),
        };
        self.set(&snapshot);
        snapshot
    }
}

impl ProfileRepository<'_> {
    pub fn touch(&self, now: DateTime<Utc>) -> UserProfile {
        let mut profile = self.get();
        profile.updated_at = Some(now);
        self.set(&profile);
        profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::Density;
    use serde_json::json;

    fn store() -> Store {
        let store = Store::open_in_memory().expect("open");
        store.init().expect("init");
        store
    }

    #[test]
    fn first_read_persists_default_profile() {
        let store = store();
        let repo = ProfileRepository::new(&store);
        assert_eq!(repo.get(), UserProfile::default());
        assert!(store.exists("jobtrack:profile"));
    }

    #[test]
    fn profile_update_merges_fields() {
        let store = store();
        let repo = ProfileRepository::new(&store);
        let updated = repo
            .update(&json!({"name": "Riley", "density": "compact"}))
            .expect("updated");
        assert_eq!(updated.name, "Riley");
        assert_eq!(updated.density, Density::Compact);
        assert_eq!(repo.get().name, "Riley");
        assert!(repo.update(&json!({"density": "huge"})).is_none());
        assert_eq!(repo.get().density, Density::Compact);
    }

    #[test]
    fn unreadable_singleton_resets_and_keeps_copy() {
        let store = store();
        store.set("jobtrack:profile", &json!({"name": 42}));
        let repo = ProfileRepository::new(&store);
        assert_eq!(repo.get(), UserProfile::default());
        assert_eq!(store.get("jobtrack:profile.corrupt"), Some(json!({"name": 42})));
    }

    #[test]
    fn stats_snapshot_is_recorded() {
        let store = store();
        let repo = StatsRepository::new(&store);
        let now = Utc::now();
        let stats = crate::query::compute_stats(&[], now);
        let snapshot = repo.record(&stats, now);
        assert_eq!(snapshot.total_applications, 0);
        assert_eq!(snapshot.response_rate, 0.0);
        assert_eq!(repo.get(), snapshot);

        let mut new = crate::models::NewApplication::new("Engineer", "Acme");
        new.stage = crate::models::Stage::Interview;
        let app = <crate::models::Application as crate::repository::Entity>::from_new("a1".into(), new);
        let snapshot = repo.record(&crate::query::compute_stats(&[app], now), now);
        assert_eq!(snapshot.interviews_scheduled, 0);
    }
}
