//! Typed CRUD over the flat JSON collections kept in [`Store`].
//!
//! Each collection is one insertion-ordered array under a namespaced key.
//! There are no secondary indices; every query is a full scan of the
//! loaded array.

mod activities;
mod applications;
mod companies;
mod events;
mod goals;
mod reminders;
mod singleton;

pub use activities::ActivityRepository;
pub use applications::ApplicationRepository;
pub use companies::CompanyRepository;
pub use events::EventRepository;
pub use goals::GoalRepository;
pub use reminders::ReminderRepository;
pub use singleton::{ProfileRepository, Singleton, SingletonRepository, StatsRepository};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::marker::PhantomData;
use tracing::{debug, warn};

use crate::error::RecordError;
use crate::store::{namespaced, Store};

/// A record type stored as one element of a collection array.
pub trait Entity: Serialize + DeserializeOwned + Clone {
    /// Creation payload: everything except the id.
    type New;

    /// Collection name; the storage key is derived from it.
    const COLLECTION: &'static str;

    /// Top-level fields holding dates. Migration coerces legacy encodings of
    /// these (and only these) into ISO-8601 before typed parsing.
    const DATE_FIELDS: &'static [&'static str] = &[];

    fn id(&self) -> &str;

    fn from_new(id: String, new: Self::New) -> Self;

    fn seed() -> Vec<Self> {
        Vec::new()
    }

    fn validate(&self) -> Result<(), RecordError> {
        if self.id().trim().is_empty() {
            return Err(RecordError::Invalid("empty id".to_string()));
        }
        Ok(())
    }

    /// Upgrade a raw stored record in place. Returns whether anything changed.
    fn migrate(raw: &mut Value) -> bool {
        coerce_dates(raw, Self::DATE_FIELDS)
    }
}

/// A stored record that could not be turned into a valid entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejected {
    pub index: usize,
    pub raw: Value,
    pub reason: RecordError,
}

/// Outcome of parsing one stored record.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    Valid(T),
    Rejected(Rejected),
}

/// Valid records plus everything that was rejected on the way.
#[derive(Debug, Clone)]
pub struct LoadReport<T> {
    pub items: Vec<T>,
    pub rejected: Vec<Rejected>,
}

#[derive(Debug, Clone, Copy)]
pub struct RepositoryOptions {
    /// Write the default dataset when a collection is read empty.
    pub seed_defaults: bool,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            seed_defaults: true,
        }
    }
}

pub struct EntityRepository<'s, T: Entity> {
    store: &'s Store,
    key: String,
    options: RepositoryOptions,
    _entity: PhantomData<T>,
}

impl<'s, T: Entity> EntityRepository<'s, T> {
    pub fn new(store: &'s Store, options: RepositoryOptions) -> Self {
        Self {
            store,
            key: namespaced(T::COLLECTION),
            options,
            _entity: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Every valid record, in insertion order. Rejected records are logged
    /// and left out; use [`EntityRepository::load_report`] to see them.
    pub fn get_all(&self) -> Vec<T> {
        self.load_slots()
            .into_iter()
            .filter_map(|slot| match slot {
                Parsed::Valid(item) => Some(item),
                Parsed::Rejected(_) => None,
            })
            .collect()
    }

    pub fn load_report(&self) -> LoadReport<T> {
        let mut items = Vec::new();
        let mut rejected = Vec::new();
        for slot in self.load_slots() {
            match slot {
                Parsed::Valid(item) => items.push(item),
                Parsed::Rejected(r) => rejected.push(r),
            }
        }
        LoadReport { items, rejected }
    }

    pub fn get_by_id(&self, id: &str) -> Option<T> {
        self.get_all().into_iter().find(|item| item.id() == id)
    }

    pub fn count(&self) -> usize {
        self.get_all().len()
    }

    pub fn create(&self, new: T::New) -> T {
        self.insert(new).0
    }

    /// Like [`EntityRepository::create`], also reporting whether the write
    /// reached storage.
    pub fn insert(&self, new: T::New) -> (T, bool) {
        let mut slots = self.load_slots();
        let id = fresh_id(&slots);
        let item = T::from_new(id, new);
        slots.push(Parsed::Valid(item.clone()));
        let persisted = self.persist(&slots);
        debug!(key = %self.key, id = item.id(), persisted, "created record");
        (item, persisted)
    }

    /// Shallow-merge the serialized `patch` onto the record with `id`.
    ///
    /// Returns `None` without writing when the id is unknown, the patch is
    /// not an object, or the merged record no longer parses. An `id` key in
    /// the patch is ignored.
    pub fn update<P: Serialize + ?Sized>(&self, id: &str, patch: &P) -> Option<T> {
        let mut slots = self.load_slots();
        let pos = position_of(&slots, id)?;
        let Parsed::Valid(current) = &slots[pos] else {
            return None;
        };

        let mut merged = match serde_json::to_value(current) {
            Ok(value) => value,
            Err(err) => {
                warn!(key = %self.key, id, error = %err, "could not serialize record for update");
                return None;
            }
        };
        let patch = match serde_json::to_value(patch) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                warn!(key = %self.key, id, "update patch is not an object; ignoring");
                return None;
            }
            Err(err) => {
                warn!(key = %self.key, id, error = %err, "could not serialize update patch");
                return None;
            }
        };
        shallow_merge(&mut merged, patch);

        match parse_record::<T>(merged) {
            Ok(updated) => {
                slots[pos] = Parsed::Valid(updated.clone());
                self.persist(&slots);
                Some(updated)
            }
            Err(reason) => {
                warn!(key = %self.key, id, %reason, "update would produce an invalid record; not applied");
                None
            }
        }
    }

    /// Apply `edit` to the record with `id` and persist. The id itself cannot
    /// be changed; an edit that changes it or invalidates the record is
    /// refused.
    pub fn update_with<F>(&self, id: &str, edit: F) -> Option<T>
    where
        F: FnOnce(&mut T),
    {
        let mut slots = self.load_slots();
        let pos = position_of(&slots, id)?;
        let Parsed::Valid(current) = &slots[pos] else {
            return None;
        };
        let mut updated = current.clone();
        edit(&mut updated);

        if updated.id() != id {
            warn!(key = %self.key, id, "edit attempted to reassign id; not applied");
            return None;
        }
        if let Err(reason) = updated.validate() {
            warn!(key = %self.key, id, %reason, "edit would produce an invalid record; not applied");
            return None;
        }

        slots[pos] = Parsed::Valid(updated.clone());
        self.persist(&slots);
        Some(updated)
    }

    pub fn delete(&self, id: &str) -> bool {
        let mut slots = self.load_slots();
        let Some(pos) = position_of(&slots, id) else {
            return false;
        };
        slots.remove(pos);
        self.persist(&slots);
        debug!(key = %self.key, id, "deleted record");
        true
    }

    fn load_slots(&self) -> Vec<Parsed<T>> {
        let mut records = match self.store.get(&self.key) {
            Some(Value::Array(records)) if !records.is_empty() => records,
            Some(Value::Array(_)) | None => return self.seed(),
            Some(other) => {
                warn!(key = %self.key, "collection is not an array; copying aside and reseeding");
                self.store.set_aside(&self.key, &other);
                return self.seed();
            }
        };

        let mut migrated = false;
        for record in records.iter_mut() {
            migrated |= T::migrate(record);
        }
        if migrated {
            debug!(key = %self.key, "persisting migrated collection");
            self.store.set(&self.key, &records);
        }

        records
            .into_iter()
            .enumerate()
            .map(|(index, raw)| match parse_record::<T>(raw.clone()) {
                Ok(item) => Parsed::Valid(item),
                Err(reason) => {
                    warn!(key = %self.key, index, %reason, "dropping record that failed validation");
                    Parsed::Rejected(Rejected { index, raw, reason })
                }
            })
            .collect()
    }

    fn seed(&self) -> Vec<Parsed<T>> {
        if !self.options.seed_defaults {
            return Vec::new();
        }
        let seed = T::seed();
        debug!(key = %self.key, count = seed.len(), "seeding default collection");
        self.store.set(&self.key, &seed);
        seed.into_iter().map(Parsed::Valid).collect()
    }

    // Rejected records are written back verbatim so a write never loses them.
    fn persist(&self, slots: &[Parsed<T>]) -> bool {
        let mut records = Vec::with_capacity(slots.len());
        for slot in slots {
            match slot {
                Parsed::Valid(item) => match serde_json::to_value(item) {
                    Ok(value) => records.push(value),
                    Err(err) => {
                        warn!(key = %self.key, id = item.id(), error = %err, "could not serialize record");
                        return false;
                    }
                },
                Parsed::Rejected(rejected) => records.push(rejected.raw.clone()),
            }
        }
        self.store.set(&self.key, &records)
    }
}

fn parse_record<T: Entity>(raw: Value) -> Result<T, RecordError> {
    let item: T = serde_json::from_value(raw)?;
    item.validate()?;
    Ok(item)
}

fn position_of<T: Entity>(slots: &[Parsed<T>], id: &str) -> Option<usize> {
    slots
        .iter()
        .position(|slot| matches!(slot, Parsed::Valid(item) if item.id() == id))
}

fn fresh_id<T: Entity>(slots: &[Parsed<T>]) -> String {
    loop {
        let id = generate_id();
        let taken = slots.iter().any(|slot| match slot {
            Parsed::Valid(item) => item.id() == id,
            Parsed::Rejected(r) => r.raw.get("id").and_then(Value::as_str) == Some(id.as_str()),
        });
        if !taken {
            return id;
        }
    }
}

/// `{unix-millis}-{9 base36 chars}`. Unique enough for a single local writer;
/// not a security token.
pub fn generate_id() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{}-{}", Utc::now().timestamp_millis(), suffix)
}

pub(crate) fn shallow_merge(target: &mut Value, patch: Map<String, Value>) {
    if let Value::Object(target) = target {
        for (field, value) in patch {
            if field == "id" {
                continue;
            }
            target.insert(field, value);
        }
    }
}

/// Rewrite legacy encodings of the named date fields as RFC 3339 strings:
/// date-only strings, naive timestamps (taken as UTC) and epoch milliseconds.
/// Fields not named are left alone even if they look like dates.
pub fn coerce_dates(record: &mut Value, fields: &[&str]) -> bool {
    let Value::Object(map) = record else {
        return false;
    };
    let mut changed = false;
    for field in fields {
        let Some(value) = map.get_mut(*field) else {
            continue;
        };
        if let Some(coerced) = coerce_date_value(value) {
            *value = Value::String(coerced);
            changed = true;
        }
    }
    changed
}

fn coerce_date_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if DateTime::parse_from_rfc3339(s).is_ok() {
                return None;
            }
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().to_rfc3339());
            }
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
                .ok()
                .map(|dt| dt.and_utc().to_rfc3339())
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| dt.to_rfc3339()),
        _ => None,
    }
}

/// Apply `coerce_dates` to every element of the array field `field`.
pub(crate) fn coerce_nested_dates(record: &mut Value, field: &str, date_fields: &[&str]) -> bool {
    let Some(Value::Array(items)) = record.get_mut(field) else {
        return false;
    };
    let mut changed = false;
    for item in items.iter_mut() {
        changed |= coerce_dates(item, date_fields);
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Widget {
        id: String,
        name: String,
        made_at: DateTime<Utc>,
        #[serde(default)]
        tag: String,
    }

    struct NewWidget {
        name: String,
        made_at: DateTime<Utc>,
    }

    impl Entity for Widget {
        type New = NewWidget;
        const COLLECTION: &'static str = "widgets";
        const DATE_FIELDS: &'static [&'static str] = &["madeAt"];

        fn id(&self) -> &str {
            &self.id
        }

        fn from_new(id: String, new: NewWidget) -> Self {
            Self {
                id,
                name: new.name,
                made_at: new.made_at,
                tag: String::new(),
            }
        }

        fn seed() -> Vec<Self> {
            vec![Widget {
                id: "seed-1".into(),
                name: "seeded".into(),
                made_at: Utc::now(),
                tag: String::new(),
            }]
        }

        fn validate(&self) -> Result<(), RecordError> {
            if self.name.trim().is_empty() {
                return Err(RecordError::Invalid("name is empty".into()));
            }
            Ok(())
        }
    }

    fn store() -> Store {
        let store = Store::open_in_memory().expect("open");
        store.init().expect("init");
        store
    }

    fn widget(name: &str) -> NewWidget {
        NewWidget {
            name: name.into(),
            made_at: "2024-05-01T12:00:00Z".parse().expect("date"),
        }
    }

    #[test]
    fn first_read_seeds_and_persists() {
        let store = store();
        let repo: EntityRepository<Widget> = EntityRepository::new(&store, RepositoryOptions::default());
        let all = repo.get_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "seed-1");
        assert!(store.exists("jobtrack:widgets"));
    }

    #[test]
    fn seeding_can_be_disabled() {
        let store = store();
        let repo: EntityRepository<Widget> =
            EntityRepository::new(&store, RepositoryOptions { seed_defaults: false });
        assert!(repo.get_all().is_empty());
        assert!(!store.exists("jobtrack:widgets"));
    }

    #[test]
    fn create_assigns_unique_id_and_round_trips_dates() {
        let store = store();
        let repo: EntityRepository<Widget> =
            EntityRepository::new(&store, RepositoryOptions { seed_defaults: false });
        let before: Vec<String> = repo.get_all().into_iter().map(|w| w.id).collect();
        let created = repo.create(widget("gear"));
        assert!(!before.contains(&created.id));
        let loaded = repo.get_by_id(&created.id).expect("found");
        assert_eq!(loaded, created);
        assert_eq!(loaded.made_at.to_rfc3339(), "2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn delete_is_true_once_then_false() {
        let store = store();
        let repo: EntityRepository<Widget> =
            EntityRepository::new(&store, RepositoryOptions { seed_defaults: false });
        let a = repo.create(widget("a"));
        repo.create(widget("b"));
        assert!(repo.delete(&a.id));
        assert!(!repo.delete(&a.id));
        assert_eq!(repo.count(), 1);
    }

    #[test]
    fn update_merges_and_ignores_id() {
        let store = store();
        let repo: EntityRepository<Widget> =
            EntityRepository::new(&store, RepositoryOptions { seed_defaults: false });
        let w = repo.create(widget("a"));
        let updated = repo
            .update(&w.id, &json!({"tag": "blue", "id": "hijack"}))
            .expect("updated");
        assert_eq!(updated.id, w.id);
        assert_eq!(updated.tag, "blue");
        assert_eq!(updated.name, "a");
        assert_eq!(repo.get_by_id(&w.id).expect("found").tag, "blue");
    }

    #[test]
    fn update_unknown_id_returns_none_without_write() {
        let store = store();
        let repo: EntityRepository<Widget> =
            EntityRepository::new(&store, RepositoryOptions { seed_defaults: false });
        repo.create(widget("a"));
        let before = store.get(repo.key());
        assert!(repo.update("missing", &json!({"tag": "x"})).is_none());
        assert_eq!(store.get(repo.key()), before);
    }

    #[test]
    fn update_that_breaks_validation_is_refused() {
        let store = store();
        let repo: EntityRepository<Widget> =
            EntityRepository::new(&store, RepositoryOptions { seed_defaults: false });
        let w = repo.create(widget("a"));
        assert!(repo.update(&w.id, &json!({"name": ""})).is_none());
        assert!(repo.update_with(&w.id, |w| w.name.clear()).is_none());
        assert!(repo.update_with(&w.id, |w| w.id = "other".into()).is_none());
        assert_eq!(repo.get_by_id(&w.id).expect("found").name, "a");
    }

    #[test]
    fn invalid_records_are_reported_and_preserved_on_write() {
        let store = store();
        store.set(
            "jobtrack:widgets",
            &json!([
                {"id": "ok", "name": "fine", "madeAt": "2024-01-01T00:00:00Z"},
                {"id": "bad", "name": "", "madeAt": "2024-01-01T00:00:00Z"},
                {"id": "worse", "madeAt": 17}
            ]),
        );
        let repo: EntityRepository<Widget> = EntityRepository::new(&store, RepositoryOptions::default());

        assert_eq!(repo.get_all().len(), 1);
        let report = repo.load_report();
        assert_eq!(report.items.len(), 1);
        assert_eq!(report.rejected.len(), 2);
        assert_eq!(report.rejected[0].index, 1);

        repo.create(widget("new"));
        let stored = store.get("jobtrack:widgets").expect("stored");
        assert_eq!(stored.as_array().expect("array").len(), 4);
    }

    #[test]
    fn migration_coerces_only_named_date_fields() {
        let store = store();
        store.set(
            "jobtrack:widgets",
            &json!([
                {"id": "a", "name": "2024-02-02", "madeAt": "2024-02-01"},
                {"id": "b", "name": "millis", "madeAt": 1_700_000_000_000_i64}
            ]),
        );
        let repo: EntityRepository<Widget> = EntityRepository::new(&store, RepositoryOptions::default());
        let all = repo.get_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "2024-02-02");
        assert_eq!(all[0].made_at.to_rfc3339(), "2024-02-01T00:00:00+00:00");
        assert_eq!(all[1].made_at.timestamp_millis(), 1_700_000_000_000);

        let stored = store.get("jobtrack:widgets").expect("stored");
        assert_eq!(stored[0]["madeAt"], json!("2024-02-01T00:00:00+00:00"));
    }

    #[test]
    fn generated_ids_have_timestamp_and_suffix() {
        let id = generate_id();
        let (millis, suffix) = id.split_once('-').expect("dash");
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), 9);
        assert!(suffix.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn non_array_collection_is_copied_aside() {
        let store = store();
        store.set("jobtrack:widgets", &json!({"oops": true}));
        let repo: EntityRepository<Widget> = EntityRepository::new(&store, RepositoryOptions::default());
        assert_eq!(repo.get_all().len(), 1);
        assert_eq!(store.get("jobtrack:widgets.corrupt"), Some(json!({"oops": true})));
    }

    #[test]
    fn second_corruption_does_not_replace_first_backup() {
        let store = store();
        let repo: EntityRepository<Widget> = EntityRepository::new(&store, RepositoryOptions::default());
        store.set("jobtrack:widgets", &json!({"oops": 1}));
        assert_eq!(repo.get_all().len(), 1);
        store.set("jobtrack:widgets", &json!({"oops": 2}));
        assert_eq!(repo.get_all().len(), 1);

        assert_eq!(store.get("jobtrack:widgets.corrupt"), Some(json!({"oops": 1})));
        assert_eq!(store.get("jobtrack:widgets.corrupt.1"), Some(json!({"oops": 2})));
    }
}
