use chrono::{DateTime, Utc};

use super::{Entity, EntityRepository, RepositoryOptions};
use crate::models::{NewEvent, UpcomingEvent};
use crate::seed;
use crate::store::Store;

impl Entity for UpcomingEvent {
    type New = NewEvent;
    const COLLECTION: &'static str = "events";
    const DATE_FIELDS: &'static [&'static str] = &["date"];

    fn id(&self) -> &str {
        &self.id
    }

    fn from_new(id: String, new: NewEvent) -> Self {
        Self {
            id,
            title: new.title,
            kind: new.kind,
            date: new.date,
            application_id: new.application_id,
            company_name: new.company_name,
            location: new.location,
            notes: new.notes,
        }
    }

    fn seed() -> Vec<Self> {
        seed::events()
    }
}

pub struct EventRepository<'s> {
    inner: EntityRepository<'s, UpcomingEvent>,
}

impl<'s> EventRepository<'s> {
    pub fn new(store: &'s Store, options: RepositoryOptions) -> Self {
        Self {
            inner: EntityRepository::new(store, options),
        }
    }

    pub fn get_all(&self) -> Vec<UpcomingEvent> {
        self.inner.get_all()
    }

    pub fn create(&self, new: NewEvent) -> UpcomingEvent {
        self.inner.create(new)
    }

    pub fn delete(&self, id: &str) -> bool {
        self.inner.delete(id)
    }

    /// Events at or after `now`, soonest first.
    pub fn upcoming(&self, now: DateTime<Utc>) -> Vec<UpcomingEvent> {
        let mut events: Vec<UpcomingEvent> = self.inner.get_all().into_iter().filter(|e| e.date >= now).collect();
        events.sort_by(|a, b| a.date.cmp(&b.date));
        events
    }

    pub fn today(&self, now: DateTime<Utc>) -> Vec<UpcomingEvent> {
        let today = now.date_naive();
        self.inner
            .get_all()
            .into_iter()
            .filter(|e| e.date.date_naive() == today)
            .collect()
    }

    pub fn for_application(&self, application_id: &str) -> Vec<UpcomingEvent> {
        self.inner
            .get_all()
            .into_iter()
            .filter(|e| e.application_id.as_deref() == Some(application_id))
            .collect()
    }
}
