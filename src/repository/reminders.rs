use chrono::{DateTime, Utc};

use super::{Entity, EntityRepository, RepositoryOptions};
use crate::error::RecordError;
use crate::models::{NewReminder, Priority, Reminder, ReminderStatus};
use crate::seed;
use crate::store::Store;

impl Entity for Reminder {
    type New = NewReminder;
    const COLLECTION: &'static str = "reminders";
    const DATE_FIELDS: &'static [&'static str] = &["dueDate"];

    fn id(&self) -> &str {
        &self.id
    }

    fn from_new(id: String, new: NewReminder) -> Self {
        Self {
            id,
            title: new.title,
            description: new.description,
            due_date: new.due_date,
            status: ReminderStatus::Pending,
            priority: new.priority,
            application_id: new.application_id,
        }
    }

    fn seed() -> Vec<Self> {
        seed::reminders()
    }

    fn validate(&self) -> Result<(), RecordError> {
        if self.id.trim().is_empty() {
            return Err(RecordError::Invalid("empty id".to_string()));
        }
        if self.title.trim().is_empty() {
            return Err(RecordError::Invalid("reminder title is empty".to_string()));
        }
        Ok(())
    }
}

/// Reminder queries compare against the `now` passed in on every call;
/// nothing is cached between calls.
pub struct ReminderRepository<'s> {
    inner: EntityRepository<'s, Reminder>,
}

impl<'s> ReminderRepository<'s> {
    pub fn new(store: &'s Store, options: RepositoryOptions) -> Self {
        Self {
            inner: EntityRepository::new(store, options),
        }
    }

    pub fn get_all(&self) -> Vec<Reminder> {
        self.inner.get_all()
    }

    pub fn get_by_id(&self, id: &str) -> Option<Reminder> {
        self.inner.get_by_id(id)
    }

    pub fn create(&self, new: NewReminder) -> Reminder {
        self.inner.create(new)
    }

    pub fn delete(&self, id: &str) -> bool {
        self.inner.delete(id)
    }

    pub fn complete(&self, id: &str) -> Option<Reminder> {
        self.inner.update_with(id, |r| r.status = ReminderStatus::Completed)
    }

    pub fn pending(&self) -> Vec<Reminder> {
        self.filtered(|r| r.status == ReminderStatus::Pending)
    }

    pub fn overdue(&self, now: DateTime<Utc>) -> Vec<Reminder> {
        self.filtered(|r| r.status == ReminderStatus::Pending && r.due_date < now)
    }

    pub fn due_today(&self, now: DateTime<Utc>) -> Vec<Reminder> {
        let today = now.date_naive();
        self.filtered(|r| r.status == ReminderStatus::Pending && r.due_date.date_naive() == today)
    }

    /// Pending reminders not yet due, soonest first.
    pub fn upcoming(&self, now: DateTime<Utc>) -> Vec<Reminder> {
        let mut upcoming = self.filtered(|r| r.status == ReminderStatus::Pending && r.due_date >= now);
        upcoming.sort_by(|a, b| a.due_date.cmp(&b.due_date));
        upcoming
    }

    pub fn by_priority(&self, priority: Priority) -> Vec<Reminder> {
        self.filtered(|r| r.priority == priority)
    }

    pub fn for_application(&self, application_id: &str) -> Vec<Reminder> {
        self.filtered(|r| r.application_id.as_deref() == Some(application_id))
    }

    fn filtered<F>(&self, keep: F) -> Vec<Reminder>
    where
        F: Fn(&Reminder) -> bool,
    {
        self.inner.get_all().into_iter().filter(|r| keep(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn reminder(title: &str, due: DateTime<Utc>, priority: Priority) -> NewReminder {
        NewReminder {
            title: title.to_string(),
            description: String::new(),
            due_date: due,
            priority,
            application_id: None,
        }
    }

    #[test]
    fn date_buckets_follow_now() {
        let store = Store::open_in_memory().expect("open");
        store.init().expect("init");
        let repo = ReminderRepository::new(&store, RepositoryOptions { seed_defaults: false });
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();

        repo.create(reminder("late", now - Duration::days(2), Priority::High));
        repo.create(reminder("this morning", now - Duration::hours(3), Priority::Low));
        repo.create(reminder("tonight", now + Duration::hours(6), Priority::Medium));
        let done = repo.create(reminder("next week", now + Duration::days(7), Priority::High));

        assert_eq!(repo.overdue(now).len(), 2);
        assert_eq!(repo.due_today(now).len(), 2);
        let upcoming: Vec<String> = repo.upcoming(now).into_iter().map(|r| r.title).collect();
        assert_eq!(upcoming, vec!["tonight", "next week"]);
        assert_eq!(repo.by_priority(Priority::High).len(), 2);

        let completed = repo.complete(&done.id).expect("completed");
        assert_eq!(completed.status, ReminderStatus::Completed);
        assert_eq!(repo.pending().len(), 3);
        assert!(repo.complete("missing").is_none());

        // A later "now" moves everything pending into overdue.
        assert_eq!(repo.overdue(now + Duration::days(30)).len(), 3);
    }
}
