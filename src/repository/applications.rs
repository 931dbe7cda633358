use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{
    coerce_dates, coerce_nested_dates, generate_id, ActivityRepository, Entity, EntityRepository, LoadReport,
    RepositoryOptions,
};
use crate::error::RecordError;
use crate::models::{
    Application, ApplicationPatch, Contact, InterviewEvent, NewApplication, Note, Priority, Stage, Task,
};
use crate::seed;
use crate::store::Store;

const SUB_COLLECTIONS: [&str; 5] = ["contacts", "interviews", "tasks", "documents", "noteEntries"];

impl Entity for Application {
    type New = NewApplication;
    const COLLECTION: &'static str = "applications";
    const DATE_FIELDS: &'static [&'static str] = &["dateApplied"];

    fn id(&self) -> &str {
        &self.id
    }

    fn from_new(id: String, new: NewApplication) -> Self {
        Self {
            id,
            position: new.position,
            company: new.company,
            date_applied: new.date_applied,
            stage: new.stage,
            job_description: new.job_description,
            salary: new.salary,
            location: new.location,
            remote: new.remote,
            shortlisted: new.shortlisted,
            notes: new.notes,
            contacts: Vec::new(),
            interviews: Vec::new(),
            tasks: Vec::new(),
            documents: Vec::new(),
            note_entries: Vec::new(),
        }
    }

    fn seed() -> Vec<Self> {
        seed::applications()
    }

    fn validate(&self) -> Result<(), RecordError> {
        if self.id.trim().is_empty() {
            return Err(RecordError::Invalid("empty id".to_string()));
        }
        if self.position.trim().is_empty() {
            return Err(RecordError::Invalid("position is empty".to_string()));
        }
        if self.company.name.trim().is_empty() {
            return Err(RecordError::Invalid("company name is empty".to_string()));
        }
        Ok(())
    }

    fn migrate(raw: &mut Value) -> bool {
        let Value::Object(map) = raw else {
            return false;
        };
        let mut changed = false;

        for field in SUB_COLLECTIONS {
            if !matches!(map.get(field), Some(Value::Array(_))) {
                map.insert(field.to_string(), Value::Array(Vec::new()));
                changed = true;
            }
        }

        // Early records stored the company as a bare name.
        if let Some(name) = map.get("company").and_then(Value::as_str).map(str::to_string) {
            let company = serde_json::json!({ "name": name });
            map.insert("company".to_string(), company);
            changed = true;
        }

        changed |= coerce_dates(raw, Self::DATE_FIELDS);
        changed |= coerce_nested_dates(raw, "interviews", &["date"]);
        changed |= coerce_nested_dates(raw, "tasks", &["dueDate"]);
        changed |= coerce_nested_dates(raw, "documents", &["addedAt"]);
        changed |= coerce_nested_dates(raw, "noteEntries", &["createdAt"]);
        changed
    }
}

pub struct ApplicationRepository<'s> {
    inner: EntityRepository<'s, Application>,
    activities: ActivityRepository<'s>,
}

impl<'s> ApplicationRepository<'s> {
    pub fn new(store: &'s Store, options: RepositoryOptions) -> Self {
        Self {
            inner: EntityRepository::new(store, options),
            activities: ActivityRepository::new(store, options),
        }
    }

    pub fn get_all(&self) -> Vec<Application> {
        self.inner.get_all()
    }

    pub fn load_report(&self) -> LoadReport<Application> {
        self.inner.load_report()
    }

    pub fn get_by_id(&self, id: &str) -> Option<Application> {
        self.inner.get_by_id(id)
    }

    pub fn create(&self, new: NewApplication) -> Application {
        self.inner.create(new)
    }

    pub fn update<P: Serialize + ?Sized>(&self, id: &str, patch: &P) -> Option<Application> {
        self.inner.update(id, patch)
    }

    pub fn delete(&self, id: &str) -> bool {
        self.inner.delete(id)
    }

    /// Stage change workflow: update the application, then append a
    /// stage-change entry to the activity log.
    ///
    /// The two writes are not atomic. If the activity cannot be persisted the
    /// stage change stays applied and a warning is logged. Setting the stage
    /// an application already has is a no-op and logs nothing.
    pub fn update_stage(&self, id: &str, stage: Stage) -> Option<Application> {
        let before = self.inner.get_by_id(id)?;
        if before.stage == stage {
            return Some(before);
        }

        let patch = ApplicationPatch {
            stage: Some(stage),
            ..ApplicationPatch::default()
        };
        let updated = self.inner.update(id, &patch)?;

        match self.activities.log_stage_change(&updated, before.stage) {
            Some(activity) => info!(id, activity = %activity.id, from = %before.stage, to = %stage, "stage changed"),
            None => warn!(id, to = %stage, "stage changed but the activity entry was not persisted"),
        }
        Some(updated)
    }

    pub fn by_stage(&self, stage: Stage) -> Vec<Application> {
        self.inner.get_all().into_iter().filter(|a| a.stage == stage).collect()
    }

    pub fn by_company(&self, company: &str) -> Vec<Application> {
        let needle = company.to_lowercase();
        self.inner
            .get_all()
            .into_iter()
            .filter(|a| a.company.name.to_lowercase() == needle)
            .collect()
    }

    /// Most recently applied first.
    pub fn recent(&self, limit: usize) -> Vec<Application> {
        let mut all = self.inner.get_all();
        all.sort_by(|a, b| b.date_applied.cmp(&a.date_applied));
        all.truncate(limit);
        all
    }

    pub fn with_open_tasks(&self) -> Vec<Application> {
        self.inner
            .get_all()
            .into_iter()
            .filter(|a| a.tasks.iter().any(|t| !t.completed))
            .collect()
    }

    pub fn add_note(&self, id: &str, content: &str) -> Option<Note> {
        let note = Note {
            id: generate_id(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        let pushed = note.clone();
        self.inner.update_with(id, move |app| app.note_entries.push(pushed))?;
        Some(note)
    }

    pub fn add_task(
        &self,
        id: &str,
        title: &str,
        due_date: Option<DateTime<Utc>>,
        priority: Priority,
    ) -> Option<Task> {
        let task = Task {
            id: generate_id(),
            title: title.to_string(),
            due_date,
            completed: false,
            priority,
        };
        let pushed = task.clone();
        self.inner.update_with(id, move |app| app.tasks.push(pushed))?;
        Some(task)
    }

    /// Mark a task done. Returns `false` when either id is unknown.
    pub fn complete_task(&self, id: &str, task_id: &str) -> bool {
        let has_task = self
            .inner
            .get_by_id(id)
            .is_some_and(|app| app.tasks.iter().any(|t| t.id == task_id));
        if !has_task {
            return false;
        }
        self.inner
            .update_with(id, |app| {
                if let Some(task) = app.tasks.iter_mut().find(|t| t.id == task_id) {
                    task.completed = true;
                }
            })
            .is_some()
    }

    pub fn add_contact(&self, id: &str, mut contact: Contact) -> Option<Contact> {
        contact.id = generate_id();
        let pushed = contact.clone();
        self.inner.update_with(id, move |app| app.contacts.push(pushed))?;
        Some(contact)
    }

    pub fn add_interview(&self, id: &str, kind: &str, date: DateTime<Utc>) -> Option<InterviewEvent> {
        let interview = InterviewEvent {
            id: generate_id(),
            kind: kind.to_string(),
            date,
            interviewers: Vec::new(),
            notes: String::new(),
            completed: false,
        };
        let pushed = interview.clone();
        self.inner.update_with(id, move |app| app.interviews.push(pushed))?;
        Some(interview)
    }
}
