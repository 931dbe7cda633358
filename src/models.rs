use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Applied,
    Screening,
    Interview,
    Offer,
    Rejected,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Applied,
        Stage::Screening,
        Stage::Interview,
        Stage::Offer,
        Stage::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Screening => "screening",
            Self::Interview => "interview",
            Self::Offer => "offer",
            Self::Rejected => "rejected",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Applied => "Applied",
            Self::Screening => "Screening",
            Self::Interview => "Interview",
            Self::Offer => "Offer",
            Self::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown stage '{s}' (expected applied, screening, interview, offer, rejected)"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown priority '{other}' (expected high, medium, low)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    #[default]
    Pending,
    Completed,
}

/// Company snapshot. Embedded by value in applications and activities, and
/// also kept as its own collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub description: String,
}

impl Company {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub linkedin: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewEvent {
    pub id: String,
    pub kind: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub interviewers: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
}

impl Task {
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due < now)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub url: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    pub position: String,
    pub company: Company,
    pub date_applied: DateTime<Utc>,
    pub stage: Stage,
    #[serde(default)]
    pub job_description: String,
    #[serde(default)]
    pub salary: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub remote: bool,
    #[serde(default)]
    pub shortlisted: bool,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub interviews: Vec<InterviewEvent>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub note_entries: Vec<Note>,
}

impl Application {
    pub fn has_salary(&self) -> bool {
        !self.salary.trim().is_empty()
    }
}

/// Fields a caller supplies when creating an application; the id is assigned
/// by the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewApplication {
    pub position: String,
    pub company: Company,
    pub date_applied: DateTime<Utc>,
    pub stage: Stage,
    #[serde(default)]
    pub job_description: String,
    #[serde(default)]
    pub salary: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub remote: bool,
    #[serde(default)]
    pub shortlisted: bool,
    #[serde(default)]
    pub notes: String,
}

impl NewApplication {
    pub fn new(position: &str, company: &str) -> Self {
        Self {
            position: position.to_string(),
            company: Company::named(company),
            date_applied: Utc::now(),
            stage: Stage::Applied,
            job_description: String::new(),
            salary: String::new(),
            location: String::new(),
            remote: false,
            shortlisted: false,
            notes: String::new(),
        }
    }
}

/// Partial application update. Only `Some` fields are merged.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<Company>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_applied: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortlisted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Application,
    StageChange,
    Interview,
    Offer,
    Rejection,
    Note,
}

/// Append-only log entry. Written as a side effect of application changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub kind: ActivityKind,
    pub title: String,
    #[serde(default)]
    pub application_id: Option<String>,
    #[serde(default)]
    pub company: Option<Company>,
    #[serde(default)]
    pub stage: Option<Stage>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    pub kind: ActivityKind,
    pub title: String,
    pub application_id: Option<String>,
    pub company: Option<Company>,
    pub stage: Option<Stage>,
    pub timestamp: DateTime<Utc>,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingEvent {
    pub id: String,
    pub title: String,
    pub kind: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub application_id: Option<String>,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub title: String,
    pub kind: String,
    pub date: DateTime<Utc>,
    pub application_id: Option<String>,
    pub company_name: String,
    pub location: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub status: ReminderStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub application_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReminder {
    pub title: String,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub priority: Priority,
    pub application_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyGoal {
    pub id: String,
    pub title: String,
    /// First day of the month the goal belongs to.
    pub month: NaiveDate,
    pub target: u32,
    #[serde(default)]
    pub current: u32,
}

impl MonthlyGoal {
    pub fn progress(&self) -> f64 {
        if self.target == 0 {
            return 0.0;
        }
        (f64::from(self.current) / f64::from(self.target)).min(1.0)
    }

    pub fn is_met(&self) -> bool {
        self.target > 0 && self.current >= self.target
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGoal {
    pub title: String,
    pub month: NaiveDate,
    pub target: u32,
}

/// Persisted snapshot of the most recent aggregate computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppStats {
    pub total_applications: usize,
    pub active_applications: usize,
    pub interviews_scheduled: usize,
    pub offers_received: usize,
    pub response_rate: f64,
    pub success_rate: f64,
    #[serde(default)]
    pub computed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub target_roles: Vec<String>,
    #[serde(default)]
    pub density: crate::window::Density,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            name: "Job Seeker".to_string(),
            email: String::new(),
            title: String::new(),
            location: String::new(),
            target_roles: Vec::new(),
            density: crate::window::Density::default(),
            updated_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stage_parses_case_insensitively() {
        assert_eq!("Interview".parse::<Stage>(), Ok(Stage::Interview));
        assert!("ghosted".parse::<Stage>().is_err());
    }

    #[test]
    fn unknown_stage_fails_to_deserialize() {
        let raw = json!({
            "id": "1",
            "position": "Engineer",
            "company": {"name": "Acme"},
            "dateApplied": "2024-03-01T00:00:00Z",
            "stage": "ghosted"
        });
        assert!(serde_json::from_value::<Application>(raw).is_err());
    }

    #[test]
    fn dates_deserialize_into_native_values() {
        let raw = json!({
            "id": "1",
            "position": "Engineer",
            "company": {"name": "Acme"},
            "dateApplied": "2024-03-01T09:30:00Z",
            "stage": "applied"
        });
        let app: Application = serde_json::from_value(raw).expect("parse");
        assert_eq!(app.date_applied.to_rfc3339(), "2024-03-01T09:30:00+00:00");
        assert!(app.contacts.is_empty());
    }

    #[test]
    fn goal_progress_guards_zero_target() {
        let goal = MonthlyGoal {
            id: "g".into(),
            title: "Apply".into(),
            month: NaiveDate::from_ymd_opt(2024, 3, 1).expect("date"),
            target: 0,
            current: 4,
        };
        assert_eq!(goal.progress(), 0.0);
        assert!(!goal.is_met());
    }

    #[test]
    fn patch_serializes_only_present_fields() {
        let patch = ApplicationPatch {
            salary: Some("$120k".into()),
            ..ApplicationPatch::default()
        };
        assert_eq!(serde_json::to_value(&patch).expect("value"), json!({"salary": "$120k"}));
    }
}
