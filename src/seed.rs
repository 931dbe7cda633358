//! Default datasets written the first time a collection is read empty.
//!
//! Dates are relative to the moment of seeding so that "upcoming" and
//! "this week" views have something to show on a fresh install.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use crate::models::{
    Activity, ActivityKind, Application, Company, Contact, InterviewEvent, MonthlyGoal, Note, Priority, Reminder,
    ReminderStatus, Stage, Task, UpcomingEvent,
};

fn days_ago(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now - Duration::days(days)
}

fn days_ahead(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now + Duration::days(days)
}

pub fn companies() -> Vec<Company> {
    vec![
        Company {
            id: "seed-company-1".to_string(),
            name: "Northwind Labs".to_string(),
            industry: "Software".to_string(),
            website: "https://northwind.example".to_string(),
            location: "Seattle, WA".to_string(),
            size: "201-500".to_string(),
            description: "Developer tooling for data teams.".to_string(),
        },
        Company {
            id: "seed-company-2".to_string(),
            name: "Bluefin Health".to_string(),
            industry: "Healthcare".to_string(),
            website: "https://bluefin.example".to_string(),
            location: "Boston, MA".to_string(),
            size: "1001-5000".to_string(),
            description: "Patient scheduling platform.".to_string(),
        },
        Company {
            id: "seed-company-3".to_string(),
            name: "Copperline Finance".to_string(),
            industry: "Fintech".to_string(),
            website: "https://copperline.example".to_string(),
            location: "New York, NY".to_string(),
            size: "51-200".to_string(),
            description: "Treasury management for small businesses.".to_string(),
        },
    ]
}

pub fn applications() -> Vec<Application> {
    let now = Utc::now();
    let companies = companies();
    vec![
        Application {
            id: "seed-app-1".to_string(),
            position: "Senior Backend Engineer".to_string(),
            company: companies[0].clone(),
            date_applied: days_ago(now, 3),
            stage: Stage::Applied,
            job_description: "Own ingestion services written in Rust.".to_string(),
            salary: "$160k - $190k".to_string(),
            location: "Seattle, WA".to_string(),
            remote: true,
            shortlisted: true,
            notes: "Referred by a former teammate.".to_string(),
            contacts: vec![Contact {
                id: "seed-contact-1".to_string(),
                name: "Dana Whitfield".to_string(),
                role: "Engineering Manager".to_string(),
                email: "dana@northwind.example".to_string(),
                ..Contact::default()
            }],
            interviews: Vec::new(),
            tasks: vec![Task {
                id: "seed-task-1".to_string(),
                title: "Follow up with recruiter".to_string(),
                due_date: Some(days_ahead(now, 2)),
                completed: false,
                priority: Priority::High,
            }],
            documents: Vec::new(),
            note_entries: Vec::new(),
        },
        Application {
            id: "seed-app-2".to_string(),
            position: "Platform Engineer".to_string(),
            company: companies[1].clone(),
            date_applied: days_ago(now, 12),
            stage: Stage::Interview,
            job_description: "Kubernetes platform and CI ownership.".to_string(),
            salary: String::new(),
            location: "Boston, MA".to_string(),
            remote: false,
            shortlisted: false,
            notes: String::new(),
            contacts: Vec::new(),
            interviews: vec![InterviewEvent {
                id: "seed-interview-1".to_string(),
                kind: "technical".to_string(),
                date: days_ahead(now, 4),
                interviewers: vec!["Priya N.".to_string()],
                notes: String::new(),
                completed: false,
            }],
            tasks: vec![Task {
                id: "seed-task-2".to_string(),
                title: "Prepare system design notes".to_string(),
                due_date: Some(days_ago(now, 1)),
                completed: false,
                priority: Priority::Medium,
            }],
            documents: Vec::new(),
            note_entries: vec![Note {
                id: "seed-note-1".to_string(),
                content: "Recruiter mentioned a hybrid schedule.".to_string(),
                created_at: days_ago(now, 10),
            }],
        },
        Application {
            id: "seed-app-3".to_string(),
            position: "Staff Software Engineer".to_string(),
            company: companies[2].clone(),
            date_applied: days_ago(now, 40),
            stage: Stage::Rejected,
            job_description: String::new(),
            salary: "$210k".to_string(),
            location: "New York, NY".to_string(),
            remote: false,
            shortlisted: false,
            notes: "Position filled internally.".to_string(),
            contacts: Vec::new(),
            interviews: Vec::new(),
            tasks: Vec::new(),
            documents: Vec::new(),
            note_entries: Vec::new(),
        },
    ]
}

pub fn activities() -> Vec<Activity> {
    let now = Utc::now();
    let companies = companies();
    vec![
        Activity {
            id: "seed-activity-1".to_string(),
            kind: ActivityKind::Application,
            title: "Applied to Senior Backend Engineer".to_string(),
            application_id: Some("seed-app-1".to_string()),
            company: Some(companies[0].clone()),
            stage: Some(Stage::Applied),
            timestamp: days_ago(now, 3),
            detail: String::new(),
        },
        Activity {
            id: "seed-activity-2".to_string(),
            kind: ActivityKind::StageChange,
            title: "Moved to Interview".to_string(),
            application_id: Some("seed-app-2".to_string()),
            company: Some(companies[1].clone()),
            stage: Some(Stage::Interview),
            timestamp: days_ago(now, 6),
            detail: "Platform Engineer at Bluefin Health: applied -> interview".to_string(),
        },
    ]
}

pub fn events() -> Vec<UpcomingEvent> {
    let now = Utc::now();
    vec![UpcomingEvent {
        id: "seed-event-1".to_string(),
        title: "Technical interview".to_string(),
        kind: "interview".to_string(),
        date: days_ahead(now, 4),
        application_id: Some("seed-app-2".to_string()),
        company_name: "Bluefin Health".to_string(),
        location: "Video call".to_string(),
        notes: String::new(),
    }]
}

pub fn reminders() -> Vec<Reminder> {
    let now = Utc::now();
    vec![
        Reminder {
            id: "seed-reminder-1".to_string(),
            title: "Send thank-you note".to_string(),
            description: "Thank the Bluefin panel.".to_string(),
            due_date: days_ahead(now, 5),
            status: ReminderStatus::Pending,
            priority: Priority::High,
            application_id: Some("seed-app-2".to_string()),
        },
        Reminder {
            id: "seed-reminder-2".to_string(),
            title: "Update portfolio".to_string(),
            description: String::new(),
            due_date: days_ago(now, 2),
            status: ReminderStatus::Pending,
            priority: Priority::Low,
            application_id: None,
        },
    ]
}

pub fn goals() -> Vec<MonthlyGoal> {
    let today = Utc::now().date_naive();
    let month = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);
    vec![
        MonthlyGoal {
            id: "seed-goal-1".to_string(),
            title: "Applications sent".to_string(),
            month,
            target: 20,
            current: 0,
        },
        MonthlyGoal {
            id: "seed-goal-2".to_string(),
            title: "Networking conversations".to_string(),
            month,
            target: 5,
            current: 0,
        },
    ]
}
