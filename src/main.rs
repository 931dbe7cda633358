mod tui;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use jobtrack::config::Config;
use jobtrack::logging;
use jobtrack::models::{
    Activity, Application, Company, MonthlyGoal, NewApplication, NewEvent, NewGoal, NewReminder, Priority,
    Reminder, Stage, UpcomingEvent, UserProfile,
};
use jobtrack::query::{
    compute_stats, format_date, Column, DateRange, QueryEngine, QuickFilter, SalaryFilter, SortSpec, StageFilter,
};
use jobtrack::repository::{
    ActivityRepository, ApplicationRepository, CompanyRepository, Entity, EntityRepository, EventRepository,
    GoalRepository, ProfileRepository, ReminderRepository, RepositoryOptions, StatsRepository,
};
use jobtrack::store::Store;
use jobtrack::window::Density;

#[derive(Parser)]
#[command(name = "jobtrack")]
#[command(about = "Track job applications, interviews and follow-ups locally")]
struct Cli {
    /// Path to the data file
    #[arg(long, global = true, env = "JOBTRACK_DB")]
    db: Option<PathBuf>,

    /// Leave empty collections empty instead of writing sample data
    #[arg(long, global = true, env = "JOBTRACK_NO_SEED")]
    no_seed: bool,

    /// Delay before typed search and column filters apply in the browser
    #[arg(long, global = true, env = "JOBTRACK_DEBOUNCE_MS")]
    debounce_ms: Option<u64>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data file
    Init,

    /// Add an application
    Add {
        /// Position title
        position: String,

        /// Company name
        company: String,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(long)]
        salary: Option<String>,

        #[arg(long)]
        remote: bool,

        #[arg(long)]
        shortlist: bool,

        /// Initial stage (applied, screening, interview, offer, rejected)
        #[arg(long, default_value = "applied")]
        stage: Stage,

        /// Date applied (YYYY-MM-DD), defaults to now
        #[arg(long, value_parser = parse_when)]
        date: Option<DateTime<Utc>>,

        #[arg(short, long)]
        notes: Option<String>,
    },

    /// List applications
    List {
        /// Case-insensitive search over position, company, location and notes
        #[arg(short, long)]
        search: Option<String>,

        /// Column filter, e.g. --filter company=acme (repeatable)
        #[arg(short, long = "filter", value_parser = parse_column_filter)]
        filters: Vec<(Column, String)>,

        /// Only this stage
        #[arg(long)]
        stage: Option<Stage>,

        /// Applied within: 7d, 30d, 90d, all, or an inclusive YYYY-MM-DD..YYYY-MM-DD range
        #[arg(long, default_value = "all")]
        since: DateRange,

        /// Salary presence: with, without or all
        #[arg(long, default_value = "all")]
        salary: SalaryFilter,

        /// Sort column (position, company, location, stage, date, salary, remote, notes)
        #[arg(long)]
        sort: Option<Column>,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        /// Maximum rows to print
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Show application details
    Show {
        /// Application ID
        id: String,
    },

    /// Move an application to a new stage
    Stage {
        /// Application ID
        id: String,

        /// New stage
        stage: Stage,
    },

    /// Delete an application
    Delete {
        /// Application ID
        id: String,
    },

    /// Attach a note to an application
    Note {
        /// Application ID
        id: String,

        content: String,
    },

    /// Manage application tasks
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Show aggregate statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the activity log
    Activity {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,

        /// Only entries for this application
        #[arg(short, long)]
        application: Option<String>,
    },

    /// Manage reminders
    Reminders {
        #[command(subcommand)]
        command: Option<ReminderCommands>,
    },

    /// Manage upcoming events
    Events {
        #[command(subcommand)]
        command: Option<EventCommands>,
    },

    /// Manage monthly goals
    Goals {
        #[command(subcommand)]
        command: Option<GoalCommands>,
    },

    /// Show or edit the user profile
    Profile {
        #[command(subcommand)]
        command: Option<ProfileCommands>,
    },

    /// Report stored records that fail to load
    Check,

    /// Browse applications interactively
    Browse,
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Add a task to an application
    Add {
        /// Application ID
        id: String,

        title: String,

        /// Due date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_when)]
        due: Option<DateTime<Utc>>,

        #[arg(short, long, default_value = "medium")]
        priority: Priority,
    },

    /// Mark a task complete
    Done {
        /// Application ID
        id: String,

        /// Task ID
        task_id: String,
    },

    /// List applications with open tasks
    List,
}

#[derive(Subcommand)]
enum ReminderCommands {
    /// List pending reminders
    List {
        /// Only overdue reminders
        #[arg(long)]
        overdue: bool,

        /// Only reminders due today
        #[arg(long)]
        today: bool,

        /// Only this priority
        #[arg(short, long)]
        priority: Option<Priority>,

        /// Only reminders for this application
        #[arg(short, long)]
        application: Option<String>,
    },

    /// Add a reminder
    Add {
        title: String,

        /// Due date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_when)]
        due: DateTime<Utc>,

        #[arg(short, long, default_value = "medium")]
        priority: Priority,

        #[arg(short, long)]
        application: Option<String>,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// Mark a reminder complete
    Done {
        /// Reminder ID
        id: String,
    },

    /// Delete a reminder
    Delete {
        /// Reminder ID
        id: String,
    },
}

#[derive(Subcommand)]
enum EventCommands {
    /// List events from now on
    List {
        /// Only today's events
        #[arg(long)]
        today: bool,

        /// Only events for this application
        #[arg(short, long)]
        application: Option<String>,
    },

    /// Add an event
    Add {
        title: String,

        /// Date (YYYY-MM-DD or RFC 3339)
        #[arg(value_parser = parse_when)]
        date: DateTime<Utc>,

        /// Event kind (interview, call, deadline, ...)
        #[arg(short, long, default_value = "interview")]
        kind: String,

        #[arg(short, long)]
        application: Option<String>,

        #[arg(short, long)]
        company: Option<String>,

        #[arg(short, long)]
        location: Option<String>,
    },

    /// Delete an event
    Delete {
        /// Event ID
        id: String,
    },
}

#[derive(Subcommand)]
enum GoalCommands {
    /// List goals for a month (defaults to the current one)
    List {
        /// Month as YYYY-MM
        #[arg(short, long, value_parser = parse_month)]
        month: Option<NaiveDate>,
    },

    /// Add a goal
    Add {
        title: String,

        target: u32,

        /// Month as YYYY-MM (defaults to the current one)
        #[arg(short, long, value_parser = parse_month)]
        month: Option<NaiveDate>,
    },

    /// Record progress towards a goal
    Progress {
        /// Goal ID
        id: String,

        #[arg(default_value = "1")]
        amount: u32,
    },

    /// Change a goal's target
    Target {
        /// Goal ID
        id: String,

        target: u32,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show the profile
    Show,

    /// Update profile fields
    Set {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        location: Option<String>,

        /// Row density in the browser (compact, comfortable, spacious)
        #[arg(long)]
        density: Option<Density>,

        /// Target role (repeatable; replaces the list)
        #[arg(long = "role")]
        roles: Vec<String>,
    },
}

/// `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp.
fn parse_when(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|day| day.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| format!("invalid date '{s}' (expected YYYY-MM-DD)"))
}

fn parse_month(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d")
        .map_err(|_| format!("invalid month '{s}' (expected YYYY-MM)"))
}

fn parse_column_filter(s: &str) -> Result<(Column, String), String> {
    let (column, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid filter '{s}' (expected column=value)"))?;
    Ok((column.parse()?, value.to_string()))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn percent(rate: f64) -> String {
    format!("{:.0}%", rate * 100.0)
}

fn print_applications(apps: &[&Application]) {
    println!(
        "{:<24} {:<10} {:<30} {:<22} {:>10}",
        "ID", "STAGE", "POSITION", "COMPANY", "APPLIED"
    );
    println!("{}", "-".repeat(100));
    for app in apps {
        println!(
            "{:<24} {:<10} {:<30} {:<22} {:>10}",
            app.id,
            app.stage,
            truncate(&app.position, 28),
            truncate(&app.company.name, 20),
            format_date(app.date_applied)
        );
    }
}

fn print_reminders(reminders: &[Reminder]) {
    if reminders.is_empty() {
        println!("No reminders.");
        return;
    }
    println!("{:<24} {:<8} {:<10} {:<40}", "ID", "PRIORITY", "DUE", "TITLE");
    println!("{}", "-".repeat(84));
    for reminder in reminders {
        println!(
            "{:<24} {:<8} {:<10} {:<40}",
            reminder.id,
            reminder.priority.as_str(),
            format_date(reminder.due_date),
            truncate(&reminder.title, 40)
        );
    }
}

fn print_events(events: &[UpcomingEvent]) {
    if events.is_empty() {
        println!("No upcoming events.");
        return;
    }
    println!("{:<24} {:<16} {:<12} {:<30} {:<20}", "ID", "WHEN", "KIND", "TITLE", "COMPANY");
    println!("{}", "-".repeat(104));
    for event in events {
        println!(
            "{:<24} {:<16} {:<12} {:<30} {:<20}",
            event.id,
            event.date.format("%Y-%m-%d %H:%M"),
            truncate(&event.kind, 12),
            truncate(&event.title, 28),
            truncate(&event.company_name, 20)
        );
    }
}

fn print_activities(activities: &[Activity]) {
    if activities.is_empty() {
        println!("No activity yet.");
        return;
    }
    for activity in activities {
        let company = activity.company.as_ref().map(|c| c.name.as_str()).unwrap_or("");
        println!(
            "{}  {:<32} {}",
            activity.timestamp.format("%Y-%m-%d %H:%M"),
            truncate(&activity.title, 32),
            company
        );
        if !activity.detail.is_empty() {
            println!("                  {}", activity.detail);
        }
    }
}

fn print_goals(goals: &[MonthlyGoal]) {
    if goals.is_empty() {
        println!("No goals for this month.");
        return;
    }
    println!("{:<24} {:<30} {:>9} {:>6}", "ID", "GOAL", "PROGRESS", "");
    println!("{}", "-".repeat(72));
    for goal in goals {
        let mark = if goal.is_met() { "done" } else { "" };
        println!(
            "{:<24} {:<30} {:>4}/{:<4} {:>6}",
            goal.id,
            truncate(&goal.title, 28),
            goal.current,
            goal.target,
            mark
        );
    }
}

fn print_profile(profile: &UserProfile) {
    println!("Name: {}", profile.name);
    if !profile.email.is_empty() {
        println!("Email: {}", profile.email);
    }
    if !profile.title.is_empty() {
        println!("Title: {}", profile.title);
    }
    if !profile.location.is_empty() {
        println!("Location: {}", profile.location);
    }
    if !profile.target_roles.is_empty() {
        println!("Target roles: {}", profile.target_roles.join(", "));
    }
    println!("Density: {}", profile.density);
}

fn show_application(store: &Store, options: RepositoryOptions, app: &Application) {
    println!("{} at {}", app.position, app.company.name);
    println!("ID: {}", app.id);
    println!("Stage: {}", app.stage.label());
    println!("Applied: {}", format_date(app.date_applied));
    if !app.location.is_empty() {
        let remote = if app.remote { " (remote)" } else { "" };
        println!("Location: {}{}", app.location, remote);
    } else if app.remote {
        println!("Location: remote");
    }
    if app.has_salary() {
        println!("Salary: {}", app.salary);
    }
    if app.shortlisted {
        println!("Shortlisted");
    }
    if !app.notes.is_empty() {
        println!("\n{}", textwrap::fill(&app.notes, 80));
    }

    if !app.contacts.is_empty() {
        println!("\nContacts:");
        for contact in &app.contacts {
            println!("  {} {} {}", contact.name, contact.role, contact.email);
        }
    }
    if !app.interviews.is_empty() {
        println!("\nInterviews:");
        for interview in &app.interviews {
            let done = if interview.completed { "x" } else { " " };
            println!("  [{}] {} {}", done, interview.date.format("%Y-%m-%d %H:%M"), interview.kind);
        }
    }
    if !app.tasks.is_empty() {
        println!("\nTasks:");
        let now = Utc::now();
        for task in &app.tasks {
            let done = if task.completed { "x" } else { " " };
            let due = task.due_date.map(format_date).unwrap_or_default();
            let late = if task.is_overdue(now) { " OVERDUE" } else { "" };
            println!("  [{}] {:<24} {:<40} {}{}", done, task.id, truncate(&task.title, 40), due, late);
        }
    }
    if !app.note_entries.is_empty() {
        println!("\nNotes:");
        for note in &app.note_entries {
            println!("  {}", note.created_at.format("%Y-%m-%d"));
            for line in textwrap::fill(&note.content, 76).lines() {
                println!("    {}", line);
            }
        }
    }
    if !app.job_description.is_empty() {
        println!("\n--- Job Description ---\n{}", textwrap::fill(&app.job_description, 80));
    }

    let reminders = ReminderRepository::new(store, options).for_application(&app.id);
    if !reminders.is_empty() {
        println!("\nReminders:");
        print_reminders(&reminders);
    }
    let activities = ActivityRepository::new(store, options).for_application(&app.id);
    if !activities.is_empty() {
        println!("\nActivity:");
        print_activities(&activities);
    }
}

fn check_collection<T: Entity>(store: &Store, options: RepositoryOptions) -> usize {
    let report = EntityRepository::<T>::new(store, options).load_report();
    println!(
        "{:<14} {:>6} loaded {:>6} rejected",
        T::COLLECTION,
        report.items.len(),
        report.rejected.len()
    );
    for rejected in &report.rejected {
        println!("  #{:<4} {}", rejected.index, rejected.reason);
        println!("        {}", truncate(&rejected.raw.to_string(), 72));
    }
    report.rejected.len()
}

fn run(command: Commands, store: &Store, config: &Config) -> Result<()> {
    let options = config.repository_options();

    match command {
        Commands::Init => {
            let apps = ApplicationRepository::new(store, options).get_all();
            CompanyRepository::new(store, options).get_all();
            ActivityRepository::new(store, options).get_all();
            EventRepository::new(store, options).get_all();
            ReminderRepository::new(store, options).get_all();
            GoalRepository::new(store, options).get_all();
            ProfileRepository::new(store).get();
            println!("Data file initialized at {}", config.data_path.display());
            println!("{} application(s) on record.", apps.len());
        }

        Commands::Add {
            position,
            company,
            location,
            salary,
            remote,
            shortlist,
            stage,
            date,
            notes,
        } => {
            let company = CompanyRepository::new(store, options).get_or_create(&company);
            let new = NewApplication {
                position,
                company,
                date_applied: date.unwrap_or_else(Utc::now),
                stage,
                job_description: String::new(),
                salary: salary.unwrap_or_default(),
                location: location.unwrap_or_default(),
                remote,
                shortlisted: shortlist,
                notes: notes.unwrap_or_default(),
            };
            let app = ApplicationRepository::new(store, options).create(new);
            println!("Added application {}", app.id);
        }

        Commands::List {
            search,
            filters,
            stage,
            since,
            salary,
            sort,
            desc,
            limit,
        } => {
            let apps = ApplicationRepository::new(store, options).get_all();
            let mut engine = QueryEngine::new(apps, Duration::ZERO);
            let now = Instant::now();
            if let Some(search) = search {
                engine.set_search(search, now);
            }
            for (column, value) in &filters {
                engine.set_column_filter(*column, value, now);
            }
            engine.flush();
            engine.set_quick_filter(QuickFilter {
                stage: stage.map(StageFilter::Only).unwrap_or_default(),
                date_range: since,
                salary,
            });
            engine.set_sort(sort.map(|column| if desc { SortSpec::desc(column) } else { SortSpec::asc(column) }));

            if engine.is_empty() {
                println!("No applications found.");
            } else {
                let shown: Vec<&Application> = engine.filtered().take(limit.unwrap_or(usize::MAX)).collect();
                print_applications(&shown);
                if shown.len() < engine.items().len() {
                    println!("\n{} of {} shown", shown.len(), engine.items().len());
                }
            }
        }

        Commands::Show { id } => {
            match ApplicationRepository::new(store, options).get_by_id(&id) {
                Some(app) => show_application(store, options, &app),
                None => println!("Application {} not found.", id),
            }
        }

        Commands::Stage { id, stage } => {
            let app = ApplicationRepository::new(store, options)
                .update_stage(&id, stage)
                .ok_or_else(|| anyhow!("application {} not found or not updated", id))?;
            println!("{} at {} is now {}.", app.position, app.company.name, app.stage.label());
        }

        Commands::Delete { id } => {
            if ApplicationRepository::new(store, options).delete(&id) {
                println!("Deleted application {}.", id);
            } else {
                println!("Application {} not found.", id);
            }
        }

        Commands::Note { id, content } => {
            let note = ApplicationRepository::new(store, options)
                .add_note(&id, &content)
                .ok_or_else(|| anyhow!("application {} not found", id))?;
            println!("Added note {}", note.id);
        }

        Commands::Task { command } => {
            let repo = ApplicationRepository::new(store, options);
            match command {
                TaskCommands::Add {
                    id,
                    title,
                    due,
                    priority,
                } => {
                    let task = repo
                        .add_task(&id, &title, due, priority)
                        .ok_or_else(|| anyhow!("application {} not found", id))?;
                    println!("Added task {}", task.id);
                }

                TaskCommands::Done { id, task_id } => {
                    if repo.complete_task(&id, &task_id) {
                        println!("Task {} done.", task_id);
                    } else {
                        println!("Task {} not found on application {}.", task_id, id);
                    }
                }

                TaskCommands::List => {
                    let now = Utc::now();
                    let apps = repo.with_open_tasks();
                    if apps.is_empty() {
                        println!("No open tasks.");
                    }
                    for app in apps {
                        println!("{} at {} ({})", app.position, app.company.name, app.id);
                        for task in app.tasks.iter().filter(|t| !t.completed) {
                            let due = task.due_date.map(format_date).unwrap_or_default();
                            let late = if task.is_overdue(now) { " OVERDUE" } else { "" };
                            println!(
                                "  {:<24} {:<6} {:<40} {}{}",
                                task.id,
                                task.priority.as_str(),
                                truncate(&task.title, 40),
                                due,
                                late
                            );
                        }
                    }
                }
            }
        }

        Commands::Stats { json } => {
            let now = Utc::now();
            let apps = ApplicationRepository::new(store, options).get_all();
            let stats = compute_stats(&apps, now);
            StatsRepository::new(store).record(&stats, now);

            if json {
                println!("{}", serde_json::to_string_pretty(&stats).context("serializing stats")?);
            } else {
                println!("Total applications: {}", stats.total);
                println!("Active: {}", stats.active);
                for stage in Stage::ALL {
                    println!("  {:<10} {:>4}", stage.label(), stats.count(stage));
                }
                println!("Applied this week: {}", stats.applied_this_week);
                println!("Applied this month: {}", stats.applied_this_month);
                println!("Open tasks: {} ({} overdue)", stats.pending_tasks, stats.overdue_tasks);
                println!("Interviews scheduled: {}", stats.interviews_scheduled);
                println!("Shortlisted: {}", stats.shortlisted);
                println!("Remote: {}", stats.remote);
                println!("With salary: {}", stats.with_salary);
                println!("Response rate: {}", percent(stats.response_rate));
                println!("Success rate: {}", percent(stats.success_rate));
            }
        }

        Commands::Activity { limit, application } => {
            let repo = ActivityRepository::new(store, options);
            let activities = match application {
                Some(id) => repo.for_application(&id),
                None => repo.recent(limit),
            };
            print_activities(&activities);
        }

        Commands::Reminders { command } => {
            let repo = ReminderRepository::new(store, options);
            let now = Utc::now();
            match command.unwrap_or(ReminderCommands::List {
                overdue: false,
                today: false,
                priority: None,
                application: None,
            }) {
                ReminderCommands::List {
                    overdue,
                    today,
                    priority,
                    application,
                } => {
                    let mut reminders = if overdue {
                        repo.overdue(now)
                    } else if today {
                        repo.due_today(now)
                    } else if let Some(id) = application {
                        repo.for_application(&id)
                    } else {
                        let mut pending = repo.pending();
                        pending.sort_by_key(|r| r.due_date);
                        pending
                    };
                    if let Some(priority) = priority {
                        reminders.retain(|r| r.priority == priority);
                    }
                    print_reminders(&reminders);
                }

                ReminderCommands::Add {
                    title,
                    due,
                    priority,
                    application,
                    description,
                } => {
                    let reminder = repo.create(NewReminder {
                        title,
                        description: description.unwrap_or_default(),
                        due_date: due,
                        priority,
                        application_id: application,
                    });
                    println!("Added reminder {}", reminder.id);
                }

                ReminderCommands::Done { id } => match repo.complete(&id) {
                    Some(reminder) => println!("Completed '{}'.", reminder.title),
                    None => println!("Reminder {} not found.", id),
                },

                ReminderCommands::Delete { id } => {
                    if repo.delete(&id) {
                        println!("Deleted reminder {}.", id);
                    } else {
                        println!("Reminder {} not found.", id);
                    }
                }
            }
        }

        Commands::Events { command } => {
            let repo = EventRepository::new(store, options);
            let now = Utc::now();
            match command.unwrap_or(EventCommands::List {
                today: false,
                application: None,
            }) {
                EventCommands::List { today, application } => {
                    let events = if today {
                        repo.today(now)
                    } else if let Some(id) = application {
                        repo.for_application(&id)
                    } else {
                        repo.upcoming(now)
                    };
                    print_events(&events);
                }

                EventCommands::Add {
                    title,
                    date,
                    kind,
                    application,
                    company,
                    location,
                } => {
                    let company_name = match (&company, &application) {
                        (Some(name), _) => name.clone(),
                        (None, Some(id)) => ApplicationRepository::new(store, options)
                            .get_by_id(id)
                            .map(|app| app.company.name)
                            .unwrap_or_default(),
                        (None, None) => String::new(),
                    };
                    let event = repo.create(NewEvent {
                        title,
                        kind,
                        date,
                        application_id: application,
                        company_name,
                        location: location.unwrap_or_default(),
                        notes: String::new(),
                    });
                    println!("Added event {}", event.id);
                }

                EventCommands::Delete { id } => {
                    if repo.delete(&id) {
                        println!("Deleted event {}.", id);
                    } else {
                        println!("Event {} not found.", id);
                    }
                }
            }
        }

        Commands::Goals { command } => {
            let repo = GoalRepository::new(store, options);
            let now = Utc::now();
            match command.unwrap_or(GoalCommands::List { month: None }) {
                GoalCommands::List { month } => {
                    let goals = match month {
                        Some(month) => repo.for_month(month.year(), month.month()),
                        None => repo.current(now),
                    };
                    print_goals(&goals);
                }

                GoalCommands::Add { title, target, month } => {
                    let month = match month {
                        Some(month) => month,
                        None => NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
                            .ok_or_else(|| anyhow!("current month out of range"))?,
                    };
                    let goal = repo.create(NewGoal { title, month, target });
                    println!("Added goal {}", goal.id);
                }

                GoalCommands::Progress { id, amount } => match repo.record_progress(&id, amount) {
                    Some(goal) => println!("{}: {}/{}", goal.title, goal.current, goal.target),
                    None => println!("Goal {} not found.", id),
                },

                GoalCommands::Target { id, target } => match repo.set_target(&id, target) {
                    Some(goal) => println!("{}: {}/{}", goal.title, goal.current, goal.target),
                    None => println!("Goal {} not found.", id),
                },
            }
        }

        Commands::Profile { command } => {
            let repo = ProfileRepository::new(store);
            match command.unwrap_or(ProfileCommands::Show) {
                ProfileCommands::Show => print_profile(&repo.get()),

                ProfileCommands::Set {
                    name,
                    email,
                    title,
                    location,
                    density,
                    roles,
                } => {
                    let mut patch = Map::new();
                    for (field, value) in [("name", name), ("email", email), ("title", title), ("location", location)] {
                        if let Some(value) = value {
                            patch.insert(field.to_string(), Value::String(value));
                        }
                    }
                    if let Some(density) = density {
                        patch.insert("density".to_string(), json!(density));
                    }
                    if !roles.is_empty() {
                        patch.insert("targetRoles".to_string(), json!(roles));
                    }
                    repo.update(&Value::Object(patch))
                        .ok_or_else(|| anyhow!("profile update rejected"))?;
                    print_profile(&repo.touch(Utc::now()));
                }
            }
        }

        Commands::Check => {
            let rejected = check_collection::<Application>(store, options)
                + check_collection::<Company>(store, options)
                + check_collection::<Activity>(store, options)
                + check_collection::<UpcomingEvent>(store, options)
                + check_collection::<Reminder>(store, options)
                + check_collection::<MonthlyGoal>(store, options);
            if rejected == 0 {
                println!("\nAll records load cleanly.");
            } else {
                println!("\n{} record(s) are kept as stored but hidden until repaired.", rejected);
            }
        }

        Commands::Browse => {
            tui::run_browse(store, config)?;
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = Config::resolve(cli.db, cli.no_seed, cli.debounce_ms);
    let store = config
        .open_store()
        .with_context(|| format!("opening {}", config.data_path.display()))?;

    let result = run(cli.command, &store, &config);
    store.teardown();
    result
}
