use chrono::{Duration, Utc};
use serde_json::json;
use std::time::Instant;
use tempfile::TempDir;

use jobtrack::config::Config;
use jobtrack::models::{ActivityKind, ApplicationPatch, NewApplication, NewReminder, Priority, Stage};
use jobtrack::query::{
    compute_stats, Column, DateRange, QueryEngine, QuickFilter, SalaryFilter, SortSpec, StageFilter,
    DEFAULT_DEBOUNCE,
};
use jobtrack::repository::{ActivityRepository, ApplicationRepository, ReminderRepository, RepositoryOptions};
use jobtrack::store::{namespaced, Store};
use jobtrack::window::{Density, VirtualWindow, WindowConfig};

fn open(dir: &TempDir, seed_defaults: bool) -> (Config, Store) {
    let config = Config::resolve(Some(dir.path().join("jobtrack.db")), !seed_defaults, None);
    let store = config.open_store().expect("open store");
    (config, store)
}

fn no_seed() -> RepositoryOptions {
    RepositoryOptions { seed_defaults: false }
}

#[test]
fn sixty_rows_render_a_window_not_the_whole_list() {
    let window = VirtualWindow::new(60, Density::Comfortable.row_height(), WindowConfig::default()).with_viewport(600);
    let range = window.range();
    assert_eq!(range.start_index, 0);
    assert!(range.end_index >= 11, "visible rows must be covered");
    assert!(range.end_index <= 22, "rendered {} rows", range.end_index);
    assert_eq!(range.total_height, 60 * 56);
}

#[test]
fn create_then_delete_restores_count() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (config, store) = open(&dir, true);
    let repo = ApplicationRepository::new(&store, config.repository_options());

    let before = repo.get_all().len();
    let app = repo.create(NewApplication::new("Engineer", "Acme"));
    assert_eq!(repo.get_all().len(), before + 1);
    assert!(repo.delete(&app.id));
    assert_eq!(repo.get_all().len(), before);
    assert!(!repo.delete(&app.id));
}

#[test]
fn stage_change_appends_exactly_one_activity() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (config, store) = open(&dir, false);
    let options = config.repository_options();
    let apps = ApplicationRepository::new(&store, options);
    let activities = ActivityRepository::new(&store, options);

    let app = apps.create(NewApplication::new("Engineer", "Acme"));
    assert_eq!(app.stage, Stage::Applied);
    let before = activities.get_all().len();

    let updated = apps.update_stage(&app.id, Stage::Interview).expect("updated");
    assert_eq!(updated.stage, Stage::Interview);

    let log = activities.get_all();
    assert_eq!(log.len(), before + 1);
    let entry = log.last().expect("entry");
    assert_eq!(entry.kind, ActivityKind::StageChange);
    assert_eq!(entry.application_id.as_deref(), Some(app.id.as_str()));
    assert_eq!(entry.stage, Some(Stage::Interview));
    assert!(entry.title.contains(Stage::Interview.label()));
}

#[test]
fn empty_collection_has_zero_rates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_, store) = open(&dir, false);
    let apps = ApplicationRepository::new(&store, no_seed()).get_all();
    assert!(apps.is_empty());

    let engine = QueryEngine::new(apps, DEFAULT_DEBOUNCE);
    assert_eq!(engine.stats().response_rate, 0.0);
    assert_eq!(engine.stats().success_rate, 0.0);
}

#[test]
fn dates_come_back_as_native_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_, store) = open(&dir, false);
    let repo = ApplicationRepository::new(&store, no_seed());

    let mut new = NewApplication::new("Platform Engineer", "Initech");
    new.date_applied = Utc::now() - Duration::days(3);
    new.salary = "$140k".into();
    let created = repo.create(new.clone());

    store.teardown();
    let (_, store) = open(&dir, false);
    let repo = ApplicationRepository::new(&store, no_seed());
    let loaded = repo.get_by_id(&created.id).expect("loaded");
    assert_eq!(loaded, created);
    assert_eq!(loaded.date_applied, new.date_applied);
    assert_eq!(loaded.position, new.position);
    assert_eq!(loaded.company, new.company);
}

#[test]
fn unknown_ids_are_sentinels_without_writes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_, store) = open(&dir, false);
    let repo = ApplicationRepository::new(&store, no_seed());
    repo.create(NewApplication::new("Engineer", "Acme"));
    let before = store.get(&namespaced("applications"));

    let patch = ApplicationPatch {
        notes: Some("ghost".into()),
        ..ApplicationPatch::default()
    };
    assert!(repo.update("missing", &patch).is_none());
    assert!(repo.update_stage("missing", Stage::Offer).is_none());
    assert!(!repo.delete("missing"));
    assert_eq!(store.get(&namespaced("applications")), before);
}

#[test]
fn created_ids_are_fresh() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_, store) = open(&dir, false);
    let repo = ApplicationRepository::new(&store, no_seed());
    for i in 0..20 {
        let existing: Vec<String> = repo.get_all().into_iter().map(|a| a.id).collect();
        let app = repo.create(NewApplication::new(&format!("Role {i}"), "Acme"));
        assert!(!existing.contains(&app.id));
    }
}

#[test]
fn malformed_records_are_reported_and_survive_writes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_, store) = open(&dir, false);
    let key = namespaced("applications");
    store.set(
        &key,
        &json!([
            {"id": "ok-1", "position": "Engineer", "company": {"name": "Acme"},
             "dateApplied": "2024-05-01", "stage": "applied"},
            {"id": "bad-1", "position": "Engineer", "company": {"name": "Acme"},
             "dateApplied": "2024-05-01T00:00:00Z", "stage": "ghosted"}
        ]),
    );

    let repo = ApplicationRepository::new(&store, no_seed());
    let report = repo.load_report();
    assert_eq!(report.items.len(), 1);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].index, 1);

    repo.create(NewApplication::new("Designer", "Globex"));
    let stored = store.get(&key).expect("stored");
    let ids: Vec<&str> = stored
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|r| r.get("id").and_then(|v| v.as_str()))
        .collect();
    assert!(ids.contains(&"bad-1"));
    assert_eq!(ids.len(), 3);
}

#[test]
fn filtered_view_is_subset_and_stats_ignore_filters() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (config, store) = open(&dir, true);
    let repo = ApplicationRepository::new(&store, config.repository_options());
    let all = repo.get_all();
    let expected = compute_stats(&all, Utc::now());

    let mut engine = QueryEngine::new(all.clone(), config.debounce);
    let combos = [
        QuickFilter::default(),
        QuickFilter {
            stage: StageFilter::Only(Stage::Interview),
            ..QuickFilter::default()
        },
        QuickFilter {
            date_range: DateRange::Last7Days,
            salary: SalaryFilter::With,
            ..QuickFilter::default()
        },
    ];
    let t0 = Instant::now();
    engine.set_search("engineer", t0);
    engine.set_column_filter(Column::Company, "north", t0);
    for quick in combos {
        engine.set_quick_filter(quick);
        engine.flush();
        for app in engine.filtered() {
            assert!(all.contains(app));
        }
        assert_eq!(engine.stats().total, expected.total);
        assert_eq!(engine.stats().by_stage, expected.by_stage);
        assert_eq!(engine.stats().response_rate, expected.response_rate);
    }
}

#[test]
fn ascending_and_descending_sorts_mirror() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_, store) = open(&dir, false);
    let repo = ApplicationRepository::new(&store, no_seed());
    let now = Utc::now();
    for (i, (position, company)) in [("Zeta", "Umbrella"), ("Alpha", "Hooli"), ("Mid", "Vandelay")]
        .into_iter()
        .enumerate()
    {
        let mut new = NewApplication::new(position, company);
        new.date_applied = now - Duration::days(i as i64 + 1);
        repo.create(new);
    }

    let mut engine = QueryEngine::new(repo.get_all(), DEFAULT_DEBOUNCE);
    for column in [Column::Position, Column::Company, Column::DateApplied] {
        engine.set_sort(Some(SortSpec::asc(column)));
        let mut asc: Vec<String> = engine.filtered().map(|a| a.id.clone()).collect();
        engine.set_sort(Some(SortSpec::desc(column)));
        let desc: Vec<String> = engine.filtered().map(|a| a.id.clone()).collect();
        asc.reverse();
        assert_eq!(asc, desc, "column {column}");
    }
}

#[test]
fn reminders_queries_follow_the_clock() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_, store) = open(&dir, false);
    let repo = ReminderRepository::new(&store, no_seed());
    let now = Utc::now();
    let late = repo.create(NewReminder {
        title: "Send thank-you note".into(),
        description: String::new(),
        due_date: now - Duration::days(2),
        priority: Priority::High,
        application_id: None,
    });
    repo.create(NewReminder {
        title: "Follow up with recruiter".into(),
        description: String::new(),
        due_date: now + Duration::days(5),
        priority: Priority::Low,
        application_id: None,
    });

    let overdue = repo.overdue(now);
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].id, late.id);
    assert!(repo.complete(&late.id).is_some());
    assert!(repo.overdue(now).is_empty());
    assert_eq!(repo.by_priority(Priority::Low).len(), 1);
}

#[test]
fn corrupt_collection_reseeds_and_keeps_a_copy() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (config, store) = open(&dir, true);
    let key = namespaced("applications");
    store.set(&key, &json!({"not": "an array"}));

    let repo = ApplicationRepository::new(&store, config.repository_options());
    assert!(!repo.get_all().is_empty());
    assert!(store.exists(&format!("{key}.corrupt")));
}
