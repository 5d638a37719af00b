mod common;

use chrono::Duration;

use common::{at, memory_db, morning_clock, seeded_source};
use qtimer::clock::ManualClock;
use qtimer::config::Config;
use qtimer::sync::SyncEngine;
use qtimer::timers::TimerManager;
use qtimer::types::{TimerFilter, TimerSelector};
use qtimer::{db, Core, Error};

#[test]
fn first_sync_mirrors_projects_and_tickets() {
    let conn = memory_db();
    let clock = morning_clock();
    let source = seeded_source();
    source.add_project(2, "Mobile app");
    source.add_ticket(20, 1, "Push notifications", 2);

    let engine = SyncEngine::new(&conn, Some(&source), &clock, Duration::minutes(60));
    assert_eq!(engine.last_synced().unwrap(), None);

    let summary = engine.sync().unwrap();
    assert_eq!(summary.projects, 2);
    assert_eq!(summary.tickets, 3);
    assert_eq!(summary.detached_timers, 0);
    assert_eq!(summary.synced_at, at(9, 0, 0));
    assert_eq!(engine.last_synced().unwrap(), Some(at(9, 0, 0)));

    let tickets = db::query_tickets(None, Some("mobile"), &conn).unwrap();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].project_id, 2);
    assert_eq!(tickets[0].ticket_id, 1);
}

#[test]
fn failing_ticket_listing_leaves_the_mirror_untouched() {
    let conn = memory_db();
    let clock = morning_clock();
    let source = seeded_source();
    let engine = SyncEngine::new(&conn, Some(&source), &clock, Duration::minutes(60));
    engine.sync().unwrap();

    let projects_before = db::query_projects(None, &conn).unwrap();
    let tickets_before = db::query_tickets(None, None, &conn).unwrap();

    source.clear();
    source.add_project(1, "Website v2");
    source.add_ticket(30, 1, "Redesign", 1);
    source.add_project(2, "Mobile app");
    source.add_project(3, "Intranet");
    source.add_ticket(31, 1, "Login", 3);
    source.fail_tickets_of(3);
    clock.advance(Duration::hours(2));

    let err = engine.sync().unwrap_err();
    assert!(matches!(err, Error::SyncFailure { .. }), "{err}");
    assert!(err.to_string().contains("project 3"), "{err}");

    assert_eq!(db::query_projects(None, &conn).unwrap(), projects_before);
    assert_eq!(db::query_tickets(None, None, &conn).unwrap(), tickets_before);
    assert_eq!(engine.last_synced().unwrap(), Some(at(9, 0, 0)));
}

#[test]
fn an_empty_source_empties_the_mirror() {
    let conn = memory_db();
    let clock = morning_clock();
    let source = seeded_source();
    let engine = SyncEngine::new(&conn, Some(&source), &clock, Duration::minutes(60));
    engine.sync().unwrap();
    assert_eq!(db::query_projects(None, &conn).unwrap().len(), 1);

    source.clear();
    clock.advance(Duration::minutes(5));
    let summary = engine.sync().unwrap();
    assert_eq!((summary.projects, summary.tickets), (0, 0));
    assert!(db::query_projects(None, &conn).unwrap().is_empty());
    assert!(db::query_tickets(None, None, &conn).unwrap().is_empty());
    assert_eq!(engine.last_synced().unwrap(), Some(at(9, 5, 0)));
}

#[test]
fn vanished_tickets_detach_their_timers() {
    let conn = memory_db();
    let clock = morning_clock();
    let source = seeded_source();
    let engine = SyncEngine::new(&conn, Some(&source), &clock, Duration::minutes(60));
    engine.sync().unwrap();

    let timers = TimerManager::new(&conn, &clock, 60);
    let landing = timers.start("landing", Some(10)).unwrap();
    let contact = timers.start("contact", Some(11)).unwrap();

    source.clear();
    source.add_project(1, "Website");
    source.add_ticket(11, 2, "Contact form", 1);
    let summary = engine.sync().unwrap();

    assert_eq!(summary.detached_timers, 1);
    assert_eq!(timers.get(landing.id).unwrap().ticket_id, None);
    assert_eq!(timers.get(contact.id).unwrap().ticket_id, Some(11));
}

#[test]
fn conditional_sync_respects_the_cache_lifetime() {
    let conn = memory_db();
    let clock = morning_clock();
    let source = seeded_source();
    let engine = SyncEngine::new(&conn, Some(&source), &clock, Duration::minutes(60));

    assert!(engine.sync_conditionally().unwrap().is_some());
    assert_eq!(source.list_calls(), 1);

    clock.advance(Duration::minutes(60));
    assert!(engine.sync_conditionally().unwrap().is_none());
    assert_eq!(source.list_calls(), 1);

    clock.advance(Duration::minutes(1));
    let summary = engine.sync_conditionally().unwrap().unwrap();
    assert_eq!(summary.synced_at, at(10, 1, 0));
    assert_eq!(source.list_calls(), 2);
}

#[test]
fn remote_operations_need_a_source() {
    let core = Core::new(
        memory_db(),
        Config::default(),
        Box::new(ManualClock::new(at(9, 0, 0))),
        None,
    );

    assert!(matches!(core.source(), Err(Error::Configuration(_))));
    assert!(matches!(
        core.sync_engine().sync(),
        Err(Error::Configuration(_))
    ));
    assert!(matches!(
        core.sync_engine().sync_conditionally(),
        Err(Error::Configuration(_))
    ));

    let timer = core.timers().start("offline work", None).unwrap();
    core.timers().stop(&TimerSelector::Id(timer.id)).unwrap();
    assert!(matches!(
        core.timers().post(&TimerFilter::default(), core.source_opt()),
        Err(Error::Configuration(_))
    ));
    assert!(!core.timers().get(timer.id).unwrap().posted);
    core.close().unwrap();
}

#[test]
fn core_hands_its_source_to_the_sync_engine() {
    let core = Core::new(
        memory_db(),
        Config::default(),
        Box::new(ManualClock::new(at(9, 0, 0))),
        Some(Box::new(seeded_source())),
    );

    assert_eq!(core.source().unwrap().name(), "fake");
    let summary = core.sync_engine().sync_conditionally().unwrap().unwrap();
    assert_eq!(summary.tickets, 2);
    assert!(core.sync_engine().sync_conditionally().unwrap().is_none());
    assert_eq!(core.timers().find_projects(Some("web")).unwrap().len(), 1);
}

#[test]
fn failing_project_listing_is_a_sync_failure() {
    struct Unreachable;

    impl qtimer::source::ExternalSource for Unreachable {
        fn name(&self) -> &str {
            "unreachable"
        }

        fn list_projects(
            &self,
        ) -> Result<Vec<qtimer::types::Project>, qtimer::source::AdapterError> {
            Err(qtimer::source::AdapterError::Rejected("down".into()))
        }

        fn list_tickets(
            &self,
            _project_id: i64,
        ) -> Result<Vec<qtimer::types::Ticket>, qtimer::source::AdapterError> {
            unreachable!("projects are listed first")
        }

        fn post_timer(
            &self,
            _project_id: i64,
            _ticket_id: i64,
            _record: &qtimer::source::TimerRecord,
        ) -> Result<(), qtimer::source::AdapterError> {
            unreachable!("nothing is posted during a sync")
        }
    }

    let conn = memory_db();
    let clock = morning_clock();
    let engine = SyncEngine::new(&conn, Some(&Unreachable), &clock, Duration::minutes(60));
    assert!(matches!(engine.sync(), Err(Error::SyncFailure { .. })));
    assert_eq!(engine.last_synced().unwrap(), None);
}

#[test]
fn posted_timers_survive_their_ticket_vanishing() {
    let conn = memory_db();
    let clock = morning_clock();
    let source = seeded_source();
    let engine = SyncEngine::new(&conn, Some(&source), &clock, Duration::minutes(60));
    engine.sync().unwrap();

    let timers = TimerManager::new(&conn, &clock, 60);
    let timer = timers.start("landing", Some(10)).unwrap();
    clock.advance(Duration::minutes(30));
    timers.stop(&TimerSelector::Id(timer.id)).unwrap();
    let report = timers.post(&TimerFilter::default(), Some(&source)).unwrap();
    assert_eq!(report.succeeded, vec![timer.id]);

    source.clear();
    let summary = engine.sync().unwrap();
    assert_eq!(summary.detached_timers, 0);

    let timer = timers.get(timer.id).unwrap();
    assert!(timer.posted);
    assert_eq!(timer.ticket_id, Some(10));
    let row = timers
        .find(&TimerFilter {
            id: Some(timer.id),
            ..Default::default()
        })
        .unwrap()
        .next()
        .unwrap()
        .unwrap();
    assert_eq!(row.ticket, None);
    assert_eq!(row.duration, Duration::minutes(30));
}
