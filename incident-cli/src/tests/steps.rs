//! Behaviour-driven step definitions driving the sync CLI scenarios.

use super::helpers::{StubBackendBuilder, Workspace, credential_argv, date};
use super::*;
use crate::sync::run_sync_with;
use incident_core::test_support::page_of;
use incident_core::{GazetteerError, RunSummary, SourceError, SyncError};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;

struct SyncCommandWorld {
    workspace: Workspace,
    omit: RefCell<Option<&'static str>>,
    window: RefCell<(&'static str, &'static str)>,
    builder: RefCell<StubBackendBuilder>,
    stdout: RefCell<Vec<u8>>,
    result: RefCell<Option<Result<RunSummary, CliError>>>,
}

impl SyncCommandWorld {
    fn new() -> Self {
        Self {
            workspace: Workspace::new(),
            omit: RefCell::new(None),
            window: RefCell::new(("2024-03-01", "2024-03-07")),
            builder: RefCell::new(StubBackendBuilder::default()),
            stdout: RefCell::new(Vec::new()),
            result: RefCell::new(None),
        }
    }

    fn build_command_line(&self) -> Vec<String> {
        let (start, end) = *self.window.borrow();
        let mut argv = vec!["incident-sync".to_owned(), "sync".to_owned()];
        argv.extend([
            format!("--{ARG_COUNTRY}"),
            "ukraine".to_owned(),
            format!("--{ARG_START_DATE}"),
            start.to_owned(),
            format!("--{ARG_END_DATE}"),
            end.to_owned(),
            format!("--{ARG_GAZETTEER}"),
            self.workspace.gazetteer_path().into_string(),
        ]);
        argv.extend(credential_argv(*self.omit.borrow()));
        argv
    }

    fn error(&self) -> std::cell::Ref<'_, CliError> {
        std::cell::Ref::map(self.result.borrow(), |result| {
            result
                .as_ref()
                .expect("result recorded")
                .as_ref()
                .expect_err("expected error")
        })
    }

    fn stdout(&self) -> String {
        String::from_utf8(self.stdout.borrow().clone()).expect("stdout utf-8")
    }
}

#[fixture]
fn world() -> SyncCommandWorld {
    SyncCommandWorld::new()
}

// --- Given steps ---

#[given("a gazetteer file on disk")]
fn gazetteer_on_disk(#[from(world)] world: &SyncCommandWorld) {
    world.workspace.write_gazetteer();
}

#[given("the source returns UKR1 and UKR2")]
fn source_returns_two(#[from(world)] world: &SyncCommandWorld) {
    world
        .builder
        .borrow_mut()
        .set_pages(vec![page_of(&["UKR1", "UKR2"])]);
}

#[given("the store already holds UKR1")]
fn store_holds_ukr1(#[from(world)] world: &SyncCommandWorld) {
    world.builder.borrow_mut().set_existing(&["UKR1"]);
}

#[given("I omit the ACLED access token")]
fn omit_access_token(#[from(world)] world: &SyncCommandWorld) {
    *world.omit.borrow_mut() = Some(ARG_ACLED_ACCESS_TOKEN);
}

#[given("the end date precedes the start date")]
fn inverted_window(#[from(world)] world: &SyncCommandWorld) {
    *world.window.borrow_mut() = ("2024-03-07", "2024-03-01");
}

#[given("the source rejects the first page")]
fn source_rejects(#[from(world)] world: &SyncCommandWorld) {
    world
        .builder
        .borrow_mut()
        .set_source_failure(SourceError::Api {
            message: "Invalid key".into(),
        });
}

// --- When steps ---

#[when("I run the sync command")]
fn run_sync_command(#[from(world)] world: &SyncCommandWorld) {
    let invocation = world.build_command_line();
    let parsed = Cli::try_parse_from(invocation).map_err(CliError::from);
    let outcome = parsed.and_then(|cli| match cli.command {
        Command::Sync(args) => {
            let builder = world.builder.borrow();
            let mut buffer = world.stdout.borrow_mut();
            run_sync_with(args, &*builder, &mut *buffer)
        }
    });

    world.result.replace(Some(outcome));
}

// --- Then steps ---

#[then("the command succeeds")]
fn command_succeeds(#[from(world)] world: &SyncCommandWorld) {
    let borrowed = world.result.borrow();
    let result = borrowed.as_ref().expect("result recorded");
    if let Err(err) = result {
        panic!("expected success, found {err:?}");
    }
}

#[then("the source was queried for Ukraine in the requested window")]
fn source_queried(#[from(world)] world: &SyncCommandWorld) {
    let queries = world.builder.borrow().queries();
    let query = queries.first().expect("source queried");
    assert_eq!(query.country, "Ukraine");
    assert_eq!(query.start_date, date(2024, 3, 1));
    assert_eq!(query.end_date, date(2024, 3, 7));
}

#[then("the output reports 2 processed, 2 added and 0 already existing")]
fn output_all_added(#[from(world)] world: &SyncCommandWorld) {
    let stdout = world.stdout();
    assert!(stdout.contains("For Ukraine:"), "stdout: {stdout}");
    assert!(
        stdout.contains("2 processed, 2 added and 0 already existing"),
        "stdout: {stdout}"
    );
}

#[then("the output reports 2 processed, 1 added and 1 already existing")]
fn output_one_existing(#[from(world)] world: &SyncCommandWorld) {
    let stdout = world.stdout();
    assert!(
        stdout.contains("2 processed, 1 added and 1 already existing"),
        "stdout: {stdout}"
    );
}

#[then("the command fails because the access token is missing")]
fn fails_missing_token(#[from(world)] world: &SyncCommandWorld) {
    match &*world.error() {
        CliError::MissingArgument { field, env } => {
            assert_eq!(*field, ARG_ACLED_ACCESS_TOKEN);
            assert_eq!(*env, ENV_ACLED_ACCESS_TOKEN);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[then("the command fails because the date window is inverted")]
fn fails_inverted_window(#[from(world)] world: &SyncCommandWorld) {
    match &*world.error() {
        CliError::InvalidDateWindow { .. } => {}
        other => panic!("expected InvalidDateWindow, found {other:?}"),
    }
}

#[then("the command fails because the gazetteer cannot be read")]
fn fails_missing_gazetteer(#[from(world)] world: &SyncCommandWorld) {
    match &*world.error() {
        CliError::Gazetteer(GazetteerError::Read { path, .. }) => {
            assert_eq!(*path, world.workspace.gazetteer_path());
        }
        other => panic!("expected Gazetteer read error, found {other:?}"),
    }
}

#[then("the command fails because page 1 could not be fetched")]
fn fails_fetch(#[from(world)] world: &SyncCommandWorld) {
    match &*world.error() {
        CliError::Sync(SyncError::FetchPage { page, source }) => {
            assert_eq!(*page, 1);
            assert!(matches!(source, SourceError::Api { .. }));
        }
        other => panic!("expected FetchPage, found {other:?}"),
    }
}

macro_rules! register_sync_scenario {
    ($fn_name:ident, $scenario_title:literal) => {
        #[scenario(path = "tests/features/sync_command.feature", name = $scenario_title)]
        fn $fn_name(#[from(world)] world: SyncCommandWorld) {
            let _ = world;
        }
    };
}

register_sync_scenario!(
    inserting_new_incidents,
    "inserting new incidents from the command line"
);
register_sync_scenario!(skipping_existing, "skipping incidents already in the store");
register_sync_scenario!(missing_access_token, "rejecting a missing ACLED access token");
register_sync_scenario!(inverted_date_window, "rejecting an inverted date window");
register_sync_scenario!(missing_gazetteer, "failing when the gazetteer is missing");
register_sync_scenario!(
    source_rejection,
    "failing when the source rejects the request"
);
