//! Solver invoker crash recovery tests.

mod common;

use std::path::Path;
use std::sync::Arc;

use radcoupler::adapters::solvers::{MockSolve, MockZoneSolver};
use radcoupler::domain::models::{PhotoionizationConfig, ZoneParameterTable};
use radcoupler::services::{InvocationOutcome, SolverInvoker};
use radcoupler::DomainError;

fn invoker(dir: &Path, solver: Arc<MockZoneSolver>) -> SolverInvoker {
    let table_path = common::write_parameter_table(dir, 2);
    let table = ZoneParameterTable::load(&table_path).unwrap();
    common::write_flat_handoff(dir, "zone0.sed", 1.0);
    common::write_flat_handoff(dir, "zone1.sed", 1.0);
    let config = PhotoionizationConfig {
        extra_outputs: radcoupler::domain::models::ExtraOutputs {
            emissivity: true,
            ..Default::default()
        },
        ..PhotoionizationConfig::default()
    };
    SolverInvoker::new(solver, &config, Arc::new(table), dir)
}

#[tokio::test]
async fn first_crash_is_retried_once_without_quantum_heating() {
    let dir = common::temp_dir();
    let solver = Arc::new(
        MockZoneSolver::new().with_script(1, vec![MockSolve::crash(common::FATAL_MARKER)]),
    );
    let invoker = invoker(dir.path(), solver.clone());
    invoker.write_decks().await.unwrap();

    let (logs, _guard) = common::capture_logs();
    let outcome = invoker.invoke(1).await.unwrap();

    assert_eq!(outcome, InvocationOutcome::RecoveredWithoutQheat);
    assert_eq!(solver.call_count(1).await, 2);
    assert!(logs.contents().contains("weakened physics"));

    let records = solver.records().await;
    let first_deck = records[0].deck.as_deref().unwrap();
    let retry_deck = records[1].deck.as_deref().unwrap();
    assert!(!first_deck.contains("no qheat run"));
    assert!(first_deck.contains("emissivity_zone1.txt"));
    assert!(retry_deck.contains("no qheat run"));
    assert!(retry_deck.contains("no qheat"));
    assert!(!retry_deck.contains("emissivity_zone1.txt"));
}

#[tokio::test]
async fn crash_on_both_attempts_stops_the_run() {
    let dir = common::temp_dir();
    let solver = Arc::new(MockZoneSolver::new().with_script(
        0,
        vec![
            MockSolve::crash(common::FATAL_MARKER),
            MockSolve::crash(common::FATAL_MARKER),
        ],
    ));
    let invoker = invoker(dir.path(), solver.clone());
    invoker.write_decks().await.unwrap();

    let err = invoker.invoke(0).await.unwrap_err();
    match err {
        DomainError::SolverCrashPersisted { zone, log_path } => {
            assert_eq!(zone, 0);
            assert_eq!(log_path, dir.path().join("zone0.out"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(solver.call_count(0).await, 2);
}

#[tokio::test]
async fn other_zones_are_unaffected_by_a_crash_script() {
    let dir = common::temp_dir();
    let solver = Arc::new(
        MockZoneSolver::new().with_script(1, vec![MockSolve::crash(common::FATAL_MARKER)]),
    );
    let invoker = invoker(dir.path(), solver.clone());
    invoker.write_decks().await.unwrap();

    assert_eq!(invoker.invoke(0).await.unwrap(), InvocationOutcome::Clean);
    assert_eq!(solver.call_count(0).await, 1);
}
