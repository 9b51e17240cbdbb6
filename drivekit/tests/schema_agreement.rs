mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use drivekit::{AsyncSession, DriverError, Statement};

use common::{create_table, executor, settings, SimulatedCluster};

#[tokio::test(start_paused = true)]
async fn test_succeeds_when_all_nodes_agree() {
    let cluster = SimulatedCluster::new(3);
    let executor = executor(&cluster, settings(Duration::from_secs(3)));

    let result = executor
        .execute_async(create_table("all_nodes_agree"))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(result.execution_info().is_schema_in_agreement(), Some(true));
    assert!(executor.check_schema_agreement().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_agreement_in_first_round_returns_before_timeout() {
    let cluster = SimulatedCluster::new(3);
    let executor = executor(&cluster, settings(Duration::from_secs(3)));

    let started = tokio::time::Instant::now();
    let detail = executor.check_schema_agreement_detailed().await.unwrap();

    assert!(detail.agreed);
    assert_eq!(detail.rounds, 1);
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(cluster.polls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_fails_on_timeout_when_a_node_is_paused() {
    let cluster = SimulatedCluster::new(3);
    let executor = executor(&cluster, settings(Duration::from_secs(3)));

    cluster.pause(2);
    let result = executor
        .execute_async(create_table("paused_node"))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(result.execution_info().is_schema_in_agreement(), Some(false));
    assert!(!executor.check_schema_agreement().await.unwrap());

    cluster.resume(2);
    assert!(executor.check_schema_agreement().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_single_silent_node_is_not_outvoted() {
    let cluster = SimulatedCluster::new(5);
    let executor = executor(&cluster, settings(Duration::from_secs(3)));

    cluster.pause(4);
    let detail = executor.check_schema_agreement_detailed().await.unwrap();

    assert!(!detail.agreed);
    assert_eq!(detail.observed_versions.len(), 1);
    assert_eq!(detail.non_responding.len(), 1);
    assert!(detail.elapsed >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_agrees_when_up_nodes_agree() {
    let cluster = SimulatedCluster::new(3);
    let executor = executor(&cluster, settings(Duration::from_secs(3)));

    cluster.stop(2);
    let result = executor
        .execute_async(create_table("stopped_node"))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(result.execution_info().is_schema_in_agreement(), Some(true));
    assert!(executor.check_schema_agreement().await.unwrap());
    // The stopped node missed the change.
    assert_ne!(cluster.version_of(2), cluster.version_of(0));

    cluster.start(2);
    assert!(executor.check_schema_agreement().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_fails_if_timeout_is_zero() {
    let cluster = SimulatedCluster::new(3);
    let executor = executor(&cluster, settings(Duration::ZERO));

    let result = executor
        .execute_async(create_table("zero_timeout"))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(result.execution_info().is_schema_in_agreement(), Some(false));
    assert!(!executor.check_schema_agreement().await.unwrap());
    assert_eq!(cluster.polls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_regular_statements_leave_flag_unset() {
    let cluster = SimulatedCluster::new(3);
    let executor = executor(&cluster, settings(Duration::from_secs(3)));

    let result = executor
        .execute_async("SELECT k, v FROM ks.t")
        .unwrap()
        .await
        .unwrap();

    assert_eq!(result.execution_info().is_schema_in_agreement(), None);
    assert_eq!(result.remaining(), 1);
    assert_eq!(cluster.polls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_explicit_agreement_request_on_regular_statement() {
    let cluster = SimulatedCluster::new(3);
    let executor = executor(&cluster, settings(Duration::from_secs(3)));

    let statement = Statement::new("INSERT INTO ks.t (k, v) VALUES (1, 1)").with_schema_agreement();
    let result = executor.execute_async(statement).unwrap().await.unwrap();

    assert_eq!(result.execution_info().is_schema_in_agreement(), Some(true));
}

#[tokio::test(start_paused = true)]
async fn test_request_error_is_not_reported_as_disagreement() {
    let cluster = SimulatedCluster::new(3);
    let executor = executor(&cluster, settings(Duration::from_secs(3)));

    cluster.fail_sends();
    let err = executor
        .execute_async(create_table("failing_request"))
        .unwrap()
        .await
        .unwrap_err();

    assert!(matches!(err, DriverError::Request(_)));
    assert_eq!(cluster.polls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_request_timeout_bounds_the_wire_exchange() {
    let cluster = SimulatedCluster::new(3);
    let mut settings = settings(Duration::from_secs(3));
    settings.request_timeout = Duration::from_secs(2);
    let executor = executor(&cluster, settings);

    cluster.set_send_delay(Duration::from_secs(5));
    let err = executor
        .execute_async(create_table("slow_request"))
        .unwrap()
        .await
        .unwrap_err();

    assert!(matches!(err, DriverError::RequestTimeout(d) if d == Duration::from_secs(2)));
}

#[tokio::test(start_paused = true)]
async fn test_agreement_check_shares_request_budget() {
    let cluster = SimulatedCluster::new(3);
    let mut settings = settings(Duration::from_secs(10));
    settings.request_timeout = Duration::from_secs(1);
    let executor = executor(&cluster, settings);

    cluster.pause(1);
    let started = tokio::time::Instant::now();
    let result = executor
        .execute_async(create_table("tight_budget"))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(result.execution_info().is_schema_in_agreement(), Some(false));
    assert!(started.elapsed() <= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_control_channel_is_a_hard_failure() {
    let cluster = SimulatedCluster::new(3);
    let executor = executor(&cluster, settings(Duration::from_secs(3)));

    cluster.take_channel_down();

    let err = executor.check_schema_agreement().await.unwrap_err();
    assert!(matches!(err, DriverError::ControlChannel(_)));

    let err = executor
        .execute_async(create_table("channel_down"))
        .unwrap()
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::ControlChannel(_)));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_executions_are_independent() {
    let cluster = SimulatedCluster::new(3);
    let executor = executor(&cluster, settings(Duration::from_secs(3)));

    let ddl = executor.execute_async(create_table("concurrent")).unwrap();
    let select = executor.execute_async("SELECT k, v FROM ks.t").unwrap();
    let (ddl, select) = tokio::join!(ddl, select);

    assert_eq!(ddl.unwrap().execution_info().is_schema_in_agreement(), Some(true));
    assert_eq!(select.unwrap().execution_info().is_schema_in_agreement(), None);
}
