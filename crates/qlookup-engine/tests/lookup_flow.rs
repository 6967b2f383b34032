use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use qlookup_core::config::{ConnectionSettings, LookupOptions};
use qlookup_core::error::{Error, ServiceError};
use qlookup_core::memory::{CallCounts, InMemoryFactory, InMemoryQueryService, Script};
use qlookup_core::traits::{QueryService, ServiceFactory, ServiceResult};
use qlookup_core::types::{Entity, ExecutionStatus, PreparedStatementInfo, ResultSet, SubmitRequest};
use qlookup_engine::result::RUNNING_TAG;
use qlookup_engine::LookupSession;
use qlookup_format::Details;

fn options(query: &str) -> LookupOptions {
    LookupOptions { query: query.into(), poll_interval_ms: 5, poll_attempts: 3, ..LookupOptions::default() }
}

fn entities(values: &[&str]) -> Vec<Entity> { values.iter().copied().map(Entity::from).collect() }

fn session_with(svc: &Arc<InMemoryQueryService>) -> (LookupSession, Arc<InMemoryFactory>) {
    let factory = Arc::new(InMemoryFactory::new(svc.clone()));
    (LookupSession::new(factory.clone()), factory)
}

#[tokio::test]
async fn ip_lookup_yields_summary_and_document() -> anyhow::Result<()> {
    let svc = Arc::new(InMemoryQueryService::new());
    svc.on_query_containing("'8.8.8.8'", Script::succeed(&["ip", "severity"], &[&["8.8.8.8", "high"]]));
    let (mut session, _) = session_with(&svc);
    let opts = LookupOptions {
        summary_attributes: Some("ip".into()),
        detail_attributes: Some("severity".into()),
        ..options("SELECT ip, severity FROM logs WHERE ip = ?")
    };

    let results = session.lookup(&entities(&["8.8.8.8"]), &opts).await?;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].entity.value, "8.8.8.8");
    let data = results[0].data.as_ref().expect("rows found");
    assert_eq!(data.summary, vec!["8.8.8.8"]);
    assert!(data.details.complete);
    let Details::Documents(docs) = &data.details.results else { panic!("documents expected") };
    assert_eq!(docs[0].get("severity"), Some(&json!("high")));

    let submitted = svc.submitted();
    assert_eq!(submitted[0].query, format!("EXECUTE {} USING '8.8.8.8'", session.statement_name()));
    assert_eq!(svc.statement_text(session.statement_name(), "primary").as_deref(), Some("SELECT ip, severity FROM logs WHERE ip = ?"));
    Ok(())
}

#[tokio::test]
async fn results_follow_input_order() -> anyhow::Result<()> {
    let svc = Arc::new(InMemoryQueryService::new());
    let values = ["a", "b", "c", "d", "e", "f"];
    for (i, v) in values.iter().enumerate() {
        // Earlier entities take longer to finish.
        svc.on_query_containing(&format!("'{v}'"), Script::succeed(&["name"], &[&[*v]]).after_polls(values.len() - i - 1));
    }
    let (mut session, _) = session_with(&svc);
    let opts = LookupOptions { summary_attributes: Some("name".into()), poll_attempts: 10, ..options("SELECT name FROM t WHERE name = ?") };

    let results = session.lookup(&entities(&values), &opts).await?;

    let order: Vec<&str> = results.iter().map(|r| r.entity.value.as_str()).collect();
    assert_eq!(order, values);
    for r in &results {
        assert_eq!(r.data.as_ref().map(|d| d.summary.clone()), Some(vec![r.entity.value.clone()]));
    }
    Ok(())
}

#[tokio::test]
async fn one_bad_entity_fails_the_batch_but_not_an_isolated_run() -> anyhow::Result<()> {
    let svc = Arc::new(InMemoryQueryService::new());
    svc.on_query_containing("USING 3", Script::succeed(&["n"], &[&["3"]]));
    let (mut session, _) = session_with(&svc);
    let opts = options("SELECT n FROM t WHERE n = ?:integer");
    let batch = entities(&["1", "x", "3"]);

    let err = session.lookup(&batch, &opts).await.expect_err("coercion fails the batch");
    assert!(matches!(err, Error::TypeCoercion { ref type_name, ref value } if type_name == "integer" && value == "x"));

    let isolated = session.lookup_isolated(&batch, &opts).await?;
    assert_eq!(isolated.len(), 3);
    assert_eq!(isolated[0].result, Ok(None), "completed without rows");
    let payload = isolated[1].result.as_ref().expect_err("bad entity");
    assert_eq!(payload.name, "TypeCoercionError");
    assert_eq!(payload.detail, "Entity value is not a valid integer");
    let third = isolated[2].result.as_ref().expect("ok").as_ref().expect("rows");
    assert_eq!(third.summary, vec!["1 result"]);
    Ok(())
}

#[tokio::test]
async fn rejected_submission_is_reported_per_entity() -> anyhow::Result<()> {
    let svc = Arc::new(InMemoryQueryService::new());
    svc.reject_submission_containing("'blocked'", ServiceError::new("InvalidRequestException", "Unable to verify/create output bucket missing-bucket"));
    let (mut session, _) = session_with(&svc);

    let isolated = session.lookup_isolated(&entities(&["fine", "blocked"]), &options("SELECT * FROM t WHERE v = ?")).await?;

    assert!(isolated[0].result.is_ok());
    let payload = isolated[1].result.as_ref().expect_err("rejected");
    assert_eq!(payload.name, "RemoteSubmissionError");
    assert!(payload.message.contains("missing-bucket"), "{}", payload.message);
    Ok(())
}

#[tokio::test]
async fn suspended_lookup_resumes_through_status_messages() -> anyhow::Result<()> {
    let svc = Arc::new(InMemoryQueryService::new());
    svc.on_query_containing("'8.8.8.8'", Script::succeed(&["ip"], &[&["8.8.8.8"]]).after_polls(4));
    let (mut session, _) = session_with(&svc);
    let opts = LookupOptions { summary_attributes: Some("ip".into()), poll_attempts: 2, ..options("SELECT ip FROM logs WHERE ip = ?") };

    let results = session.lookup(&entities(&["8.8.8.8"]), &opts).await?;
    let running = results[0].data.as_ref().expect("placeholder");
    assert_eq!(running.summary, vec![RUNNING_TAG]);
    assert!(!running.details.complete);
    let handle = running.details.execution_handle.clone();

    let message = json!({"action": "CHECK_QUERY_STATUS", "executionId": handle});
    // Polls three and four are still pending; the fifth sees the result.
    for _ in 0..2 {
        let reply = session.handle_message(&message, &opts).await.expect("reply");
        assert_eq!(reply["summary"], json!([RUNNING_TAG]));
        assert_eq!(reply["details"]["complete"], json!(false));
    }
    let reply = session.handle_message(&message, &opts).await.expect("reply");
    assert_eq!(reply["summary"], json!(["8.8.8.8"]));
    assert_eq!(reply["details"]["complete"], json!(true));
    assert_eq!(reply["details"]["executionHandle"], json!(handle));
    assert_eq!(reply["details"]["showAsJson"], json!(true));
    assert_eq!(svc.calls().submit, 1, "resumption never resubmits");
    Ok(())
}

#[tokio::test]
async fn resumed_failure_becomes_an_execution_failure_payload() -> anyhow::Result<()> {
    let svc = Arc::new(InMemoryQueryService::new());
    svc.on_query_containing("'10.0.0.9'", Script::fail("SYNTAX_ERROR: line 1:8").after_polls(1));
    let (mut session, _) = session_with(&svc);
    let opts = LookupOptions { poll_attempts: 1, ..options("SELECT * FROM logs WHERE ip = ?") };

    let results = session.lookup(&entities(&["10.0.0.9"]), &opts).await?;
    let handle = results[0].data.as_ref().expect("placeholder").details.execution_handle.clone();

    let payload = session
        .handle_message(&json!({"action": "CHECK_QUERY_STATUS", "executionId": handle}), &opts)
        .await
        .expect_err("remote failure");
    assert_eq!(payload.name, "RemoteExecutionFailure");
    assert_eq!(payload.detail, "SYNTAX_ERROR: line 1:8");
    assert!(payload.message.contains(&handle), "{}", payload.message);
    Ok(())
}

#[tokio::test]
async fn unknown_actions_and_handles_become_error_payloads() {
    let svc = Arc::new(InMemoryQueryService::new());
    let (mut session, _) = session_with(&svc);
    let opts = options("SELECT 1");

    let unknown = session.handle_message(&json!({"action": "REFRESH"}), &opts).await.expect_err("unknown action");
    assert_eq!(unknown.name, "UnknownAction");

    let missing = session
        .handle_message(&json!({"action": "CHECK_QUERY_STATUS", "executionId": "exec-9999"}), &opts)
        .await
        .expect_err("no such execution");
    assert_eq!(missing.name, "RemoteServiceError");
    assert_eq!(missing.status_code, Some(400));
}

#[tokio::test]
async fn statement_is_ensured_once_per_invocation() -> anyhow::Result<()> {
    let svc = Arc::new(InMemoryQueryService::new());
    let (mut session, _) = session_with(&svc);
    let opts = options("SELECT * FROM t WHERE a = ? OR b = ?");

    session.lookup(&entities(&["p", "q", "r", "s"]), &opts).await?;
    let calls = svc.calls();
    assert_eq!((calls.get_statement, calls.create_statement, calls.update_statement), (1, 1, 0));
    assert_eq!(calls.submit, 4);
    let name = session.statement_name().to_string();
    let queries: Vec<String> = svc.submitted().into_iter().map(|r| r.query).collect();
    let expected: Vec<String> = ["p", "q", "r", "s"].iter().map(|v| format!("EXECUTE {name} USING '{v}', '{v}'")).collect();
    assert_eq!(queries, expected, "every placeholder receives the entity");

    session.lookup(&entities(&["t"]), &opts).await?;
    assert_eq!(svc.calls().get_statement, 1, "cached record short-circuits");

    let changed = options("SELECT * FROM t WHERE c = ?");
    session.lookup(&entities(&["u"]), &changed).await?;
    let calls = svc.calls();
    assert_eq!((calls.get_statement, calls.create_statement, calls.update_statement), (2, 1, 1));
    Ok(())
}

#[tokio::test]
async fn parameter_free_query_is_submitted_verbatim() -> anyhow::Result<()> {
    let svc = Arc::new(InMemoryQueryService::new());
    let (mut session, _) = session_with(&svc);
    let query = "SELECT count(*) AS n FROM logs WHERE note = 'why?'";

    let results = session.lookup(&entities(&["one", "two"]), &options(query)).await?;

    assert_eq!(results.len(), 2);
    assert!(svc.submitted().iter().all(|r| r.query == query));
    assert_eq!(svc.calls().get_statement, 0);
    Ok(())
}

#[tokio::test]
async fn connection_change_rebuilds_client_and_resets_statement_cache() -> anyhow::Result<()> {
    let svc = Arc::new(InMemoryQueryService::new());
    let (mut session, factory) = session_with(&svc);
    let mut opts = options("SELECT * FROM t WHERE a = ?");

    session.lookup(&entities(&["x"]), &opts).await?;
    session.lookup(&entities(&["y"]), &opts).await?;
    assert_eq!(factory.connects(), 1);
    assert_eq!(svc.calls().get_statement, 1);

    opts.region = "eu-west-1".into();
    session.lookup(&entities(&["z"]), &opts).await?;
    assert_eq!(factory.connects(), 2);
    let calls = svc.calls();
    assert_eq!(calls.get_statement, 2, "statement re-checked after rebuild");
    assert_eq!(calls.update_statement, 0, "remote text already matches");

    opts.summary_attributes = Some("a".into());
    session.lookup(&entities(&["w"]), &opts).await?;
    assert_eq!(factory.connects(), 2, "attribute changes keep the client");
    assert_eq!(session.projector().summary_cache().compilations(), 1);
    Ok(())
}

#[tokio::test]
async fn invalid_options_fail_before_connecting() {
    let svc = Arc::new(InMemoryQueryService::new());
    let (mut session, factory) = session_with(&svc);

    let err = session.lookup(&entities(&["x"]), &options("  ")).await.expect_err("empty query");
    assert!(matches!(err, Error::InvalidConfig(_)));
    assert_eq!(factory.connects(), 0);
}

#[tokio::test]
async fn empty_entity_list_does_no_remote_work() -> anyhow::Result<()> {
    let svc = Arc::new(InMemoryQueryService::new());
    let (mut session, _) = session_with(&svc);

    let results = session.lookup(&[], &options("SELECT * FROM t WHERE a = ?")).await?;

    assert!(results.is_empty());
    assert_eq!(svc.calls(), CallCounts::default());
    Ok(())
}

/// Wraps the in-memory service and records how many executions overlap.
struct Gauge {
    inner: InMemoryQueryService,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl QueryService for Gauge {
    async fn submit_execution(&self, request: &SubmitRequest) -> ServiceResult<String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.inner.submit_execution(request).await
    }

    async fn get_execution_status(&self, execution_id: &str) -> ServiceResult<ExecutionStatus> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.inner.get_execution_status(execution_id).await
    }

    async fn get_results(&self, execution_id: &str, max_rows: usize) -> ServiceResult<ResultSet> {
        let result = self.inner.get_results(execution_id, max_rows).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn get_prepared_statement(&self, name: &str, workgroup: &str) -> ServiceResult<Option<PreparedStatementInfo>> {
        self.inner.get_prepared_statement(name, workgroup).await
    }

    async fn create_prepared_statement(&self, name: &str, text: &str, workgroup: &str) -> ServiceResult<()> {
        self.inner.create_prepared_statement(name, text, workgroup).await
    }

    async fn update_prepared_statement(&self, name: &str, text: &str, workgroup: &str) -> ServiceResult<()> {
        self.inner.update_prepared_statement(name, text, workgroup).await
    }
}

struct GaugeFactory(Arc<Gauge>);

impl ServiceFactory for GaugeFactory {
    fn connect(&self, _settings: &ConnectionSettings) -> anyhow::Result<Arc<dyn QueryService>> { Ok(self.0.clone()) }
}

#[tokio::test]
async fn fan_out_respects_concurrency_bound() -> anyhow::Result<()> {
    let gauge = Arc::new(Gauge { inner: InMemoryQueryService::new(), in_flight: AtomicUsize::new(0), peak: AtomicUsize::new(0) });
    let mut session = LookupSession::new(Arc::new(GaugeFactory(gauge.clone())));
    let opts = LookupOptions { max_concurrency: 4, ..options("SELECT * FROM t WHERE a = ?") };
    let values: Vec<String> = (0..20).map(|i| format!("v{i}")).collect();
    let batch: Vec<Entity> = values.iter().map(|v| Entity::new(v.as_str())).collect();

    let results = session.lookup(&batch, &opts).await?;

    assert_eq!(results.len(), 20);
    let peak = gauge.peak.load(Ordering::SeqCst);
    assert!(peak <= 4, "peak {peak} exceeds bound");
    assert!(peak > 1, "executions should overlap");
    assert_eq!(gauge.in_flight.load(Ordering::SeqCst), 0);
    Ok(())
}
