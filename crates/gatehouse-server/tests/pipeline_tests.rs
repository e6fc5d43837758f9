//! Inspector pipeline tests: ordering, applicability, state correlation.

use std::sync::{Arc, Mutex};

use gatehouse_protocol::{InboundRequest, OutboundResponse};
use gatehouse_server::{
    Correlation, Inspector, InspectorError, InspectorPipeline, Phase, RequestContext,
    ResponseContext,
};
use http::{Method, StatusCode};

type Log = Arc<Mutex<Vec<String>>>;

/// Records every hook call as `"<name>:before"` / `"<name>:after:<state>"`.
struct Recording {
    name: &'static str,
    log: Log,
    applies: bool,
    skip_in_before: bool,
    fail_before: bool,
    fail_after: bool,
}

impl Recording {
    fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: Arc::clone(log),
            applies: true,
            skip_in_before: false,
            fail_before: false,
            fail_after: false,
        }
    }

    fn not_applicable(mut self) -> Self {
        self.applies = false;
        self
    }
}

impl Inspector for Recording {
    type State = String;

    fn name(&self) -> &str {
        self.name
    }

    fn applies_to(&self, _request: &RequestContext) -> bool {
        self.applies
    }

    fn before(&self, request: &RequestContext) -> Result<Correlation<String>, InspectorError> {
        self.log.lock().unwrap().push(format!("{}:before", self.name));
        if self.fail_before {
            return Err(InspectorError::Failed("before exploded".into()));
        }
        if self.skip_in_before {
            return Ok(Correlation::Skipped);
        }
        Ok(Correlation::Ran(format!("{}@{}", self.name, request.path())))
    }

    fn after(
        &self,
        response: &mut ResponseContext,
        _request: &RequestContext,
        state: String,
    ) -> Result<(), InspectorError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:after:{}", self.name, state));
        if self.fail_after {
            return Err(InspectorError::Failed("after exploded".into()));
        }
        response.set_header(http::HeaderName::from_static("x-last-inspector"), self.name)?;
        Ok(())
    }
}

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn request(path: &str) -> RequestContext {
    RequestContext::new(InboundRequest::new(Method::GET, path))
}

fn ok_response() -> ResponseContext {
    ResponseContext::new(OutboundResponse::empty(StatusCode::OK))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[test]
fn hooks_run_in_registration_order_in_both_phases() {
    let log = new_log();
    let pipeline = InspectorPipeline::builder()
        .with(Recording::new("a", &log))
        .with(Recording::new("b", &log))
        .with(Recording::new("c", &log))
        .build();
    assert_eq!(pipeline.names(), vec!["a", "b", "c"]);

    let req = request("/api/test");
    let correlations = pipeline.on_request(&req).unwrap();
    assert_eq!(correlations.len(), 3);
    assert_eq!(correlations.ran(), 3);

    let mut resp = ok_response();
    pipeline.on_response(&mut resp, &req, correlations).unwrap();

    assert_eq!(
        entries(&log),
        vec![
            "a:before",
            "b:before",
            "c:before",
            "a:after:a@/api/test",
            "b:after:b@/api/test",
            "c:after:c@/api/test",
        ]
    );
    // Last writer in forward order wins.
    assert_eq!(resp.header("x-last-inspector"), Some("c"));
}

#[test]
fn non_applicable_inspector_runs_neither_hook() {
    let log = new_log();
    let pipeline = InspectorPipeline::builder()
        .with(Recording::new("a", &log))
        .with(Recording::new("b", &log).not_applicable())
        .build();

    let req = request("/api/test");
    let correlations = pipeline.on_request(&req).unwrap();
    assert!(!correlations.is_skipped(0));
    assert!(correlations.is_skipped(1));

    let mut resp = ok_response();
    pipeline.on_response(&mut resp, &req, correlations).unwrap();
    assert_eq!(entries(&log), vec!["a:before", "a:after:a@/api/test"]);
}

#[test]
fn skipped_from_before_hook_suppresses_after_hook() {
    let log = new_log();
    let mut skipper = Recording::new("skipper", &log);
    skipper.skip_in_before = true;
    let pipeline = InspectorPipeline::builder()
        .with(skipper)
        .with(Recording::new("b", &log))
        .build();

    let req = request("/api/test");
    let correlations = pipeline.on_request(&req).unwrap();
    assert_eq!(correlations.ran(), 1);

    let mut resp = ok_response();
    pipeline.on_response(&mut resp, &req, correlations).unwrap();
    assert_eq!(
        entries(&log),
        vec!["skipper:before", "b:before", "b:after:b@/api/test"]
    );
}

#[test]
fn state_returns_only_to_its_own_request() {
    let log = new_log();
    let pipeline = InspectorPipeline::builder()
        .with(Recording::new("a", &log))
        .build();

    let first = request("/api/first");
    let second = request("/api/second");
    let first_slots = pipeline.on_request(&first).unwrap();
    let second_slots = pipeline.on_request(&second).unwrap();

    // Complete out of order.
    pipeline
        .on_response(&mut ok_response(), &second, second_slots)
        .unwrap();
    pipeline
        .on_response(&mut ok_response(), &first, first_slots)
        .unwrap();

    assert_eq!(
        entries(&log),
        vec![
            "a:before",
            "a:before",
            "a:after:a@/api/second",
            "a:after:a@/api/first",
        ]
    );
}

#[test]
fn before_failure_stops_the_chain() {
    let log = new_log();
    let mut failing = Recording::new("broken", &log);
    failing.fail_before = true;
    let pipeline = InspectorPipeline::builder()
        .with(Recording::new("a", &log))
        .with(failing)
        .with(Recording::new("c", &log))
        .build();

    let err = pipeline.on_request(&request("/api/test")).unwrap_err();
    assert_eq!(err.inspector, "broken");
    assert_eq!(err.phase, Phase::Before);
    assert!(matches!(err.source, InspectorError::Failed(_)));
    assert_eq!(entries(&log), vec!["a:before", "broken:before"]);
}

#[test]
fn after_failure_is_reported_with_phase() {
    let log = new_log();
    let mut failing = Recording::new("broken", &log);
    failing.fail_after = true;
    let pipeline = InspectorPipeline::builder()
        .with(failing)
        .with(Recording::new("b", &log))
        .build();

    let req = request("/api/test");
    let correlations = pipeline.on_request(&req).unwrap();
    let err = pipeline
        .on_response(&mut ok_response(), &req, correlations)
        .unwrap_err();
    assert_eq!(err.inspector, "broken");
    assert_eq!(err.phase, Phase::After);
    assert!(err.to_string().contains("after exploded"));
}

#[test]
fn empty_pipeline_passes_response_through() {
    let pipeline = InspectorPipeline::empty();
    assert!(pipeline.is_empty());

    let req = request("/api/test");
    let correlations = pipeline.on_request(&req).unwrap();
    assert!(correlations.is_empty());

    let mut resp = ok_response();
    pipeline.on_response(&mut resp, &req, correlations).unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().is_empty());
}

#[test]
fn correlation_helpers() {
    let ran = Correlation::Ran(2);
    assert!(!ran.is_skipped());
    assert_eq!(ran.state(), Some(&2));
    assert_eq!(ran.map(|n| n * 10), Correlation::Ran(20));

    let skipped: Correlation<i32> = Correlation::Skipped;
    assert!(skipped.is_skipped());
    assert_eq!(skipped.state(), None);
}
