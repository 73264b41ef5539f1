//! End-to-end runs of [`HttpProcessor`] against the in-memory transport.

use super::{HttpProcessor, RequestCompleteHandler, SessionCleaner};
use crate::context::{SessionContext, REQUEST_TIMING};
use crate::errors::PipelineError;
use crate::events::CollectingEventSink;
use crate::filters::{FilterStage, FnFilter, StagedFilterExecutor};
use crate::message::{HttpResponseMessage, Message};
use crate::testing::{
    NativeRequest, NativeResponse, RecordingCleaner, RecordingCompleteHandler, ScriptedExecutor,
    StageScript, StubContextFactory,
};
use http::{HeaderValue, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    factory: Arc<StubContextFactory>,
    executor: Arc<ScriptedExecutor>,
    cleaner: Arc<RecordingCleaner>,
    handler: Arc<RecordingCompleteHandler>,
    events: Arc<CollectingEventSink>,
    processor: Arc<HttpProcessor<StubContextFactory>>,
}

impl Harness {
    fn new(executor: ScriptedExecutor) -> Self {
        Self::with(executor, RecordingCleaner::new(), RecordingCompleteHandler::new())
    }

    fn with(
        executor: ScriptedExecutor,
        cleaner: RecordingCleaner,
        handler: RecordingCompleteHandler,
    ) -> Self {
        let factory = Arc::new(StubContextFactory::new());
        let executor = Arc::new(executor);
        let cleaner = Arc::new(cleaner);
        let handler = Arc::new(handler);
        let events = Arc::new(CollectingEventSink::new());

        let processor = HttpProcessor::builder(factory.clone())
            .filter_executor(executor.clone())
            .request_complete_handler(handler.clone())
            .session_cleaner(cleaner.clone())
            .event_sink(events.clone())
            .build()
            .unwrap();

        Self {
            factory,
            executor,
            cleaner,
            handler,
            events,
            processor: Arc::new(processor),
        }
    }

    async fn process(&self, native: NativeResponse) -> Result<HttpResponseMessage, PipelineError> {
        self.processor.process(NativeRequest::get("/orders"), native).await
    }
}

#[tokio::test]
async fn test_happy_path_writes_response() {
    let harness = Harness::new(ScriptedExecutor::responding(StatusCode::OK));
    let native = NativeResponse::new();

    let response = harness.process(native.clone()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.is_fallback());
    assert_eq!(native.written().unwrap().status, StatusCode::OK);
    assert_eq!(
        harness.executor.executed_stages(),
        vec![FilterStage::Inbound, FilterStage::Endpoint, FilterStage::Outbound]
    );
    assert_eq!(harness.cleaner.call_count(), 1);
    assert_eq!(harness.cleaner.cleaned_ids(), vec![response.context().id()]);
    assert_eq!(harness.handler.call_count(), 1);
    assert_eq!(harness.handler.responses()[0].status(), StatusCode::OK);
}

#[tokio::test]
async fn test_endpoint_failure_is_returned() {
    let harness = Harness::new(
        ScriptedExecutor::pass_through()
            .with_stage(FilterStage::Endpoint, StageScript::Fail("upstream refused".into())),
    );
    let native = NativeResponse::new();

    let err = harness.process(native.clone()).await.unwrap_err();

    let failure = err.as_stage_failure().unwrap();
    assert_eq!(failure.stage, FilterStage::Endpoint);
    assert!(failure.message.contains("upstream refused"));
    assert_eq!(
        harness.executor.executed_stages(),
        vec![FilterStage::Inbound, FilterStage::Endpoint]
    );
    assert_eq!(harness.factory.write_count(), 0);
    assert!(native.written().is_none());
    assert_eq!(harness.cleaner.call_count(), 1);
    assert_eq!(harness.handler.call_count(), 0);
}

#[tokio::test]
async fn test_inbound_failure_skips_later_stages() {
    let harness = Harness::new(
        ScriptedExecutor::responding(StatusCode::OK)
            .with_stage(FilterStage::Inbound, StageScript::Fail("bad token".into())),
    );

    let err = harness.process(NativeResponse::new()).await.unwrap_err();

    assert_eq!(err.as_stage_failure().unwrap().stage, FilterStage::Inbound);
    assert_eq!(harness.executor.executed_stages(), vec![FilterStage::Inbound]);
    assert_eq!(harness.cleaner.call_count(), 1);
    assert_eq!(harness.handler.call_count(), 0);
}

#[tokio::test]
async fn test_outbound_failure_is_not_a_fallback() {
    let harness = Harness::new(
        ScriptedExecutor::responding(StatusCode::OK)
            .with_stage(FilterStage::Outbound, StageScript::Fail("compression failed".into())),
    );

    let err = harness.process(NativeResponse::new()).await.unwrap_err();

    assert!(err.is_stage_failure());
    assert_eq!(err.as_stage_failure().unwrap().stage, FilterStage::Outbound);
    assert_eq!(harness.factory.write_count(), 0);
    assert_eq!(harness.cleaner.call_count(), 1);
}

#[tokio::test]
async fn test_write_failure_yields_fallback() {
    let harness = Harness::new(ScriptedExecutor::responding(StatusCode::OK));

    let response = harness
        .process(NativeResponse::failing("connection reset"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.is_fallback());
    let answered = harness.executor.answered_requests();
    assert!(Arc::ptr_eq(response.outbound_request(), &answered[0]));
    assert!(Arc::ptr_eq(response.context(), answered[0].context()));

    assert_eq!(harness.handler.call_count(), 1);
    assert_eq!(
        harness.handler.responses()[0].status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(harness.cleaner.call_count(), 1);
    assert_eq!(harness.events.events_of_type("response.fallback").len(), 1);
    assert!(harness.events.events_of_type("response.written").is_empty());
}

#[tokio::test]
async fn test_every_write_failure_mode_yields_fallback() {
    let modes = [
        NativeResponse::rejecting("serializer refused body"),
        NativeResponse::failing("broken pipe"),
        NativeResponse::panicking("writer bug"),
        NativeResponse::panicking_async("writer bug in flight"),
    ];

    for native in modes {
        let harness = Harness::new(ScriptedExecutor::responding(StatusCode::CREATED));
        let response = harness.process(native).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.is_fallback());
        assert_eq!(harness.handler.call_count(), 1);
        assert_eq!(harness.cleaner.call_count(), 1);
        assert!(response.context().timings().request().is_complete());
    }
}

#[tokio::test]
async fn test_endpoint_without_response_fails_at_write() {
    let harness = Harness::new(ScriptedExecutor::pass_through());

    let response = harness.process(NativeResponse::new()).await.unwrap();

    assert!(response.is_fallback());
    assert_eq!(response.outbound_request().path(), "/orders");
    assert_eq!(harness.factory.write_count(), 1);
}

#[tokio::test]
async fn test_complete_handler_failure_does_not_change_outcome() {
    for handler in [RecordingCompleteHandler::failing(), RecordingCompleteHandler::panicking()] {
        let harness = Harness::with(
            ScriptedExecutor::responding(StatusCode::OK),
            RecordingCleaner::new(),
            handler,
        );

        let response = harness.process(NativeResponse::new()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.is_fallback());
        assert_eq!(harness.handler.call_count(), 1);
        assert_eq!(harness.cleaner.call_count(), 1);
    }
}

#[tokio::test]
async fn test_cleaner_failure_is_swallowed() {
    let harness = Harness::with(
        ScriptedExecutor::responding(StatusCode::OK),
        RecordingCleaner::failing("session store offline"),
        RecordingCompleteHandler::new(),
    );

    let response = harness.process(NativeResponse::new()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(harness.cleaner.call_count(), 1);
    let cleanup = harness.events.events_of_type("request.cleanup");
    assert_eq!(cleanup[0].1.as_ref().unwrap()["cleaned"], json!(false));
}

#[tokio::test]
async fn test_cleaner_failure_after_stage_failure_keeps_stage_error() {
    let harness = Harness::with(
        ScriptedExecutor::pass_through()
            .with_stage(FilterStage::Endpoint, StageScript::Fail("no route".into())),
        RecordingCleaner::failing("session store offline"),
        RecordingCompleteHandler::new(),
    );

    let err = harness.process(NativeResponse::new()).await.unwrap_err();
    assert_eq!(err.as_stage_failure().unwrap().message, "no route");
    assert_eq!(harness.cleaner.call_count(), 1);
}

#[tokio::test]
async fn test_timings_recorded() {
    let harness = Harness::new(
        ScriptedExecutor::responding(StatusCode::OK)
            .with_stage(FilterStage::Inbound, StageScript::Delay(Duration::from_millis(20))),
    );

    let response = harness.process(NativeResponse::new()).await.unwrap();
    let timings = response.context().timings();

    assert!(timings.request().is_complete());
    assert!(timings.request().duration_ms().unwrap() >= 20.0);
    for stage in FilterStage::ALL {
        assert!(timings.contains(stage.timing_name()));
        assert!(timings.get(stage.timing_name()).is_complete());
    }
    assert!(timings.get(FilterStage::Inbound.timing_name()).duration_ms().unwrap() >= 20.0);
    assert!(timings.get("write").is_complete());

    let names: Vec<String> = timings.snapshot().into_iter().map(|t| t.name).collect();
    assert_eq!(names[0], REQUEST_TIMING);
}

#[tokio::test]
async fn test_request_timing_ended_on_stage_failure() {
    let harness = Harness::new(
        ScriptedExecutor::pass_through()
            .with_stage(FilterStage::Inbound, StageScript::Fail("denied".into())),
    );
    harness.process(NativeResponse::new()).await.unwrap_err();

    let context = harness.executor.seen_contexts()[0].clone();
    let request_timing = context.timings().request();
    assert!(request_timing.is_complete());
    assert!(!request_timing.is_running());
    assert!(context.timings().get(FilterStage::Inbound.timing_name()).is_complete());

    let failed = harness.events.events_of_type("request.failed");
    assert_eq!(failed.len(), 1);
    let payload = failed[0].1.as_ref().unwrap();
    assert_eq!(payload["stage"], json!("inbound"));
    assert!(payload["duration_ms"].is_number());
}

#[tokio::test]
async fn test_no_decorator_gives_pristine_context() {
    let harness = Harness::new(ScriptedExecutor::responding(StatusCode::OK));
    harness.process(NativeResponse::new()).await.unwrap();

    let created = harness.factory.created_contexts();
    assert_eq!(created.len(), 1);
    assert!(created[0].was_pristine);
}

#[tokio::test]
async fn test_decorator_attributes_reach_the_response() {
    let factory = Arc::new(StubContextFactory::new());
    let processor = HttpProcessor::builder(factory.clone())
        .filter_executor(Arc::new(ScriptedExecutor::responding(StatusCode::OK)))
        .decorator(Arc::new(|ctx: SessionContext| {
            ctx.with_attribute("tenant", json!("acme"))
        }))
        .session_cleaner(Arc::new(RecordingCleaner::new()))
        .build()
        .unwrap();

    let response = processor
        .process(NativeRequest::get("/"), NativeResponse::new())
        .await
        .unwrap();

    assert_eq!(
        response.context().attributes().get_str("tenant"),
        Some("acme".to_string())
    );
    assert!(!factory.created_contexts()[0].was_pristine);
}

#[tokio::test]
async fn test_identity_replacing_decorator_is_a_construction_error() {
    let cleaner = Arc::new(RecordingCleaner::new());
    let executor = Arc::new(ScriptedExecutor::responding(StatusCode::OK));
    let processor = HttpProcessor::builder(Arc::new(StubContextFactory::new()))
        .filter_executor(executor.clone())
        .decorator(Arc::new(|_ctx: SessionContext| SessionContext::new()))
        .session_cleaner(cleaner.clone())
        .build()
        .unwrap();

    let err = processor
        .process(NativeRequest::get("/"), NativeResponse::new())
        .await
        .unwrap_err();

    assert!(err.is_construction_failure());
    assert!(executor.executed_stages().is_empty());
    assert_eq!(cleaner.call_count(), 0);
}

#[tokio::test]
async fn test_malformed_request_is_a_construction_error() {
    let harness = Harness::new(ScriptedExecutor::responding(StatusCode::OK));

    let err = harness
        .processor
        .process(NativeRequest::malformed(), NativeResponse::new())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Construction(_)));
    assert_eq!(harness.cleaner.call_count(), 0);
    assert!(harness.events.is_empty());
}

#[tokio::test]
async fn test_dropped_run_still_cleans_up() {
    let harness = Harness::new(
        ScriptedExecutor::responding(StatusCode::OK)
            .with_stage(FilterStage::Endpoint, StageScript::Pending),
    );

    let outcome = tokio::time::timeout(
        Duration::from_millis(20),
        harness.process(NativeResponse::new()),
    )
    .await;

    assert!(outcome.is_err());
    assert_eq!(harness.cleaner.call_count(), 1);
    assert_eq!(harness.handler.call_count(), 0);

    let cleanup = harness.events.events_of_type("request.cleanup");
    assert_eq!(cleanup.len(), 1);
    assert_eq!(cleanup[0].1.as_ref().unwrap()["cancelled"], json!(true));
    assert!(harness.events.events_of_type("request.completed").is_empty());
}

#[tokio::test]
async fn test_aborted_task_still_cleans_up() {
    let harness = Harness::new(
        ScriptedExecutor::pass_through().with_stage(FilterStage::Inbound, StageScript::Pending),
    );

    let processor = harness.processor.clone();
    let task = tokio::spawn(async move {
        processor
            .process(NativeRequest::get("/slow"), NativeResponse::new())
            .await
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    assert_eq!(harness.cleaner.call_count(), 1);
    assert_eq!(harness.factory.created_contexts().len(), 1);
}

#[tokio::test]
async fn test_event_order_on_success() {
    let harness = Harness::new(ScriptedExecutor::responding(StatusCode::OK));
    harness.process(NativeResponse::new()).await.unwrap();

    assert_eq!(
        harness.events.event_types(),
        vec![
            "request.started",
            "stage.started",
            "stage.completed",
            "stage.started",
            "stage.completed",
            "stage.started",
            "stage.completed",
            "response.written",
            "request.completed",
            "request.cleanup",
        ]
    );

    let stages: Vec<serde_json::Value> = harness
        .events
        .events_of_type("stage.completed")
        .into_iter()
        .map(|(_, data)| data.unwrap()["stage"].clone())
        .collect();
    assert_eq!(stages, vec![json!("inbound"), json!("endpoint"), json!("outbound")]);

    let completed = harness.events.events_of_type("request.completed");
    let payload = completed[0].1.as_ref().unwrap();
    assert_eq!(payload["status"], json!(200));
    assert_eq!(payload["fallback"], json!(false));
}

#[tokio::test]
async fn test_event_order_on_endpoint_failure() {
    let harness = Harness::new(
        ScriptedExecutor::pass_through()
            .with_stage(FilterStage::Endpoint, StageScript::Fail("boom".into())),
    );
    harness.process(NativeResponse::new()).await.unwrap_err();

    assert_eq!(
        harness.events.event_types(),
        vec![
            "request.started",
            "stage.started",
            "stage.completed",
            "stage.started",
            "stage.failed",
            "request.failed",
            "request.cleanup",
        ]
    );
}

#[tokio::test]
async fn test_concurrent_requests_are_isolated() {
    let harness = Harness::new(
        ScriptedExecutor::responding(StatusCode::OK)
            .with_stage(FilterStage::Inbound, StageScript::Delay(Duration::from_millis(5))),
    );

    let runs = (0..16).map(|_| harness.process(NativeResponse::new()));
    let responses = futures::future::join_all(runs).await;

    let mut ids: Vec<_> = responses
        .into_iter()
        .map(|r| r.unwrap().context().id())
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 16);
    assert_eq!(harness.cleaner.call_count(), 16);
    assert_eq!(harness.handler.call_count(), 16);
}

#[tokio::test]
async fn test_staged_filters_end_to_end() {
    let executor = StagedFilterExecutor::new()
        .with_filter(Arc::new(FnFilter::new("route", FilterStage::Endpoint, |msg: Message| {
            Ok(HttpResponseMessage::new(msg.outbound_request(), StatusCode::OK)
                .with_body("hello")
                .into())
        })))
        .unwrap()
        .with_filter(Arc::new(FnFilter::new("server-header", FilterStage::Outbound, |msg: Message| {
            let mut response = msg
                .into_response()
                .map_err(|_| anyhow::anyhow!("expected a response"))?;
            response
                .headers_mut()
                .insert("server", HeaderValue::from_static("edgeflow"));
            Ok(response.into())
        })))
        .unwrap();

    let cleaner = Arc::new(RecordingCleaner::new());
    let handler: Arc<dyn RequestCompleteHandler> =
        Arc::new(|resp: &HttpResponseMessage| -> anyhow::Result<()> {
            assert_eq!(resp.status(), StatusCode::OK);
            Ok(())
        });
    let processor = HttpProcessor::builder(Arc::new(StubContextFactory::new()))
        .filter_executor(Arc::new(executor))
        .request_complete_handler(handler)
        .session_cleaner(cleaner.clone() as Arc<dyn SessionCleaner>)
        .build()
        .unwrap();

    let native = NativeResponse::new();
    processor
        .process(NativeRequest::get("/hello"), native.clone())
        .await
        .unwrap();

    let written = native.written().unwrap();
    assert_eq!(written.headers["server"], "edgeflow");
    assert_eq!(written.body, bytes::Bytes::from("hello"));
    assert_eq!(cleaner.call_count(), 1);
}

#[tokio::test]
async fn test_panicking_filter_becomes_stage_failure() {
    let executor = StagedFilterExecutor::new()
        .with_filter(Arc::new(FnFilter::new(
            "geo-lookup",
            FilterStage::Inbound,
            |_msg: Message| -> anyhow::Result<Message> { panic!("filter bug") },
        )))
        .unwrap();
    let cleaner = Arc::new(RecordingCleaner::new());
    let events = Arc::new(CollectingEventSink::new());
    let processor = Arc::new(
        HttpProcessor::builder(Arc::new(StubContextFactory::new()))
            .filter_executor(Arc::new(executor))
            .session_cleaner(cleaner.clone())
            .event_sink(events.clone())
            .build()
            .unwrap(),
    );

    let task = tokio::spawn({
        let processor = processor.clone();
        async move {
            processor
                .process(NativeRequest::get("/geo"), NativeResponse::new())
                .await
        }
    });
    let err = task.await.unwrap().unwrap_err();

    let failure = err.as_stage_failure().unwrap();
    assert_eq!(failure.stage, FilterStage::Inbound);
    assert!(failure.message.contains("filter bug"));
    assert_eq!(cleaner.call_count(), 1);
    assert_eq!(events.events_of_type("stage.failed").len(), 1);
    assert_eq!(events.events_of_type("request.failed").len(), 1);
}

#[tokio::test]
async fn test_panicking_endpoint_filter_skips_write() {
    let executor = StagedFilterExecutor::new()
        .with_filter(Arc::new(FnFilter::new(
            "route",
            FilterStage::Endpoint,
            |_msg: Message| -> anyhow::Result<Message> { panic!("route table corrupt") },
        )))
        .unwrap();
    let factory = Arc::new(StubContextFactory::new());
    let cleaner = Arc::new(RecordingCleaner::new());
    let processor = HttpProcessor::builder(factory.clone())
        .filter_executor(Arc::new(executor))
        .session_cleaner(cleaner.clone())
        .build()
        .unwrap();

    let err = processor
        .process(NativeRequest::get("/"), NativeResponse::new())
        .await
        .unwrap_err();

    assert_eq!(err.as_stage_failure().unwrap().stage, FilterStage::Endpoint);
    assert_eq!(factory.write_count(), 0);
    assert_eq!(cleaner.call_count(), 1);
}
