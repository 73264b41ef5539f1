//! JSON payloads attached to lifecycle events.

use crate::context::SessionContext;
use crate::filters::FilterStage;
use crate::message::HttpResponseMessage;
use serde_json::{json, Value};

/// Builds a payload carrying the request identity plus `extra` fields.
#[must_use]
pub fn request_payload(context: &SessionContext, extra: Value) -> Value {
    let mut payload = json!({
        "request_id": context.id().to_string(),
        "received_at": context.identity().received_at.to_rfc3339(),
    });

    if let (Value::Object(map), Value::Object(extra)) = (&mut payload, extra) {
        map.extend(extra);
    }

    payload
}

/// Builds a payload for a stage transition.
#[must_use]
pub fn stage_payload(
    context: &SessionContext,
    stage: FilterStage,
    duration_ms: Option<f64>,
    error: Option<&str>,
) -> Value {
    let mut payload = request_payload(context, json!({ "stage": stage.as_str() }));

    if let Some(ms) = duration_ms {
        payload["duration_ms"] = json!(ms);
    }
    if let Some(err) = error {
        payload["error"] = json!(err);
    }

    payload
}

/// Builds the payload for a completed request.
#[must_use]
pub fn completion_payload(response: &HttpResponseMessage) -> Value {
    let context = response.context();
    request_payload(
        context,
        json!({
            "status": response.status().as_u16(),
            "fallback": response.is_fallback(),
            "duration_ms": context.timings().request().duration_ms(),
            "timings": context.timings().snapshot(),
        }),
    )
}
