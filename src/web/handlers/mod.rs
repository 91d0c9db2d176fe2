use salvo::prelude::*;
use serde_json::json;

use crate::engine::EngineError;

pub mod chat;
pub mod feed;
pub mod health;
pub mod matchmaking;

pub(crate) fn render_error(res: &mut Response, status: StatusCode, message: &str) {
    res.status_code(status);
    res.render(Json(json!({ "error": message })));
}

/// Maps engine failures onto the status codes callers can act on:
/// caller mistakes are 4xx, an exhausted write budget is 503, anything
/// else is a plain 500.
pub(crate) fn render_engine_error(res: &mut Response, err: EngineError) {
    let status = match &err {
        EngineError::SelfDecision
        | EngineError::InvalidStatus(_)
        | EngineError::MessageTooLong { .. } => StatusCode::BAD_REQUEST,
        EngineError::NotMatched(_) => StatusCode::NOT_FOUND,
        EngineError::NotParticipant { .. } => StatusCode::FORBIDDEN,
        EngineError::WriteExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Store(_) | EngineError::MissingThread(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    render_error(res, status, &err.to_string());
}
