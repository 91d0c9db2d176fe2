use salvo::prelude::*;
use serde::Deserialize;
use serde_json::json;

use crate::db::{DecisionStatus, PairKey};
use crate::engine::EngineError;
use crate::web::handlers::{render_engine_error, render_error};
use crate::web::web_state;

#[derive(Debug, Deserialize)]
struct DecisionRequest {
    liker_id: String,
    liked_id: String,
    status: String,
}

#[handler]
pub async fn post_decision(req: &mut Request, res: &mut Response) {
    let body: DecisionRequest = match req.parse_json().await {
        Ok(body) => body,
        Err(_) => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid decision body");
            return;
        }
    };
    if body.liker_id.is_empty() || body.liked_id.is_empty() {
        render_error(res, StatusCode::BAD_REQUEST, "missing liker_id or liked_id");
        return;
    }

    let status = match DecisionStatus::parse(&body.status) {
        Some(status) => status,
        None => {
            render_engine_error(res, EngineError::InvalidStatus(body.status));
            return;
        }
    };

    match web_state()
        .engine
        .swipe(&body.liker_id, &body.liked_id, status)
        .await
    {
        Ok(outcome) => {
            if outcome.matched.is_some() {
                res.status_code(StatusCode::CREATED);
            }
            res.render(Json(json!({
                "decision": outcome.decision,
                "matched": outcome.matched,
            })));
        }
        Err(err) => render_engine_error(res, err),
    }
}

#[handler]
pub async fn list_matches(req: &mut Request, res: &mut Response) {
    let user_id = match req.query::<String>("user_id") {
        Some(v) if !v.is_empty() => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "missing user_id query parameter");
            return;
        }
    };

    match web_state().engine.chat_list(&user_id).await {
        Ok(matches) => {
            res.render(Json(json!({
                "matches": matches,
                "count": matches.len(),
            })));
        }
        Err(err) => render_engine_error(res, err),
    }
}

#[handler]
pub async fn delete_match(req: &mut Request, res: &mut Response) {
    let key = match req.param::<String>("key") {
        Some(v) if !v.is_empty() => PairKey::from_raw(v),
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "missing pair key");
            return;
        }
    };

    match web_state().engine.unmatch(&key).await {
        Ok(()) => {
            res.render(Json(json!({ "ok": true, "key": key })));
        }
        Err(err) => render_engine_error(res, err),
    }
}
