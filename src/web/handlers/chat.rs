use salvo::prelude::*;
use serde::Deserialize;
use serde_json::json;

use crate::db::PairKey;
use crate::web::handlers::{render_engine_error, render_error};
use crate::web::web_state;

fn pair_key_param(req: &mut Request, res: &mut Response) -> Option<PairKey> {
    match req.param::<String>("key") {
        Some(v) if !v.is_empty() => Some(PairKey::from_raw(v)),
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "missing pair key");
            None
        }
    }
}

#[handler]
pub async fn list_chat_messages(req: &mut Request, res: &mut Response) {
    let Some(key) = pair_key_param(req, res) else {
        return;
    };
    let user_id = match req.query::<String>("user_id") {
        Some(v) if !v.is_empty() => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "missing user_id query parameter");
            return;
        }
    };

    match web_state().engine.chat().messages(&key, &user_id).await {
        Ok(messages) => {
            res.render(Json(json!({
                "messages": messages,
                "count": messages.len(),
            })));
        }
        Err(err) => render_engine_error(res, err),
    }
}

#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    sender_id: String,
    body: String,
}

#[handler]
pub async fn post_chat_message(req: &mut Request, res: &mut Response) {
    let Some(key) = pair_key_param(req, res) else {
        return;
    };
    let body: SendMessageRequest = match req.parse_json().await {
        Ok(body) => body,
        Err(_) => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid message body");
            return;
        }
    };
    if body.sender_id.is_empty() {
        render_error(res, StatusCode::BAD_REQUEST, "missing sender_id");
        return;
    }

    match web_state()
        .engine
        .chat()
        .send(&key, &body.sender_id, &body.body)
        .await
    {
        Ok(Some(message)) => {
            res.status_code(StatusCode::CREATED);
            res.render(Json(json!({ "ok": true, "message": message })));
        }
        // Whitespace-only body: accepted and dropped.
        Ok(None) => {
            res.render(Json(json!({ "ok": true, "message": null })));
        }
        Err(err) => render_engine_error(res, err),
    }
}

#[derive(Debug, Deserialize)]
struct MarkReadRequest {
    user_id: String,
}

#[handler]
pub async fn mark_chat_read(req: &mut Request, res: &mut Response) {
    let Some(key) = pair_key_param(req, res) else {
        return;
    };
    let body: MarkReadRequest = match req.parse_json().await {
        Ok(body) => body,
        Err(_) => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid read receipt body");
            return;
        }
    };
    if body.user_id.is_empty() {
        render_error(res, StatusCode::BAD_REQUEST, "missing user_id");
        return;
    }

    match web_state().engine.chat().mark_read(&key, &body.user_id).await {
        Ok(()) => {
            res.render(Json(json!({ "ok": true, "key": key })));
        }
        Err(err) => render_engine_error(res, err),
    }
}
