use salvo::prelude::*;
use serde_json::json;
use tracing::warn;

use crate::web::handlers::render_error;
use crate::web::web_state;

/// Candidate feed for a user. A store failure degrades to an empty
/// list flagged `degraded` instead of an error page; the client shows
/// "no more profiles" and retries later.
#[handler]
pub async fn get_feed(req: &mut Request, res: &mut Response) {
    let user_id = match req.param::<String>("user_id") {
        Some(v) if !v.is_empty() => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "missing user_id");
            return;
        }
    };

    match web_state().engine.candidates(&user_id).await {
        Ok(candidates) => {
            res.render(Json(json!({
                "candidates": candidates,
                "degraded": false,
            })));
        }
        Err(err) => {
            warn!(user = %user_id, error = %err, "feed read failed, serving empty feed");
            res.render(Json(json!({
                "candidates": [],
                "degraded": true,
            })));
        }
    }
}
