use salvo::prelude::*;
use serde_json::json;

use crate::web::web_state;

#[handler]
pub async fn health_check(res: &mut Response) {
    res.render(Json(json!({
        "status": "ok",
        "uptime_seconds": web_state().started_at.elapsed().as_secs(),
    })));
}

#[handler]
pub async fn get_status(res: &mut Response) {
    let state = web_state();

    let (matches, database) = match state.engine.count_matches().await {
        Ok(count) => (count, "ok"),
        Err(_) => (0, "unavailable"),
    };

    res.render(Json(json!({
        "status": "ok",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "matches": matches,
        "database": database,
    })));
}
