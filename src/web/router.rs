use salvo::prelude::*;

use crate::web::handlers::{
    chat::{list_chat_messages, mark_chat_read, post_chat_message},
    feed::get_feed,
    health::{get_status, health_check},
    matchmaking::{delete_match, list_matches, post_decision},
};

pub fn create_router() -> Router {
    Router::new()
        .push(Router::with_path("health").get(health_check))
        .push(Router::with_path("status").get(get_status))
        .push(Router::with_path("feed/{user_id}").get(get_feed))
        .push(Router::with_path("decisions").post(post_decision))
        .push(
            Router::with_path("matches")
                .get(list_matches)
                .push(Router::with_path("{key}").delete(delete_match)),
        )
        .push(
            Router::with_path("chats/{key}")
                .push(
                    Router::with_path("messages")
                        .get(list_chat_messages)
                        .post(post_chat_message),
                )
                .push(Router::with_path("read").post(mark_chat_read)),
        )
}
