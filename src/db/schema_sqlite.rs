// SQLite schema definitions for the matching and chat tables.
// Timestamps are stored as RFC 3339 text.

diesel::table! {
    profiles (user_id) {
        user_id -> Text,
        name -> Text,
        age -> Integer,
        bio -> Text,
        gender -> Text,
        hobbies -> Text,
        likes -> Text,
        image_url -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    decisions (id) {
        id -> Integer,
        liker_id -> Text,
        liked_id -> Text,
        status -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    matches (pair_key) {
        pair_key -> Text,
        user_a -> Text,
        user_b -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    chat_threads (pair_key) {
        pair_key -> Text,
        user_a -> Text,
        user_b -> Text,
        created_at -> Text,
        last_message -> Text,
        unread_a -> Bool,
        unread_b -> Bool,
    }
}

diesel::table! {
    messages (id) {
        id -> Integer,
        pair_key -> Text,
        sender_id -> Text,
        body -> Text,
        created_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(profiles, decisions, matches, chat_threads, messages,);
