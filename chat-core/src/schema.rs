use diesel::{allow_tables_to_appear_in_same_query, table};

table! {
    chat_conversations (id) {
        id -> BigInt,
        conversation_id -> Text,
        participant_low -> Text,
        participant_high -> Text,
        last_message_text -> Nullable<Text>,
        last_message_sender -> Nullable<Text>,
        last_message_at -> Nullable<Timestamptz>,
        unread_low -> Integer,
        unread_high -> Integer,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    chat_messages (id) {
        id -> BigInt,
        conversation_id -> Text,
        sender_id -> Text,
        recipient_id -> Text,
        message_type -> Text,
        content -> Text,
        voice_url -> Nullable<Text>,
        voice_duration -> Nullable<Double>,
        reply_to_id -> Nullable<BigInt>,
        reply_to_text -> Nullable<Text>,
        reply_to_sender -> Nullable<Text>,
        is_read -> Bool,
        read_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

table! {
    chat_device_tokens (id) {
        id -> BigInt,
        user_id -> Text,
        token -> Text,
        platform -> Text,
        device_id -> Nullable<Text>,
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    chat_profiles (user_id) {
        user_id -> Text,
        display_name -> Text,
        age -> Nullable<Integer>,
        photo_key -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    chat_ws_connections (id) {
        id -> BigInt,
        user_id -> Text,
        connection_id -> Text,
        connected_at -> Timestamptz,
        last_heartbeat_at -> Timestamptz,
        disconnected_at -> Nullable<Timestamptz>,
    }
}

allow_tables_to_appear_in_same_query!(
    chat_conversations,
    chat_messages,
    chat_device_tokens,
    chat_profiles,
    chat_ws_connections,
);
