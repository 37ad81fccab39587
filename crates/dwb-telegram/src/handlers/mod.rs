//! Telegram update handlers.
//!
//! Endpoints here only unpack teloxide types; the actual work is done by
//! functions that take the [`AppState`] and a chat id, so they can run
//! against a fake messenger in tests.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};

use dwb_core::{
    digest::split_entries,
    domain::{MessageId, MessageRef},
};

use crate::router::AppState;

mod callback;
mod commands;
pub mod keyboards;
mod text;

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    let data = q.data.clone().unwrap_or_default();
    let origin = q.message.as_ref().map(|m| MessageRef {
        chat_id: dwb_core::domain::ChatId(m.chat.id.0),
        message_id: MessageId(m.id.0),
    });

    if let Some(origin) = origin {
        subscribe(&state, origin.chat_id.0);
        let _guard = state.chat_locks.lock_chat(origin.chat_id.0).await;
        callback::handle_callback(&state, &q.id, origin, &data).await;
    } else {
        let _ = state
            .messenger
            .answer_callback(&q.id, Some("This message is too old"))
            .await;
    }
    Ok(())
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let chat_id = msg.chat.id.0;
    subscribe(&state, chat_id);

    let Some(text) = msg.text() else {
        state
            .reply(chat_id, "Send a domain name or pick an action from the menu.")
            .await;
        return Ok(());
    };

    // Sequentialize per chat so a pending prompt is consumed once.
    let _guard = state.chat_locks.lock_chat(chat_id).await;
    if text.starts_with('/') {
        commands::handle_command(&state, chat_id, text).await;
    } else {
        text::handle_text(&state, chat_id, text).await;
    }
    Ok(())
}

fn subscribe(state: &AppState, chat_id: i64) {
    if let Err(e) = state.subscribers.add(chat_id) {
        tracing::warn!(chat_id, error = %e, "failed to persist subscriber");
    }
}

/// Split a reply on line boundaries into chunks of at most `limit` characters.
pub fn split_reply(text: &str, limit: usize) -> Vec<String> {
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }
    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    split_entries(&lines, "\n", limit)
}
