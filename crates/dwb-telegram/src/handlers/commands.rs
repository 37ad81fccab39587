use crate::router::AppState;

use super::keyboards::Intent;
use super::text::run_intent;

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

pub(crate) async fn handle_command(state: &AppState, chat_id: i64, text: &str) {
    let (cmd, arg) = parse_command(text);

    match cmd.as_str() {
        "start" => {
            state.take_pending(chat_id).await;
            let body = format!(
                "👋 Hi! I keep an eye on domain registrations and warn before they expire.\n\n\
🔔 You are subscribed to the daily check at {}.\n\n\
Choose an action:",
                state.cfg.daily_check_time
            );
            state.reply(chat_id, &body).await;
        }

        "digest" => {
            state.reply(chat_id, "⏳ Running the daily check now...").await;
            let o = state.scheduler.run_now().await;
            let summary = if o.checked == 0 {
                "Nothing to check: the domain list is empty.".to_string()
            } else if o.expiring == 0 {
                format!("✅ {} domain(s) checked, none expiring soon.", o.checked)
            } else {
                format!(
                    "📨 {} domain(s) checked, {} expiring. Digest sent to {} chat(s), {} failed.",
                    o.checked, o.expiring, o.delivered, o.failed
                )
            };
            state.reply(chat_id, &summary).await;
        }

        "schedule" => {
            let status = state.scheduler.status_text().await;
            state.reply(chat_id, &status).await;
        }

        "rename" => {
            let mut words = arg.split_whitespace();
            match (words.next(), words.next(), words.next()) {
                (Some(old), Some(new), None) => {
                    let res = state.repo.rename(old, new);
                    super::text::reply_result(state, chat_id, res).await;
                }
                _ => run_intent(state, chat_id, Intent::Rename, "").await,
            }
        }

        other => match Intent::from_command(other) {
            Some(intent) => run_intent(state, chat_id, intent, &arg).await,
            None => {
                state
                    .reply(chat_id, "Unknown command. Send /help for the list of actions.")
                    .await
            }
        },
    }
}
