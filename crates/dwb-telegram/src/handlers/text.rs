use dwb_core::{
    digest::{self, DigestMode},
    domain::ChatId,
    formatting::{
        render, render_domain_list, render_help, render_search_results, render_stats,
    },
    messaging::types::InlineKeyboard,
    repository::{is_valid_domain, normalize_domain, RepoResult, StoreLayout},
};

use super::keyboards::{self, Intent};
use crate::router::{AppState, PendingInput};

const EMPTY_LIST: &str = "The domain list is empty. Add one with ➕ Add.";

pub(crate) async fn handle_text(state: &AppState, chat_id: i64, text: &str) {
    if let Some(intent) = Intent::from_button(text) {
        // A menu button always wins over a pending prompt.
        state.take_pending(chat_id).await;
        run_intent(state, chat_id, intent, "").await;
        return;
    }

    match state.take_pending(chat_id).await {
        Some(pending) => complete_pending(state, chat_id, pending, text).await,
        None => {
            state
                .reply(chat_id, "Pick an action from the menu below.")
                .await
        }
    }
}

/// Run one user action. `arg` is the text after a slash command, if any;
/// when an action needs input and `arg` is blank, the chat is prompted.
pub(crate) async fn run_intent(state: &AppState, chat_id: i64, intent: Intent, arg: &str) {
    let arg = arg.trim();
    tracing::debug!(chat_id, ?intent, "intent");

    match intent {
        Intent::CheckAll => check_all(state, chat_id).await,
        Intent::Expiring => show_expiring(state, chat_id).await,
        Intent::List => list_domains(state, chat_id).await,
        Intent::CheckOne if !arg.is_empty() => check_one(state, chat_id, arg).await,
        Intent::CheckOne => {
            prompt(state, chat_id, PendingInput::CheckDomain, "Send the domain to check:").await
        }
        Intent::Add if !arg.is_empty() => {
            let res = state.repo.add(arg, None);
            reply_result(state, chat_id, res).await;
        }
        Intent::Add => start_add(state, chat_id).await,
        Intent::Remove if !arg.is_empty() => {
            let res = state.repo.remove(arg);
            reply_result(state, chat_id, res).await;
        }
        Intent::Remove => {
            offer_domains(state, chat_id, "Choose a domain to remove:", keyboards::remove_keyboard)
                .await
        }
        Intent::Rename => {
            offer_domains(state, chat_id, "Choose a domain to rename:", keyboards::rename_keyboard)
                .await
        }
        Intent::Find if !arg.is_empty() => find(state, chat_id, arg).await,
        Intent::Find => {
            prompt(
                state,
                chat_id,
                PendingInput::FindDomain,
                "Send part of a domain name to search for:",
            )
            .await
        }
        Intent::Accounts => show_accounts(state, chat_id).await,
        Intent::AddAccount if !arg.is_empty() => {
            let res = state.repo.add_account(arg);
            reply_result(state, chat_id, res).await;
        }
        Intent::AddAccount => {
            prompt(state, chat_id, PendingInput::AddAccount, "Send the new account id:").await
        }
        Intent::RemoveAccount if !arg.is_empty() => {
            let res = state.repo.remove_account(arg);
            reply_result(state, chat_id, res).await;
        }
        Intent::RemoveAccount => show_accounts(state, chat_id).await,
        Intent::Stats => {
            let text = render_stats(&state.repo.stats());
            state.reply(chat_id, &text).await;
        }
        Intent::Help => {
            let text = render_help(state.cfg.tiers, state.cfg.daily_check_time);
            state.reply(chat_id, &text).await;
        }
        Intent::Cancel => {
            state.take_pending(chat_id).await;
            state.reply(chat_id, "Cancelled.").await;
        }
    }
}

async fn complete_pending(state: &AppState, chat_id: i64, pending: PendingInput, text: &str) {
    match pending {
        PendingInput::AddDomain { account } => {
            let res = state.repo.add(text, account.as_deref());
            reply_result(state, chat_id, res).await;
        }
        PendingInput::CheckDomain => check_one(state, chat_id, text).await,
        PendingInput::RenameDomain { old } => {
            let res = state.repo.rename(&old, text);
            reply_result(state, chat_id, res).await;
        }
        PendingInput::FindDomain => find(state, chat_id, text).await,
        PendingInput::AddAccount => {
            let res = state.repo.add_account(text);
            reply_result(state, chat_id, res).await;
        }
    }
}

async fn prompt(state: &AppState, chat_id: i64, pending: PendingInput, text: &str) {
    state.set_pending(chat_id, pending).await;
    state
        .reply(chat_id, &format!("{text}\n\nPress {} to abort.", keyboards::BTN_CANCEL))
        .await;
}

pub(crate) async fn reply_result(state: &AppState, chat_id: i64, res: RepoResult) {
    let text = match res {
        Ok(ok) => format!("✅ {}", ok.message),
        Err(e) => format!("❌ {e}"),
    };
    state.reply(chat_id, &text).await;
}

async fn check_all(state: &AppState, chat_id: i64) {
    let domains = state.repo.list_domains();
    if domains.is_empty() {
        state.reply(chat_id, EMPTY_LIST).await;
        return;
    }

    state
        .reply(chat_id, &format!("⏳ Checking {} domain(s)...", domains.len()))
        .await;
    let results = state.runner.check_all(&domains).await;
    let chunks = digest::full_report(&results, state.cfg.tiers, state.cfg.telegram_safe_limit);
    state.send_chunks(chat_id, &chunks).await;
}

async fn show_expiring(state: &AppState, chat_id: i64) {
    let domains = state.repo.list_domains();
    if domains.is_empty() {
        state.reply(chat_id, EMPTY_LIST).await;
        return;
    }

    state.reply(chat_id, "⏳ Looking for expiring domains...").await;
    let results = state.runner.check_all(&domains).await;
    let chunks = digest::assemble(
        &results,
        state.cfg.tiers,
        DigestMode::Interactive,
        state.cfg.telegram_safe_limit,
    );
    state.send_chunks(chat_id, &chunks).await;
}

async fn list_domains(state: &AppState, chat_id: i64) {
    let accounts = state.repo.list_accounts();
    if accounts.is_empty() {
        let domains = state.repo.list_domains();
        if domains.is_empty() {
            state.reply(chat_id, EMPTY_LIST).await;
        } else {
            state
                .reply(chat_id, &render_domain_list("Domains", &domains))
                .await;
        }
        return;
    }

    let blocks: Vec<String> = accounts
        .iter()
        .map(|acc| {
            let domains = state.repo.account_domains(acc).unwrap_or_default();
            render_domain_list(&format!("👤 {acc}"), &domains)
        })
        .collect();
    let chunks =
        digest::split_entries(&blocks, digest::ENTRY_SEPARATOR, state.cfg.telegram_safe_limit);
    state.send_chunks(chat_id, &chunks).await;
}

pub(crate) async fn check_one(state: &AppState, chat_id: i64, raw: &str) {
    let domain = normalize_domain(raw);
    if !is_valid_domain(&domain) {
        state
            .reply(chat_id, &format!("❌ Invalid domain format: '{domain}'"))
            .await;
        return;
    }

    state.reply(chat_id, &format!("⏳ Checking {domain}...")).await;
    let info = state.runner.checker().check(&domain).await;
    let mut text = render(&info, state.cfg.tiers);
    if info.is_expiring_soon {
        text.push_str(&format!(
            "\n\n⚠️ Expires in less than {} days!",
            state.cfg.tiers.warning_days
        ));
    }
    state.reply(chat_id, &text).await;
}

async fn find(state: &AppState, chat_id: i64, query: &str) {
    let hits = state.repo.search(query);
    state
        .reply(chat_id, &render_search_results(query, &hits))
        .await;
}

async fn start_add(state: &AppState, chat_id: i64) {
    let accounts = state.repo.list_accounts();
    match accounts.len() {
        0 if state.repo.layout() == StoreLayout::Grouped => {
            state
                .reply(
                    chat_id,
                    "❌ No accounts yet. Add an account first with /addaccount <id>.",
                )
                .await;
        }
        0 | 1 => {
            let account = accounts.into_iter().next();
            prompt(
                state,
                chat_id,
                PendingInput::AddDomain { account },
                "Send the domain to add:",
            )
            .await;
        }
        _ => {
            send_keyboard(
                state,
                chat_id,
                "Choose the account for the new domain:",
                keyboards::select_account_keyboard(&accounts),
            )
            .await;
        }
    }
}

async fn offer_domains(
    state: &AppState,
    chat_id: i64,
    text: &str,
    build: fn(&[String]) -> InlineKeyboard,
) {
    let domains = state.repo.list_domains();
    if domains.is_empty() {
        state.reply(chat_id, EMPTY_LIST).await;
        return;
    }

    let pages: Vec<&[String]> = domains.chunks(keyboards::MAX_BUTTONS_PER_MESSAGE).collect();
    let total = pages.len();
    for (i, page) in pages.into_iter().enumerate() {
        let header = if total > 1 {
            format!("{text} ({}/{total})", i + 1)
        } else {
            text.to_string()
        };
        if !send_keyboard(state, chat_id, &header, build(page)).await {
            return;
        }
    }
}

async fn show_accounts(state: &AppState, chat_id: i64) {
    let stats = state.repo.stats();
    if stats.per_account.is_empty() {
        state
            .reply(
                chat_id,
                "No accounts yet. Create one with /addaccount <id>; existing domains join the first account.",
            )
            .await;
        return;
    }

    let mut text = format!("👤 Accounts ({}):\n", stats.account_count);
    for (acc, n) in &stats.per_account {
        text.push_str(&format!("\n• {acc}: {n} domain(s)"));
    }
    text.push_str(
        "\n\nTap an account to delete it together with its domains.\nCreate one with /addaccount <id>.",
    );

    let accounts: Vec<String> = stats.per_account.iter().map(|(a, _)| a.clone()).collect();
    send_keyboard(
        state,
        chat_id,
        &text,
        keyboards::delete_account_keyboard(&accounts),
    )
    .await;
}

/// Returns false when the keyboard could not be shown; the user has then
/// been told so in plain text.
async fn send_keyboard(
    state: &AppState,
    chat_id: i64,
    text: &str,
    keyboard: InlineKeyboard,
) -> bool {
    match state
        .messenger
        .send_with_keyboard(ChatId(chat_id), text, keyboard)
        .await
    {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(chat_id, error = %e, "failed to send inline keyboard");
            state
                .reply(
                    chat_id,
                    "❌ Could not show the buttons. Use the slash commands instead: /remove <domain>, /rename <old> <new>, /removeaccount <id>.",
                )
                .await;
            false
        }
    }
}
