use dwb_core::{
    domain::{ChatId, MessageRef},
    messaging::types::Callback,
};

use super::keyboards;
use crate::router::{AppState, PendingInput};

pub(crate) async fn handle_callback(
    state: &AppState,
    callback_id: &str,
    origin: MessageRef,
    data: &str,
) {
    let Some(cb) = Callback::parse(data) else {
        tracing::debug!(data, "unrecognized callback data");
        answer(state, callback_id, Some("Unknown action")).await;
        return;
    };
    answer(state, callback_id, None).await;

    let chat_id = origin.chat_id.0;
    let text = match cb {
        Callback::DeleteDomain(key) => match state.repo.resolve_domain(&key) {
            Some(domain) => outcome_text(state.repo.remove(&domain)),
            None => gone("Domain"),
        },
        Callback::RenameDomain(key) => match state.repo.resolve_domain(&key) {
            Some(old) => {
                let text = format!("Renaming: {old}\n\nSend the new name:");
                state
                    .set_pending(chat_id, PendingInput::RenameDomain { old })
                    .await;
                text
            }
            None => gone("Domain"),
        },
        Callback::SelectAccount(key) => match state.repo.resolve_account(&key) {
            Some(account) => {
                let text = format!("Account: {account}\n\nSend the domain to add:");
                state
                    .set_pending(
                        chat_id,
                        PendingInput::AddDomain {
                            account: Some(account),
                        },
                    )
                    .await;
                text
            }
            None => gone("Account"),
        },
        Callback::DeleteAccount(key) => match state.repo.resolve_account(&key) {
            Some(account) => {
                confirm_account_deletion(state, chat_id, &account).await;
                return;
            }
            None => gone("Account"),
        },
        Callback::ConfirmDeleteAccount(key) => match state.repo.resolve_account(&key) {
            Some(account) => outcome_text(state.repo.remove_account(&account)),
            None => gone("Account"),
        },
    };

    if let Err(e) = state.messenger.edit_text(origin, &text).await {
        tracing::warn!(chat_id, error = %e, "failed to edit callback message; sending instead");
        state.reply(chat_id, &text).await;
    }
}

/// Deleting an account drops its domains too, so it takes a second tap.
async fn confirm_account_deletion(state: &AppState, chat_id: i64, account: &str) {
    let owned = state
        .repo
        .account_domains(account)
        .map(|d| d.len())
        .unwrap_or_default();
    let text = format!("⚠️ Delete account {account} together with its {owned} domain(s)?");
    let keyboard = keyboards::confirm_delete_account_keyboard(account);

    if let Err(e) = state
        .messenger
        .send_with_keyboard(ChatId(chat_id), &text, keyboard)
        .await
    {
        tracing::warn!(chat_id, error = %e, "failed to send confirmation keyboard");
        state
            .reply(
                chat_id,
                &format!("{text}

Send /removeaccount {account} to confirm."),
            )
            .await;
    }
}

async fn answer(state: &AppState, callback_id: &str, text: Option<&str>) {
    if let Err(e) = state.messenger.answer_callback(callback_id, text).await {
        tracing::debug!(error = %e, "failed to answer callback");
    }
}

fn outcome_text(res: dwb_core::repository::RepoResult) -> String {
    match res {
        Ok(ok) => format!("✅ {}", ok.message),
        Err(e) => format!("❌ {e}"),
    }
}

fn gone(what: &str) -> String {
    format!("❌ {what} no longer exists")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{testkit, text::handle_text};
    use dwb_core::{
        domain::MessageId,
        repository::{Repository, StoreLayout},
    };
    use std::sync::atomic::Ordering;

    fn origin() -> MessageRef {
        MessageRef {
            chat_id: ChatId(7),
            message_id: MessageId(99),
        }
    }

    #[tokio::test]
    async fn delete_by_key_edits_the_menu_message() {
        let (state, fake) = testkit::state("dwb-tg-cb-del", StoreLayout::Flat, &[]);
        state.repo.add("a.com", None).unwrap();
        state.repo.add("b.com", None).unwrap();

        let data = Callback::DeleteDomain(Repository::domain_key("b.com")).encode();
        handle_callback(&state, "cb1", origin(), &data).await;

        assert_eq!(state.repo.list_domains(), vec!["a.com".to_string()]);
        assert!(fake.last_edit().starts_with("✅"));
        assert_eq!(fake.answers.lock().unwrap()[0], ("cb1".to_string(), None));

        // Stale button: the domain is already gone.
        handle_callback(&state, "cb2", origin(), &data).await;
        assert_eq!(fake.last_edit(), "❌ Domain no longer exists");
    }

    #[tokio::test]
    async fn rename_goes_through_pending_input() {
        let (state, fake) = testkit::state("dwb-tg-cb-ren", StoreLayout::Flat, &[]);
        state.repo.add("old.com", None).unwrap();

        let data = Callback::RenameDomain(Repository::domain_key("old.com")).encode();
        handle_callback(&state, "cb", origin(), &data).await;
        assert!(fake.last_edit().contains("Renaming: old.com"));

        handle_text(&state, 7, "New.com").await;
        assert_eq!(state.repo.list_domains(), vec!["new.com".to_string()]);
        assert!(fake.last_text().starts_with("✅"));
    }

    #[tokio::test]
    async fn select_account_then_add() {
        let (state, _fake) = testkit::state("dwb-tg-cb-acc", StoreLayout::Grouped, &[]);
        state.repo.add_account("first").unwrap();
        state.repo.add_account("second").unwrap();

        let data = Callback::SelectAccount(Repository::account_key("second")).encode();
        handle_callback(&state, "cb", origin(), &data).await;
        handle_text(&state, 7, "x.org").await;

        assert_eq!(state.repo.find_owner("x.org").as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn delete_account_asks_before_cascading() {
        let (state, fake) = testkit::state("dwb-tg-cb-dacc", StoreLayout::Grouped, &[]);
        state.repo.add_account("ops").unwrap();
        state.repo.add("a.com", Some("ops")).unwrap();
        state.repo.add("b.com", Some("ops")).unwrap();

        let data = Callback::DeleteAccount(Repository::account_key("ops")).encode();
        handle_callback(&state, "cb", origin(), &data).await;

        // First tap only asks.
        assert_eq!(state.repo.list_domains().len(), 2);
        assert!(fake.edits.lock().unwrap().is_empty());
        let (text, kb) = fake.last_keyboard().unwrap();
        assert!(text.contains("Delete account ops together with its 2 domain(s)?"));
        assert_eq!(kb.buttons.len(), 1);
        assert_eq!(
            Callback::parse(&kb.buttons[0].callback_data),
            Some(Callback::ConfirmDeleteAccount(Repository::account_key("ops")))
        );

        handle_callback(&state, "cb2", origin(), &kb.buttons[0].callback_data).await;
        assert!(state.repo.list_domains().is_empty());
        assert!(state.repo.list_accounts().is_empty());
        assert!(fake.last_edit().starts_with("✅"));

        // Confirming again after the account is gone.
        handle_callback(&state, "cb3", origin(), &kb.buttons[0].callback_data).await;
        assert_eq!(fake.last_edit(), "❌ Account no longer exists");
    }

    #[tokio::test]
    async fn rejected_confirmation_keyboard_falls_back_to_text() {
        let (state, fake) = testkit::state("dwb-tg-cb-dacc-text", StoreLayout::Grouped, &[]);
        state.repo.add_account("ops").unwrap();
        fake.reject_keyboards.store(true, Ordering::SeqCst);

        let data = Callback::DeleteAccount(Repository::account_key("ops")).encode();
        handle_callback(&state, "cb", origin(), &data).await;

        assert_eq!(state.repo.list_accounts(), vec!["ops".to_string()]);
        assert!(fake.last_text().contains("/removeaccount ops"));
    }

    #[tokio::test]
    async fn garbage_callback_is_answered() {
        let (state, fake) = testkit::state("dwb-tg-cb-junk", StoreLayout::Flat, &[]);

        handle_callback(&state, "junk", origin(), "del_a.com").await;
        let answers = fake.answers.lock().unwrap();
        assert_eq!(
            answers.last(),
            Some(&("junk".to_string(), Some("Unknown action".to_string())))
        );
    }
}
