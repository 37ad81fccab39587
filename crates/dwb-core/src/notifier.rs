use std::sync::Arc;

use crate::{
    batch::BatchRunner,
    digest::{self, DigestMode},
    domain::ChatId,
    messaging::port::MessagingPort,
    repository::Repository,
    subscribers::SubscriberStore,
};

/// What one digest run did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DigestOutcome {
    pub checked: usize,
    pub expiring: usize,
    /// Recipients that got every chunk.
    pub delivered: usize,
    /// Recipients where a send failed.
    pub failed: usize,
}

/// Checks every tracked domain and pushes the expiring-soon digest to all
/// subscribers.
#[derive(Clone)]
pub struct Notifier {
    repo: Arc<Repository>,
    runner: BatchRunner,
    subscribers: Arc<SubscriberStore>,
    messenger: Arc<dyn MessagingPort>,
    limit: usize,
}

impl Notifier {
    pub fn new(
        repo: Arc<Repository>,
        runner: BatchRunner,
        subscribers: Arc<SubscriberStore>,
        messenger: Arc<dyn MessagingPort>,
        limit: usize,
    ) -> Self {
        Self {
            repo,
            runner,
            subscribers,
            messenger,
            limit,
        }
    }

    pub async fn run_daily(&self) -> DigestOutcome {
        let mut outcome = DigestOutcome::default();

        let domains = self.repo.list_domains();
        if domains.is_empty() {
            tracing::info!("daily check skipped: no domains tracked");
            return outcome;
        }

        let results = self.runner.check_all(&domains).await;
        outcome.checked = results.len();
        outcome.expiring = results.iter().filter(|i| i.is_expiring_soon).count();

        let bounds = self.runner.checker().bounds();
        let chunks = digest::assemble(&results, bounds, DigestMode::Scheduled, self.limit);
        if chunks.is_empty() {
            tracing::info!(checked = outcome.checked, "daily check: nothing expiring");
            return outcome;
        }

        for chat_id in self.subscribers.list() {
            let mut ok = true;
            for chunk in &chunks {
                if let Err(e) = self.messenger.send_text(ChatId(chat_id), chunk).await {
                    tracing::warn!(chat_id, error = %e, "failed to deliver digest");
                    ok = false;
                    break;
                }
            }
            if ok {
                outcome.delivered += 1;
            } else {
                outcome.failed += 1;
            }
        }

        tracing::info!(
            checked = outcome.checked,
            expiring = outcome.expiring,
            delivered = outcome.delivered,
            failed = outcome.failed,
            "daily digest sent"
        );
        outcome
    }
}
