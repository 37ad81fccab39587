use std::{collections::HashMap, sync::Arc};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio::sync::{Mutex, OwnedMutexGuard};

use dwb_core::messaging::throttled::{ThrottleConfig, ThrottledMessenger};
use dwb_core::{
    batch::BatchRunner,
    config::Config,
    domain::ChatId,
    messaging::port::MessagingPort,
    notifier::Notifier,
    repository::Repository,
    scheduler::DailyScheduler,
    subscribers::SubscriberStore,
};

use crate::handlers::{self, keyboards};
use crate::TelegramMessenger;

/// What the bot is waiting for from a chat after a prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingInput {
    AddDomain { account: Option<String> },
    CheckDomain,
    RenameDomain { old: String },
    FindDomain,
    AddAccount,
}

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub repo: Arc<Repository>,
    pub runner: BatchRunner,
    pub subscribers: Arc<SubscriberStore>,
    pub messenger: Arc<dyn MessagingPort>,
    pub scheduler: DailyScheduler,
    pub pending: Arc<Mutex<HashMap<i64, PendingInput>>>,
    pub chat_locks: Arc<ChatLocks>,
}

impl AppState {
    pub async fn set_pending(&self, chat_id: i64, input: PendingInput) {
        self.pending.lock().await.insert(chat_id, input);
    }

    pub async fn take_pending(&self, chat_id: i64) -> Option<PendingInput> {
        self.pending.lock().await.remove(&chat_id)
    }

    /// Send pre-split chunks in order; stops at the first failure.
    pub async fn send_chunks(&self, chat_id: i64, chunks: &[String]) {
        for chunk in chunks {
            if let Err(e) = self.messenger.send_text(ChatId(chat_id), chunk).await {
                tracing::warn!(chat_id, error = %e, "failed to send reply");
                return;
            }
        }
    }

    /// Send `text`, split on line boundaries when it exceeds the safe limit.
    pub async fn reply(&self, chat_id: i64, text: &str) {
        let chunks = handlers::split_reply(text, self.cfg.telegram_safe_limit);
        self.send_chunks(chat_id, &chunks).await;
    }
}

#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub async fn run_polling(
    cfg: Arc<Config>,
    repo: Arc<Repository>,
    runner: BatchRunner,
    subscribers: Arc<SubscriberStore>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "bot started"),
        Err(e) => tracing::warn!(error = %e, "get_me failed; continuing"),
    }
    tracing::info!(
        domains = repo.list_domains().len(),
        subscribers = subscribers.len(),
        store = %repo.path().display(),
        "state loaded"
    );

    // Throttle on top of the adapter; the adapter still retries once on 429.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(
        TelegramMessenger::new(bot.clone()).with_reply_menu(keyboards::MAIN_MENU),
    );
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let notifier = Notifier::new(
        repo.clone(),
        runner.clone(),
        subscribers.clone(),
        messenger.clone(),
        cfg.telegram_safe_limit,
    );
    let scheduler = DailyScheduler::new(cfg.daily_check_time, notifier);
    scheduler.start().await;

    let state = Arc::new(AppState {
        cfg,
        repo,
        runner,
        subscribers,
        messenger,
        scheduler: scheduler.clone(),
        pending: Arc::new(Mutex::new(HashMap::new())),
        chat_locks: Arc::new(ChatLocks::default()),
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    scheduler.stop().await;
    tracing::info!("bot stopped");
    Ok(())
}
