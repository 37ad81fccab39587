use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, MessageRef},
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, MessagingCapabilities},
    },
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between any two Bot API calls.
    pub global_min_interval: Duration,
    /// Minimum spacing between calls to the same chat.
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40),     // ~25/sec
            per_chat_min_interval: Duration::from_millis(1050), // ~0.95/sec
        }
    }
}

/// Next free send instant, globally and per chat.
#[derive(Debug)]
struct Slots {
    global_next: Instant,
    chat_next: HashMap<i64, Instant>,
}

impl Slots {
    /// Book the earliest slot satisfying both spacings; returns the wait until it.
    fn book(&mut self, cfg: &ThrottleConfig, chat: Option<i64>) -> Duration {
        let now = Instant::now();
        let mut at = self.global_next.max(now);
        if let Some(chat) = chat {
            if let Some(next) = self.chat_next.get(&chat) {
                at = at.max(*next);
            }
            self.chat_next.insert(chat, at + cfg.per_chat_min_interval);
        }
        self.global_next = at + cfg.global_min_interval;
        at.saturating_duration_since(now)
    }
}

/// MessagingPort decorator that spaces out outbound calls.
///
/// The daily digest fans out chunked messages to every subscriber at once;
/// this keeps that burst under Telegram's flood limits. Best effort: a 429
/// can still happen and is handled by the transport's retry.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    slots: Mutex<Slots>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            slots: Mutex::new(Slots {
                global_next: Instant::now(),
                chat_next: HashMap::new(),
            }),
        }
    }

    async fn wait_turn(&self, chat: Option<i64>) {
        let wait = self.slots.lock().await.book(&self.cfg, chat);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    async fn throttle_chat(&self, chat_id: i64) {
        self.wait_turn(Some(chat_id)).await;
    }

    async fn throttle_global(&self) {
        self.wait_turn(None).await;
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        self.inner.capabilities()
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        self.throttle_chat(chat_id.0).await;
        self.inner.send_text(chat_id, text).await
    }

    async fn send_with_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        self.throttle_chat(chat_id.0).await;
        self.inner.send_with_keyboard(chat_id, text, keyboard).await
    }

    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<()> {
        self.throttle_chat(msg.chat_id.0).await;
        self.inner.edit_text(msg, text).await
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        // No chat id on callback answers; global spacing only.
        self.throttle_global().await;
        self.inner.answer_callback(callback_id, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageId;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Recorder {
        sent: StdMutex<Vec<(i64, String, std::time::Instant)>>,
    }

    #[async_trait::async_trait]
    impl MessagingPort for Recorder {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities {
                supports_edit: true,
                supports_inline_keyboards: true,
                max_message_len: 4096,
            }
        }

        async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
            let mut sent = self.sent.lock().unwrap();
            sent.push((chat_id.0, text.to_string(), std::time::Instant::now()));
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(sent.len() as i32),
            })
        }

        async fn send_with_keyboard(
            &self,
            chat_id: ChatId,
            text: &str,
            _keyboard: InlineKeyboard,
        ) -> Result<MessageRef> {
            self.send_text(chat_id, text).await
        }

        async fn edit_text(&self, _msg: MessageRef, _text: &str) -> Result<()> {
            Ok(())
        }

        async fn answer_callback(&self, _callback_id: &str, _text: Option<&str>) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn spaces_calls_to_the_same_chat() {
        let inner = Arc::new(Recorder::default());
        let throttled = ThrottledMessenger::new(
            inner.clone(),
            ThrottleConfig {
                global_min_interval: Duration::from_millis(1),
                per_chat_min_interval: Duration::from_millis(50),
            },
        );

        throttled.send_text(ChatId(1), "one").await.unwrap();
        throttled.send_text(ChatId(1), "two").await.unwrap();
        throttled.send_text(ChatId(2), "other").await.unwrap();

        let sent = inner.sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].1, "one");
        assert_eq!(sent[1].1, "two");
        let gap = sent[1].2.duration_since(sent[0].2);
        assert!(gap >= Duration::from_millis(45), "gap was {gap:?}");
        // Another chat is not held back by chat 1's spacing.
        let other_gap = sent[2].2.duration_since(sent[1].2);
        assert!(other_gap < Duration::from_millis(45), "gap was {other_gap:?}");
    }
}
