//! Shared fakes for unit tests.

use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::Mutex,
};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Local};

use crate::{
    checker::{ExpiryField, LookupError, WhoisRecord, WhoisSource},
    domain::{ChatId, MessageId, MessageRef},
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, MessagingCapabilities},
    },
    Error, Result,
};

/// Scratch directory under `/tmp`, removed with its contents on drop.
pub struct TempDir(PathBuf);

impl TempDir {
    pub fn new(prefix: &str) -> Self {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let dir = PathBuf::from(format!("/tmp/{prefix}-{}-{ts}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.0.join(name)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

/// Answers with an expiry `days` days from today; unknown domains fail.
#[derive(Default)]
pub struct FixedSource {
    pub days: HashMap<String, i64>,
}

impl FixedSource {
    pub fn with(entries: &[(&str, i64)]) -> Self {
        Self {
            days: entries
                .iter()
                .map(|(d, n)| (d.to_string(), *n))
                .collect(),
        }
    }
}

#[async_trait]
impl WhoisSource for FixedSource {
    async fn lookup(&self, domain: &str) -> std::result::Result<WhoisRecord, LookupError> {
        let Some(days) = self.days.get(domain) else {
            return Err(LookupError::Http(500));
        };
        // +1 so the floor lands on `days` whatever the time of day.
        let date = Local::now().date_naive() + ChronoDuration::days(days + 1);
        Ok(WhoisRecord {
            expiry: Some(ExpiryField::Single(date.format("%Y-%m-%d").to_string())),
            registrar: Some("TEST-REG".to_string()),
        })
    }
}

/// Records every outbound message; chats listed in `failing` reject sends.
#[derive(Default)]
pub struct FakeMessenger {
    pub sent: Mutex<Vec<(i64, String)>>,
    pub keyboards: Mutex<Vec<(i64, String, InlineKeyboard)>>,
    pub edits: Mutex<Vec<(MessageRef, String)>>,
    pub answers: Mutex<Vec<(String, Option<String>)>>,
    pub failing: Vec<i64>,
}

impl FakeMessenger {
    pub fn failing_for(chats: &[i64]) -> Self {
        Self {
            failing: chats.to_vec(),
            ..Default::default()
        }
    }

    pub fn texts_for(&self, chat_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == chat_id)
            .map(|(_, t)| t.clone())
            .collect()
    }

    fn next_ref(&self, chat_id: ChatId) -> MessageRef {
        let n = self.sent.lock().unwrap().len() + self.keyboards.lock().unwrap().len();
        MessageRef {
            chat_id,
            message_id: MessageId(n as i32 + 1),
        }
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_edit: true,
            supports_inline_keyboards: true,
            max_message_len: 4096,
        }
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        if self.failing.contains(&chat_id.0) {
            return Err(Error::External("Forbidden: bot was blocked by the user".into()));
        }
        let r = self.next_ref(chat_id);
        self.sent.lock().unwrap().push((chat_id.0, text.to_string()));
        Ok(r)
    }

    async fn send_with_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        let r = self.next_ref(chat_id);
        self.keyboards
            .lock()
            .unwrap()
            .push((chat_id.0, text.to_string(), keyboard));
        Ok(r)
    }

    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<()> {
        self.edits.lock().unwrap().push((msg, text.to_string()));
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.answers
            .lock()
            .unwrap()
            .push((callback_id.to_string(), text.map(str::to_string)));
        Ok(())
    }
}
