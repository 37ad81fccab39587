//! Chats that receive the daily digest.
//!
//! Persisted as `{"users": [chat_id, ...]}`. Loaded once at startup and
//! rewritten whenever a new chat appears.

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::{Deserialize, Serialize};

use crate::Result;

#[derive(Debug, Default, Serialize, Deserialize)]
struct UsersFile {
    #[serde(default)]
    users: Vec<i64>,
}

pub struct SubscriberStore {
    path: PathBuf,
    users: Mutex<BTreeSet<i64>>,
}

impl SubscriberStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let users = load_users(&path);
        tracing::info!(path = %path.display(), count = users.len(), "subscribers loaded");
        Self {
            path,
            users: Mutex::new(users),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Subscribe a chat. Returns `true` when the chat is new.
    ///
    /// The in-memory set keeps the chat even if persisting fails.
    pub fn add(&self, chat_id: i64) -> Result<bool> {
        let snapshot = {
            let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
            if !users.insert(chat_id) {
                return Ok(false);
            }
            users.iter().copied().collect::<Vec<_>>()
        };

        tracing::info!(chat_id, "new subscriber");
        self.save(snapshot)?;
        Ok(true)
    }

    /// All subscribed chats, ascending.
    pub fn list(&self) -> Vec<i64> {
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        users.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.users.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn save(&self, users: Vec<i64>) -> Result<()> {
        let txt = serde_json::to_string_pretty(&UsersFile { users })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, txt)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn load_users(path: &Path) -> BTreeSet<i64> {
    let txt = match fs::read_to_string(path) {
        Ok(v) => v,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeSet::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read subscribers; starting empty");
            return BTreeSet::new();
        }
    };
    if txt.trim().is_empty() {
        return BTreeSet::new();
    }
    match serde_json::from_str::<UsersFile>(&txt) {
        Ok(file) => file.users.into_iter().collect(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "subscribers file is corrupt; starting empty");
            BTreeSet::new()
        }
    }
}
