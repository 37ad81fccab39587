use std::fmt;

use sha2::{Digest, Sha256};

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Number of digest bytes kept in a [`Key`] (24 hex chars).
const KEY_BYTES: usize = 12;

/// Opaque, fixed-width identifier for a domain or account.
///
/// Derived from the normalized name, so it is stable across reloads and fits
/// in Telegram callback data no matter how long the name is.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Key(String);

impl Key {
    /// Key of an already-normalized name.
    pub fn of(normalized: &str) -> Self {
        let mut h = Sha256::new();
        h.update(normalized.as_bytes());
        let digest = h.finalize();
        Self(hex_prefix(&digest, KEY_BYTES))
    }

    /// Parse a key received from the outside world (callback data).
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.len() != KEY_BYTES * 2 || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn hex_prefix(bytes: &[u8], len: usize) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(len * 2);
    for b in bytes.iter().take(len) {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
