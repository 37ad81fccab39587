use crate::domain::Key;

/// Structured inline-button payload.
///
/// Targets are referenced by [`Key`], never by (possibly truncated) names, so
/// the encoded form stays well under Telegram's 64-byte callback limit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Callback {
    DeleteDomain(Key),
    RenameDomain(Key),
    SelectAccount(Key),
    /// Asks for confirmation; nothing is deleted yet.
    DeleteAccount(Key),
    ConfirmDeleteAccount(Key),
}

impl Callback {
    pub fn encode(&self) -> String {
        let (tag, key) = match self {
            Self::DeleteDomain(k) => ("del", k),
            Self::RenameDomain(k) => ("ren", k),
            Self::SelectAccount(k) => ("acc", k),
            Self::DeleteAccount(k) => ("dacc", k),
            Self::ConfirmDeleteAccount(k) => ("cdacc", k),
        };
        format!("{tag}:{key}")
    }

    pub fn parse(data: &str) -> Option<Self> {
        let (tag, raw) = data.split_once(':')?;
        let key = Key::parse(raw)?;
        match tag {
            "del" => Some(Self::DeleteDomain(key)),
            "ren" => Some(Self::RenameDomain(key)),
            "acc" => Some(Self::SelectAccount(key)),
            "dacc" => Some(Self::DeleteAccount(key)),
            "cdacc" => Some(Self::ConfirmDeleteAccount(key)),
            _ => None,
        }
    }
}

/// Inline keyboard (buttons under a message).
#[derive(Clone, Debug)]
pub struct InlineKeyboard {
    pub buttons: Vec<InlineButton>,
}

#[derive(Clone, Debug)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineKeyboard {
    pub fn new(buttons: Vec<InlineButton>) -> Self {
        Self { buttons }
    }

    /// One button per row. Labels are shortened for display only; the
    /// callback payload always carries the full key.
    pub fn one_per_row(items: Vec<(String, Callback)>, max_label_len: usize) -> Self {
        let buttons = items
            .into_iter()
            .map(|(label, cb)| {
                let label = if label.chars().count() > max_label_len {
                    format!("{}...", label.chars().take(max_label_len).collect::<String>())
                } else {
                    label
                };
                InlineButton {
                    label,
                    callback_data: cb.encode(),
                }
            })
            .collect();
        Self { buttons }
    }

    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }
}

/// Capabilities / feature flags of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub supports_edit: bool,
    pub supports_inline_keyboards: bool,
    pub max_message_len: usize,
}
