use dwb_core::{
    messaging::types::{Callback, InlineKeyboard},
    repository::Repository,
};

pub const BTN_CHECK_ALL: &str = "🔄 Check all";
pub const BTN_EXPIRING: &str = "⚠️ Expiring";
pub const BTN_LIST: &str = "📋 List";
pub const BTN_CHECK_ONE: &str = "🔎 Check one";
pub const BTN_ADD: &str = "➕ Add";
pub const BTN_REMOVE: &str = "➖ Remove";
pub const BTN_RENAME: &str = "✏️ Rename";
pub const BTN_FIND: &str = "🔍 Find";
pub const BTN_ACCOUNTS: &str = "👤 Accounts";
pub const BTN_STATS: &str = "📊 Stats";
pub const BTN_HELP: &str = "❓ Help";
pub const BTN_CANCEL: &str = "❌ Cancel";

pub const MAIN_MENU: &[&[&str]] = &[
    &[BTN_CHECK_ALL, BTN_EXPIRING],
    &[BTN_LIST, BTN_CHECK_ONE],
    &[BTN_ADD, BTN_REMOVE],
    &[BTN_RENAME, BTN_FIND],
    &[BTN_ACCOUNTS, BTN_STATS],
    &[BTN_HELP, BTN_CANCEL],
];

/// Inline button labels are cut to this many characters.
const MAX_LABEL_LEN: usize = 40;

/// Most inline buttons put under one message; Telegram rejects oversized
/// markup, so longer lists are sent as several pages.
pub const MAX_BUTTONS_PER_MESSAGE: usize = 40;

/// One user action, whether it came from a menu button or a slash command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    CheckAll,
    Expiring,
    List,
    CheckOne,
    Add,
    Remove,
    Rename,
    Find,
    Accounts,
    AddAccount,
    RemoveAccount,
    Stats,
    Help,
    Cancel,
}

impl Intent {
    pub fn from_button(text: &str) -> Option<Self> {
        let intent = match text.trim() {
            BTN_CHECK_ALL => Self::CheckAll,
            BTN_EXPIRING => Self::Expiring,
            BTN_LIST => Self::List,
            BTN_CHECK_ONE => Self::CheckOne,
            BTN_ADD => Self::Add,
            BTN_REMOVE => Self::Remove,
            BTN_RENAME => Self::Rename,
            BTN_FIND => Self::Find,
            BTN_ACCOUNTS => Self::Accounts,
            BTN_STATS => Self::Stats,
            BTN_HELP => Self::Help,
            BTN_CANCEL => Self::Cancel,
            _ => return None,
        };
        Some(intent)
    }

    pub fn from_command(cmd: &str) -> Option<Self> {
        let intent = match cmd {
            "check" | "checkall" => Self::CheckAll,
            "expiring" => Self::Expiring,
            "list" => Self::List,
            "checkone" | "whois" => Self::CheckOne,
            "add" => Self::Add,
            "remove" | "delete" => Self::Remove,
            "rename" => Self::Rename,
            "find" | "search" => Self::Find,
            "accounts" => Self::Accounts,
            "addaccount" => Self::AddAccount,
            "removeaccount" => Self::RemoveAccount,
            "stats" => Self::Stats,
            "help" => Self::Help,
            "cancel" => Self::Cancel,
            _ => return None,
        };
        Some(intent)
    }
}

pub fn remove_keyboard(domains: &[String]) -> InlineKeyboard {
    domain_keyboard(domains, "❌", Callback::DeleteDomain)
}

pub fn rename_keyboard(domains: &[String]) -> InlineKeyboard {
    domain_keyboard(domains, "✏️", Callback::RenameDomain)
}

pub fn select_account_keyboard(accounts: &[String]) -> InlineKeyboard {
    InlineKeyboard::one_per_row(
        accounts
            .iter()
            .map(|a| (format!("👤 {a}"), Callback::SelectAccount(Repository::account_key(a))))
            .collect(),
        MAX_LABEL_LEN,
    )
}

pub fn delete_account_keyboard(accounts: &[String]) -> InlineKeyboard {
    InlineKeyboard::one_per_row(
        accounts
            .iter()
            .map(|a| (format!("🗑 {a}"), Callback::DeleteAccount(Repository::account_key(a))))
            .collect(),
        MAX_LABEL_LEN,
    )
}

pub fn confirm_delete_account_keyboard(account: &str) -> InlineKeyboard {
    InlineKeyboard::one_per_row(
        vec![(
            format!("🗑 Yes, delete {account}"),
            Callback::ConfirmDeleteAccount(Repository::account_key(account)),
        )],
        MAX_LABEL_LEN,
    )
}

fn domain_keyboard(
    domains: &[String],
    icon: &str,
    make: fn(dwb_core::domain::Key) -> Callback,
) -> InlineKeyboard {
    InlineKeyboard::one_per_row(
        domains
            .iter()
            .map(|d| (format!("{icon} {d}"), make(Repository::domain_key(d))))
            .collect(),
        MAX_LABEL_LEN,
    )
}
