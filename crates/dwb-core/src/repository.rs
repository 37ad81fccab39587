//! JSON-backed domain/account store.
//!
//! Every operation reloads the backing file and persists after a mutation, so
//! the file is the only source of truth. An internal lock serializes
//! read-modify-write cycles within the process; there is no cross-process
//! locking.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::domain::Key;

// ============== Public types ==============

/// On-disk shape of the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreLayout {
    /// `{ "domains": [...] }`
    Flat,
    /// `{ "accounts": { id: [...] } }`
    Grouped,
}

impl StoreLayout {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "flat" => Some(Self::Flat),
            "grouped" | "accounts" => Some(Self::Grouped),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepoErrorKind {
    /// Malformed domain or account string.
    Validation,
    /// Domain or account already present.
    Duplicate,
    /// Referenced domain or account is absent.
    NotFound,
    /// Add requested with no account to attach to.
    NoAccount,
    /// The backing file could not be written.
    Storage,
}

/// Failed repository operation. `message` is meant to be shown verbatim.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RepoError {
    pub kind: RepoErrorKind,
    pub message: String,
}

impl RepoError {
    fn new(kind: RepoErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Successful mutation, with a confirmation to show the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Confirmation {
    pub message: String,
}

impl Confirmation {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type RepoResult = std::result::Result<Confirmation, RepoError>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchHit {
    pub domain: String,
    pub account: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RepoStats {
    pub account_count: usize,
    pub domain_count: usize,
    pub per_account: Vec<(String, usize)>,
}

// ============== Persisted state ==============

#[derive(Clone, Debug, PartialEq, Eq)]
struct AccountEntry {
    id: String,
    domains: Vec<String>,
}

/// Accounts in insertion order, (de)serialized as a JSON object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Accounts(Vec<AccountEntry>);

impl Serialize for Accounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for acc in &self.0 {
            map.serialize_entry(&acc.id, &acc.domains)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Accounts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct AccountsVisitor;

        impl<'de> Visitor<'de> for AccountsVisitor {
            type Value = Accounts;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of account id to domain list")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut out = Vec::new();
                while let Some((id, domains)) = access.next_entry::<String, Vec<String>>()? {
                    out.push(AccountEntry { id, domains });
                }
                Ok(Accounts(out))
            }
        }

        deserializer.deserialize_map(AccountsVisitor)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StoreFile {
    Grouped { accounts: Accounts },
    Flat { domains: Vec<String> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum State {
    Flat(Vec<String>),
    Grouped(Vec<AccountEntry>),
}

impl State {
    fn empty(layout: StoreLayout) -> Self {
        match layout {
            StoreLayout::Flat => Self::Flat(Vec::new()),
            StoreLayout::Grouped => Self::Grouped(Vec::new()),
        }
    }

    /// `(domain, owner)` pairs in iteration order.
    fn entries(&self) -> Vec<(&str, Option<&str>)> {
        match self {
            Self::Flat(domains) => domains.iter().map(|d| (d.as_str(), None)).collect(),
            Self::Grouped(accounts) => accounts
                .iter()
                .flat_map(|a| a.domains.iter().map(|d| (d.as_str(), Some(a.id.as_str()))))
                .collect(),
        }
    }

    fn contains(&self, domain: &str) -> bool {
        self.entries().iter().any(|(d, _)| d.eq_ignore_ascii_case(domain))
    }

    fn owner_of(&self, domain: &str) -> Option<String> {
        self.entries()
            .into_iter()
            .find(|(d, _)| d.eq_ignore_ascii_case(domain))
            .and_then(|(_, owner)| owner.map(str::to_string))
    }

    fn account_index(&self, id: &str) -> Option<usize> {
        match self {
            Self::Flat(_) => None,
            Self::Grouped(accounts) => accounts.iter().position(|a| same_account(&a.id, id)),
        }
    }

    fn from_file(file: StoreFile) -> Self {
        let mut seen: Vec<String> = Vec::new();
        let mut keep = |raw: String| -> Option<String> {
            let d = normalize_domain(&raw);
            if d.is_empty() || seen.contains(&d) {
                tracing::warn!(domain = %raw, "dropping empty or duplicate domain from store");
                return None;
            }
            seen.push(d.clone());
            Some(d)
        };

        match file {
            StoreFile::Flat { domains } => Self::Flat(domains.into_iter().filter_map(&mut keep).collect()),
            StoreFile::Grouped { accounts } => {
                let mut out: Vec<AccountEntry> = Vec::new();
                for acc in accounts.0 {
                    let id = acc.id.trim().to_string();
                    let domains: Vec<String> =
                        acc.domains.into_iter().filter_map(&mut keep).collect();
                    if let Some(existing) = out.iter_mut().find(|a| same_account(&a.id, &id)) {
                        existing.domains.extend(domains);
                    } else {
                        out.push(AccountEntry { id, domains });
                    }
                }
                Self::Grouped(out)
            }
        }
    }

    fn to_file(&self) -> StoreFile {
        match self {
            Self::Flat(domains) => StoreFile::Flat {
                domains: domains.clone(),
            },
            Self::Grouped(accounts) => StoreFile::Grouped {
                accounts: Accounts(accounts.clone()),
            },
        }
    }
}

// ============== Repository ==============

/// Domain/account repository backed by a single JSON file.
///
/// Constructed once at startup and shared (`Arc<Repository>`).
#[derive(Debug)]
pub struct Repository {
    path: PathBuf,
    default_layout: StoreLayout,
    io_lock: Mutex<()>,
}

impl Repository {
    pub fn new(path: impl Into<PathBuf>, default_layout: StoreLayout) -> Self {
        Self {
            path: path.into(),
            default_layout,
            io_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Layout of the store as it currently exists on disk.
    pub fn layout(&self) -> StoreLayout {
        let _guard = self.lock();
        match self.load() {
            State::Flat(_) => StoreLayout::Flat,
            State::Grouped(_) => StoreLayout::Grouped,
        }
    }

    /// All domains, flattened across accounts in insertion order.
    pub fn list_domains(&self) -> Vec<String> {
        let _guard = self.lock();
        self.load()
            .entries()
            .into_iter()
            .map(|(d, _)| d.to_string())
            .collect()
    }

    pub fn list_accounts(&self) -> Vec<String> {
        let _guard = self.lock();
        match self.load() {
            State::Flat(_) => Vec::new(),
            State::Grouped(accounts) => accounts.into_iter().map(|a| a.id).collect(),
        }
    }

    pub fn account_domains(&self, account: &str) -> Option<Vec<String>> {
        let _guard = self.lock();
        match self.load() {
            State::Flat(_) => None,
            State::Grouped(accounts) => accounts
                .into_iter()
                .find(|a| same_account(&a.id, account))
                .map(|a| a.domains),
        }
    }

    /// First account whose list contains `domain` (case-insensitive).
    pub fn find_owner(&self, domain: &str) -> Option<String> {
        let _guard = self.lock();
        self.load().owner_of(&normalize_domain(domain))
    }

    /// Case-insensitive substring search across every domain.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let _guard = self.lock();
        self.load()
            .entries()
            .into_iter()
            .filter(|(d, _)| d.contains(&needle))
            .map(|(d, owner)| SearchHit {
                domain: d.to_string(),
                account: owner.map(str::to_string),
            })
            .collect()
    }

    pub fn add(&self, domain: &str, account: Option<&str>) -> RepoResult {
        let domain = normalize_domain(domain);
        if !is_valid_domain(&domain) {
            return Err(RepoError::new(
                RepoErrorKind::Validation,
                format!("Invalid domain format: '{domain}'"),
            ));
        }

        let _guard = self.lock();
        let mut state = self.load();

        if state.contains(&domain) {
            return Err(duplicate_domain(&domain, state.owner_of(&domain)));
        }

        let message = match &mut state {
            State::Flat(domains) => {
                domains.push(domain.clone());
                format!("Domain {domain} added")
            }
            State::Grouped(accounts) => {
                let idx = match account.map(str::trim).filter(|a| !a.is_empty()) {
                    Some(id) => accounts
                        .iter()
                        .position(|a| same_account(&a.id, id))
                        .ok_or_else(|| account_not_found(id))?,
                    None if accounts.is_empty() => {
                        return Err(RepoError::new(
                            RepoErrorKind::NoAccount,
                            "No accounts yet. Add an account first",
                        ))
                    }
                    None => 0,
                };
                let acc = &mut accounts[idx];
                acc.domains.push(domain.clone());
                format!("Domain {domain} added to account {}", acc.id)
            }
        };

        self.save(&state)?;
        tracing::info!(domain = %domain, "domain added");
        Ok(Confirmation::new(message))
    }

    pub fn remove(&self, domain: &str) -> RepoResult {
        let domain = normalize_domain(domain);

        let _guard = self.lock();
        let mut state = self.load();

        let message = match &mut state {
            State::Flat(domains) => {
                let idx = domains
                    .iter()
                    .position(|d| d.eq_ignore_ascii_case(&domain))
                    .ok_or_else(|| domain_not_found(&domain))?;
                domains.remove(idx);
                format!("Domain {domain} removed ({} left)", domains.len())
            }
            State::Grouped(accounts) => {
                let (acc, idx) = accounts
                    .iter_mut()
                    .find_map(|a| {
                        let idx = a.domains.iter().position(|d| d.eq_ignore_ascii_case(&domain))?;
                        Some((a, idx))
                    })
                    .ok_or_else(|| domain_not_found(&domain))?;
                acc.domains.remove(idx);
                format!(
                    "Domain {domain} removed from account {} ({} left)",
                    acc.id,
                    acc.domains.len()
                )
            }
        };

        self.save(&state)?;
        tracing::info!(domain = %domain, "domain removed");
        Ok(Confirmation::new(message))
    }

    /// Rename in place; the new name takes the old one's position.
    pub fn rename(&self, old_domain: &str, new_domain: &str) -> RepoResult {
        let old_domain = normalize_domain(old_domain);
        let new_domain = normalize_domain(new_domain);

        if !is_valid_domain(&new_domain) {
            return Err(RepoError::new(
                RepoErrorKind::Validation,
                format!("Invalid format for new domain: '{new_domain}'"),
            ));
        }

        let _guard = self.lock();
        let mut state = self.load();

        if !state.contains(&old_domain) {
            return Err(domain_not_found(&old_domain));
        }
        if state.contains(&new_domain) {
            return Err(duplicate_domain(&new_domain, state.owner_of(&new_domain)));
        }

        let slot = match &mut state {
            State::Flat(domains) => domains.iter_mut().find(|d| d.eq_ignore_ascii_case(&old_domain)),
            State::Grouped(accounts) => accounts
                .iter_mut()
                .flat_map(|a| a.domains.iter_mut())
                .find(|d| d.eq_ignore_ascii_case(&old_domain)),
        };
        if let Some(slot) = slot {
            *slot = new_domain.clone();
        }

        self.save(&state)?;
        tracing::info!(from = %old_domain, to = %new_domain, "domain renamed");
        Ok(Confirmation::new(format!(
            "Domain {old_domain} renamed to {new_domain}"
        )))
    }

    /// Add an account. On a flat store the first account adopts the existing
    /// domains and the store becomes grouped.
    pub fn add_account(&self, id: &str) -> RepoResult {
        let id = id.trim();
        if id.is_empty() {
            return Err(RepoError::new(
                RepoErrorKind::Validation,
                "Account name must not be empty",
            ));
        }

        let _guard = self.lock();
        let mut state = self.load();

        if state.account_index(id).is_some() {
            return Err(RepoError::new(
                RepoErrorKind::Duplicate,
                format!("Account {id} already exists"),
            ));
        }

        let message = match &mut state {
            State::Flat(domains) => {
                let domains = std::mem::take(domains);
                let adopted = domains.len();
                state = State::Grouped(vec![AccountEntry {
                    id: id.to_string(),
                    domains,
                }]);
                tracing::info!(account = %id, adopted, "converted flat store to accounts");
                format!("Account {id} added ({adopted} existing domain(s) moved to it)")
            }
            State::Grouped(accounts) => {
                accounts.push(AccountEntry {
                    id: id.to_string(),
                    domains: Vec::new(),
                });
                format!("Account {id} added")
            }
        };

        self.save(&state)?;
        tracing::info!(account = %id, "account added");
        Ok(Confirmation::new(message))
    }

    /// Remove an account together with every domain it owns.
    pub fn remove_account(&self, id: &str) -> RepoResult {
        let id = id.trim();

        let _guard = self.lock();
        let mut state = self.load();

        let idx = state.account_index(id).ok_or_else(|| account_not_found(id))?;
        let removed = match &mut state {
            State::Grouped(accounts) => accounts.remove(idx),
            State::Flat(_) => return Err(account_not_found(id)),
        };

        self.save(&state)?;
        tracing::info!(account = %removed.id, domains = removed.domains.len(), "account removed");
        Ok(Confirmation::new(format!(
            "Account {} removed along with {} domain(s)",
            removed.id,
            removed.domains.len()
        )))
    }

    pub fn stats(&self) -> RepoStats {
        let _guard = self.lock();
        match self.load() {
            State::Flat(domains) => RepoStats {
                account_count: 0,
                domain_count: domains.len(),
                per_account: Vec::new(),
            },
            State::Grouped(accounts) => RepoStats {
                account_count: accounts.len(),
                domain_count: accounts.iter().map(|a| a.domains.len()).sum(),
                per_account: accounts
                    .iter()
                    .map(|a| (a.id.clone(), a.domains.len()))
                    .collect(),
            },
        }
    }

    // ---- stable keys ----

    pub fn domain_key(domain: &str) -> Key {
        Key::of(&normalize_domain(domain))
    }

    pub fn account_key(account: &str) -> Key {
        Key::of(&account.trim().to_lowercase())
    }

    /// Current domain whose key matches, if exactly one does.
    pub fn resolve_domain(&self, key: &Key) -> Option<String> {
        let _guard = self.lock();
        let state = self.load();
        let mut hits = state
            .entries()
            .into_iter()
            .filter(|(d, _)| &Self::domain_key(d) == key)
            .map(|(d, _)| d.to_string());
        let first = hits.next()?;
        if hits.next().is_some() {
            tracing::warn!(key = %key, "domain key is ambiguous");
            return None;
        }
        Some(first)
    }

    /// Current account whose key matches, if exactly one does.
    pub fn resolve_account(&self, key: &Key) -> Option<String> {
        let _guard = self.lock();
        let State::Grouped(accounts) = self.load() else {
            return None;
        };
        let mut hits = accounts
            .into_iter()
            .filter(|a| &Self::account_key(&a.id) == key)
            .map(|a| a.id);
        let first = hits.next()?;
        if hits.next().is_some() {
            tracing::warn!(key = %key, "account key is ambiguous");
            return None;
        }
        Some(first)
    }

    // ---- storage ----

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.io_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn load(&self) -> State {
        if !self.path.exists() {
            let state = State::empty(self.default_layout);
            if let Err(e) = self.save(&state) {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to create store file");
            }
            return state;
        }

        let txt = match fs::read_to_string(&self.path) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read store; using empty state");
                return State::empty(self.default_layout);
            }
        };
        if txt.trim().is_empty() {
            return State::empty(self.default_layout);
        }

        match serde_json::from_str::<StoreFile>(&txt) {
            Ok(file) => State::from_file(file),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "store file is corrupt; using empty state (next write will overwrite it)"
                );
                State::empty(self.default_layout)
            }
        }
    }

    fn save(&self, state: &State) -> std::result::Result<(), RepoError> {
        let txt =
            serde_json::to_string_pretty(&state.to_file()).map_err(|e| self.storage_error(e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.storage_error(e))?;
        }

        // Write-then-rename so a crash never leaves a half-written store.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, txt).map_err(|e| self.storage_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.storage_error(e))?;
        Ok(())
    }

    fn storage_error(&self, e: impl fmt::Display) -> RepoError {
        tracing::error!(path = %self.path.display(), error = %e, "failed to write store");
        RepoError::new(
            RepoErrorKind::Storage,
            format!("Failed to save domain list: {e}"),
        )
    }
}

// ============== Helpers ==============

/// Lowercase + trim; the only normalization applied to domain names.
pub fn normalize_domain(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// A domain is valid when it contains at least one `.` and only letters
/// (IDN included), digits, `-` and `.`.
pub fn is_valid_domain(normalized: &str) -> bool {
    normalized.contains('.')
        && normalized
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '.')
}

/// Same normalization as [`Repository::account_key`], so two ids that compare
/// equal always share a key and vice versa.
fn same_account(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn duplicate_domain(domain: &str, owner: Option<String>) -> RepoError {
    let message = match owner {
        Some(acc) => format!("Domain {domain} already exists (account {acc})"),
        None => format!("Domain {domain} already exists"),
    };
    RepoError::new(RepoErrorKind::Duplicate, message)
}

fn domain_not_found(domain: &str) -> RepoError {
    RepoError::new(RepoErrorKind::NotFound, format!("Domain {domain} not found"))
}

fn account_not_found(id: &str) -> RepoError {
    RepoError::new(RepoErrorKind::NotFound, format!("Account {id} not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TempDir;

    fn flat(prefix: &str) -> (Repository, TempDir) {
        let dir = TempDir::new(prefix);
        (Repository::new(dir.file("domains.json"), StoreLayout::Flat), dir)
    }

    fn grouped(prefix: &str) -> (Repository, TempDir) {
        let dir = TempDir::new(prefix);
        (Repository::new(dir.file("domains.json"), StoreLayout::Grouped), dir)
    }

    #[test]
    fn add_then_list_then_duplicate() {
        let (repo, _dir) = flat("dwb-repo-add");
        let ok = repo.add("example.com", None).unwrap();
        assert!(ok.message.contains("example.com"));
        assert_eq!(repo.list_domains(), vec!["example.com".to_string()]);

        let err = repo.add("example.com", None).unwrap_err();
        assert_eq!(err.kind, RepoErrorKind::Duplicate);
        assert!(err.message.contains("already exists"));
        assert_eq!(repo.list_domains(), vec!["example.com".to_string()]);
    }

    #[test]
    fn add_normalizes_and_dedupes_case_insensitively() {
        let (repo, _dir) = flat("dwb-repo-norm");
        repo.add("  Example.COM ", None).unwrap();
        assert_eq!(repo.list_domains(), vec!["example.com".to_string()]);
        let err = repo.add("EXAMPLE.com", None).unwrap_err();
        assert_eq!(err.kind, RepoErrorKind::Duplicate);
    }

    #[test]
    fn add_without_dot_is_rejected_and_store_stays_empty() {
        let (repo, _dir) = flat("dwb-repo-bad");
        let err = repo.add("bad", None).unwrap_err();
        assert_eq!(err.kind, RepoErrorKind::Validation);
        assert!(err.message.contains("format"));
        assert!(repo.list_domains().is_empty());

        assert_eq!(
            repo.add("   ", None).unwrap_err().kind,
            RepoErrorKind::Validation
        );
    }

    #[test]
    fn rename_keeps_position() {
        let (repo, _dir) = flat("dwb-repo-rename");
        for d in ["a.com", "b.com", "c.com"] {
            repo.add(d, None).unwrap();
        }
        repo.rename("b.com", "bb.org").unwrap();
        assert_eq!(
            repo.list_domains(),
            vec!["a.com".to_string(), "bb.org".to_string(), "c.com".to_string()]
        );
    }

    #[test]
    fn rename_failures() {
        let (repo, _dir) = flat("dwb-repo-rename-err");
        repo.add("a.com", None).unwrap();
        repo.add("b.com", None).unwrap();

        assert_eq!(
            repo.rename("a.com", "nodot").unwrap_err().kind,
            RepoErrorKind::Validation
        );
        assert_eq!(
            repo.rename("zzz.com", "new.com").unwrap_err().kind,
            RepoErrorKind::NotFound
        );
        assert_eq!(
            repo.rename("a.com", "B.COM").unwrap_err().kind,
            RepoErrorKind::Duplicate
        );
        assert_eq!(
            repo.list_domains(),
            vec!["a.com".to_string(), "b.com".to_string()]
        );
    }

    #[test]
    fn remove_absent_leaves_list_unchanged() {
        let (repo, _dir) = flat("dwb-repo-remove");
        repo.add("a.com", None).unwrap();
        let err = repo.remove("missing.com").unwrap_err();
        assert_eq!(err.kind, RepoErrorKind::NotFound);
        assert_eq!(repo.list_domains(), vec!["a.com".to_string()]);

        let ok = repo.remove("A.com").unwrap();
        assert!(ok.message.contains("0 left"));
        assert!(repo.list_domains().is_empty());
    }

    #[test]
    fn grouped_add_requires_an_account() {
        let (repo, _dir) = grouped("dwb-repo-noacc");
        let err = repo.add("example.com", None).unwrap_err();
        assert_eq!(err.kind, RepoErrorKind::NoAccount);

        repo.add_account("ops@example.com").unwrap();
        repo.add_account("dev@example.com").unwrap();
        let ok = repo.add("example.com", None).unwrap();
        assert!(ok.message.contains("ops@example.com"));

        let err = repo.add("other.com", Some("nobody@example.com")).unwrap_err();
        assert_eq!(err.kind, RepoErrorKind::NotFound);

        repo.add("other.com", Some("DEV@example.com")).unwrap();
        assert_eq!(repo.find_owner("OTHER.com").as_deref(), Some("dev@example.com"));
    }

    #[test]
    fn grouped_duplicate_names_owner() {
        let (repo, _dir) = grouped("dwb-repo-dup-owner");
        repo.add_account("first").unwrap();
        repo.add_account("second").unwrap();
        repo.add("shared.com", Some("first")).unwrap();
        let err = repo.add("shared.com", Some("second")).unwrap_err();
        assert_eq!(err.kind, RepoErrorKind::Duplicate);
        assert!(err.message.contains("first"));
    }

    #[test]
    fn list_flattens_accounts_in_insertion_order() {
        let (repo, _dir) = grouped("dwb-repo-order");
        repo.add_account("zeta").unwrap();
        repo.add_account("alpha").unwrap();
        repo.add("z1.com", Some("zeta")).unwrap();
        repo.add("a1.com", Some("alpha")).unwrap();
        repo.add("z2.com", Some("zeta")).unwrap();

        assert_eq!(
            repo.list_domains(),
            vec!["z1.com".to_string(), "z2.com".to_string(), "a1.com".to_string()]
        );
        assert_eq!(
            repo.list_accounts(),
            vec!["zeta".to_string(), "alpha".to_string()]
        );

        // Order survives the round trip through the file.
        let reopened = Repository::new(repo.path().to_path_buf(), StoreLayout::Flat);
        assert_eq!(reopened.list_accounts(), repo.list_accounts());
        assert_eq!(reopened.layout(), StoreLayout::Grouped);
    }

    #[test]
    fn search_is_substring_and_case_insensitive() {
        let (repo, _dir) = grouped("dwb-repo-search");
        repo.add_account("a").unwrap();
        repo.add_account("b").unwrap();
        repo.add("shop.example.com", Some("a")).unwrap();
        repo.add("blog.test.org", Some("a")).unwrap();
        repo.add("example.net", Some("b")).unwrap();

        let hits = repo.search("EXAMPLE");
        assert_eq!(
            hits,
            vec![
                SearchHit {
                    domain: "shop.example.com".to_string(),
                    account: Some("a".to_string())
                },
                SearchHit {
                    domain: "example.net".to_string(),
                    account: Some("b".to_string())
                },
            ]
        );
        assert!(repo.search("  ").is_empty());
        assert!(repo.search("nomatch").is_empty());
    }

    #[test]
    fn remove_account_cascades() {
        let (repo, _dir) = grouped("dwb-repo-cascade");
        repo.add_account("a").unwrap();
        repo.add_account("b").unwrap();
        repo.add("one.com", Some("a")).unwrap();
        repo.add("two.com", Some("a")).unwrap();
        repo.add("three.com", Some("b")).unwrap();

        let ok = repo.remove_account("A").unwrap();
        assert!(ok.message.contains("2 domain(s)"));
        assert_eq!(repo.list_domains(), vec!["three.com".to_string()]);
        assert_eq!(
            repo.remove_account("a").unwrap_err().kind,
            RepoErrorKind::NotFound
        );
        assert_eq!(
            repo.add_account("b").unwrap_err().kind,
            RepoErrorKind::Duplicate
        );
    }

    #[test]
    fn remove_reports_remaining_for_account() {
        let (repo, _dir) = grouped("dwb-repo-remaining");
        repo.add_account("a").unwrap();
        repo.add("one.com", Some("a")).unwrap();
        repo.add("two.com", Some("a")).unwrap();
        let ok = repo.remove("one.com").unwrap();
        assert!(ok.message.contains("account a"));
        assert!(ok.message.contains("1 left"));
    }

    #[test]
    fn first_account_adopts_flat_domains() {
        let (repo, _dir) = flat("dwb-repo-migrate");
        repo.add("a.com", None).unwrap();
        repo.add("b.com", None).unwrap();
        assert_eq!(repo.layout(), StoreLayout::Flat);

        repo.add_account("owner").unwrap();
        assert_eq!(repo.layout(), StoreLayout::Grouped);
        assert_eq!(
            repo.account_domains("owner"),
            Some(vec!["a.com".to_string(), "b.com".to_string()])
        );
    }

    #[test]
    fn stats_counts_per_account() {
        let (repo, _dir) = grouped("dwb-repo-stats");
        repo.add_account("a").unwrap();
        repo.add_account("b").unwrap();
        repo.add("one.com", Some("a")).unwrap();
        repo.add("two.com", Some("a")).unwrap();

        let s = repo.stats();
        assert_eq!(s.account_count, 2);
        assert_eq!(s.domain_count, 2);
        assert_eq!(
            s.per_account,
            vec![("a".to_string(), 2), ("b".to_string(), 0)]
        );
    }

    #[test]
    fn corrupt_file_degrades_to_empty_state() {
        let dir = TempDir::new("dwb-repo-corrupt");
        let path = dir.file("domains.json");
        fs::write(&path, "{ not json").unwrap();
        let repo = Repository::new(path.clone(), StoreLayout::Flat);
        assert!(repo.list_domains().is_empty());

        // Still operable; the next write replaces the corrupt file.
        repo.add("fresh.com", None).unwrap();
        let txt = fs::read_to_string(&path).unwrap();
        assert!(txt.contains("fresh.com"));
    }

    #[test]
    fn missing_file_is_created_with_default_layout() {
        let dir = TempDir::new("dwb-repo-create");
        let path = dir.file("domains.json");
        let repo = Repository::new(path.clone(), StoreLayout::Grouped);
        assert!(repo.list_domains().is_empty());
        let v: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(v.get("accounts").is_some());
    }

    #[test]
    fn reads_legacy_flat_file() {
        let dir = TempDir::new("dwb-repo-legacy");
        let path = dir.file("domains.json");
        fs::write(&path, r#"{"domains": ["Example.com", "test.org"]}"#).unwrap();
        let repo = Repository::new(path, StoreLayout::Grouped);
        assert_eq!(repo.layout(), StoreLayout::Flat);
        assert_eq!(
            repo.list_domains(),
            vec!["example.com".to_string(), "test.org".to_string()]
        );
    }

    #[test]
    fn keys_resolve_to_current_names_only() {
        let (repo, _dir) = grouped("dwb-repo-keys");
        repo.add_account("a@example.com").unwrap();
        repo.add("one.com", None).unwrap();

        let k = Repository::domain_key("ONE.com");
        assert_eq!(repo.resolve_domain(&k).as_deref(), Some("one.com"));
        assert_eq!(
            repo.resolve_account(&Repository::account_key("A@example.com"))
                .as_deref(),
            Some("a@example.com")
        );

        repo.rename("one.com", "two.com").unwrap();
        assert!(repo.resolve_domain(&k).is_none());
    }

    #[test]
    fn account_ids_compare_with_unicode_case_folding() {
        let (repo, _dir) = grouped("dwb-repo-unicode-acc");
        repo.add_account("Élan").unwrap();

        let err = repo.add_account("élan").unwrap_err();
        assert_eq!(err.kind, RepoErrorKind::Duplicate);
        assert_eq!(repo.list_accounts(), vec!["Élan".to_string()]);

        repo.add("elan.fr", Some("ÉLAN")).unwrap();
        assert_eq!(repo.account_domains("élan"), Some(vec!["elan.fr".to_string()]));
        assert_eq!(
            repo.resolve_account(&Repository::account_key("élan")).as_deref(),
            Some("Élan")
        );
    }

    #[test]
    fn domain_charset_is_restricted() {
        assert!(is_valid_domain("example.com"));
        assert!(is_valid_domain("my-site.co.uk"));
        assert!(is_valid_domain("пример.рф"));
        assert!(!is_valid_domain("a.com&x=1"));
        assert!(!is_valid_domain("a.com/path"));
        assert!(!is_valid_domain("a b.com"));

        let (repo, _dir) = flat("dwb-repo-charset");
        assert_eq!(
            repo.add("a.com?x=1", None).unwrap_err().kind,
            RepoErrorKind::Validation
        );
        assert!(repo.list_domains().is_empty());
    }

    #[test]
    fn unwritable_store_reports_storage_error() {
        let dir = TempDir::new("dwb-repo-storage");
        // A regular file where the store's parent directory should be.
        let blocker = dir.file("blocker");
        fs::write(&blocker, "").unwrap();
        let repo = Repository::new(blocker.join("domains.json"), StoreLayout::Flat);

        let err = repo.add("example.com", None).unwrap_err();
        assert_eq!(err.kind, RepoErrorKind::Storage);
        assert!(err.message.contains("Failed to save"));
        assert!(repo.list_domains().is_empty());
    }
}
