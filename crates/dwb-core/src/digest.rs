//! Digest assembly: filter, render, and pack check results into messages.

use crate::{checker::DomainInfo, config::TierBounds, formatting::render};

/// Separator between rendered entries.
pub const ENTRY_SEPARATOR: &str = "\n\n";

/// Who asked for the digest; changes the header and the "nothing to report" case.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DigestMode {
    /// The daily job: stays silent when nothing is expiring.
    Scheduled,
    /// A user asked: always answers.
    Interactive,
}

/// Expiring-soon digest, split into messages of at most `limit` characters.
///
/// Returns no messages in scheduled mode when nothing qualifies.
pub fn assemble(
    results: &[DomainInfo],
    bounds: TierBounds,
    mode: DigestMode,
    limit: usize,
) -> Vec<String> {
    let entries: Vec<String> = results
        .iter()
        .filter(|i| i.is_expiring_soon)
        .map(|i| render(i, bounds))
        .collect();

    if entries.is_empty() {
        return match mode {
            DigestMode::Scheduled => Vec::new(),
            DigestMode::Interactive => vec![format!(
                "✅ No domains expiring within {} days.",
                bounds.warning_days
            )],
        };
    }

    let threshold = format!("⚠️ Expiring within {} days:", bounds.warning_days);
    let header = match mode {
        DigestMode::Scheduled => format!("🔔 Daily domain check\n\n{threshold}"),
        DigestMode::Interactive => threshold,
    };

    let mut blocks = Vec::with_capacity(entries.len() + 1);
    blocks.push(header);
    blocks.extend(entries);
    split_entries(&blocks, ENTRY_SEPARATOR, limit)
}

/// Report for "check all": every result rendered, plus a trailing warning
/// counting expiring domains.
pub fn full_report(results: &[DomainInfo], bounds: TierBounds, limit: usize) -> Vec<String> {
    let mut blocks: Vec<String> = results.iter().map(|i| render(i, bounds)).collect();

    let expiring = results.iter().filter(|i| i.is_expiring_soon).count();
    if expiring > 0 {
        blocks.push(format!(
            "⚠️ WARNING: {expiring} domain(s) expire within {} days!",
            bounds.warning_days
        ));
    }

    split_entries(&blocks, ENTRY_SEPARATOR, limit)
}

/// Greedily pack entries into chunks of at most `limit` characters.
///
/// An entry is never split; one that alone exceeds `limit` becomes its own chunk.
pub fn split_entries(entries: &[String], sep: &str, limit: usize) -> Vec<String> {
    let sep_len = sep.chars().count();
    let mut chunks = Vec::new();
    let mut current: Option<(String, usize)> = None;

    for entry in entries {
        let entry_len = entry.chars().count();
        current = match current.take() {
            None => Some((entry.clone(), entry_len)),
            Some((chunk, len)) if len + sep_len + entry_len > limit => {
                chunks.push(chunk);
                Some((entry.clone(), entry_len))
            }
            Some((mut chunk, len)) => {
                chunk.push_str(sep);
                chunk.push_str(entry);
                Some((chunk, len + sep_len + entry_len))
            }
        };
    }

    if let Some((chunk, _)) = current {
        chunks.push(chunk);
    }
    chunks
}
