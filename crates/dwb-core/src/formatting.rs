//! Plain-text rendering of check results and repository views.

use crate::{
    checker::{DomainInfo, Tier},
    config::TierBounds,
    repository::{RepoStats, SearchHit},
    scheduler::DailyTime,
};

/// Error text is cut to this many characters in rendered output.
pub const ERROR_DISPLAY_LEN: usize = 50;

/// Render one check result. Pure; no side effects.
pub fn render(info: &DomainInfo, bounds: TierBounds) -> String {
    if let Some(err) = &info.error {
        return format!(
            "❌ {}\n   Error: {}",
            info.domain,
            truncate_text(&err.to_string(), ERROR_DISPLAY_LEN)
        );
    }

    let (Some(expiry), Some(days_left)) = (info.expiry_date, info.days_left) else {
        return format!("⚠️ {}\n   Expiry date undetermined", info.domain);
    };

    let tier = Tier::classify(days_left, bounds);
    let status = match tier {
        Tier::Red if days_left < 0 => format!("EXPIRED {} DAYS AGO!", -days_left),
        Tier::Red => format!("EXPIRES IN {days_left} DAYS!"),
        Tier::Yellow | Tier::Green => format!("{days_left} days left"),
    };

    let mut out = format!(
        "{} {}\n   Expires: {}\n   Status: {status}",
        tier.emoji(),
        info.domain,
        expiry.format("%d.%m.%Y"),
    );
    if let Some(registrar) = &info.registrar {
        out.push_str(&format!("\n   Registrar: {registrar}"));
    }
    out
}

pub fn render_domain_list(title: &str, domains: &[String]) -> String {
    let mut out = format!("📋 {title} ({}):\n", domains.len());
    for (i, d) in domains.iter().enumerate() {
        out.push_str(&format!("\n{}. {d}", i + 1));
    }
    out
}

pub fn render_search_results(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("🔍 Nothing matches '{}'", query.trim());
    }

    let mut out = format!("🔍 Matches for '{}' ({}):\n", query.trim(), hits.len());
    for hit in hits {
        match &hit.account {
            Some(acc) => out.push_str(&format!("\n• {} ({acc})", hit.domain)),
            None => out.push_str(&format!("\n• {}", hit.domain)),
        }
    }
    out
}

pub fn render_stats(stats: &RepoStats) -> String {
    let mut out = format!("📊 Domains tracked: {}", stats.domain_count);
    if stats.account_count > 0 {
        out.push_str(&format!("\nAccounts: {}\n", stats.account_count));
        for (acc, n) in &stats.per_account {
            out.push_str(&format!("\n• {acc}: {n}"));
        }
    }
    out
}

pub fn render_help(bounds: TierBounds, check_time: DailyTime) -> String {
    format!(
        "❓ Help

🔄 Check all - check every tracked domain
⚠️ Expiring - only domains expiring within {warn} days
📋 List - all tracked domains
🔎 Check one - check any domain
➕ Add / ➖ Remove / ✏️ Rename - manage domains
🔍 Find - search tracked domains
👤 Accounts - list or delete accounts
📊 Stats - counts per account

Commands: /remove <domain>, /rename <old> <new>,
/addaccount <id>, /removeaccount <id>,
/digest (run the daily check now), /schedule

🔔 Daily check at {time}: subscribers are notified
   when any domain expires within {warn} days.

Indicators:
🟢 more than {attn} days
🟡 {warn}-{attn} days
🔴 less than {warn} days",
        warn = bounds.warning_days,
        attn = bounds.attention_days,
        time = check_time,
    )
}

/// Cut to `max_len` characters, appending `...` when something was removed.
pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}
