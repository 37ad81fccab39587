use std::sync::Arc;

use dwb_core::{
    batch::BatchRunner, checker::ExpiryChecker, config::Config, repository::Repository,
    subscribers::SubscriberStore,
};

#[tokio::main]
async fn main() -> Result<(), dwb_core::Error> {
    dwb_core::logging::init("dwb")?;

    let cfg = Arc::new(Config::load()?);
    tracing::info!(
        domains_file = %cfg.domains_file.display(),
        users_file = %cfg.users_file.display(),
        warning_days = cfg.tiers.warning_days,
        daily_check_time = %cfg.daily_check_time,
        "configuration loaded"
    );

    let repo = Arc::new(Repository::new(cfg.domains_file.clone(), cfg.store_layout));
    let subscribers = Arc::new(SubscriberStore::new(cfg.users_file.clone()));

    let source = dwb_whois::source_for(&cfg)?;
    let checker = ExpiryChecker::new(source, cfg.tiers, cfg.whois_timeout);
    let runner = BatchRunner::new(checker, cfg.max_concurrent_checks);

    dwb_telegram::router::run_polling(cfg, repo, runner, subscribers)
        .await
        .map_err(|e| dwb_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
