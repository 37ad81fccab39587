use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::checker::{DomainInfo, ExpiryChecker, LookupError};

/// Fans expiry checks out over a domain set with bounded concurrency.
///
/// Results come back in input order regardless of completion order, one per
/// input domain. Checks are spawned tasks, so a caller that stops awaiting
/// still lets in-flight lookups finish.
#[derive(Clone)]
pub struct BatchRunner {
    checker: ExpiryChecker,
    max_concurrent: usize,
}

impl BatchRunner {
    pub fn new(checker: ExpiryChecker, max_concurrent: usize) -> Self {
        Self {
            checker,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn checker(&self) -> &ExpiryChecker {
        &self.checker
    }

    pub async fn check_all(&self, domains: &[String]) -> Vec<DomainInfo> {
        let permits = Arc::new(Semaphore::new(self.max_concurrent));

        let handles: Vec<_> = domains
            .iter()
            .map(|domain| {
                let permits = permits.clone();
                let checker = self.checker.clone();
                let domain = domain.clone();
                tokio::spawn(async move {
                    let _permit = match permits.acquire_owned().await {
                        Ok(p) => p,
                        Err(e) => {
                            return DomainInfo::failed(
                                &domain,
                                LookupError::Aborted(e.to_string()),
                                None,
                            )
                        }
                    };
                    checker.check(&domain).await
                })
            })
            .collect();

        let mut out = Vec::with_capacity(domains.len());
        for (domain, handle) in domains.iter().zip(handles) {
            match handle.await {
                Ok(info) => out.push(info),
                Err(e) => {
                    tracing::error!(domain = %domain, error = %e, "expiry check task failed");
                    out.push(DomainInfo::failed(
                        domain,
                        LookupError::Aborted(e.to_string()),
                        None,
                    ));
                }
            }
        }

        let failed = out.iter().filter(|i| i.error.is_some()).count();
        tracing::info!(total = out.len(), failed, "batch check finished");
        out
    }
}
