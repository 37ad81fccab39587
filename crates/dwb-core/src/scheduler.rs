//! Daily digest scheduler.
//!
//! One job: sleep until the configured local wall-clock time, run the
//! [`Notifier`], repeat. A failed or partial run is logged and the loop keeps
//! going.

use std::{fmt, sync::Arc, time::Duration};

use chrono::{DateTime, Local, NaiveTime, TimeZone};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    notifier::{DigestOutcome, Notifier},
    Error, Result,
};

/// Local wall-clock time of day (`HH:MM`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DailyTime {
    hour: u32,
    minute: u32,
}

impl DailyTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(Error::Config(format!(
                "Invalid time of day: {hour:02}:{minute:02}"
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || Error::Config(format!("Invalid time of day (expected HH:MM): {raw}"));
        let (h, m) = raw.trim().split_once(':').ok_or_else(invalid)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }
        let hour = h.parse::<u32>().map_err(|_| invalid())?;
        let minute = m.parse::<u32>().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }

    pub fn hour(self) -> u32 {
        self.hour
    }

    pub fn minute(self) -> u32 {
        self.minute
    }

    /// First occurrence strictly after `now`.
    ///
    /// A day where the time falls into a DST gap is skipped.
    pub fn next_after(self, now: DateTime<Local>) -> DateTime<Local> {
        let at = NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN);
        let mut day = now.date_naive();
        for _ in 0..3 {
            if let Some(t) = Local.from_local_datetime(&day.and_time(at)).earliest() {
                if t > now {
                    return t;
                }
            }
            let Some(next) = day.succ_opt() else {
                break;
            };
            day = next;
        }
        now + chrono::Duration::days(1)
    }
}

impl fmt::Display for DailyTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Clone)]
pub struct DailyScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    at: DailyTime,
    notifier: Notifier,
    state: tokio::sync::Mutex<SchedulerState>,
}

#[derive(Default)]
struct SchedulerState {
    job: Option<JobEntry>,
    last_run: Option<(DateTime<Local>, DigestOutcome)>,
}

struct JobEntry {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl DailyScheduler {
    pub fn new(at: DailyTime, notifier: Notifier) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                at,
                notifier,
                state: tokio::sync::Mutex::new(SchedulerState::default()),
            }),
        }
    }

    pub fn time(&self) -> DailyTime {
        self.inner.at
    }

    /// Spawn the job loop. Returns `false` if it is already running.
    pub async fn start(&self) -> bool {
        let mut st = self.inner.state.lock().await;
        if st.job.is_some() {
            return false;
        }

        let cancel = CancellationToken::new();
        let scheduler = self.clone();
        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(async move {
            scheduler.job_loop(cancel_clone).await;
        });
        st.job = Some(JobEntry { cancel, handle });

        tracing::info!(at = %self.inner.at, "daily check scheduled");
        true
    }

    pub async fn stop(&self) {
        let mut st = self.inner.state.lock().await;
        if let Some(job) = st.job.take() {
            job.cancel.cancel();
            job.handle.abort();
            tracing::info!("daily check stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.inner.state.lock().await.job.is_some()
    }

    /// Run the digest immediately, outside the schedule.
    pub async fn run_now(&self) -> DigestOutcome {
        let outcome = self.inner.notifier.run_daily().await;
        self.inner.state.lock().await.last_run = Some((Local::now(), outcome));
        outcome
    }

    pub async fn status_text(&self) -> String {
        let st = self.inner.state.lock().await;
        let mut lines = Vec::new();

        if st.job.is_some() {
            let next = self.inner.at.next_after(Local::now());
            lines.push(format!("⏰ Daily check at {}", self.inner.at));
            lines.push(format!("Next run: {}", next.format("%d.%m.%Y %H:%M")));
        } else {
            lines.push(format!("⏸ Daily check at {} is not running", self.inner.at));
        }

        match &st.last_run {
            Some((at, o)) => lines.push(format!(
                "Last run: {} ({} checked, {} expiring, {} delivered, {} failed)",
                at.format("%d.%m.%Y %H:%M"),
                o.checked,
                o.expiring,
                o.delivered,
                o.failed
            )),
            None => lines.push("Last run: never".to_string()),
        }

        lines.join("\n")
    }

    async fn job_loop(&self, cancel: CancellationToken) {
        loop {
            let now = Local::now();
            let next = self.inner.at.next_after(now);
            let dur = (next - now).to_std().unwrap_or(Duration::ZERO);
            tracing::debug!(next = %next, "sleeping until next daily check");

            tokio::select! {
              _ = cancel.cancelled() => break,
              _ = sleep(dur) => {
                tracing::info!("running scheduled daily check");
                self.run_now().await;
              }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        batch::BatchRunner,
        checker::ExpiryChecker,
        config::TierBounds,
        repository::{Repository, StoreLayout},
        subscribers::SubscriberStore,
        testing::{FakeMessenger, FixedSource, TempDir},
    };
    use chrono::Timelike;

    fn scheduler(messenger: Arc<FakeMessenger>) -> (DailyScheduler, TempDir) {
        let dir = TempDir::new("dwb-sched");
        let repo = Arc::new(Repository::new(dir.file("domains.json"), StoreLayout::Flat));
        repo.add("soon.com", None).unwrap();
        let subs = Arc::new(SubscriberStore::new(dir.file("users.json")));
        subs.add(5).unwrap();
        let checker = ExpiryChecker::new(
            Arc::new(FixedSource::with(&[("soon.com", 2)])),
            TierBounds::default(),
            Duration::from_secs(5),
        );
        let notifier = Notifier::new(repo, BatchRunner::new(checker, 2), subs, messenger, 3900);
        (DailyScheduler::new(DailyTime::new(9, 0).unwrap(), notifier), dir)
    }

    #[test]
    fn daily_time_parses_and_displays() {
        assert_eq!(DailyTime::parse("09:00").unwrap(), DailyTime::new(9, 0).unwrap());
        assert_eq!(DailyTime::parse(" 7:05 ").unwrap().to_string(), "07:05");
        assert_eq!(DailyTime::parse("23:59").unwrap().hour(), 23);
        for bad in ["24:00", "12:60", "9", "09:5", "ab:cd", "", "09:000"] {
            assert!(DailyTime::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn next_after_is_today_or_tomorrow() {
        let t = DailyTime::new(9, 0).unwrap();

        let before = Local.with_ymd_and_hms(2026, 1, 10, 8, 30, 0).unwrap();
        let next = t.next_after(before);
        assert_eq!(next.date_naive(), before.date_naive());
        assert_eq!((next.hour(), next.minute()), (9, 0));

        let after = Local.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap();
        let next = t.next_after(after);
        assert_eq!(next.date_naive(), after.date_naive().succ_opt().unwrap());
        assert_eq!((next.hour(), next.minute(), next.second()), (9, 0, 0));
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_cancels() {
        let (s, _dir) = scheduler(Arc::new(FakeMessenger::default()));
        assert!(s.start().await);
        assert!(!s.start().await);
        assert!(s.is_running().await);
        assert!(s.status_text().await.contains("Daily check at 09:00"));

        s.stop().await;
        assert!(!s.is_running().await);
        assert!(s.status_text().await.contains("not running"));
    }

    #[tokio::test]
    async fn run_now_sends_and_records_outcome() {
        let messenger = Arc::new(FakeMessenger::default());
        let (s, _dir) = scheduler(messenger.clone());

        let outcome = s.run_now().await;

        assert_eq!(outcome.expiring, 1);
        assert_eq!(outcome.delivered, 1);
        assert_eq!(messenger.texts_for(5).len(), 1);
        let status = s.status_text().await;
        assert!(status.contains("1 checked, 1 expiring, 1 delivered, 0 failed"));
    }
}
