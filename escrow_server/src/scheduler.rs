//! Runs the auto-refund and payout sweeps on a timetable.
//!
//! The overdue and payout sweeps run on every multiple of the overdue interval (hourly, on the hour, by default) and
//! the refund sweep runs once a day (09:00 UTC by default). Each loop awaits its sweep before working out when to run next, so a slow sweep
//! delays its own next run rather than overlapping it, and a tick that is missed entirely is simply skipped.
use std::{future::Future, time::Duration};

use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use escrow_engine::{escrow_objects::SweepReport, AutoRefundApi, EscrowError, SqliteDatabase};
use log::*;
use tokio::{sync::watch, task::JoinHandle};

use crate::config::SweepSchedule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// On every multiple of the interval since the Unix epoch.
    Every(Duration),
    /// Once a day at the given UTC time.
    DailyAt(NaiveTime),
}

impl Schedule {
    /// The first scheduled time strictly after `now`.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Every(interval) => {
                let secs = interval.as_secs().max(1) as i64;
                let next = (now.timestamp().div_euclid(secs) + 1) * secs;
                Utc.timestamp_opt(next, 0).single().unwrap_or(now + chrono::Duration::seconds(secs))
            },
            Self::DailyAt(time) => {
                let today = Utc.from_utc_datetime(&now.date_naive().and_time(*time));
                if today > now {
                    today
                } else {
                    today.checked_add_days(Days::new(1)).unwrap_or(today)
                }
            },
        }
    }
}

/// Owns the sweep loops. Call [`RefundScheduler::start`] once the server is up, and [`RefundScheduler::stop`] on
/// shutdown. A sweep that is running when `stop` is called is allowed to finish.
pub struct RefundScheduler {
    api: AutoRefundApi<SqliteDatabase>,
    schedule: SweepSchedule,
    shutdown: Option<watch::Sender<bool>>,
    handles: Vec<JoinHandle<()>>,
}

impl RefundScheduler {
    pub fn new(api: AutoRefundApi<SqliteDatabase>, schedule: SweepSchedule) -> Self {
        Self { api, schedule, shutdown: None, handles: Vec::new() }
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_some()
    }

    pub fn start(&mut self) {
        if self.is_running() {
            warn!("🕰️ The refund scheduler is already running");
            return;
        }
        let (tx, rx) = watch::channel(false);
        let api = self.api.clone();
        let hourly = Schedule::Every(self.schedule.overdue_interval);
        let overdue = spawn_sweep("overdue", hourly, rx.clone(), move |now| {
            let api = api.clone();
            async move { api.run_overdue_sweep_at(now).await }
        });
        let api = self.api.clone();
        let daily = Schedule::DailyAt(self.schedule.refund_time);
        let refunds = spawn_sweep("refund", daily, rx.clone(), move |now| {
            let api = api.clone();
            async move { api.run_refund_sweep_at(now).await }
        });
        let api = self.api.clone();
        let payouts = spawn_sweep("payout", hourly, rx, move |now| {
            let api = api.clone();
            async move { api.run_payout_sweep_at(now).await }
        });
        self.handles = vec![overdue, refunds, payouts];
        self.shutdown = Some(tx);
        info!(
            "🕰️ Refund scheduler started. Overdue and payout sweeps every {} min, refund sweep daily at {} UTC",
            self.schedule.overdue_interval.as_secs() / 60,
            self.schedule.refund_time.format("%H:%M")
        );
    }

    pub async fn stop(&mut self) {
        let Some(tx) = self.shutdown.take() else {
            return;
        };
        let _ = tx.send(true);
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                warn!("🕰️ A sweep task ended abnormally. {e}");
            }
        }
        info!("🕰️ Refund scheduler stopped");
    }
}

fn spawn_sweep<F, Fut>(
    name: &'static str,
    schedule: Schedule,
    mut shutdown: watch::Receiver<bool>,
    sweep: F,
) -> JoinHandle<()>
where
    F: Fn(DateTime<Utc>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<SweepReport, EscrowError>> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let next = schedule.next_run_after(Utc::now());
            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            debug!("🕰️ Next {name} sweep at {next}");
            tokio::select! {
                _ = tokio::time::sleep(wait) => {},
                _ = shutdown.changed() => break,
            }
            info!("🕰️ Running the {name} sweep");
            match sweep(Utc::now()).await {
                Ok(report) => log_report(name, &report),
                Err(e) => error!("🕰️ The {name} sweep failed. It will run again at the next scheduled time. {e}"),
            }
        }
        debug!("🕰️ The {name} sweep loop has shut down");
    })
}

fn log_report(name: &str, report: &SweepReport) {
    if report.skipped {
        return;
    }
    info!(
        "🕰️ {name} sweep done. {} examined, {} processed, {} failed",
        report.examined,
        report.processed.len(),
        report.failed.len()
    );
    for (order_id, reason) in &report.failed {
        warn!("🕰️ {name} sweep could not process order {order_id}. {reason}");
    }
}
