use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use common::actors::{Actor, ActorType, ControlMessage};
use common::models::TradeIdea;
use serde::Serialize;
use strategy::services::scanner;
use tokio::{
    sync::mpsc,
    time::{self, MissedTickBehavior},
};
use tracing::{info, warn};

use crate::context::RelayContext;
use crate::messages;
use crate::pipeline::Ignored;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanTrigger {
    /// Interval tick: honours the session window.
    Scheduled,
    /// `/scan` from HTTP or the bot: runs at any time of day.
    Manual,
}

/// What one pass over the universe did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanCycle {
    pub scanned: usize,
    pub picks: Vec<String>,
    pub alerts_sent: Vec<String>,
    pub already_sent: Vec<String>,
    pub filtered: Vec<String>,
    pub failures: Vec<String>,
    pub delivery_errors: Vec<String>,
    pub stopped: Option<Ignored>,
}

impl ScanCycle {
    pub fn summary(&self) -> String {
        if let Some(reason) = self.stopped.filter(|_| self.scanned == 0) {
            return format!("Scan skipped: {:?}", reason);
        }

        let list = |items: &[String]| {
            if items.is_empty() {
                "-".to_string()
            } else {
                items.join(", ")
            }
        };
        let mut text = format!(
            "🔭 Scan: {} symbols, {} picks\nSent: {}\nAlready sent today: {}\nFiltered: {}\nExcluded: {}",
            self.scanned,
            self.picks.len(),
            list(&self.alerts_sent),
            list(&self.already_sent),
            list(&self.filtered),
            self.failures.len(),
        );
        if !self.delivery_errors.is_empty() {
            text.push_str(&format!("\nDelivery errors: {}", self.delivery_errors.len()));
        }
        if let Some(reason) = self.stopped {
            text.push_str(&format!("\nStopped early: {:?}", reason));
        }
        text
    }
}

/// Scans the universe and relays each pick that was not sent today and
/// whose ideas survive the current settings. Per-pick failures are
/// collected, never propagated.
pub async fn run_scan_cycle(ctx: &RelayContext, trigger: ScanTrigger) -> ScanCycle {
    let mut cycle = ScanCycle::default();

    {
        let mut state = ctx.state.lock().await;
        state.reset_if_new_day();
        if trigger == ScanTrigger::Scheduled && !ctx.session_open(&state.now()) {
            cycle.stopped = Some(Ignored::OutsideTimeWindow);
            return cycle;
        }
        if ctx.daily_limit_reached(&state) {
            cycle.stopped = Some(Ignored::DailyLimitReached);
            return cycle;
        }
    }

    let scanner_settings = &ctx.config.scanner;
    let report = scanner::scan(
        ctx.market.as_ref(),
        &scanner_settings.symbols,
        &scanner_settings.scan,
    )
    .await;

    cycle.scanned = report.scanned;
    cycle.picks = report.picks.iter().map(|p| p.symbol.clone()).collect();
    cycle.failures = report
        .failures
        .iter()
        .map(|f| format!("{}: {}", f.symbol, f.rejection))
        .collect();

    let settings = ctx.settings.get().await;

    for pick in &report.picks {
        {
            let state = ctx.state.lock().await;
            if state.already_sent(&pick.symbol) {
                cycle.already_sent.push(pick.symbol.clone());
                continue;
            }
            if ctx.daily_limit_reached(&state) {
                cycle.stopped = Some(Ignored::DailyLimitReached);
                break;
            }
        }

        let analysis = match ctx.analyze_symbol(&pick.symbol, &settings).await {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                warn!("Scanner pick {} sent without analysis: {}", pick.symbol, e);
                None
            }
        };

        let ideas: Vec<&TradeIdea> = analysis
            .iter()
            .flat_map(|a| a.ideas.iter())
            .filter(|idea| settings.filter_mode.passes(idea.decision))
            .collect();
        if analysis.is_some() && ideas.is_empty() {
            cycle.filtered.push(pick.symbol.clone());
            continue;
        }

        let reservation = {
            let mut state = ctx.state.lock().await;
            if state.already_sent(&pick.symbol) {
                cycle.already_sent.push(pick.symbol.clone());
                continue;
            }
            match state.reserve(&pick.symbol, ctx.config.max_alerts_per_day) {
                Some(reservation) => reservation,
                None => {
                    cycle.stopped = Some(Ignored::DailyLimitReached);
                    break;
                }
            }
        };

        let text = messages::scan_alert(pick, analysis.as_ref(), &ideas);
        let delivery = ctx.deliver(&text).await;
        if delivery.ok {
            cycle.alerts_sent.push(pick.symbol.clone());
        } else {
            ctx.state.lock().await.release(reservation);
            cycle
                .delivery_errors
                .push(format!("{}: {}", pick.symbol, delivery.message));
        }
    }

    cycle
}

/// Forwards a cycle's delivery errors to the supervisor without blocking
/// the scan loop. Returns whether a report was queued.
fn report_delivery_errors(
    supervisor_tx: &mpsc::Sender<ControlMessage>,
    actor: ActorType,
    cycle: &ScanCycle,
) -> bool {
    if cycle.delivery_errors.is_empty() {
        return false;
    }
    match supervisor_tx.try_send(ControlMessage::Error(actor, cycle.delivery_errors.join("; "))) {
        Ok(()) => true,
        Err(e) => {
            warn!("Could not report scan delivery errors to supervisor: {}", e);
            false
        }
    }
}

pub struct ScannerService {
    ctx: Arc<RelayContext>,
}

impl ScannerService {
    pub fn new(ctx: Arc<RelayContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Actor for ScannerService {
    fn name(&self) -> ActorType {
        ActorType::ScannerActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let heartbeat_handle = self.spawn_heartbeat(supervisor_tx.clone());

        let period = self.ctx.config.scanner.interval;
        info!(
            "Starting scanner: {} symbols every {}s",
            self.ctx.config.scanner.symbols.len(),
            period.as_secs()
        );
        if self.ctx.config.scanner.symbols.is_empty() {
            heartbeat_handle.abort();
            supervisor_tx
                .send(ControlMessage::Shutdown(self.name()))
                .await?;
            bail!("Scanner has an empty universe");
        }

        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let cycle = run_scan_cycle(&self.ctx, ScanTrigger::Scheduled).await;
            match cycle.stopped {
                Some(reason) if cycle.scanned == 0 => info!("Scan skipped: {:?}", reason),
                _ => info!(
                    "Scan cycle: {} picks, sent {:?}, {} delivery errors",
                    cycle.picks.len(),
                    cycle.alerts_sent,
                    cycle.delivery_errors.len()
                ),
            }
            report_delivery_errors(&supervisor_tx, self.name(), &cycle);
        }
    }
}
