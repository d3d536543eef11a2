use common::models::{Analysis, InboundSignal, Settings, TradeIdea};
use storage::DayState;
use strategy::services::scanner::ScanPick;

const DISCLAIMER: &str = "Manual execution only. Educational aid, not a profit guarantee.";

pub fn signal_alert(signal: &InboundSignal, analysis: Option<&Analysis>) -> String {
    let mut lines = vec![
        "📣 Trade signal".to_string(),
        format!("Symbol: {}", signal.ticker),
    ];
    if let Some(ref tf) = signal.timeframe {
        lines.push(format!("Timeframe: {}", tf));
    }
    lines.push(format!("Direction: {}", signal.direction.side()));
    if let Some(ref price) = signal.price {
        lines.push(format!("Price: {}", price));
    }
    if let Some(ref entry) = signal.entry {
        lines.push(format!("Entry: {}", entry));
    }
    if let Some(ref sl) = signal.stop_loss {
        lines.push(format!("Stop: {}", sl));
    }
    let targets: Vec<&str> = [&signal.take_profit1, &signal.take_profit2]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect();
    if !targets.is_empty() {
        lines.push(format!("Targets: {}", targets.join(" / ")));
    }
    if let Some(ref reason) = signal.reason {
        lines.push(format!("Reason: {}", reason));
    }
    lines.push(format!("Signal score: {:.1}", signal.payload_score));

    if let Some(analysis) = analysis {
        lines.push(String::new());
        lines.push(indicator_line(analysis));
        if let Some(idea) = analysis.idea_for(signal.direction.side()) {
            lines.extend(idea_lines(idea));
        }
    }

    lines.push(String::new());
    lines.push(DISCLAIMER.to_string());
    lines.join("\n")
}

pub fn analysis_report(analysis: &Analysis) -> String {
    let mut lines = vec![format!("🔎 {}", analysis.symbol), indicator_line(analysis)];
    for idea in &analysis.ideas {
        lines.push(String::new());
        lines.extend(idea_lines(idea));
    }
    lines.join("\n")
}

pub fn scan_alert(pick: &ScanPick, analysis: Option<&Analysis>, ideas: &[&TradeIdea]) -> String {
    let mut lines = vec![
        format!("📈 Screener pick: {}", pick.symbol),
        format!(
            "Price: {:.2} ({:+.2}%) | Avg volume: {:.0}",
            pick.price, pick.change_pct, pick.avg_volume
        ),
        format!("Score: {:.2}", pick.score),
        format!("Stop: {:.2} | Target: {:.2}", pick.stop_loss, pick.take_profit),
    ];

    if let Some(analysis) = analysis {
        lines.push(String::new());
        lines.push(indicator_line(analysis));
        for idea in ideas {
            lines.push(String::new());
            lines.extend(idea_lines(idea));
        }
    }

    lines.push(String::new());
    lines.push(DISCLAIMER.to_string());
    lines.join("\n")
}

pub fn settings_summary(settings: &Settings) -> String {
    format!(
        "⚙️ Settings\nCapital: {:.2}\nRisk per trade: {}%\nSide: {}\nFilter: {}\nCooldown: {} min",
        settings.capital,
        settings.risk_pct,
        settings.side,
        settings.filter_mode,
        settings.cooldown_minutes
    )
}

pub fn day_summary(day: &DayState, max_per_day: u32) -> String {
    let limit = if max_per_day == 0 {
        "unlimited".to_string()
    } else {
        max_per_day.to_string()
    };
    let mut sent: Vec<&str> = day.sent_symbols.iter().map(String::as_str).collect();
    sent.sort_unstable();

    format!(
        "📅 Day {}\nAlerts sent: {} / {}\nSymbols: {}",
        day.day_key.as_deref().unwrap_or("-"),
        day.sent_count,
        limit,
        if sent.is_empty() {
            "-".to_string()
        } else {
            sent.join(", ")
        }
    )
}

fn indicator_line(analysis: &Analysis) -> String {
    format!(
        "Trend: {} | RSI14: {:.1} | ATR14: {:.2} | MA20: {:.2} | MA50: {:.2}",
        analysis.trend, analysis.rsi14, analysis.atr14, analysis.ma20, analysis.ma50
    )
}

fn idea_lines(idea: &TradeIdea) -> Vec<String> {
    let mut lines = vec![
        format!("{} → {} (score {}/8)", idea.side, idea.decision, idea.score),
        format!(
            "Entry {:.2} | SL {:.2} | TP1 {:.2} | TP2 {:.2}",
            idea.entry, idea.stop_loss, idea.take_profit1, idea.take_profit2
        ),
        format!("Qty: {}", idea.quantity),
    ];
    lines.extend(idea.reasons.iter().map(|r| format!("• {}", r)));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_signal_alert_lists_present_fields_only() {
        let signal = InboundSignal::from_payload(&json!({
            "ticker": "AAPL",
            "direction": "buy",
            "price": 187.2,
            "tp2": "195",
            "reason": "VWAP reclaim",
        }))
        .unwrap();

        let text = signal_alert(&signal, None);

        assert!(text.starts_with("📣 Trade signal\nSymbol: AAPL"));
        assert!(text.contains("Direction: LONG"));
        assert!(text.contains("Price: 187.2"));
        assert!(text.contains("Targets: 195"));
        assert!(text.contains("Reason: VWAP reclaim"));
        assert!(!text.contains("Timeframe"));
        assert!(!text.contains("Stop:"));
        assert!(text.ends_with(DISCLAIMER));
    }

    #[test]
    fn test_day_summary() {
        let mut day = DayState {
            day_key: Some("2025-03-04".to_string()),
            ..DayState::default()
        };
        day.sent_symbols.insert("MSFT".to_string());
        day.sent_symbols.insert("AAPL".to_string());
        day.sent_count = 2;

        assert_eq!(
            day_summary(&day, 0),
            "📅 Day 2025-03-04\nAlerts sent: 2 / unlimited\nSymbols: AAPL, MSFT"
        );
    }
}
