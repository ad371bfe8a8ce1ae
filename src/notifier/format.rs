// src/notifier/format.rs
use crate::config::Config;
use crate::domain::models::{
    CycleOutcome, CycleReport, DecisionSource, NextTier, PositionView,
};
use std::fmt::Write;

const TIMESTAMP_FORMAT: &str = "(%H:%M:%S) %d-%m-%Y";

/// Render one completed cycle for the notification channel.
pub fn cycle_message(report: &CycleReport) -> String {
    let mut message = String::new();

    let _ = writeln!(
        message,
        "<b>🟢 Executed {}</b>",
        report.taken_at.format(TIMESTAMP_FORMAT)
    );
    let _ = writeln!(message);
    let _ = writeln!(
        message,
        "<b>Asset:</b> {} ({}) — cycle #{}",
        report.stock_code, report.symbol, report.cycle
    );
    let _ = writeln!(message);
    let _ = writeln!(message, "<b>Details:</b>");

    match &report.position {
        PositionView::Flat => {
            let _ = writeln!(message, " - <b>Position:</b> Flat");
            let _ = writeln!(message, " - <b>Current price:</b> {}", report.price);
        }
        PositionView::Long {
            entry_price,
            entry_quantity,
            remaining_quantity,
            entry_time,
            stop_loss,
            sell_floor,
            next_tier,
            variation_pct,
        } => {
            let _ = writeln!(message, " - <b>Position:</b> Long");
            let _ = writeln!(
                message,
                " - <b>Entry:</b> {} x {} at {}",
                entry_price,
                entry_quantity,
                entry_time.format(TIMESTAMP_FORMAT)
            );
            let _ = writeln!(message, " - <b>Remaining:</b> {}", remaining_quantity);
            let _ = writeln!(message, " - <b>Current price:</b> {}", report.price);
            let _ = writeln!(
                message,
                " - <b>Variation:</b> {}%",
                variation_pct.round_dp(2)
            );
            let _ = writeln!(message, " - <b>Stop loss at:</b> {}", stop_loss);
            let _ = writeln!(message, " - <b>Minimum sell price:</b> {}", sell_floor);
            match next_tier {
                NextTier::Pending {
                    index,
                    trigger_price,
                    amount_pct,
                } => {
                    let _ = writeln!(
                        message,
                        " - <b>Next take profit:</b> tier {} at {} (sell {}%)",
                        index + 1,
                        trigger_price,
                        amount_pct
                    );
                }
                NextTier::Exhausted => {
                    let _ = writeln!(message, " - <b>Next take profit:</b> all tiers consumed");
                }
            }
        }
    }

    let _ = writeln!(message);
    let _ = write!(
        message,
        "<b>📊 Strategy:</b> {} ({})",
        report.strategy_name, report.decision_source
    );
    for indicator in &report.decision.indicators {
        let _ = write!(message, " | <b>{}:</b> {:.4}", indicator.name, indicator.value);
    }
    let _ = writeln!(message);
    let _ = writeln!(message, "<b>Decision:</b> {}", report.decision.action);
    if report.decision_source == DecisionSource::Failed {
        let _ = writeln!(
            message,
            "⚠️ Both strategies failed to produce a decision; holding."
        );
    }

    let _ = writeln!(message);
    let _ = writeln!(message, "<b>🏁 Action:</b> {}", action_line(&report.outcome));
    let _ = writeln!(message, "------------------------------------------------");
    let _ = write!(
        message,
        "^ [{}][{}] time_to_sleep = '{:.2} min'",
        report.symbol,
        report.cycle,
        report.time_to_sleep.as_secs_f64() / 60.0
    );

    message
}

fn action_line(outcome: &CycleOutcome) -> String {
    match outcome {
        CycleOutcome::Entered { fill } => {
            format!("Entered long: {} at {}", fill.quantity, fill.price)
        }
        CycleOutcome::StopLossExit { fill } => {
            format!("STOP LOSS — sold {} at {}", fill.quantity, fill.price)
        }
        CycleOutcome::TookProfit { tier, fill } => format!(
            "Take profit tier {} — sold {} at {}",
            tier + 1,
            fill.quantity,
            fill.price
        ),
        CycleOutcome::StrategyExit { fill } => {
            format!("Strategy exit — sold {} at {}", fill.quantity, fill.price)
        }
        CycleOutcome::HeldBelowFloor { floor } => format!(
            "Sell signal held: price below the minimum sell price {}",
            floor
        ),
        CycleOutcome::InsufficientFunds { needed, available } => format!(
            "Buy skipped: insufficient funds (need {}, have {})",
            needed, available
        ),
        CycleOutcome::Held => "Kept position unchanged".to_string(),
    }
}

/// Render a failed cycle. The worker keeps running; this is informational.
pub fn error_message(stock_code: &str, symbol: &str, cycle: u64, error: &str) -> String {
    format!(
        "<b>⚠️ Cycle {} failed for {} ({}):</b> {}\nThe worker sleeps and retries on its normal schedule.",
        cycle, stock_code, symbol, error
    )
}

/// Announce the process start and the portfolio it will trade. Every asset
/// starts Flat; seeing this mid-day means the process restarted.
pub fn startup_message(config: &Config) -> String {
    let mut message = String::new();
    let _ = writeln!(message, "🚀 <b>spot_trader started</b>");
    let _ = writeln!(message, "Mode: {:?}", config.orchestrator.mode);
    let _ = writeln!(message, "Assets (all starting Flat):");
    for asset in &config.assets {
        let _ = writeln!(
            message,
            " - {} ({}) every {}s",
            asset.stock_code, asset.symbol, asset.cycle_interval_secs
        );
    }
    message
}
