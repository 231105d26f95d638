//! Status command implementation

use crate::store::{read_state, PersistedState};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// State file to read instead of the configured one
    #[arg(short, long)]
    pub state: Option<PathBuf>,
}

impl StatusArgs {
    pub async fn execute(&self, default_path: &std::path::Path) -> anyhow::Result<()> {
        let path = self.state.as_deref().unwrap_or(default_path);
        let state = read_state(path).await?;
        print!("{}", render(&state, &path.display().to_string()));
        Ok(())
    }
}

/// Human-readable summary of the persisted ledger
pub fn render(state: &PersistedState, path: &str) -> String {
    let mut out = format!("poly-tail status\n  State file: {}\n", path);
    if state.orders.is_empty() {
        out.push_str("  No orders recorded\n");
        return out;
    }

    for slug in state.orders.event_slugs() {
        out.push_str(&format!("\n  {}\n", slug));
        for order in state.orders.orders(slug).unwrap_or_default() {
            let status = match (&order.error, &order.take_profit_order_id) {
                (Some(error), _) => format!("error: {}", error),
                (None, Some(tp)) => format!("closed by {}", tp),
                (None, None) => "open".to_string(),
            };
            let matched = order
                .matched_size
                .map(|m| m.to_string())
                .unwrap_or_else(|| "-".to_string());
            let profit = order
                .profit
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "    {} {} {} @ {} size {} matched {} profit {} [{}]\n",
                order.order_id,
                order.side,
                order.outcome.as_deref().unwrap_or("?"),
                order.price,
                order.size,
                matched,
                profit,
                status
            ));
        }
    }
    out
}
