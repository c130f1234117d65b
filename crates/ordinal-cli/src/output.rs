use anyhow::{Context, Result};
use ordinal_db::StatusReport;

/// Render a status report for the terminal.
pub fn render_status(status: &StatusReport) -> String {
    let mut out = String::new();

    if status.ledger_exists {
        out.push_str(&format!("ledger table: {}\n", status.table));
    } else {
        out.push_str(&format!("ledger table: {} (missing)\n", status.table));
    }

    out.push_str(&format!("applied: {}\n", status.applied.len()));
    for entry in &status.applied {
        out.push_str(&format!(
            "  {:>6}  {}\n",
            entry.id,
            entry.applied_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }

    if status.pending.is_empty() {
        out.push_str("pending: none\n");
    } else {
        let ids: Vec<String> = status.pending.iter().map(u64::to_string).collect();
        out.push_str(&format!(
            "pending: {} ({})\n",
            status.pending.len(),
            ids.join(", ")
        ));
    }
    out
}

pub fn render_status_json(status: &StatusReport) -> Result<String> {
    serde_json::to_string_pretty(status).context("failed to serialize status")
}
