//! Rendering of the end-of-run summary.

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use tapfarm_types::{AccountSummary, ExitSummary, SessionState};

/// Display order of end states.
const STATE_ORDER: [SessionState; 4] =
    [SessionState::Failed, SessionState::Stopped, SessionState::Pending, SessionState::Running];

fn state_cell(state: SessionState) -> Cell {
    let color = match state {
        SessionState::Failed => Color::Red,
        SessionState::Stopped => Color::Green,
        SessionState::Pending => Color::DarkGrey,
        SessionState::Starting | SessionState::Running | SessionState::Degraded => Color::Yellow,
    };
    Cell::new(state.to_string()).fg(color)
}

/// Accounts grouped by end state, registry order kept within a group.
pub fn grouped(summary: &ExitSummary) -> Vec<&AccountSummary> {
    let mut rows: Vec<&AccountSummary> = summary.accounts.iter().collect();
    rows.sort_by_key(|a| {
        STATE_ORDER.iter().position(|s| *s == a.final_state).unwrap_or(STATE_ORDER.len())
    });
    rows
}

pub fn render_table(summary: &ExitSummary) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Account", "State", "Proxy", "Cycles", "Quests", "Errors", "Proxy swaps", "Reason",
    ]);

    for account in grouped(summary) {
        let stats = summary.stats_for(&account.account_id);
        let count = |f: fn(&tapfarm_types::StatsRecord) -> u64| {
            stats.map_or_else(|| "-".to_string(), |r| f(r).to_string())
        };
        table.add_row(vec![
            Cell::new(&account.account_id),
            state_cell(account.final_state),
            Cell::new(account.proxy.as_ref().map_or_else(|| "-".to_string(), ToString::to_string)),
            Cell::new(count(|r| r.cycles_completed)),
            Cell::new(count(|r| r.quests_completed)),
            Cell::new(count(|r| r.errors)),
            Cell::new(count(|r| r.proxy_replacements)),
            Cell::new(account.reason.as_deref().unwrap_or("-")),
        ]);
    }
    table
}

pub fn print_summary(summary: &ExitSummary) {
    println!("{}", render_table(summary));

    let elapsed = summary.finished_at - summary.started_at;
    println!(
        "\n{} {} accounts: {} stopped, {} failed, {} not started ({}s)",
        "Run".cyan().bold(),
        summary.accounts.len(),
        summary.count_in(SessionState::Stopped).to_string().green(),
        summary.count_in(SessionState::Failed).to_string().red(),
        summary.count_in(SessionState::Pending),
        elapsed.num_seconds()
    );
    println!(
        "    {} cycles, {} quests, {} errors, {} proxy replacements",
        summary.totals.cycles_completed,
        summary.totals.quests_completed,
        summary.totals.errors,
        summary.totals.proxy_replacements
    );
    if summary.restart_requested {
        println!("{}", "Update found, restarting...".yellow());
    }
}
