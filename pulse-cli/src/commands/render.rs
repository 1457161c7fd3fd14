//! Terminal formatting shared by the live commands.

use colored::{ColoredString, Colorize};
use pulse_core::{AlertLevel, AlertStatus, ConnectionState, LogLevel, Payload, Sample};
use tokio::time::Instant;

/// Clear the terminal and move the cursor home.
pub fn clear_screen() {
    print!("\x1B[2J\x1B[H");
}

/// One-line connection indicator.
pub fn indicator(state: &ConnectionState) -> ColoredString {
    match state {
        ConnectionState::Open => "● connected".green().bold(),
        ConnectionState::Connecting => "● connecting".yellow(),
        ConnectionState::Backoff { attempt, retry_at, .. } => {
            let remaining = retry_at.saturating_duration_since(Instant::now());
            format!("● reconnecting (attempt {}, retry in {:.1}s)", attempt, remaining.as_secs_f64())
                .yellow()
        }
        ConnectionState::Disconnected => "● disconnected".red().bold(),
    }
}

/// Render one sample as a single terminal line.
pub fn sample_line(sample: &Sample) -> String {
    let ts = sample.timestamp.to_string().dimmed();
    match &sample.payload {
        Payload::Value(value) => format!("{}  {:>12.2}", ts, value),
        Payload::Log(log) => {
            let level = match log.level {
                LogLevel::Error => "ERROR".red().bold(),
                LogLevel::Warn => "WARN ".yellow(),
                LogLevel::Info => "INFO ".green(),
                LogLevel::Debug => "DEBUG".dimmed(),
            };
            if log.source.is_empty() {
                format!("{} {} {}", ts, level, log.message)
            } else {
                format!("{} {} {} {}", ts, level, log.source.cyan(), log.message)
            }
        }
        Payload::Alert(alert) => {
            let level = match alert.level {
                AlertLevel::Critical => "critical".red().bold(),
                AlertLevel::Warning => "warning ".yellow(),
                AlertLevel::Info => "info    ".blue(),
            };
            let status = match alert.status {
                AlertStatus::Active => "active".bold(),
                AlertStatus::Resolved => "resolved".dimmed(),
            };
            format!("{} {} {} {} {}", ts, level, status, alert.target.cyan(), alert.message)
        }
    }
}
