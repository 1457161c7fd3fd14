//! `pulse watch` command - live summary of every channel

use super::render::{clear_screen, indicator};
use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use pulse_core::observability::metrics::register_core_metrics;
use pulse_core::{ChannelSummary, Coordinator, PulseConfig};
use std::net::SocketAddr;
use std::time::Duration;
use tabled::{settings::Style, Table, Tabled};
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tracing::info;

/// Lower bound for the redraw interval.
const MIN_REFRESH: Duration = Duration::from_millis(50);

#[derive(Tabled)]
struct ChannelRow {
    #[tabled(rename = "CHANNEL")]
    channel: String,
    #[tabled(rename = "ENTRIES")]
    entries: String,
    #[tabled(rename = "PENDING")]
    pending: usize,
    #[tabled(rename = "EVICTED")]
    evicted: u64,
    #[tabled(rename = "LATEST")]
    latest: String,
}

impl From<ChannelSummary> for ChannelRow {
    fn from(summary: ChannelSummary) -> Self {
        Self {
            channel: summary.channel.to_string(),
            entries: format!("{}/{}", summary.len, summary.capacity),
            pending: summary.pending,
            evicted: summary.evicted,
            latest: summary
                .newest
                .map(|sample| format!("{} @ {}", sample.payload, sample.timestamp))
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

fn render(coordinator: &Coordinator, endpoint: &str) {
    clear_screen();
    println!("{}  {}", indicator(&coordinator.connection_state()), endpoint);

    let stats = coordinator.stats();
    println!(
        "messages {}  malformed {}  reconnects {}",
        stats.session.messages_received,
        stats.session.malformed_dropped,
        stats.session.connect_failures + stats.session.disconnects
    );
    println!();

    let rows: Vec<ChannelRow> = coordinator.channels().into_iter().map(ChannelRow::from).collect();
    if rows.is_empty() {
        println!("Waiting for telemetry...");
        return;
    }

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{}", table);
}

/// Connect and redraw the channel summary until Ctrl+C.
pub async fn watch(
    config: &PulseConfig,
    refresh_ms: u64,
    metrics_addr: Option<SocketAddr>,
) -> Result<()> {
    if let Some(addr) = metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        register_core_metrics();
        info!(%addr, "Serving Prometheus metrics");
    }

    let coordinator = Coordinator::websocket(config)?;
    coordinator.start(&config.endpoint)?;

    let mut states = WatchStream::new(coordinator.subscribe_state());
    let mut ticker = tokio::time::interval(Duration::from_millis(refresh_ms).max(MIN_REFRESH));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            Some(_) = states.next() => render(&coordinator, &config.endpoint),
            _ = ticker.tick() => render(&coordinator, &config.endpoint),
        }
    }

    coordinator.stop();
    Ok(())
}
