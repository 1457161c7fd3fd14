//! `pulse tail` command - follow one channel

use super::render::{clear_screen, indicator, sample_line};
use anyhow::Result;
use pulse_core::{Channel, Coordinator, PulseConfig};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

fn render(coordinator: &Coordinator, channel: &Channel, lines: usize) {
    clear_screen();
    let window = coordinator.channel_tail(channel, lines);
    println!(
        "{}  {} ({} of {})",
        indicator(&coordinator.connection_state()),
        channel,
        window.len(),
        window.total
    );
    for sample in &window.items {
        println!("{}", sample_line(sample));
    }
}

/// Print the newest `lines` entries of `channel` on every flush until Ctrl+C.
pub async fn tail(config: &PulseConfig, channel: &str, lines: usize) -> Result<()> {
    let channel = Channel::new(channel);
    let coordinator = Coordinator::websocket(config)?;
    coordinator.start(&config.endpoint)?;

    // Lagged receivers just redraw; the window is always read fresh.
    let mut flushes = BroadcastStream::new(coordinator.subscribe_flushes());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    render(&coordinator, &channel, lines);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            event = flushes.next() => match event {
                Some(Ok(event)) if event.channel != channel => {}
                Some(_) => render(&coordinator, &channel, lines),
                None => break,
            },
        }
    }

    coordinator.stop();
    Ok(())
}
