//! Progress bar driven by the engine's progress events.

use std::time::Duration;

use coursezip_core::ProgressEvent;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::warn;

/// Draws progress until the sending side of `events` is dropped.
pub(crate) fn spawn_progress_ui(mut events: UnboundedReceiver<ProgressEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));

        while let Some(event) = events.recv().await {
            apply(&bar, event);
        }
        bar.finish_and_clear();
    })
}

/// Waits for the progress task to drain its channel.
pub(crate) async fn finish_progress_ui(handle: JoinHandle<()>) {
    if let Err(e) = handle.await {
        warn!(error = %e, "progress display task failed");
    }
}

fn apply(bar: &ProgressBar, event: ProgressEvent) {
    match event {
        ProgressEvent::Fetch(planned) => {
            bar.set_message(format!("Listing files... {}", HumanBytes(planned)));
        }
        ProgressEvent::Size(total) => {
            bar.set_length(total);
            bar.set_position(0);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner} [{bar:40}] {bytes}/{total_bytes} ({eta}) {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
            );
            bar.set_message("downloading");
        }
        ProgressEvent::Perc(downloaded) => bar.set_position(downloaded),
        ProgressEvent::Zip => bar.set_message("packaging"),
    }
}
