//! Terminal output: the progress bar and the command table.

use std::{io::Write, sync::Arc};

use {
    pjman_common::CommandRecord,
    pjman_progress::{
        BroadcastListener, PluginProgress, ProgressBus, ProgressEvent, ProgressListener,
        SubscriptionId,
    },
    tokio::{sync::broadcast::error::RecvError, task::JoinHandle},
    tracing::warn,
};

const BAR_WIDTH: usize = 80;

/// `|====>      | 25/100%`, 80 columns plus the percentage.
pub fn progress_bar(percentage: i64) -> String {
    // Out-of-range percentages draw as an empty or full bar.
    let filled = ((percentage as f64 / 100.0) * BAR_WIDTH as f64)
        .round()
        .clamp(0.0, BAR_WIDTH as f64) as i64;
    let arrow = usize::try_from(filled - 1).unwrap_or(0);
    let rest = usize::try_from(BAR_WIDTH as i64 - filled - 2).unwrap_or(0);
    format!(
        "|{}>{}| {percentage}/100%",
        "=".repeat(arrow),
        " ".repeat(rest)
    )
}

/// Draws bus events on stderr, redrawing the bar in place.
#[derive(Debug, Default)]
pub struct ConsoleRenderer;

impl ConsoleRenderer {
    fn draw(progress: &PluginProgress) {
        let mut err = std::io::stderr().lock();
        let _ = write!(
            err,
            "\r\x1b[2K{} {}: {}",
            progress_bar(progress.percentage),
            progress.plugin,
            progress.message
        );
        let _ = err.flush();
    }
}

impl ProgressListener for ConsoleRenderer {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::PluginStart(p) | ProgressEvent::PluginProgress(p) => Self::draw(p),
            ProgressEvent::PluginComplete(p) => {
                Self::draw(p);
                eprintln!();
            },
            ProgressEvent::Completed(_) => {},
            ProgressEvent::Error(err) => eprintln!("\nerror: {err}"),
        }
    }
}

/// Writes bus events as JSON lines from a background task.
pub struct EventStream<W> {
    listener: Arc<BroadcastListener>,
    subscription: SubscriptionId,
    task: JoinHandle<W>,
}

impl<W: Write + Send + 'static> EventStream<W> {
    pub fn attach(bus: &ProgressBus, mut out: W) -> Self {
        let listener = Arc::new(BroadcastListener::default());
        let mut rx = listener.subscribe();
        let subscription = bus.subscribe(listener.clone());
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Ok(line) = serde_json::to_string(&event) {
                            let _ = writeln!(out, "{line}");
                        }
                    },
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
            let _ = out.flush();
            out
        });
        Self {
            listener,
            subscription,
            task,
        }
    }

    /// Detach from `bus` and wait until every event already published has
    /// been written. Returns the writer.
    pub async fn finish(self, bus: &ProgressBus) -> Option<W> {
        bus.unsubscribe(self.subscription);
        drop(self.listener);
        self.task.await.ok()
    }
}

/// Fixed-width listing of the command log, oldest first.
pub fn command_table(records: &[CommandRecord]) -> String {
    if records.is_empty() {
        return "No commands recorded.\n".to_string();
    }
    let rows: Vec<[String; 4]> = records
        .iter()
        .map(|r| {
            let target = r.target_str().map_or_else(|| r.target.to_string(), str::to_string);
            [r.id.to_string(), r.timestamp.to_string(), r.operation.clone(), target]
        })
        .collect();
    let header = ["ID", "TIMESTAMP", "OPERATION", "TARGET"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    let mut line = |cells: [&str; 4]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        out.push_str(padded.join("  ").trim_end());
        out.push('\n');
    };
    line(header);
    for row in &rows {
        line([row[0].as_str(), row[1].as_str(), row[2].as_str(), row[3].as_str()]);
    }
    out
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn bar_shape() {
        let quarter = progress_bar(25);
        assert!(quarter.starts_with(&format!("|{}>", "=".repeat(19))));
        assert!(quarter.ends_with("| 25/100%"));
        assert_eq!(quarter.len(), 1 + 19 + 1 + 58 + "| 25/100%".len());

        let empty = progress_bar(0);
        assert!(empty.starts_with("|>"));
        let full = progress_bar(100);
        assert!(full.starts_with(&format!("|{}>|", "=".repeat(79))));
    }

    #[tokio::test]
    async fn event_stream_writes_json_lines_until_finished() {
        let bus = ProgressBus::new();
        let stream = EventStream::attach(&bus, Vec::new());
        bus.start("analyze");
        bus.increment("half", 50, "analyze");
        bus.complete(json!({"ok": true}));

        let out = stream.finish(&bus).await.unwrap();
        assert_eq!(bus.subscriber_count(), 0);
        let lines: Vec<ProgressEvent> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].plugin_progress().unwrap().percentage, 50);
        assert_eq!(lines[2], ProgressEvent::Completed(json!({"ok": true})));
    }

    #[test]
    fn bar_clamps_out_of_range_percentages() {
        let over = progress_bar(i64::MAX);
        assert!(over.starts_with(&format!("|{}>|", "=".repeat(79))));
        assert!(over.len() < 2 * BAR_WIDTH + 32);

        let under = progress_bar(-40);
        assert!(under.starts_with("|>"));
        assert!(under.ends_with("| -40/100%"));
    }

    #[test]
    fn table_aligns_columns() {
        let mut record = CommandRecord::new(json!("package.json"), "backup");
        record.timestamp = 42;
        let table = command_table(&[record.clone()]);
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].starts_with(&record.id.to_string()));
        assert!(lines[1].ends_with("backup     package.json"));
        assert_eq!(lines[0].find("OPERATION"), lines[1].find("backup"));
    }

    #[test]
    fn empty_table() {
        assert_eq!(command_table(&[]), "No commands recorded.\n");
    }
}
