//! Prometheus text exposition of the agent metrics.

use super::AppState;
use crate::metrics::MetricsSnapshot;
use axum::{extract::State, http::header, response::IntoResponse};
use std::fmt::Write;

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// GET /metrics
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = render(&state.metrics.snapshot());
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body)
}

/// Render `snapshot` in the Prometheus text format.
pub fn render(snapshot: &MetricsSnapshot) -> String {
    let mut out = String::new();

    sample(
        &mut out,
        "dumpbeat_count_files_in_dump_directory",
        "gauge",
        "Number of files in the dump directory",
        snapshot.files_in_dump_dir,
    );
    sample(
        &mut out,
        "dumpbeat_dumps_sent_total",
        "counter",
        "Dumps accepted by the collection API",
        snapshot.dumps_sent,
    );
    sample(
        &mut out,
        "dumpbeat_dumps_failed_total",
        "counter",
        "Dumps that could not be delivered",
        snapshot.dumps_failed,
    );
    sample(
        &mut out,
        "dumpbeat_archives_created_total",
        "counter",
        "Daily tarballs written to the backup directory",
        snapshot.archives_created,
    );

    out
}

fn sample(out: &mut String, name: &str, kind: &str, help: &str, value: impl std::fmt::Display) {
    // Writing into a String cannot fail
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} {}", name, kind);
    let _ = writeln!(out, "{} {}", name, value);
}
