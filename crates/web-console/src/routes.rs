//! Routes of the status console

use std::fmt::Write;

use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use rtpmon_core::{IntervalStats, WindowReader};
use tower_http::trace::TraceLayer;

/// Build the status router over a window reader
pub fn router(reader: WindowReader) -> Router {
    Router::new()
        .route("/", get(html_handler))
        .route("/json", get(json_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(reader)
}

async fn json_handler(State(reader): State<WindowReader>) -> Json<Vec<IntervalStats>> {
    Json(reader.snapshot_all())
}

async fn html_handler(State(reader): State<WindowReader>) -> Html<String> {
    Html(render_table(&reader.snapshot_all()))
}

/// Render snapshots as an HTML page holding one table, oldest row first
pub fn render_table(history: &[IntervalStats]) -> String {
    let mut page = String::from(
        "<!DOCTYPE html>\n<html lang=\"en\"><head><title>rtpproxy monitor</title></head><body><table>\n\
         <tr><th>unixtime</th><th>received</th><th>ooo</th><th>delay</th></tr>\n",
    );
    for stats in history {
        // writing to a String cannot fail
        let _ = writeln!(
            page,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            stats.interval_start, stats.received, stats.out_of_order, stats.cumulative_delay
        );
    }
    page.push_str("</table></body></html>\n");
    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use rtpmon_core::HistoryWindow;
    use tower::ServiceExt;

    fn stats(start: i64, received: u16, ooo: u16, delay: u32) -> IntervalStats {
        IntervalStats {
            interval_start: start,
            received,
            out_of_order: ooo,
            cumulative_delay: delay,
            last_sequence: 0,
        }
    }

    fn filled_window() -> HistoryWindow {
        let mut window = HistoryWindow::new(3, 1).unwrap();
        window.push_back(stats(1_700_000_000, 2950, 0, 16_000));
        window.push_back(stats(1_700_000_060, 2948, 2, 15_800));
        window
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_json_lists_snapshots_oldest_first() {
        let window = filled_window();
        let (status, content_type, body) = get_body(router(window.reader()), "/json").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert_eq!(
            body,
            r#"[{"unixtime":1700000000,"received":2950,"ooo":0,"delay":16000},{"unixtime":1700000060,"received":2948,"ooo":2,"delay":15800}]"#
        );
    }

    #[tokio::test]
    async fn test_json_on_empty_window() {
        let window = HistoryWindow::new(3, 1).unwrap();
        let (status, _, body) = get_body(router(window.reader()), "/json").await;
        assert_eq!(status, StatusCode::OK);
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_html_table_rows() {
        let window = filled_window();
        let (status, content_type, body) = get_body(router(window.reader()), "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(content_type.unwrap().starts_with("text/html"));
        assert!(body.contains("<th>unixtime</th><th>received</th><th>ooo</th><th>delay</th>"));
        assert!(body.contains("<tr><td>1700000000</td><td>2950</td><td>0</td><td>16000</td></tr>"));
        assert!(body.contains("<tr><td>1700000060</td><td>2948</td><td>2</td><td>15800</td></tr>"));
        assert_eq!(body.matches("<tr>").count(), 3);
    }

    #[tokio::test]
    async fn test_reads_track_the_window() {
        let mut window = filled_window();
        let app = router(window.reader());
        window.push_back(stats(1_700_000_120, 10, 1, 80));
        window.push_back(stats(1_700_000_180, 20, 0, 160));

        let (_, _, body) = get_body(app, "/json").await;
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0]["unixtime"], 1_700_000_060);
        assert_eq!(parsed[2]["received"], 20);
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let window = HistoryWindow::new(3, 1).unwrap();
        let (status, _, _) = get_body(router(window.reader()), "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
