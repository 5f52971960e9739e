//! Long-running message loop.
//!
//! Reads one JSON request per line and writes every outbound event as one
//! JSON line:
//!
//! ```text
//! {"type":"post","session_id":"s1","team_id":"t1","post":{"id":"p1","channel_id":"c1","user_id":"u1","message":"outage!"}}
//! {"type":"ignore_thread","post_id":"p1","root_id":"","user_id":"u1"}
//! ```
//!
//! The keyword cache is refreshed in the background for as long as the
//! loop runs.

use super::App;
use crate::models::{Channel, Post, Session, SignalEvent};
use crate::{Error, Result};
use serde::Deserialize;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::TryRecvError;

/// One input line.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServeRequest {
    /// A message was posted.
    Post {
        /// Session the post was made from.
        session_id: String,
        /// Team owning the post's channel.
        team_id: String,
        /// Whether the session is a mobile client.
        #[serde(default)]
        is_mobile_app: bool,
        /// The post.
        post: Post,
    },
    /// The user pressed "No, ignore" on a suggestion.
    IgnoreThread {
        /// The suggestion's triggering post.
        post_id: String,
        /// Thread root of that post, empty for top-level posts.
        #[serde(default)]
        root_id: String,
        /// The user.
        user_id: String,
    },
}

/// Runs the loop over stdin and stdout until EOF or Ctrl-C.
///
/// # Errors
///
/// Returns an error if stdin or stdout fail.
pub async fn execute(app: &App) -> Result<()> {
    let refresher = app
        .service
        .keywords_cache()
        .spawn_refresher(app.config.keywords.refresh_interval());
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = std::io::stdout();

    let result = tokio::select! {
        result = run(app, stdin, stdout.lock()) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
            Ok(())
        },
    };

    refresher.shutdown().await;
    result
}

/// Processes requests from `reader`, writing outbound events to `writer`.
///
/// Malformed lines are logged and skipped.
///
/// # Errors
///
/// Returns an error if reading or writing fails.
pub async fn run<R, W>(app: &App, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut events = app.bus.subscribe();
    let mut lines = reader.lines();
    let mut processed = 0_u64;

    while let Some(line) = lines.next_line().await.map_err(io_error("read_request"))? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<ServeRequest>(line) {
            Ok(request) => handle(app, request).await,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed request line");
                continue;
            },
        }
        processed += 1;
        drain(&mut events, &mut writer)?;
    }

    tracing::info!(processed, "Input closed");
    Ok(())
}

async fn handle(app: &App, request: ServeRequest) {
    match request {
        ServeRequest::Post {
            session_id,
            team_id,
            is_mobile_app,
            post,
        } => {
            app.directory.add_channel(Channel {
                id: post.channel_id.clone(),
                team_id,
            });
            app.directory.add_session(Session {
                id: session_id.clone(),
                user_id: post.user_id.clone(),
                is_mobile_app,
            });
            app.service.on_message_posted(&session_id, &post).await;
        },
        ServeRequest::IgnoreThread {
            post_id,
            root_id,
            user_id,
        } => app.service.ignore_thread(&post_id, &root_id, &user_id),
    }
}

fn drain<W: Write>(events: &mut Receiver<SignalEvent>, writer: &mut W) -> Result<()> {
    loop {
        match events.try_recv() {
            Ok(event) => {
                let json = serde_json::to_string(&event).map_err(|e| Error::OperationFailed {
                    operation: "serialize_event".to_string(),
                    cause: e.to_string(),
                })?;
                writeln!(writer, "{json}").map_err(io_error("write_event"))?;
            },
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Output fell behind, events dropped");
            },
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    writer.flush().map_err(io_error("write_event"))
}

fn io_error(operation: &'static str) -> impl Fn(std::io::Error) -> Error {
    move |e| Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignalConfig;
    use crate::models::Playbook;
    use crate::storage::InMemoryPlaybookStore;

    fn app_with_outage_playbook() -> App {
        let app = App::with_store(SignalConfig::default(), InMemoryPlaybookStore::new());
        app.service
            .create(
                Playbook::new("t1", "Outage")
                    .with_keywords(["outage"])
                    .with_members(["u1"]),
                "u1",
            )
            .unwrap();
        app.service.keywords_cache().refresh();
        app
    }

    #[tokio::test]
    async fn test_post_line_yields_suggestion_line() {
        let app = app_with_outage_playbook();
        let input = concat!(
            r#"{"type":"post","session_id":"s1","team_id":"t1","post":{"id":"p1","channel_id":"c1","user_id":"u1","message":"outage!"}}"#,
            "\n",
            "not json\n",
        );
        let mut output = Vec::new();

        run(&app, input.as_bytes(), &mut output).await.unwrap();

        let output = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 1);
        let event: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(event["kind"], "suggestion");
        assert_eq!(event["post_id"], "p1");
    }

    #[tokio::test]
    async fn test_ignore_line_suppresses_thread() {
        let app = app_with_outage_playbook();
        let input = concat!(
            r#"{"type":"ignore_thread","post_id":"p1","user_id":"u1"}"#,
            "\n",
            r#"{"type":"post","session_id":"s1","team_id":"t1","post":{"id":"p2","channel_id":"c1","user_id":"u1","root_id":"p1","message":"outage again"}}"#,
            "\n",
        );
        let mut output = Vec::new();

        run(&app, input.as_bytes(), &mut output).await.unwrap();

        assert!(output.is_empty());
    }
}
