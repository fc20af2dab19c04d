//! Line-driven front end for the debounced search controller.
//!
//! Every stdin line replaces the search text, as if it had been typed into the
//! search box. Lines starting with `:` are commands:
//!
//! - `:limit N` changes the result count (10, 20, 30 or 50)
//! - `:search` searches immediately
//! - `:quit` stops
//!
//! Start a line with `::` to search for text that begins with a colon.

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{Sleep, sleep};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use tracing::debug;

use crate::error::AptSearchError;
use crate::render;
use crate::search::{self, Alert, ResultLimit, SearchBackend, SearchHandle, SearchSettings};

/// Extra time allowed after stdin closes for the last request to start.
const SETTLE_GRACE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WatchInput {
    Text(String),
    Limit(ResultLimit),
    Search,
    Quit,
}

pub(crate) fn parse_line(line: &str) -> Result<WatchInput, AptSearchError> {
    if let Some(rest) = line.strip_prefix("::") {
        return Ok(WatchInput::Text(format!(":{rest}")));
    }
    let Some(command) = line.strip_prefix(':') else {
        return Ok(WatchInput::Text(line.to_string()));
    };

    let words = shlex::split(command).ok_or_else(|| {
        AptSearchError::InvalidArgument(format!("Could not parse command ':{command}'"))
    })?;
    match words.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["limit", value] => Ok(WatchInput::Limit(value.parse()?)),
        ["limit"] => Err(AptSearchError::InvalidArgument(
            "Usage: :limit <10|20|30|50>".into(),
        )),
        ["search"] | ["s"] => Ok(WatchInput::Search),
        ["quit"] | ["q"] | ["exit"] => Ok(WatchInput::Quit),
        _ => Err(AptSearchError::InvalidArgument(format!(
            "Unknown command ':{}'. Use :limit N, :search or :quit",
            command.trim()
        ))),
    }
}

fn forward(handle: &SearchHandle, input: WatchInput) -> Result<(), AptSearchError> {
    match input {
        WatchInput::Text(text) => handle.set_query(text),
        WatchInput::Limit(limit) => handle.set_limit(limit),
        WatchInput::Search => handle.submit(),
        WatchInput::Quit => Ok(()),
    }
}

async fn wait_settled(settle: &mut Option<Pin<Box<Sleep>>>) {
    match settle {
        Some(deadline) if !deadline.is_elapsed() => deadline.as_mut().await,
        _ => pending().await,
    }
}

fn render_state(
    state: &search::SearchState,
    min_chars: usize,
    json: bool,
) -> Result<String, AptSearchError> {
    if json {
        let mut out = serde_json::to_string(state)?;
        out.push('\n');
        return Ok(out);
    }
    let mut out = render::markdown::search_state_markdown(state, min_chars)?;
    out.push('\n');
    Ok(out)
}

fn render_alert(alert: &Alert, json: bool) -> Result<String, AptSearchError> {
    if json {
        let mut out = serde_json::to_string(alert)?;
        out.push('\n');
        return Ok(out);
    }
    Ok(format!("[{}] {}\n", alert.title, alert.message))
}

/// Runs until `:quit`, Ctrl-C, or stdin closes and the last search settles.
pub async fn run(
    backend: impl SearchBackend,
    limit: ResultLimit,
    debounce: Duration,
    json: bool,
) -> anyhow::Result<String> {
    let settings = SearchSettings {
        debounce,
        initial_limit: limit,
        ..SearchSettings::default()
    };
    let min_chars = settings.min_query_chars;
    let (alerts_tx, mut alerts_rx) = mpsc::unbounded_channel::<Alert>();
    let handle = search::spawn(backend, alerts_tx, settings);
    let mut states = handle.subscribe();

    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();
    let mut settle: Option<Pin<Box<Sleep>>> = None;

    loop {
        tokio::select! {
            line = lines.next(), if settle.is_none() => match line {
                Some(line) => match parse_line(&line?) {
                    Ok(WatchInput::Quit) => break,
                    Ok(input) => forward(&handle, input)?,
                    Err(err) => {
                        stderr.write_all(format!("Error: {err}\n").as_bytes()).await?;
                        stderr.flush().await?;
                    }
                },
                None => {
                    debug!("stdin closed; waiting for the last search to settle");
                    settle = Some(Box::pin(sleep(debounce + SETTLE_GRACE)));
                }
            },
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = states.borrow_and_update().clone();
                stdout.write_all(render_state(&snapshot, min_chars, json)?.as_bytes()).await?;
                stdout.flush().await?;
                let settled = settle.as_ref().is_some_and(|deadline| deadline.is_elapsed());
                if settled && !snapshot.loading {
                    break;
                }
            },
            Some(alert) = alerts_rx.recv() => {
                stderr.write_all(render_alert(&alert, json)?.as_bytes()).await?;
                stderr.flush().await?;
            },
            _ = wait_settled(&mut settle) => {
                if !states.borrow().loading {
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.shutdown().await;
    while let Ok(alert) = alerts_rx.try_recv() {
        stderr.write_all(render_alert(&alert, json)?.as_bytes()).await?;
    }
    stderr.flush().await?;
    Ok(String::new())
}
