use super::oauth::authorization_header;
use super::{build_http_client, Credentials};
use crate::error::{FeedError, Result};
use crate::models::{FilterQuery, StallWarning, StreamMessage};
use crate::streaming::transport::{EventSink, StreamHandle, StreamTransport};
use crate::streaming::{StreamError, StreamEvent, WatcherConfig};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use std::io::{BufRead, BufReader};
use std::sync::{mpsc, Mutex, PoisonError};
use std::time::Duration;

/// Minimum wait after the API asked us to slow down (HTTP 420/429)
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct StatusPayload {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    extended_tweet: Option<ExtendedTweet>,
    user: UserPayload,
}

#[derive(Debug, Deserialize)]
struct ExtendedTweet {
    full_text: String,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    screen_name: String,
}

#[derive(Debug, Deserialize)]
struct WarningPayload {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    percent_full: u8,
}

/// Translate one line of the stream into the event the watcher acts on
///
/// Statuses become messages and `warning` objects become stall warnings.
/// Everything else the stream sends (deletions, limit notices, geo scrubs,
/// ...) is dropped here.
pub fn parse_payload(line: &str) -> Result<Option<StreamEvent>> {
    let value: serde_json::Value = serde_json::from_str(line)?;

    if let Some(warning) = value.get("warning") {
        let warning: WarningPayload = serde_json::from_value(warning.clone())?;
        return Ok(Some(StreamEvent::Stall(StallWarning {
            code: warning.code,
            message: warning.message,
            percent_full: warning.percent_full,
        })));
    }

    if value.get("user").is_some() && (value.get("text").is_some() || value.get("extended_tweet").is_some()) {
        let status: StatusPayload = serde_json::from_value(value)?;
        let text = status
            .extended_tweet
            .map(|extended| extended.full_text)
            .or(status.text)
            .unwrap_or_default();
        let text = html_escape::decode_html_entities(&text).into_owned();
        return Ok(Some(StreamEvent::Message(StreamMessage::new(
            status.user.screen_name,
            text,
        ))));
    }

    log::trace!("Discarding stream payload: {}", line);
    Ok(None)
}

/// Delay before the next reconnect attempt
pub fn next_backoff(current: Duration, max: Duration, error: Option<&StreamError>) -> Duration {
    let doubled = current.saturating_mul(2).min(max);
    match error.and_then(|e| e.status) {
        Some(420) | Some(429) => doubled.max(RATE_LIMIT_BACKOFF),
        _ => doubled,
    }
}

/// Filtered stream over HTTP, read as newline delimited JSON
///
/// Each opened stream runs on its own thread. A connection that stays silent
/// for `read_timeout` is treated as dropped. Shutdown is noticed between
/// lines and during reconnect waits, so closing a silent connection can take
/// up to `read_timeout`.
pub struct HttpStreamTransport {
    http: reqwest::blocking::Client,
    credentials: Credentials,
    config: WatcherConfig,
}

impl std::fmt::Debug for HttpStreamTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpStreamTransport")
            .field("stream_url", &self.config.stream_url)
            .finish()
    }
}

impl HttpStreamTransport {
    pub fn new(credentials: Credentials, config: WatcherConfig) -> Result<Self> {
        let http = build_http_client(
            reqwest::blocking::Client::builder()
                .connect_timeout(config.connect_timeout)
                .timeout(config.read_timeout),
        )?;
        Ok(Self {
            http,
            credentials,
            config,
        })
    }
}

impl StreamTransport for HttpStreamTransport {
    fn open(&self, filter: &FilterQuery, sink: EventSink) -> Result<Box<dyn StreamHandle>> {
        if filter.follow.is_empty() {
            return Err(FeedError::Transport(
                "cannot open a stream without accounts to follow".to_string(),
            ));
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel();
        let worker = StreamWorker {
            http: self.http.clone(),
            credentials: self.credentials.clone(),
            config: self.config.clone(),
            follow: filter.follow_param(),
            sink,
            shutdown: shutdown_rx,
        };

        std::thread::Builder::new()
            .name("linkwatch-stream".to_string())
            .spawn(move || worker.run())
            .map_err(|e| FeedError::Transport(format!("failed to spawn stream thread: {}", e)))?;

        log::info!("Opened filtered stream for {} account(s)", filter.follow.len());
        Ok(Box::new(HttpStreamHandle {
            shutdown: Mutex::new(Some(shutdown_tx)),
        }))
    }
}

/// Handle to a stream opened by `HttpStreamTransport`
#[derive(Debug)]
pub struct HttpStreamHandle {
    shutdown: Mutex<Option<mpsc::Sender<()>>>,
}

impl StreamHandle for HttpStreamHandle {
    fn shutdown(&self) {
        let sender = self
            .shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            log::debug!("Requesting stream shutdown");
            let _ = sender.send(());
        }
    }
}

enum ReadOutcome {
    Stopped,
    Dropped(String),
}

struct StreamWorker {
    http: reqwest::blocking::Client,
    credentials: Credentials,
    config: WatcherConfig,
    follow: String,
    sink: EventSink,
    shutdown: mpsc::Receiver<()>,
}

impl StreamWorker {
    fn run(self) {
        let mut backoff = self.config.reconnect_backoff;

        loop {
            if self.stop_requested() {
                break;
            }

            let error = match self.connect() {
                Ok(response) => {
                    if !self.sink.connected() {
                        break;
                    }
                    backoff = self.config.reconnect_backoff;
                    match self.read_lines(response) {
                        ReadOutcome::Stopped => break,
                        ReadOutcome::Dropped(reason) => {
                            log::warn!("Stream connection dropped: {}", reason);
                            self.sink.disconnected();
                            StreamError::new(reason)
                        }
                    }
                }
                Err(error) => {
                    log::warn!("Failed to connect to stream: {}", error);
                    error
                }
            };

            let delay = backoff;
            backoff = next_backoff(backoff, self.config.max_reconnect_backoff, Some(&error));
            if !self.sink.error(error) {
                break;
            }

            log::debug!("Reconnecting in {:?}", delay);
            if self.wait(delay) {
                break;
            }
        }

        log::info!("Stream worker stopped");
        self.sink.cleaned_up();
    }

    fn stop_requested(&self) -> bool {
        !matches!(self.shutdown.try_recv(), Err(mpsc::TryRecvError::Empty))
    }

    /// Sleep for `delay`; returns true when shutdown was requested meanwhile
    fn wait(&self, delay: Duration) -> bool {
        !matches!(
            self.shutdown.recv_timeout(delay),
            Err(mpsc::RecvTimeoutError::Timeout)
        )
    }

    fn connect(&self) -> std::result::Result<reqwest::blocking::Response, StreamError> {
        let params = [("follow", self.follow.as_str())];
        let auth = authorization_header(&self.credentials, "POST", &self.config.stream_url, &params)
            .map_err(|e| StreamError::new(e.to_string()))?;

        let response = self
            .http
            .post(&self.config.stream_url)
            .header(AUTHORIZATION, auth)
            .form(&params)
            .send()
            .map_err(|e| StreamError::new(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(StreamError::from_status(
            status.as_u16(),
            format!("{}:{}", status.as_u16(), body.trim()),
        ))
    }

    fn read_lines(&self, response: reqwest::blocking::Response) -> ReadOutcome {
        for line in BufReader::new(response).lines() {
            if self.stop_requested() {
                return ReadOutcome::Stopped;
            }
            let line = match line {
                Ok(line) => line,
                Err(e) => return ReadOutcome::Dropped(e.to_string()),
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match parse_payload(line) {
                Ok(Some(event)) => {
                    if !self.sink.send(event) {
                        return ReadOutcome::Stopped;
                    }
                }
                Ok(None) => {}
                Err(e) => log::warn!("Skipping malformed stream payload: {}", e),
            }
        }
        ReadOutcome::Dropped("stream closed by server".to_string())
    }
}
