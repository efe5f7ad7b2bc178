use std::pin::{pin, Pin};
use std::task::{Context, Poll};

use chrono::Utc;
use futures_util::{Stream, StreamExt};
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::api::{GenerateOptions, GenerateRequest};
use crate::core::config::data::ServerSettings;
use crate::core::constants::GENERATE_ENDPOINT;
use crate::core::message::{FailureKind, GenerationFailure, GenerationSuccess};
use crate::core::modes::GenerateProps;
use crate::core::ndjson::{decode_stream, DecodeError, DoneStats, GenerateChunk, StreamReadError};
use crate::utils::url::{construct_api_url, parse_http_url};

/// What a running generation reports to its owner, in stream order.
///
/// A generation yields any number of `Token`s and then exactly one
/// `Completed` or `Failed`.
#[derive(Clone, Debug, PartialEq)]
pub enum GenerationEvent {
    Token(String),
    Completed(GenerationSuccess),
    Failed(GenerationFailure),
}

impl GenerationEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GenerationEvent::Token(_))
    }
}

/// Everything that can stop a generation. The `Display` text is what the
/// user sees.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Generation URL server is wrong")]
    InvalidUrl(String),
    #[error("Generation connection error")]
    Connect(#[source] reqwest::Error),
    #[error("Generation communication error")]
    Communication(#[source] reqwest::Error),
    #[error("Unknown generation error")]
    Transport(#[source] reqwest::Error),
    #[error("Unexpected server generation information response")]
    Informational(StatusCode),
    #[error("Generation server response error")]
    ServerStatus(StatusCode),
    #[error("Generation client request error")]
    ClientStatus(StatusCode),
    #[error("Unexpected server generation redirection response")]
    Redirect(StatusCode),
    #[error("Generation response is empty")]
    EmptyBody,
    #[error("Generation server error: {0}")]
    ServerReported(String),
    #[error("Generation response could not be decoded")]
    Decode(#[source] DecodeError),
    #[error("Generation was aborted before starting")]
    AbortedBeforeStart,
    #[error("Generation was aborted")]
    Aborted,
}

impl GenerationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            GenerationError::InvalidUrl(_)
            | GenerationError::Connect(_)
            | GenerationError::Communication(_)
            | GenerationError::Transport(_) => FailureKind::Transport,
            GenerationError::Informational(_)
            | GenerationError::ServerStatus(_)
            | GenerationError::ClientStatus(_)
            | GenerationError::Redirect(_)
            | GenerationError::EmptyBody
            | GenerationError::ServerReported(_) => FailureKind::Protocol,
            GenerationError::Decode(_) => FailureKind::Decode,
            GenerationError::AbortedBeforeStart | GenerationError::Aborted => {
                FailureKind::Aborted
            }
        }
    }

    pub fn to_failure(&self) -> GenerationFailure {
        GenerationFailure::new(self.kind(), self.to_string())
    }

    fn from_send_error(err: reqwest::Error) -> Self {
        if err.is_builder() {
            GenerationError::InvalidUrl(err.to_string())
        } else if err.is_connect() {
            GenerationError::Connect(err)
        } else if err.is_timeout() || err.is_request() || err.is_body() {
            GenerationError::Communication(err)
        } else {
            GenerationError::Transport(err)
        }
    }
}

/// Classify a response status. Only 2xx lets the body be read.
pub fn check_status(status: StatusCode) -> Result<(), GenerationError> {
    match status.as_u16() {
        0..=199 => Err(GenerationError::Informational(status)),
        200..=299 => Ok(()),
        300..=399 => Err(GenerationError::Redirect(status)),
        400..=499 => Err(GenerationError::ClientStatus(status)),
        _ => Err(GenerationError::ServerStatus(status)),
    }
}

/// User-facing note for the server's `done_reason`.
pub fn describe_done_reason(done_reason: &str) -> &'static str {
    match done_reason {
        "stop" => "",
        "length" => "Max tokens generated",
        "load" => "Nothing generated",
        _ => "Unknown done reason",
    }
}

impl GenerationSuccess {
    pub fn from_done(stats: DoneStats) -> Self {
        let done_reason = stats.done_reason.unwrap_or_default();
        Self {
            description: describe_done_reason(&done_reason).to_string(),
            completed_at: Utc::now(),
            done_reason,
            total_duration: stats.total_duration,
            load_duration: stats.load_duration,
            prompt_eval_count: stats.prompt_eval_count,
            prompt_eval_duration: stats.prompt_eval_duration,
            eval_count: stats.eval_count,
            eval_duration: stats.eval_duration,
        }
    }
}

/// Build the HTTP client used for generations. Redirects are never followed
/// so that a 3xx reaches [`check_status`].
pub fn build_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
}

pub fn build_request(settings: &ServerSettings, props: &GenerateProps) -> GenerateRequest {
    GenerateRequest {
        model: settings.model.clone(),
        system: props.system.clone(),
        prompt: props.prompt.clone(),
        format: props.format,
        stream: true,
        options: GenerateOptions {
            seed: settings.seed,
            temperature: settings.temperature,
        },
    }
}

/// Run one generation to completion, reporting every event to `emit`.
///
/// Always emits exactly one terminal event, whatever happens on the wire.
pub async fn run_generation<F>(
    client: &reqwest::Client,
    settings: &ServerSettings,
    props: &GenerateProps,
    cancel_token: &CancellationToken,
    mut emit: F,
) where
    F: FnMut(GenerationEvent),
{
    let terminal = match stream_generation(client, settings, props, cancel_token, &mut emit).await
    {
        Ok(success) => {
            info!(
                mode = %props.mode,
                done_reason = %success.done_reason,
                eval_count = success.eval_count,
                "generation completed"
            );
            GenerationEvent::Completed(success)
        }
        Err(err) => {
            info!(mode = %props.mode, kind = ?err.kind(), error = ?err, "generation failed");
            GenerationEvent::Failed(err.to_failure())
        }
    };
    emit(terminal);
}

async fn stream_generation<F>(
    client: &reqwest::Client,
    settings: &ServerSettings,
    props: &GenerateProps,
    cancel_token: &CancellationToken,
    emit: &mut F,
) -> Result<GenerationSuccess, GenerationError>
where
    F: FnMut(GenerationEvent),
{
    let url = construct_api_url(&settings.base_url, GENERATE_ENDPOINT);
    let url = parse_http_url(&url).ok_or(GenerationError::InvalidUrl(url))?;
    let request = build_request(settings, props);

    debug!(%url, model = %request.model, mode = %props.mode, "sending generation request");

    let send = client
        .post(url)
        .header("Content-Type", "application/json")
        .json(&request)
        .send();

    let response = tokio::select! {
        biased;
        _ = cancel_token.cancelled() => return Err(GenerationError::AbortedBeforeStart),
        result = send => result.map_err(GenerationError::from_send_error)?,
    };

    let status = response.status();
    debug!(%status, "generation response received");
    check_status(status)?;
    if response.content_length() == Some(0) {
        return Err(GenerationError::EmptyBody);
    }

    let mut records = pin!(decode_stream(response.bytes_stream()));
    let mut outcome: Option<GenerationSuccess> = None;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => return Err(GenerationError::Aborted),
            next = records.next() => next,
        };

        let chunk = match next {
            None => break,
            Some(Ok(chunk)) => chunk,
            Some(Err(StreamReadError::Read(err))) => {
                return Err(GenerationError::Communication(err))
            }
            Some(Err(StreamReadError::Decode(err))) => return Err(GenerationError::Decode(err)),
        };

        match chunk {
            GenerateChunk::Token(text) => {
                if !text.is_empty() {
                    trace!(len = text.len(), "token");
                    emit(GenerationEvent::Token(text));
                }
            }
            GenerateChunk::Done { response, stats } => {
                if !response.is_empty() {
                    emit(GenerationEvent::Token(response));
                }
                outcome = Some(GenerationSuccess::from_done(stats));
            }
            GenerateChunk::Error(message) => return Err(GenerationError::ServerReported(message)),
        }
    }

    Ok(outcome.unwrap_or_else(|| GenerationSuccess::unknown(Utc::now())))
}

/// Events of a single generation started with [`generate`].
pub struct GenerationEvents {
    rx: mpsc::UnboundedReceiver<GenerationEvent>,
}

impl Stream for GenerationEvents {
    type Item = GenerationEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Start a generation on the current runtime and return its events.
///
/// The sequence ends right after the terminal event. Dropping it does not
/// stop the request; cancel `cancel_token` for that.
pub fn generate(
    client: reqwest::Client,
    settings: ServerSettings,
    props: GenerateProps,
    cancel_token: CancellationToken,
) -> GenerationEvents {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        run_generation(&client, &settings, &props, &cancel_token, |event| {
            let _ = tx.send(event);
        })
        .await;
    });
    GenerationEvents { rx }
}

pub struct GenerationParams {
    pub client: reqwest::Client,
    pub settings: ServerSettings,
    pub props: GenerateProps,
    pub cancel_token: CancellationToken,
    pub stream_id: u64,
}

/// Runs generations in the background and funnels their events, tagged with
/// the owning `stream_id`, into one channel.
#[derive(Clone)]
pub struct GenerationService {
    tx: mpsc::UnboundedSender<(GenerationEvent, u64)>,
}

impl GenerationService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(GenerationEvent, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn spawn_generation(&self, params: GenerationParams) -> tokio::task::JoinHandle<()> {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let GenerationParams {
                client,
                settings,
                props,
                cancel_token,
                stream_id,
            } = params;

            run_generation(&client, &settings, &props, &cancel_token, |event| {
                let _ = tx.send((event, stream_id));
            })
            .await;
        })
    }

    #[cfg(test)]
    pub fn send_for_test(&self, event: GenerationEvent, stream_id: u64) {
        let _ = self.tx.send((event, stream_id));
    }
}
