//! Generation client
//!
//! Wraps a [`ChatModel`] with the call policy from [`GenerationConfig`]:
//! - Each wait for data is bounded by the request timeout
//! - The initial connection is retried on transient failures, with a
//!   linearly growing delay between attempts
//! - Once the first chunk has been observed, failures are surfaced on the
//!   stream and never retried

use crate::config::GenerationConfig;
use crate::error::{ConfigError, GenerationError, MissingFieldError, ModelError};
use crate::model::{ChatModel, ChunkStream, ModelRequest};
use crate::prompt::{background_template, PromptTemplate};
use crate::request::GenerationRequest;
use futures::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, info, warn};

/// Ordered, non-empty text chunks of one generation
///
/// Finite and not restartable. Yields at most one error, as its last item.
pub type GenerationStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// Streaming and buffered text generation over a chat model
#[derive(Clone)]
pub struct GenerationClient {
    model: Arc<dyn ChatModel>,
    config: GenerationConfig,
    template: PromptTemplate,
}

enum AttemptError {
    TimedOut,
    Model(ModelError),
}

impl AttemptError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::TimedOut => true,
            Self::Model(err) => err.is_retryable(),
        }
    }
}

impl GenerationClient {
    /// Create client using the background drafting template
    ///
    /// # Errors
    /// - `ConfigError` if the configuration is inconsistent
    pub fn new(model: Arc<dyn ChatModel>, config: GenerationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            model,
            config,
            template: background_template().clone(),
        })
    }

    /// With prompt template
    #[inline]
    #[must_use]
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Call configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Prompt template
    #[inline]
    #[must_use]
    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Render the prompt for a request
    ///
    /// # Errors
    /// - `MissingFieldError` if the template needs a field the request lacks
    pub fn render_prompt(&self, request: &GenerationRequest) -> Result<String, MissingFieldError> {
        self.template.render(&request.prompt_fields())
    }

    /// Stream generated text for a request
    ///
    /// Resolves once the first chunk has arrived, so failures before any
    /// output are reported here rather than on the stream.
    ///
    /// # Errors
    /// - `GenerationError::Prompt` if the prompt cannot be rendered
    /// - `GenerationError::Timeout` if no attempt produced data in time
    /// - `GenerationError::Upstream` for a non-retryable failure or when
    ///   retries are exhausted
    pub async fn stream(&self, request: &GenerationRequest) -> Result<GenerationStream, GenerationError> {
        let prompt = self.render_prompt(request)?;
        self.stream_prompt(prompt).await
    }

    /// Generate the full text for a request
    ///
    /// # Errors
    /// - Any error of [`stream`](Self::stream), or a mid-stream failure
    pub async fn invoke(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let mut chunks = self.stream(request).await?;
        let mut text = String::new();
        while let Some(chunk) = chunks.next().await {
            text.push_str(&chunk?);
        }
        Ok(text)
    }

    /// Stream generated text for an already rendered prompt
    ///
    /// # Errors
    /// - `GenerationError::Timeout` or `GenerationError::Upstream` as for
    ///   [`stream`](Self::stream)
    pub async fn stream_prompt(&self, prompt: String) -> Result<GenerationStream, GenerationError> {
        let request = ModelRequest::new(self.config.model.clone(), prompt)
            .with_temperature(self.config.temperature)
            .with_stream(self.config.streaming);
        let timeout = self.config.timeout();
        let max_attempts = self.config.max_attempts();

        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(attempt, max_attempts, model = %request.model, "Starting generation attempt");

            let failure = match self.attempt(&request, timeout).await {
                Ok(Some((first, rest))) => {
                    info!(attempt, "Generation started");
                    return Ok(relay(first, rest, timeout));
                }
                Ok(None) => {
                    warn!(attempt, "Model finished without output");
                    let empty: GenerationStream =
                        Box::pin(stream::empty::<Result<String, GenerationError>>());
                    return Ok(empty);
                }
                Err(failure) => failure,
            };

            if !failure.is_retryable() || attempt >= max_attempts {
                return Err(match failure {
                    AttemptError::TimedOut => GenerationError::Timeout {
                        after: timeout,
                        attempts: attempt,
                    },
                    AttemptError::Model(source) => GenerationError::Upstream {
                        attempts: attempt,
                        source,
                    },
                });
            }

            let delay = self.config.backoff_for(attempt);
            match &failure {
                AttemptError::TimedOut => {
                    warn!(attempt, max_attempts, ?delay, "No data from model in time, retrying");
                }
                AttemptError::Model(err) => {
                    warn!(attempt, max_attempts, ?delay, error = %err, "Model call failed, retrying");
                }
            }
            time::sleep(delay).await;
        }
    }

    /// Open one call and wait for its first non-empty chunk
    async fn attempt(
        &self,
        request: &ModelRequest,
        timeout: Duration,
    ) -> Result<Option<(String, ChunkStream)>, AttemptError> {
        let mut chunks = match time::timeout(timeout, self.model.open(request)).await {
            Err(_) => return Err(AttemptError::TimedOut),
            Ok(Err(err)) => return Err(AttemptError::Model(err)),
            Ok(Ok(chunks)) => chunks,
        };

        loop {
            match time::timeout(timeout, chunks.next()).await {
                Err(_) => return Err(AttemptError::TimedOut),
                Ok(None) => return Ok(None),
                Ok(Some(Err(err))) => return Err(AttemptError::Model(err)),
                Ok(Some(Ok(text))) if text.is_empty() => {}
                Ok(Some(Ok(text))) => return Ok(Some((text, chunks))),
            }
        }
    }
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationClient")
            .field("config", &self.config)
            .field("placeholders", &self.template.placeholders())
            .finish_non_exhaustive()
    }
}

struct Relay {
    chunks: ChunkStream,
    seen: usize,
    done: bool,
}

fn relay(first: String, rest: ChunkStream, idle: Duration) -> GenerationStream {
    let state = Relay {
        chunks: rest,
        seen: 1,
        done: false,
    };

    let tail = stream::unfold(state, move |mut state| async move {
        if state.done {
            return None;
        }
        loop {
            match time::timeout(idle, state.chunks.next()).await {
                Err(_) => {
                    state.done = true;
                    warn!(chunks = state.seen, ?idle, "Generation stalled");
                    let err = GenerationError::Stalled {
                        chunks: state.seen,
                        after: idle,
                    };
                    return Some((Err(err), state));
                }
                Ok(None) => {
                    debug!(chunks = state.seen, "Generation finished");
                    return None;
                }
                Ok(Some(Err(source))) => {
                    state.done = true;
                    warn!(chunks = state.seen, error = %source, "Generation interrupted");
                    let err = GenerationError::Interrupted {
                        chunks: state.seen,
                        source,
                    };
                    return Some((Err(err), state));
                }
                Ok(Some(Ok(text))) if text.is_empty() => {}
                Ok(Some(Ok(text))) => {
                    state.seen += 1;
                    return Some((Ok(text), state));
                }
            }
        }
    });

    Box::pin(stream::once(async move { Ok(first) }).chain(tail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MockChatModel;
    use mockall::Sequence;

    fn chunks(items: Vec<Result<String, ModelError>>) -> ChunkStream {
        Box::pin(stream::iter(items))
    }

    fn text(parts: &[&str]) -> ChunkStream {
        chunks(parts.iter().map(|p| Ok((*p).to_string())).collect())
    }

    fn hanging() -> ChunkStream {
        Box::pin(stream::pending::<Result<String, ModelError>>())
    }

    fn config() -> GenerationConfig {
        GenerationConfig::new("test-model")
            .with_timeout(Duration::from_secs(5))
            .with_retry_backoff(Duration::ZERO)
    }

    fn client(model: MockChatModel, config: GenerationConfig) -> GenerationClient {
        GenerationClient::new(Arc::new(model), config).unwrap()
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new("一种区块链存证方法", "区块链技术").unwrap()
    }

    async fn collect(stream: GenerationStream) -> Vec<Result<String, GenerationError>> {
        stream.collect().await
    }

    #[test]
    fn client_rejects_invalid_config() {
        let result = GenerationClient::new(Arc::new(MockChatModel::new()), GenerationConfig::default());
        assert!(matches!(result, Err(ConfigError::MissingModel)));
    }

    #[tokio::test]
    async fn stream_yields_chunks_in_order() {
        let mut model = MockChatModel::new();
        model
            .expect_open()
            .times(1)
            .returning(|_| Ok(text(&["背景", "", "技术", "部分"])));

        let out = collect(client(model, config()).stream(&request()).await.unwrap()).await;
        let out: Vec<String> = out.into_iter().map(Result::unwrap).collect();
        assert_eq!(out, vec!["背景", "技术", "部分"]);
    }

    #[tokio::test]
    async fn stream_and_invoke_send_the_same_request() {
        let probe = client(MockChatModel::new(), config());
        let expected = probe.render_prompt(&request()).unwrap();
        assert!(expected.contains("一种区块链存证方法"));

        let mut model = MockChatModel::new();
        model
            .expect_open()
            .withf(move |r| r.prompt == expected && r.model == "test-model" && r.stream)
            .times(2)
            .returning(|_| Ok(text(&["甲", "乙"])));
        let client = client(model, config());

        let streamed: String = collect(client.stream(&request()).await.unwrap())
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();
        let invoked = client.invoke(&request()).await.unwrap();
        assert_eq!(streamed, invoked);
        assert_eq!(invoked, "甲乙");
    }

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let mut seq = Sequence::new();
        let mut model = MockChatModel::new();
        model
            .expect_open()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Err(ModelError::Status {
                    status: 503,
                    body: "busy".to_string(),
                })
            });
        model
            .expect_open()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(chunks(vec![Err(ModelError::Transport("reset".to_string()))])));
        model
            .expect_open()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(text(&["成功"])));

        let text = client(model, config()).invoke(&request()).await.unwrap();
        assert_eq!(text, "成功");
    }

    #[tokio::test]
    async fn non_retryable_failure_is_not_retried() {
        let mut model = MockChatModel::new();
        model.expect_open().times(1).returning(|_| {
            Err(ModelError::Status {
                status: 401,
                body: "bad key".to_string(),
            })
        });

        let err = client(model, config()).stream(&request()).await.err().unwrap();
        match err {
            GenerationError::Upstream { attempts, source } => {
                assert_eq!(attempts, 1);
                assert_eq!(source.to_string(), "upstream returned status 401: bad key");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let mut model = MockChatModel::new();
        model
            .expect_open()
            .times(3)
            .returning(|_| Err(ModelError::Transport("refused".to_string())));

        let err = client(model, config().with_max_retries(2))
            .invoke(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Upstream { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn mid_stream_failure_is_surfaced_not_retried() {
        let mut model = MockChatModel::new();
        model.expect_open().times(1).returning(|_| {
            Ok(chunks(vec![
                Ok("部分输出".to_string()),
                Err(ModelError::Transport("reset".to_string())),
                Ok("unreachable".to_string()),
            ]))
        });

        let out = collect(client(model, config()).stream(&request()).await.unwrap()).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap(), "部分输出");
        let err = out[1].as_ref().unwrap_err();
        assert!(err.is_mid_stream());
        assert!(matches!(err, GenerationError::Interrupted { chunks: 1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_model_times_out() {
        let mut model = MockChatModel::new();
        model.expect_open().times(2).returning(|_| Ok(hanging()));

        let err = client(model, config().with_max_retries(1))
            .stream(&request())
            .await
            .err()
            .unwrap();
        match err {
            GenerationError::Timeout { after, attempts } => {
                assert_eq!(after, Duration::from_secs(5));
                assert_eq!(attempts, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_stream_fails_after_output() {
        let mut model = MockChatModel::new();
        model.expect_open().times(1).returning(|_| {
            let head = stream::iter(vec![Ok::<_, ModelError>("开头".to_string())]);
            let stalled: ChunkStream = Box::pin(head.chain(stream::pending()));
            Ok(stalled)
        });

        let out = collect(client(model, config()).stream(&request()).await.unwrap()).await;
        assert_eq!(out.len(), 2);
        assert!(matches!(
            out[1],
            Err(GenerationError::Stalled { chunks: 1, .. })
        ));
    }

    #[tokio::test]
    async fn empty_completion_yields_empty_stream() {
        let mut model = MockChatModel::new();
        model.expect_open().times(1).returning(|_| Ok(text(&[])));

        let text = client(model, config()).invoke(&request()).await.unwrap();
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn unrenderable_prompt_never_calls_model() {
        let mut model = MockChatModel::new();
        model.expect_open().times(0);

        let client = client(model, config()).with_template(PromptTemplate::new("{applicant}"));
        let err = client.invoke(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Prompt(_)));
    }

    #[tokio::test]
    async fn request_carries_config() {
        let mut model = MockChatModel::new();
        model
            .expect_open()
            .withf(|r| (r.temperature - 0.7).abs() < f32::EPSILON && !r.stream)
            .times(1)
            .returning(|_| Ok(text(&["whole"])));

        let config = config().with_temperature(0.7).with_streaming(false);
        let text = client(model, config).invoke(&request()).await.unwrap();
        assert_eq!(text, "whole");
    }
}
