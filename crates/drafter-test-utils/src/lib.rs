//! Testing utilities for the drafter workspace
//!
//! Scripted chat models that record every call, plus shared fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use drafter_core::{
    ChatModel, ChunkStream, GenerationClient, GenerationConfig, GenerationRequest, ModelError,
    ModelRequest,
};
use futures::stream;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Behaviour of one scripted model call
#[derive(Debug, Clone)]
pub enum Script {
    /// Stream these chunks, then finish
    Chunks(Vec<String>),
    /// Fail to open the call
    Fail(ModelError),
    /// Stream these chunks, then fail
    FailAfter(Vec<String>, ModelError),
    /// Open the call but never produce data
    Hang,
}

impl Script {
    pub fn chunks(parts: &[&str]) -> Self {
        Self::Chunks(parts.iter().map(|p| (*p).to_string()).collect())
    }

    pub fn fail_after(parts: &[&str], err: ModelError) -> Self {
        Self::FailAfter(parts.iter().map(|p| (*p).to_string()).collect(), err)
    }
}

/// Chat model that plays back a script, one entry per call
///
/// The last entry repeats once the script is exhausted.
#[derive(Debug)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new(script: impl IntoIterator<Item = Script>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Model that always streams the given chunks
    pub fn chunks(parts: &[&str]) -> Self {
        Self::new([Script::chunks(parts)])
    }

    /// Model that always fails to open
    pub fn failing(err: ModelError) -> Self {
        Self::new([Script::Fail(err)])
    }

    /// Number of calls made so far
    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    /// Every request received, in call order
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().clone()
    }

    /// Prompt of the most recent call
    pub fn last_prompt(&self) -> Option<String> {
        self.requests.lock().last().map(|r| r.prompt.clone())
    }

    fn next_script(&self) -> Script {
        let mut script = self.script.lock();
        if script.len() > 1 {
            script.pop_front().unwrap_or(Script::Hang)
        } else {
            script.front().cloned().unwrap_or(Script::Hang)
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn open(&self, request: &ModelRequest) -> Result<ChunkStream, ModelError> {
        self.requests.lock().push(request.clone());

        let chunks: ChunkStream = match self.next_script() {
            Script::Chunks(parts) => Box::pin(stream::iter(parts.into_iter().map(Ok::<_, ModelError>))),
            Script::Fail(err) => return Err(err),
            Script::FailAfter(parts, err) => Box::pin(stream::iter(
                parts.into_iter().map(Ok).chain(std::iter::once(Err(err))),
            )),
            Script::Hang => Box::pin(stream::pending::<Result<String, ModelError>>()),
        };
        Ok(chunks)
    }
}

/// Releases chunks of a [`GatedModel`] one at a time
#[derive(Debug, Clone)]
pub struct GateHandle {
    release: mpsc::UnboundedSender<()>,
    emitted: Arc<AtomicUsize>,
}

impl GateHandle {
    /// Allow one more chunk through
    pub fn release(&self) {
        let _ = self.release.send(());
    }

    /// Chunks handed to the consumer so far
    pub fn emitted(&self) -> usize {
        self.emitted.load(Ordering::SeqCst)
    }
}

/// Chat model whose output is paced by a [`GateHandle`]
///
/// Serves a single call. The stream ends early if the handle is dropped.
#[derive(Debug)]
pub struct GatedModel {
    chunks: Vec<String>,
    gate: Mutex<Option<mpsc::UnboundedReceiver<()>>>,
    emitted: Arc<AtomicUsize>,
}

impl GatedModel {
    pub fn new(parts: &[&str]) -> (Self, GateHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let emitted = Arc::new(AtomicUsize::new(0));
        let model = Self {
            chunks: parts.iter().map(|p| (*p).to_string()).collect(),
            gate: Mutex::new(Some(rx)),
            emitted: Arc::clone(&emitted),
        };
        (
            model,
            GateHandle {
                release: tx,
                emitted,
            },
        )
    }
}

#[async_trait]
impl ChatModel for GatedModel {
    async fn open(&self, _request: &ModelRequest) -> Result<ChunkStream, ModelError> {
        let gate = self
            .gate
            .lock()
            .take()
            .ok_or_else(|| ModelError::Transport("gated model already consumed".to_string()))?;

        let state = (VecDeque::from(self.chunks.clone()), gate, Arc::clone(&self.emitted));
        let chunks: ChunkStream = Box::pin(stream::unfold(
            state,
            |(mut pending, mut gate, emitted)| async move {
                let chunk = pending.pop_front()?;
                gate.recv().await?;
                emitted.fetch_add(1, Ordering::SeqCst);
                Some((Ok::<_, ModelError>(chunk), (pending, gate, emitted)))
            },
        ));
        Ok(chunks)
    }
}

/// Generation config suited to tests: short timeout, no backoff
pub fn test_config() -> GenerationConfig {
    GenerationConfig::new("test-model")
        .with_timeout(Duration::from_secs(2))
        .with_max_retries(2)
        .with_retry_backoff(Duration::ZERO)
}

pub fn test_client(model: Arc<dyn ChatModel>) -> GenerationClient {
    GenerationClient::new(model, test_config()).expect("test config is valid")
}

pub fn sample_request() -> GenerationRequest {
    GenerationRequest::new("一种基于区块链的数据存证方法", "区块链技术")
        .expect("sample request is valid")
        .with_existing_problems("中心化存储易被篡改")
}
