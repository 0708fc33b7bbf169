//! Scripted generation backend for unit tests
//!
//! Each role gets a queue of scripts consumed one per call; a fallback script
//! serves roles without a queue. Scripts can succeed after a sequence of
//! chunks, fail before producing anything, or fail mid-stream, with optional
//! delays to stagger concurrent completions.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use crate::error::{Error, Result};
use crate::types::TokenUsage;

use super::{GenerationBackend, GenerationRequest, GenerationStream, StreamEvent};

/// One scripted call outcome.
#[derive(Clone)]
pub(crate) enum Script {
    /// Stream every chunk, then complete with the given usage
    Success {
        chunks: Vec<String>,
        usage: TokenUsage,
        /// Delay before the first event (staggers concurrent completions)
        start_delay: Duration,
    },
    /// Fail before producing any event
    Fail { error: fn() -> Error },
    /// Stream some chunks, then fail mid-stream
    FailMidStream {
        chunks: Vec<String>,
        error: fn() -> Error,
    },
}

impl Script {
    pub(crate) fn success(chunks: &[&str], usage: TokenUsage) -> Self {
        Script::Success {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            usage,
            start_delay: Duration::ZERO,
        }
    }

    pub(crate) fn success_after(chunks: &[&str], usage: TokenUsage, delay: Duration) -> Self {
        Script::Success {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            usage,
            start_delay: delay,
        }
    }
}

/// Scripted [`GenerationBackend`] with per-role call queues.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    fallback: Mutex<Option<Script>>,
    /// Number of stream_generation calls received, across all roles
    pub(crate) calls: AtomicU32,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a script for one role; queued scripts are consumed in order.
    pub(crate) fn script(&self, role: &str, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .entry(role.to_string())
            .or_default()
            .push_back(script);
    }

    /// Script used for any role whose queue is empty.
    pub(crate) fn fallback(&self, script: Script) {
        *self.fallback.lock().unwrap() = Some(script);
    }

    pub(crate) fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn stream_generation(&self, request: GenerationRequest) -> Result<GenerationStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&request.role)
            .and_then(VecDeque::pop_front)
            .or_else(|| self.fallback.lock().unwrap().clone());

        let Some(script) = script else {
            return Err(Error::Unexpected(format!(
                "no script queued for role {}",
                request.role
            )));
        };

        match script {
            Script::Success {
                chunks,
                usage,
                start_delay,
            } => {
                let mut events: Vec<Result<StreamEvent>> =
                    chunks.into_iter().map(|c| Ok(StreamEvent::Delta(c))).collect();
                events.push(Ok(StreamEvent::Completed(usage)));
                Ok(delayed_stream(events, start_delay))
            }
            Script::Fail { error } => Err(error()),
            Script::FailMidStream { chunks, error } => {
                let mut events: Vec<Result<StreamEvent>> =
                    chunks.into_iter().map(|c| Ok(StreamEvent::Delta(c))).collect();
                events.push(Err(error()));
                Ok(delayed_stream(events, Duration::ZERO))
            }
        }
    }
}

fn delayed_stream(events: Vec<Result<StreamEvent>>, start_delay: Duration) -> GenerationStream {
    futures::stream::once(async move {
        tokio::time::sleep(start_delay).await;
        futures::stream::iter(events)
    })
    .flatten()
    .boxed()
}
