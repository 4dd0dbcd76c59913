// Generation worker - Runs the generator off the event loop
// Requests go in, replies are picked up later by polling

use super::orchestrator::GenerationRequest;
use super::{Continuation, GeneratorError, PatternGenerator};
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

/// Message coming back from a generation backend
#[derive(Debug)]
pub enum GeneratorReply {
    /// Initialisation finished, requests can be submitted
    Ready,
    /// Initialisation failed, the backend will never become ready
    InitFailed(GeneratorError),
    /// Answer to the oldest outstanding request
    Continuation(Result<Continuation, GeneratorError>),
}

/// Where the session sends generation requests
pub trait GenerationBackend {
    fn is_ready(&self) -> bool;

    /// Queue a request. Returns false if the backend cannot take it.
    fn submit(&mut self, request: GenerationRequest) -> bool;

    /// Next reply, if one has arrived
    fn poll(&mut self) -> Option<GeneratorReply>;
}

/// Backend owning a generator on a dedicated thread
pub struct GeneratorWorker {
    request_tx: Option<Sender<GenerationRequest>>,
    reply_rx: Receiver<GeneratorReply>,
    ready: bool,
    handle: Option<thread::JoinHandle<()>>,
}

impl GeneratorWorker {
    /// Spawn the worker; the generator is initialised on the worker thread
    pub fn spawn(mut generator: Box<dyn PatternGenerator>) -> Self {
        let (request_tx, request_rx) = mpsc::channel::<GenerationRequest>();
        let (reply_tx, reply_rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            match generator.initialize() {
                Ok(()) => {
                    let _ = reply_tx.send(GeneratorReply::Ready);
                }
                Err(e) => {
                    let _ = reply_tx.send(GeneratorReply::InitFailed(e));
                    return;
                }
            }

            // Ends when the worker handle is dropped
            while let Ok(request) = request_rx.recv() {
                let result =
                    generator.continue_sequence(&request.seed, request.steps, request.temperature);
                if reply_tx.send(GeneratorReply::Continuation(result)).is_err() {
                    break;
                }
            }
        });

        Self {
            request_tx: Some(request_tx),
            reply_rx,
            ready: false,
            handle: Some(handle),
        }
    }
}

impl GenerationBackend for GeneratorWorker {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn submit(&mut self, request: GenerationRequest) -> bool {
        match &self.request_tx {
            Some(tx) if self.ready => tx.send(request).is_ok(),
            _ => false,
        }
    }

    fn poll(&mut self) -> Option<GeneratorReply> {
        match self.reply_rx.try_recv() {
            Ok(reply) => {
                match reply {
                    GeneratorReply::Ready => self.ready = true,
                    GeneratorReply::InitFailed(_) => self.ready = false,
                    GeneratorReply::Continuation(_) => {}
                }
                Some(reply)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.ready = false;
                None
            }
        }
    }
}

impl Drop for GeneratorWorker {
    fn drop(&mut self) {
        self.request_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Backend running the generator synchronously inside `submit`
///
/// Replies are still delivered through `poll`, so callers see the same
/// sequence of events as with a worker thread.
pub struct InlineBackend {
    generator: Box<dyn PatternGenerator>,
    ready: bool,
    replies: VecDeque<GeneratorReply>,
}

impl InlineBackend {
    pub fn new(mut generator: Box<dyn PatternGenerator>) -> Self {
        let mut replies = VecDeque::new();
        let ready = match generator.initialize() {
            Ok(()) => {
                replies.push_back(GeneratorReply::Ready);
                true
            }
            Err(e) => {
                replies.push_back(GeneratorReply::InitFailed(e));
                false
            }
        };

        Self {
            generator,
            ready,
            replies,
        }
    }
}

impl GenerationBackend for InlineBackend {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn submit(&mut self, request: GenerationRequest) -> bool {
        if !self.ready {
            return false;
        }
        let result =
            self.generator
                .continue_sequence(&request.seed, request.steps, request.temperature);
        self.replies.push_back(GeneratorReply::Continuation(result));
        true
    }

    fn poll(&mut self) -> Option<GeneratorReply> {
        self.replies.pop_front()
    }
}

/// Backend for sessions without a generator; never becomes ready
pub struct UnavailableBackend;

impl GenerationBackend for UnavailableBackend {
    fn is_ready(&self) -> bool {
        false
    }

    fn submit(&mut self, _request: GenerationRequest) -> bool {
        false
    }

    fn poll(&mut self) -> Option<GeneratorReply> {
        None
    }
}
