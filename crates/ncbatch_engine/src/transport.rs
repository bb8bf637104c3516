//! Transport layer abstraction for device sessions.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use ncbatch_protocol::{RequestKind, RpcReply, COMMIT_CHECK_SUCCESS};
use parking_lot::Mutex;
use thiserror::Error;

/// Failure reported by a transport while dialing, sending or closing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    /// Creates a transport error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A transport carries raw documents to a device session.
///
/// Implementations own connection setup, authentication and framing. The
/// engine dials before each round-trip sequence and closes afterwards, so a
/// transport must accept `dial` after `close`, and `close` on a transport
/// that was never dialed.
pub trait Transport: Send {
    /// Opens the session.
    fn dial(&mut self) -> Result<(), TransportError>;

    /// Sends one request document and returns the raw reply.
    fn send_raw(&mut self, document: &str) -> Result<RpcReply, TransportError>;

    /// Closes the session.
    fn close(&mut self) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn dial(&mut self) -> Result<(), TransportError> {
        (**self).dial()
    }

    fn send_raw(&mut self, document: &str) -> Result<RpcReply, TransportError> {
        (**self).send_raw(document)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }
}

/// Reply served by [`MockTransport`] when nothing was scripted.
pub const MOCK_OK_REPLY: &str = "<ok/>";

#[derive(Debug, Default)]
struct MockState {
    connected: bool,
    dials: usize,
    closes: usize,
    sent: Vec<String>,
    replies: HashMap<RequestKind, VecDeque<Result<RpcReply, TransportError>>>,
    dial_error: Option<TransportError>,
    close_error: Option<TransportError>,
}

/// A scripted transport for testing.
///
/// Clones share state, so a test can keep one handle to inspect the
/// requests after moving another into a coordinator. Unscripted requests
/// are answered with `<ok/>`, except validation which is answered with a
/// commit-check success.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply for the next request of the given kind.
    pub fn push_reply(&self, kind: RequestKind, reply: impl Into<RpcReply>) {
        self.state
            .lock()
            .replies
            .entry(kind)
            .or_default()
            .push_back(Ok(reply.into()));
    }

    /// Queues a send failure for the next request of the given kind.
    pub fn push_send_error(&self, kind: RequestKind, error: TransportError) {
        self.state
            .lock()
            .replies
            .entry(kind)
            .or_default()
            .push_back(Err(error));
    }

    /// Makes every following dial fail.
    pub fn set_dial_error(&self, error: Option<TransportError>) {
        self.state.lock().dial_error = error;
    }

    /// Makes every following close fail.
    pub fn set_close_error(&self, error: Option<TransportError>) {
        self.state.lock().close_error = error;
    }

    /// Returns every document sent so far, in send order.
    pub fn sent(&self) -> Vec<String> {
        self.state.lock().sent.clone()
    }

    /// Returns the kinds of the documents sent so far, in send order.
    pub fn sent_kinds(&self) -> Vec<RequestKind> {
        self.state
            .lock()
            .sent
            .iter()
            .map(|document| RequestKind::classify(document))
            .collect()
    }

    /// Returns the documents of one kind, in send order.
    pub fn sent_of(&self, kind: RequestKind) -> Vec<String> {
        self.state
            .lock()
            .sent
            .iter()
            .filter(|document| RequestKind::classify(document) == kind)
            .cloned()
            .collect()
    }

    /// Returns how many times the transport was dialed.
    pub fn dial_count(&self) -> usize {
        self.state.lock().dials
    }

    /// Returns how many times the transport was closed.
    pub fn close_count(&self) -> usize {
        self.state.lock().closes
    }

    /// Returns true between a successful dial and the next close.
    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }
}

impl Transport for MockTransport {
    fn dial(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.dials += 1;
        if let Some(err) = state.dial_error.clone() {
            return Err(err);
        }
        state.connected = true;
        Ok(())
    }

    fn send_raw(&mut self, document: &str) -> Result<RpcReply, TransportError> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(TransportError::new("not connected"));
        }
        state.sent.push(document.to_string());

        let kind = RequestKind::classify(document);
        if let Some(reply) = state.replies.get_mut(&kind).and_then(VecDeque::pop_front) {
            return reply;
        }
        Ok(match kind {
            RequestKind::Validate => RpcReply::new(format!(
                "<commit-results><routing-engine><name>re0</name><{COMMIT_CHECK_SUCCESS}/></routing-engine></commit-results>"
            )),
            _ => RpcReply::new(MOCK_OK_REPLY),
        })
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.closes += 1;
        state.connected = false;
        match state.close_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
