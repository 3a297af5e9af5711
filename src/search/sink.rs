use std::collections::HashSet;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Receiver of search results.
///
/// `on_match` is called once per newly confirmed path, in discovery order.
/// Exactly one of `on_complete` or `on_failure` ends the session.
pub trait ResultSink {
    fn on_match(&mut self, path: &str);
    fn on_complete(&mut self);
    fn on_failure(&mut self, reason: &str);
}

impl<S: ResultSink + ?Sized> ResultSink for Box<S> {
    fn on_match(&mut self, path: &str) {
        (**self).on_match(path)
    }

    fn on_complete(&mut self) {
        (**self).on_complete()
    }

    fn on_failure(&mut self, reason: &str) {
        (**self).on_failure(reason)
    }
}

/// A sink notification, as sent over a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    Match(String),
    Complete,
    Failure(String),
}

/// Forwards notifications to an unbounded channel so an async consumer can
/// drain them at its own pace.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<SearchEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, UnboundedReceiver<SearchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: SearchEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("result receiver dropped, discarding event");
        }
    }
}

impl ResultSink for ChannelSink {
    fn on_match(&mut self, path: &str) {
        self.send(SearchEvent::Match(path.to_string()));
    }

    fn on_complete(&mut self) {
        self.send(SearchEvent::Complete);
    }

    fn on_failure(&mut self, reason: &str) {
        self.send(SearchEvent::Failure(reason.to_string()));
    }
}

/// Wraps a sink with the session's set of delivered paths.
pub(crate) struct DedupSink<S> {
    inner: S,
    delivered: HashSet<String>,
}

impl<S: ResultSink> DedupSink<S> {
    pub(crate) fn new(inner: S) -> Self {
        Self {
            inner,
            delivered: HashSet::new(),
        }
    }

    /// Forward `path` unless it was already delivered. Returns whether it was sent.
    pub(crate) fn deliver(&mut self, path: &str) -> bool {
        if self.delivered.contains(path) {
            return false;
        }
        self.delivered.insert(path.to_string());
        self.inner.on_match(path);
        true
    }

    pub(crate) fn delivered(&self) -> usize {
        self.delivered.len()
    }

    pub(crate) fn complete(&mut self) {
        self.inner.on_complete();
    }

    pub(crate) fn fail(&mut self, reason: &str) {
        self.inner.on_failure(reason);
    }
}
