//! Transport layer abstraction for the distribution feed.

use crate::error::{SyncError, SyncResult};
use nfesync_protocol::{AccessKey, Taxpayer};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Performs the remote calls against the Authority.
///
/// Implementations return the raw response body. Request construction,
/// signing and the wire format belong to the implementation; retries belong
/// to the engine.
pub trait DistributionTransport: Send + Sync {
    /// Fetches the feed page starting after `sequence`.
    fn fetch(&self, taxpayer: &Taxpayer, sequence: u64) -> SyncResult<Vec<u8>>;

    /// Fetches one document by access key from the Authority serving `uf`.
    fn fetch_by_key(&self, taxpayer: &Taxpayer, key: &AccessKey, uf: &str) -> SyncResult<Vec<u8>>;
}

/// A call recorded by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// Feed page request.
    Fetch {
        /// Taxpayer CNPJ.
        taxpayer: String,
        /// Requested position.
        sequence: u64,
    },
    /// Lookup by key.
    FetchByKey {
        /// Taxpayer CNPJ.
        taxpayer: String,
        /// Requested key.
        key: String,
        /// UF the lookup was routed to.
        uf: String,
    },
}

#[derive(Debug, Clone)]
enum Reply {
    Body(Vec<u8>),
    Failure(String),
}

/// A mock transport for testing.
///
/// Replies are consumed in order regardless of which method is called. An
/// empty queue yields a non-retryable transport error.
#[derive(Debug, Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockTransport {
    /// Creates a new mock transport with no queued replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock that answers with `bodies` in order.
    pub fn with_responses<I, B>(bodies: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        let mock = Self::new();
        for body in bodies {
            mock.push_response(body);
        }
        mock
    }

    /// Queues a response body.
    pub fn push_response(&self, body: impl Into<Vec<u8>>) {
        self.replies.lock().push_back(Reply::Body(body.into()));
    }

    /// Queues a retryable transport failure.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.replies.lock().push_back(Reply::Failure(message.into()));
    }

    /// All calls made so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.replies.lock().len()
    }

    fn reply(&self, call: MockCall) -> SyncResult<Vec<u8>> {
        self.calls.lock().push(call);
        match self.replies.lock().pop_front() {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::Failure(message)) => Err(SyncError::transport_retryable(message)),
            None => Err(SyncError::transport_fatal("no mock response queued")),
        }
    }
}

impl DistributionTransport for MockTransport {
    fn fetch(&self, taxpayer: &Taxpayer, sequence: u64) -> SyncResult<Vec<u8>> {
        self.reply(MockCall::Fetch {
            taxpayer: taxpayer.id.to_string(),
            sequence,
        })
    }

    fn fetch_by_key(&self, taxpayer: &Taxpayer, key: &AccessKey, uf: &str) -> SyncResult<Vec<u8>> {
        self.reply(MockCall::FetchByKey {
            taxpayer: taxpayer.id.to_string(),
            key: key.to_string(),
            uf: uf.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nfesync_protocol::{Environment, TaxpayerId};

    fn taxpayer() -> Taxpayer {
        Taxpayer::new(
            "ACME",
            TaxpayerId::parse("11222333000181").unwrap(),
            "SP",
            Environment::Production,
        )
    }

    #[test]
    fn replies_in_order_and_records_calls() {
        let mock = MockTransport::with_responses(["first", "second"]);
        mock.push_failure("reset");

        assert_eq!(mock.fetch(&taxpayer(), 0).unwrap(), b"first");
        let key = AccessKey::parse("35240611222333000181550010000000011000000010").unwrap();
        assert_eq!(mock.fetch_by_key(&taxpayer(), &key, "sp").unwrap(), b"second");

        let err = mock.fetch(&taxpayer(), 5).unwrap_err();
        assert!(err.is_retryable());

        let err = mock.fetch(&taxpayer(), 5).unwrap_err();
        assert!(!err.is_retryable());

        assert_eq!(mock.call_count(), 4);
        assert_eq!(
            mock.calls()[1],
            MockCall::FetchByKey {
                taxpayer: "11222333000181".into(),
                key: key.to_string(),
                uf: "sp".into(),
            }
        );
        assert_eq!(mock.remaining(), 0);
    }
}
