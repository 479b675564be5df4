//! Error taxonomy for collection.
//!
//! Every fetch returns a [`CollectError`] that the collection task inspects
//! and classifies with [`CollectError::disposition`]. Nothing here crosses a
//! task boundary.

use std::fmt;

use thiserror::Error;

/// Optional sub-API a node may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Producer,
    Net,
    Db,
}

impl Capability {
    /// All capabilities in probe order.
    pub fn all() -> &'static [Capability] {
        &[Capability::Producer, Capability::Db, Capability::Net]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Producer => "producer",
            Capability::Net => "net",
            Capability::Db => "db",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure talking to a node.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {status} from {path}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    #[error("decoding response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid endpoint url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Result of a single per-kind fetch that did not produce an update.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The target was probed and does not expose this sub-API.
    #[error("{0} endpoint is not monitored")]
    NotMonitored(Capability),

    /// The call succeeded but there is nothing to report.
    #[error("no value to report")]
    Null,

    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// One record of a producer batch could not be parsed; the batch is discarded.
    #[error("malformed producer record at index {index}: {reason}")]
    MalformedProducer { index: usize, reason: String },
}

/// What a collection task does with a [`CollectError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Skip the metric kind without logging.
    Silent,
    /// Log and skip the metric kind.
    Logged,
}

impl CollectError {
    pub fn disposition(&self) -> Disposition {
        match self {
            CollectError::NotMonitored(_) | CollectError::Null => Disposition::Silent,
            CollectError::Rpc(_) | CollectError::MalformedProducer { .. } => Disposition::Logged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposition() {
        assert_eq!(
            CollectError::NotMonitored(Capability::Db).disposition(),
            Disposition::Silent
        );
        assert_eq!(CollectError::Null.disposition(), Disposition::Silent);

        let rpc = CollectError::Rpc(RpcError::Status {
            path: "/v1/net/connections".into(),
            status: 500,
            body: String::new(),
        });
        assert_eq!(rpc.disposition(), Disposition::Logged);

        let batch = CollectError::MalformedProducer {
            index: 3,
            reason: "bad".into(),
        };
        assert_eq!(batch.disposition(), Disposition::Logged);
    }

    #[test]
    fn test_not_monitored_message() {
        let err = CollectError::NotMonitored(Capability::Net);
        assert_eq!(err.to_string(), "net endpoint is not monitored");
    }
}
