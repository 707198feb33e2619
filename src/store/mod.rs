//! Coordination store client
//!
//! The cluster's single source of truth is an external, strongly consistent
//! key-value store. Everything above this module sees it through [`KvStore`]:
//! - [`MemStore`]: in-process store for tests and single-node tooling
//! - [`EtcdClient`]: etcd v3 JSON gateway over HTTP

pub mod etcd;
pub mod memory;

pub use etcd::EtcdClient;
pub use memory::MemStore;

use crate::common::Result;
use async_trait::async_trait;

/// A single key as returned by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Vec<u8>,
    /// Store revision of the last modification of this key
    pub mod_revision: i64,
}

/// Request/response binding to the coordination store.
///
/// Reads issued after a successful write observe that write. Failures to
/// reach the store or to get a quorum surface as `Error::StoreTransport`.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch the value at `key`. Returns every matching entry (zero or one).
    async fn get(&self, key: &str) -> Result<Vec<KeyValue>>;

    /// Fetch every entry whose key starts with `prefix`, ordered by key.
    async fn get_prefix(&self, prefix: &str) -> Result<Vec<KeyValue>>;

    /// Write `value` at `key`, replacing any previous value.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Remove `key`. Removing an absent key succeeds and returns 0.
    async fn delete(&self, key: &str) -> Result<u64>;
}

/// Exclusive upper bound of the key range covering `prefix`.
///
/// Increments the last byte that is not 0xff and drops what follows; a
/// prefix made only of 0xff bytes (or empty) maps to `\0`, meaning "to the
/// end of the keyspace".
pub fn prefix_range_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    for i in (0..end.len()).rev() {
        if end[i] < 0xff {
            end[i] += 1;
            end.truncate(i + 1);
            return end;
        }
    }
    vec![0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_range_end() {
        assert_eq!(prefix_range_end(b"volumes/"), b"volumes0".to_vec());
        assert_eq!(prefix_range_end(b"a\xff"), b"b".to_vec());
        assert_eq!(prefix_range_end(b"\xff\xff"), vec![0]);
        assert_eq!(prefix_range_end(b""), vec![0]);
    }
}
