//! Redis backend
//!
//! Blocking client. Every operation opens its own connection with the
//! configured timeout, so pool workers never contend for one socket.

use redis::{Client, Commands, Connection, ConnectionLike};
use std::time::Duration;
use tracing::debug;

use super::{KeyValueStore, StoreError};
use crate::config::StoreConfig;

/// Production store backed by a Redis server
pub struct RedisStore {
    client: Client,
    connect_timeout: Duration,
    url: String,
}

impl RedisStore {
    /// Build a client for `config`. Does not connect yet.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let url = config.url();
        let client = Client::open(url.as_str())
            .map_err(|e| StoreError::Connection(format!("{url}: {e}")))?;

        Ok(Self {
            client,
            connect_timeout: config.connect_timeout(),
            url,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Round-trip a `PING` to confirm the server is reachable.
    pub fn ping(&self) -> Result<(), StoreError> {
        let mut con = self.connect()?;
        redis::cmd("PING")
            .query::<String>(&mut con)
            .map(|_| ())
            .map_err(command_error)
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        self.client
            .get_connection_with_timeout(self.connect_timeout)
            .map_err(|e| StoreError::Connection(format!("{}: {e}", self.url)))
    }
}

impl KeyValueStore for RedisStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut con = self.connect()?;
        con.get::<_, Option<Vec<u8>>>(key).map_err(command_error)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut con = self.connect()?;
        con.set::<_, _, ()>(key, value).map_err(command_error)
    }

    fn list_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut con = self.connect()?;
        let keys = scan_all(&mut con, pattern)?;
        debug!(pattern, count = keys.len(), "Scanned keys");
        Ok(keys)
    }

    fn delete(&self, keys: &[String]) -> Result<usize, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut con = self.connect()?;
        con.del::<_, usize>(keys).map_err(command_error)
    }

    fn backend_name(&self) -> &'static str {
        "Redis"
    }
}

fn command_error(e: redis::RedisError) -> StoreError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
        StoreError::Connection(e.to_string())
    } else {
        StoreError::Command(e.to_string())
    }
}

/// Walk a `SCAN MATCH` cursor to completion.
///
/// Any failed step fails the whole listing; a partial key set is never
/// returned.
fn scan_all(con: &mut dyn ConnectionLike, pattern: &str) -> Result<Vec<String>, StoreError> {
    let mut cursor: u64 = 0;
    let mut found = Vec::new();
    loop {
        let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .query(con)
            .map_err(command_error)?;
        found.extend(batch);
        if next == 0 {
            break;
        }
        cursor = next;
    }

    // SCAN may return a key more than once across cursor steps
    Ok(dedup_preserving_order(found))
}

fn dedup_preserving_order(keys: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    keys.into_iter()
        .filter(|k| seen.insert(k.clone()))
        .collect()
}
