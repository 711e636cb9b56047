use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::errors::{AppError, AppResult};
use crate::faces::codec;

pub const REFERENCE_KEY_PREFIX: &str = "guard:";
pub const DEFAULT_REFERENCE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Binary-safe key-value service with an independent expiry per key.
pub trait KeyValueService: Send + Sync {
    fn exists(&self, key: &str) -> AppResult<bool>;
    fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>>;
    fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> AppResult<()>;
    /// Stores `value` only if `key` is absent. Returns whether the write happened.
    fn set_if_absent_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> AppResult<bool>;
    /// Returns whether a value was removed.
    fn delete(&self, key: &str) -> AppResult<bool>;
    /// Remaining lifetime of `key`; `None` when absent or when it never expires.
    fn ttl(&self, key: &str) -> AppResult<Option<Duration>>;
    fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

impl<K: KeyValueService + ?Sized> KeyValueService for &K {
    fn exists(&self, key: &str) -> AppResult<bool> {
        (**self).exists(key)
    }
    fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        (**self).get(key)
    }
    fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> AppResult<()> {
        (**self).set_with_ttl(key, value, ttl)
    }
    fn set_if_absent_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> AppResult<bool> {
        (**self).set_if_absent_with_ttl(key, value, ttl)
    }
    fn delete(&self, key: &str) -> AppResult<bool> {
        (**self).delete(key)
    }
    fn ttl(&self, key: &str) -> AppResult<Option<Duration>> {
        (**self).ttl(key)
    }
    fn ping(&self) -> AppResult<()> {
        (**self).ping()
    }
}

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Process-local key-value service. Expired entries are evicted lazily.
#[derive(Default)]
pub struct InMemoryKeyValue {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryKeyValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> AppResult<usize> {
        let now = Instant::now();
        let guard = self.entries.read().map_err(|_| poisoned())?;
        Ok(guard.values().filter(|entry| entry.is_live(now)).count())
    }

    pub fn is_empty(&self) -> AppResult<bool> {
        Ok(self.len()? == 0)
    }

    fn write(&self) -> AppResult<std::sync::RwLockWriteGuard<'_, HashMap<String, Entry>>> {
        self.entries.write().map_err(|_| poisoned())
    }

    fn live_entry<T>(&self, key: &str, f: impl FnOnce(&Entry) -> T) -> AppResult<Option<T>> {
        let now = Instant::now();
        {
            let guard = self.entries.read().map_err(|_| poisoned())?;
            match guard.get(key) {
                Some(entry) if entry.is_live(now) => return Ok(Some(f(entry))),
                None => return Ok(None),
                Some(_) => {}
            }
        }
        let mut guard = self.write()?;
        if guard.get(key).is_some_and(|entry| !entry.is_live(now)) {
            guard.remove(key);
        }
        Ok(None)
    }
}

fn poisoned() -> AppError {
    AppError::StoreUnavailable {
        message: "in-memory store lock poisoned".into(),
    }
}

impl KeyValueService for InMemoryKeyValue {
    fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.live_entry(key, |_| ())?.is_some())
    }

    fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        self.live_entry(key, |entry| entry.value.clone())
    }

    fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> AppResult<()> {
        let entry = Entry {
            value: value.to_vec(),
            expires_at: Instant::now() + ttl,
        };
        self.write()?.insert(key.to_string(), entry);
        Ok(())
    }

    fn set_if_absent_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> AppResult<bool> {
        let now = Instant::now();
        let mut guard = self.write()?;
        if guard.get(key).is_some_and(|entry| entry.is_live(now)) {
            return Ok(false);
        }
        guard.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    fn delete(&self, key: &str) -> AppResult<bool> {
        let now = Instant::now();
        Ok(self
            .write()?
            .remove(key)
            .is_some_and(|entry| entry.is_live(now)))
    }

    fn ttl(&self, key: &str) -> AppResult<Option<Duration>> {
        let now = Instant::now();
        self.live_entry(key, |entry| entry.expires_at.saturating_duration_since(now))
    }
}

#[cfg(feature = "redis")]
mod redis_backend {
    use std::sync::Mutex;
    use std::time::Duration;

    use redis::{Client, Connection, RedisError};
    use tracing::debug;

    use super::KeyValueService;
    use crate::errors::{AppError, AppResult};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RedisEndpoint {
        pub host: String,
        pub port: u16,
        pub db: i64,
        pub connect_timeout: Duration,
    }

    impl RedisEndpoint {
        pub fn url(&self) -> String {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        }
    }

    /// Redis-backed service holding one connection for the life of the process.
    pub struct RedisKeyValue {
        connection: Mutex<Connection>,
    }

    impl RedisKeyValue {
        pub fn connect(endpoint: &RedisEndpoint) -> AppResult<Self> {
            let url = endpoint.url();
            debug!(%url, "connecting to reference store");
            let client = Client::open(url.as_str()).map_err(unavailable)?;
            let connection = client
                .get_connection_with_timeout(endpoint.connect_timeout)
                .map_err(unavailable)?;
            Ok(Self {
                connection: Mutex::new(connection),
            })
        }

        fn query<T: redis::FromRedisValue>(&self, cmd: &redis::Cmd) -> AppResult<T> {
            let mut connection = self.connection.lock().map_err(|_| AppError::StoreUnavailable {
                message: "redis connection lock poisoned".into(),
            })?;
            cmd.query(&mut *connection).map_err(unavailable)
        }
    }

    fn unavailable(err: RedisError) -> AppError {
        AppError::StoreUnavailable {
            message: err.to_string(),
        }
    }

    fn ttl_secs(ttl: Duration) -> u64 {
        ttl.as_secs().max(1)
    }

    impl KeyValueService for RedisKeyValue {
        fn exists(&self, key: &str) -> AppResult<bool> {
            self.query(redis::cmd("EXISTS").arg(key))
        }

        fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
            self.query(redis::cmd("GET").arg(key))
        }

        fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> AppResult<()> {
            self.query(
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("EX")
                    .arg(ttl_secs(ttl)),
            )
        }

        fn set_if_absent_with_ttl(
            &self,
            key: &str,
            value: &[u8],
            ttl: Duration,
        ) -> AppResult<bool> {
            let reply: Option<String> = self.query(
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("NX")
                    .arg("EX")
                    .arg(ttl_secs(ttl)),
            )?;
            Ok(reply.is_some())
        }

        fn delete(&self, key: &str) -> AppResult<bool> {
            let removed: i64 = self.query(redis::cmd("DEL").arg(key))?;
            Ok(removed > 0)
        }

        fn ttl(&self, key: &str) -> AppResult<Option<Duration>> {
            // -2: missing key, -1: no expiry.
            let secs: i64 = self.query(redis::cmd("TTL").arg(key))?;
            Ok(u64::try_from(secs).ok().map(Duration::from_secs))
        }

        fn ping(&self) -> AppResult<()> {
            let _: String = self.query(&redis::cmd("PING"))?;
            Ok(())
        }
    }
}

#[cfg(feature = "redis")]
pub use redis_backend::{RedisEndpoint, RedisKeyValue};

pub fn reference_key(guard_id: &str) -> String {
    format!("{REFERENCE_KEY_PREFIX}{guard_id}")
}

/// One reference embedding per guard id, stored through a [`KeyValueService`].
pub struct ReferenceStore<K> {
    kv: K,
    embedding_dim: usize,
}

impl<K: KeyValueService> ReferenceStore<K> {
    pub fn new(kv: K, embedding_dim: usize) -> Self {
        Self { kv, embedding_dim }
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    pub fn service(&self) -> &K {
        &self.kv
    }

    pub fn exists(&self, guard_id: &str) -> AppResult<bool> {
        self.kv.exists(&reference_key(guard_id))
    }

    pub fn get(&self, guard_id: &str) -> AppResult<Vec<f32>> {
        let key = reference_key(guard_id);
        let bytes = self
            .kv
            .get(&key)?
            .ok_or_else(|| AppError::ReferenceNotFound {
                guard_id: guard_id.to_string(),
            })?;
        codec::decode(&bytes, self.embedding_dim).map_err(|source| {
            warn!(%key, error = %source, "stored reference failed to decode");
            AppError::CorruptData { key, source }
        })
    }

    /// Unconditionally stores `embedding`, replacing any previous reference.
    pub fn put(&self, guard_id: &str, embedding: &[f32], ttl: Duration) -> AppResult<()> {
        self.ensure_dim(embedding)?;
        self.kv
            .set_with_ttl(&reference_key(guard_id), &codec::encode(embedding), ttl)
    }

    /// Stores `embedding` only when no live reference exists.
    pub fn put_if_absent(
        &self,
        guard_id: &str,
        embedding: &[f32],
        ttl: Duration,
    ) -> AppResult<bool> {
        self.ensure_dim(embedding)?;
        self.kv
            .set_if_absent_with_ttl(&reference_key(guard_id), &codec::encode(embedding), ttl)
    }

    pub fn remove(&self, guard_id: &str) -> AppResult<bool> {
        self.kv.delete(&reference_key(guard_id))
    }

    pub fn remaining_ttl(&self, guard_id: &str) -> AppResult<Option<Duration>> {
        self.kv.ttl(&reference_key(guard_id))
    }

    fn ensure_dim(&self, embedding: &[f32]) -> AppResult<()> {
        if embedding.len() != self.embedding_dim {
            return Err(AppError::DimensionMismatch {
                context: "stored",
                expected: self.embedding_dim,
                found: embedding.len(),
            });
        }
        Ok(())
    }
}
