/// Redis wrapper with graceful degradation.
///
/// All operations return `Option<T>` or `bool`. On any Redis error, the operation logs a
/// warning and reports failure; callers keep an in-process copy and carry on. The system
/// is fully functional without Redis, it just forgets its records on restart.
use redis::AsyncCommands;
use tracing::warn;

pub struct RedisCache {
    client: Option<redis::Client>,
}

impl RedisCache {
    /// Attempt to create a client. If the URL is `None` or the URL is invalid,
    /// returns a `RedisCache` that always degrades gracefully (no-ops).
    pub fn new(url: Option<&str>) -> Self {
        let client = url.and_then(|u| {
            redis::Client::open(u)
                .inspect_err(|e| {
                    warn!(error = %e, url = u, "invalid redis url, persistence disabled")
                })
                .ok()
        });
        Self { client }
    }

    /// A cache that never talks to Redis.
    pub fn disabled() -> Self {
        Self { client: None }
    }

    /// Whether a client was configured at all. Says nothing about reachability.
    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Test the connection by sending a PING. Returns `true` if Redis is reachable.
    pub async fn is_available(&self) -> bool {
        let Some(mut conn) = self.connection().await else {
            return false;
        };
        let result: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        result.is_ok()
    }

    /// Append a value to the tail of a list. Returns `true` if successful.
    pub async fn rpush(&self, key: &str, value: &str) -> bool {
        let Some(mut conn) = self.connection().await else {
            return false;
        };
        conn.rpush::<_, _, ()>(key, value)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis RPUSH failed"))
            .is_ok()
    }

    /// Read a whole list, head to tail. A missing key reads as an empty list;
    /// `None` means Redis could not be asked.
    pub async fn lrange_all(&self, key: &str) -> Option<Vec<String>> {
        let mut conn = self.connection().await?;
        conn.lrange::<_, Vec<String>>(key, 0, -1)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis LRANGE failed"))
            .ok()
    }

    async fn connection(&self) -> Option<redis::aio::MultiplexedConnection> {
        let client = self.client.as_ref()?;
        client
            .get_multiplexed_async_connection()
            .await
            .inspect_err(|e| warn!(error = %e, "redis connection failed"))
            .ok()
    }
}
