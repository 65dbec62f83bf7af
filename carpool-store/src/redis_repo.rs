use redis::RedisResult;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
    requests_per_minute: i64,
}

impl RedisClient {
    pub fn new(connection_string: &str, requests_per_minute: i64) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client, requests_per_minute })
    }

    pub fn requests_per_minute(&self) -> i64 {
        self.requests_per_minute
    }

    /// Fixed-window counter. Returns `true` while `key` is within `limit` hits per window.
    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = window_pipeline(key, window_seconds)
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}

/// The expiry is set only by the request that opens the window; later hits just count
fn window_pipeline(key: &str, window_seconds: i64) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .cmd("SET")
        .arg(key)
        .arg(0)
        .arg("EX")
        .arg(window_seconds)
        .arg("NX")
        .ignore()
        .incr(key, 1);
    pipe
}
