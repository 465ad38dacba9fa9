//! Rate-limit handling for Gemini requests.

use std::future::Future;
use std::time::Duration;

use reqwest::{Response, StatusCode};
use tracing::warn;

use super::GeminiError;

/// Maximum retries after the first rate-limited response.
pub const MAX_RETRIES: u32 = 5;

const BASE_BACKOFF_MS: u64 = 1000;

/// Parse Retry-After header value (seconds), capped at one minute.
pub fn parse_retry_after(header_value: Option<&str>) -> Option<Duration> {
    let value = header_value?;
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs.min(60)))
}

/// Exponential backoff delay for a given attempt, capped at one minute.
pub fn backoff_delay(attempt: u32, base_ms: u64) -> Duration {
    let delay_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay_ms.min(60_000))
}

/// Execute a request, retrying with backoff while the API answers 429.
pub async fn retry_on_rate_limit<F, Fut>(model: &str, make_request: F) -> Result<Response, GeminiError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Response, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        let response = make_request().await?;

        if response.status() != StatusCode::TOO_MANY_REQUESTS {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if attempt >= MAX_RETRIES {
            return Err(GeminiError::RateLimited {
                attempts: attempt + 1,
                retry_after_secs: retry_after.as_deref().and_then(|s| s.trim().parse().ok()),
            });
        }

        let wait = parse_retry_after(retry_after.as_deref())
            .unwrap_or_else(|| backoff_delay(attempt, BASE_BACKOFF_MS));

        warn!(
            "Gemini {} rate limited (attempt {}), waiting {:?}",
            model,
            attempt + 1,
            wait
        );
        tokio::time::sleep(wait).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after(Some("5")), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after(Some("600")), Some(Duration::from_secs(60)));
        assert_eq!(parse_retry_after(Some("soon")), None);
        assert_eq!(parse_retry_after(None), None);
    }

    #[test]
    fn test_backoff_delay() {
        assert_eq!(backoff_delay(0, 1000), Duration::from_millis(1000));
        assert_eq!(backoff_delay(3, 1000), Duration::from_millis(8000));
        assert_eq!(backoff_delay(10, 1000), Duration::from_millis(60_000));
        assert_eq!(backoff_delay(80, 1000), Duration::from_millis(60_000));
    }
}
