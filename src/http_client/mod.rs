//! HTTP client shared by the search and download stages.
//!
//! One client is built per stage run and passed down; nothing here is a
//! process-wide global.

mod response;
mod user_agent;

pub use response::HttpResponse;
pub use user_agent::UserAgent;

use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::debug;

/// Thin wrapper over `reqwest::Client` with a fixed per-request timeout.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration, user_agent: &UserAgent) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent.header_value())
            .timeout(timeout)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client })
    }

    /// GET a URL. Error statuses are returned as responses, not errors.
    pub async fn get(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
        let start = Instant::now();
        let response = self.client.get(url).send().await?;
        debug!(
            "GET {} -> {} in {}ms",
            url,
            response.status().as_u16(),
            start.elapsed().as_millis()
        );
        Ok(HttpResponse::new(response))
    }

    /// POST a urlencoded form.
    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<HttpResponse, reqwest::Error> {
        let start = Instant::now();
        let response = self.client.post(url).form(form).send().await?;
        debug!(
            "POST {} -> {} in {}ms",
            url,
            response.status().as_u16(),
            start.elapsed().as_millis()
        );
        Ok(HttpResponse::new(response))
    }
}

/// Uniform random delay in `[min, max]`, used as a politeness pause.
pub fn random_delay(min: Duration, max: Duration) -> Duration {
    use rand::Rng;

    if max <= min {
        return min;
    }
    rand::rng().random_range(min..=max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_delay_stays_in_bounds() {
        let min = Duration::from_millis(10);
        let max = Duration::from_millis(20);
        for _ in 0..100 {
            let d = random_delay(min, max);
            assert!(d >= min && d <= max);
        }
        assert_eq!(random_delay(max, min), max);
    }
}
