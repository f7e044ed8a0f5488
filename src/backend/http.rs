use async_trait::async_trait;

use crate::config::Config;
use crate::error::{Error, Result};

/// Plain GET transport shared by the catalog repository and the image cache.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Fetches `url` and returns the body of a 2xx response.
    async fn get(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        log::debug!("GET {url}");
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            log::debug!("GET {url} -> {status}");
            return Err(Error::BadStatus(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}
