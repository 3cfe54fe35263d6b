use std::time::Duration;

use log::{debug, error};
use reqwest::Client;

use super::{GenerationRequest, Txt2ImgResponse};

mod error;
pub use error::ClientError;

pub const DEFAULT_ENDPOINT: &str = "https://mlkyway.anselbrandt.net/sdapi/v1/txt2img";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub endpoint: String,
    /// Deadline for the whole request, connecting included.
    pub timeout: Duration,
    /// Deadline for establishing the connection. Must stay below `timeout`,
    /// otherwise the overall deadline fires first and a dead server is
    /// reported as `Unexpected`.
    pub connect_timeout: Duration,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Talks to a Stable Diffusion WebUI `txt2img` endpoint. Never retries;
/// that is up to the caller.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    client: Client,
    config: InferenceConfig,
}

impl InferenceClient {
    pub fn new(config: InferenceConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout.min(config.timeout))
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    pub async fn infer(&self, req: &GenerationRequest) -> Result<Txt2ImgResponse, ClientError> {
        debug!(
            "POST {} ({}x{}, {} steps)",
            self.config.endpoint, req.params.width, req.params.height, req.params.steps
        );

        let res = self
            .client
            .post(&self.config.endpoint)
            .json(req)
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;
        debug!("txt2img responded {status}, {} bytes", body.len());

        if !status.is_success() {
            error!("txt2img error {status}: {body}");
            return Err(ClientError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}
