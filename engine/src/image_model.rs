use log::debug;
use serde::{Deserialize, Serialize};

pub mod sd_api;
pub use sd_api::{ClientError, InferenceClient, InferenceConfig};

/// Sampling settings sent with every txt2img request. The defaults are the
/// settings the generator has always used; they are not exposed per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    pub steps: u32,
    pub cfg_scale: u32,
    pub width: u32,
    pub height: u32,
    pub sampler_index: String,
    pub batch_size: u32,
    pub n_iter: u32,
    pub restore_faces: bool,
    pub tiling: bool,
    pub send_images: bool,
    pub save_images: bool,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            steps: 30,
            cfg_scale: 7,
            width: 1600,
            height: 1080,
            sampler_index: "Euler".into(),
            batch_size: 1,
            n_iter: 1,
            restore_faces: false,
            tiling: false,
            send_images: true,
            save_images: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: String,
    #[serde(flatten)]
    pub params: SamplingParams,
}

impl GenerationRequest {
    pub fn new(
        prompt: impl Into<String>,
        negative_prompt: impl Into<String>,
        params: SamplingParams,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: negative_prompt.into(),
            params,
        }
    }
}

/// Body of a successful `/sdapi/v1/txt2img` response.
#[derive(Debug, Default, Deserialize)]
pub struct Txt2ImgResponse {
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
    /// JSON-encoded generation info (seed, sampler, ...), as a string.
    #[serde(default)]
    pub info: Option<String>,
}

impl Txt2ImgResponse {
    /// Only one image is requested per call, anything past the first is dropped.
    pub fn into_first_image(self) -> Option<String> {
        if let Some(info) = &self.info {
            debug!("Generation info: {info}");
        }
        if self.images.len() > 1 {
            debug!("Discarding {} extra images", self.images.len() - 1);
        }
        self.images.into_iter().next()
    }
}
