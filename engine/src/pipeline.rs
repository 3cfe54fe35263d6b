use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::info;
use thiserror::Error;

use crate::{
    codec::{self, CodecError},
    image_model::{ClientError, GenerationRequest, InferenceClient, SamplingParams},
    naming,
};

pub const DEFAULT_OUTPUT_DIR: &str = "outputs";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("The response didn't contain an image")]
    MissingImage,

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Creates the output directory and its parents. Safe to call repeatedly.
pub fn ensure_output_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

/// Prompt pair in, saved PNG path out.
#[derive(Debug, Clone)]
pub struct Pipeline {
    client: InferenceClient,
    sampling: SamplingParams,
    output_dir: PathBuf,
}

impl Pipeline {
    pub fn new(client: InferenceClient, sampling: SamplingParams, output_dir: PathBuf) -> Self {
        Self {
            client,
            sampling,
            output_dir,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Requests one image and saves it as `{output_dir}/{prefix}-{timestamp}.png`.
    ///
    /// Errors are handed back as classified, nothing is retried and no file
    /// is created unless an image came back.
    pub async fn generate(
        &self,
        prompt: &str,
        negative_prompt: &str,
        prefix: &str,
    ) -> Result<PathBuf, GenerationError> {
        let req = GenerationRequest::new(prompt, negative_prompt, self.sampling.clone());

        let resp = self.client.infer(&req).await?;

        let image_b64 = resp
            .into_first_image()
            .ok_or(GenerationError::MissingImage)?;

        let path = self.output_dir.join(naming::file_name(prefix));
        codec::save_base64_image(&image_b64, &path)?;
        info!("Generated {}", path.display());
        Ok(path)
    }
}
