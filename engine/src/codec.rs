use std::{fs, path::Path, path::PathBuf};

use base64::{Engine, engine::general_purpose::STANDARD};
use log::info;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Image payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Couldn't write image to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Decodes a base64 image payload and writes the raw bytes to `path`,
/// replacing whatever was there before.
pub fn save_base64_image(image_b64: &str, path: &Path) -> Result<(), CodecError> {
    let data = STANDARD.decode(image_b64)?;
    fs::write(path, &data).map_err(|source| CodecError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Image saved to {} ({} bytes)", path.display(), data.len());
    Ok(())
}
