use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use color_eyre::{
    Result,
    eyre::{WrapErr as _, eyre},
};
use imagesmith_engine::{
    AgentConfig, InferenceClient, InferenceConfig, Pipeline, SamplingParams,
    agent::{DEFAULT_REQUEST_LIMIT, DEFAULT_RETRIES},
    image_model::sd_api::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT},
    llm::open_ai_chat::DEFAULT_BASE_URL,
    pipeline::DEFAULT_OUTPUT_DIR,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::cli::Cli;

pub mod cli;
pub mod prompts;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub inference: InferenceSection,
    pub agent: AgentSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSection {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub output_dir: PathBuf,
    pub sampling: SamplingParams,
}

impl Default for InferenceSection {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
            output_dir: DEFAULT_OUTPUT_DIR.into(),
            sampling: SamplingParams::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub model: String,
    pub base_url: String,
    pub openai_api_key: Option<String>,
    pub retries: usize,
    pub request_limit: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            model: "gpt-4".into(),
            base_url: DEFAULT_BASE_URL.into(),
            openai_api_key: None,
            retries: DEFAULT_RETRIES,
            request_limit: DEFAULT_REQUEST_LIMIT,
        }
    }
}

impl Config {
    /// Environment wins over the config file.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("SD_API_URL") {
            self.inference.endpoint = url;
        }
        if let Some(key) = var("OPENAI_API_KEY") {
            self.agent.openai_api_key = Some(key);
        }
        if let Some(url) = var("OPENAI_BASE_URL") {
            self.agent.base_url = url;
        }
    }

    /// Command line flags win over everything else.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(endpoint) = &cli.endpoint {
            self.inference.endpoint = endpoint.clone();
        }
        if let Some(secs) = cli.timeout_secs {
            self.inference.timeout_secs = secs;
        }
        if let Some(dir) = &cli.output_dir {
            self.inference.output_dir = dir.clone();
        }
    }

    pub fn inference_config(&self) -> InferenceConfig {
        InferenceConfig {
            endpoint: self.inference.endpoint.clone(),
            timeout: Duration::from_secs(self.inference.timeout_secs),
            connect_timeout: Duration::from_secs(self.inference.connect_timeout_secs),
        }
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            retries: self.agent.retries,
            request_limit: self.agent.request_limit,
        }
    }

    pub fn pipeline(&self) -> Result<Pipeline> {
        let client = InferenceClient::new(self.inference_config())?;
        Ok(Pipeline::new(
            client,
            self.inference.sampling.clone(),
            self.inference.output_dir.clone(),
        ))
    }
}

pub fn load_ron_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let src = fs::read_to_string(path).wrap_err_with(|| format!("reading {}", path.display()))?;
    ron::from_str(&src).wrap_err_with(|| format!("parsing {}", path.display()))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(dirs::config_local_dir()
        .ok_or(eyre!("Couldn't get config dir"))?
        .join("imagesmith.ron"))
}

/// The config at `explicit`, or the one in the default location if there
/// is one, or the defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return load_ron_file(path);
    }
    let path = config_path()?;
    if !path.exists() {
        Ok(Config::default())
    } else {
        load_ron_file(&path)
    }
}
