use std::path::PathBuf;

#[derive(Debug, clap::Parser)]
#[command(version, about = "Generate Stable Diffusion images, directly or through an LLM agent")]
pub struct Cli {
    /// RON config file to use instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// txt2img endpoint URL
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Generate one image from a fixed prompt pair
    Generate(Generate),
    /// Let a language model write the prompts and call the generator
    Agent(AgentArgs),
}

#[derive(Debug, clap::Args)]
pub struct Generate {
    #[arg(long)]
    pub prompt: Option<String>,

    #[arg(long)]
    pub negative_prompt: Option<String>,

    #[arg(long, default_value_t = Mode::Direct.to_string())]
    pub prefix: String,
}

#[derive(Debug, clap::Args)]
pub struct AgentArgs {
    /// What to ask the agent for
    #[arg(long)]
    pub request: Option<String>,

    #[arg(long, default_value_t = Mode::Agent.to_string())]
    pub prefix: String,
}

/// How the generator was invoked; the display form is the default file
/// name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Mode {
    #[strum(to_string = "txt2img")]
    Direct,
    #[strum(to_string = "disaster-girl")]
    Agent,
}
