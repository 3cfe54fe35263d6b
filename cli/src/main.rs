use std::process::ExitCode;

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{WrapErr as _, eyre},
};
use imagesmith::{
    Config,
    cli::{AgentArgs, Cli, Command, Generate},
    load_config,
    prompts::{AGENT_INSTRUCTIONS, AGENT_REQUEST, DIRECT_NEGATIVE_PROMPT, DIRECT_PROMPT},
};
use imagesmith_engine::{
    Agent, GenerateImageTool, Pipeline, ensure_output_dir, llm::OpenAIChat,
};
use log::debug;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();
    pretty_env_logger::init();
    color_eyre::install()?;

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    config.apply_env(|k| std::env::var(k).ok());
    config.apply_cli(&cli);
    debug!("Config: {config:#?}");

    let output_dir = &config.inference.output_dir;
    ensure_output_dir(output_dir)
        .wrap_err_with(|| format!("creating {}", output_dir.display()))?;
    let pipeline = config.pipeline()?;

    match cli.command {
        Command::Generate(args) => Ok(generate(&pipeline, args).await),
        Command::Agent(args) => run_agent(pipeline, &config, args).await,
    }
}

async fn generate(pipeline: &Pipeline, args: Generate) -> ExitCode {
    let prompt = args.prompt.as_deref().unwrap_or(DIRECT_PROMPT);
    let negative_prompt = args
        .negative_prompt
        .as_deref()
        .unwrap_or(DIRECT_NEGATIVE_PROMPT);
    println!("Generated prompt:\n{prompt}\n");

    match pipeline.generate(prompt, negative_prompt, &args.prefix).await {
        Ok(path) => {
            println!("Image generated at {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            println!("No image generated.");
            ExitCode::FAILURE
        }
    }
}

async fn run_agent(pipeline: Pipeline, config: &Config, args: AgentArgs) -> Result<ExitCode> {
    let api_key = config
        .agent
        .openai_api_key
        .clone()
        .ok_or(eyre!("OPENAI_API_KEY is not set"))?;
    let model = OpenAIChat::new(api_key, &config.agent.base_url, &config.agent.model);

    let agent = Agent::new(Box::new(model), AGENT_INSTRUCTIONS, config.agent_config())
        .with_tool(GenerateImageTool::new(pipeline, args.prefix));

    let request = args.request.as_deref().unwrap_or(AGENT_REQUEST);
    let run = agent.run(request).await?;
    debug!("{run:#?}");

    println!("Response: {}", run.output);
    for (tool, output) in &run.tool_outputs {
        if let Some(path) = output.get("file_path").and_then(|p| p.as_str()) {
            println!("{tool}: {path}");
        }
    }
    println!(
        "Requests: {}, input tokens: {}, output tokens: {}",
        run.usage.requests, run.usage.input_tokens, run.usage.output_tokens
    );
    Ok(ExitCode::SUCCESS)
}
