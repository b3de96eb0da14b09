//! agent-cli
//!
//! Runs one task through an agent backed by a local Ollama server and
//! prints every history entry as it is appended.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{
    AgentBuilder, AgentConfig, CapabilityRegistry, LlmGateway, Message,
    ResponseFormat, StrategyKind,
};
use agent_runtime::OllamaGateway;

#[derive(Parser, Debug)]
#[command(name = "agent-cli", version, about = "Run a task through a tool-using LLM agent")]
struct Cli {
    /// Task for the agent
    #[arg(required_unless_present = "list_tools")]
    task: Vec<String>,

    /// Capability identifiers, comma separated
    #[arg(long, value_delimiter = ',', default_value = "calculator,current_time")]
    tools: Vec<String>,

    /// react or native
    #[arg(long)]
    strategy: Option<StrategyKind>,

    #[arg(long)]
    max_iterations: Option<u32>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    temperature: Option<f32>,

    /// Ask the model for JSON output
    #[arg(long)]
    json: bool,

    /// List the available capabilities and exit
    #[arg(long)]
    list_tools: bool,
}

impl Cli {
    /// Flags take precedence over the environment
    fn apply(&self, mut config: AgentConfig) -> AgentConfig {
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(max) = self.max_iterations {
            config.max_iterations = max;
        }
        if let Some(model) = &self.model {
            config.model.clone_from(model);
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        if self.json {
            config.response_format = Some(ResponseFormat::Json);
        }
        config
    }

    fn task(&self) -> String {
        self.task.join(" ")
    }
}

fn print_entry(message: &Message) {
    println!("[{}] {}", message.role, message.content);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only the transcript
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let registry = CapabilityRegistry::with_builtins();

    if cli.list_tools {
        for name in registry.names() {
            println!("{name}");
        }
        return Ok(());
    }

    let config = cli.apply(AgentConfig::from_env()?);
    config.validate()?;

    let gateway = Arc::new(OllamaGateway::from_env()?);
    match gateway.health_check().await {
        Ok(true) => tracing::info!(url = %gateway.config().base_url(), "Connected to Ollama"),
        Ok(false) | Err(_) => {
            tracing::warn!("Ollama not available - the run will fail");
            tracing::warn!("  Make sure Ollama is running: ollama serve");
        }
    }

    let mut agent = AgentBuilder::new()
        .gateway(gateway)
        .registry(registry)
        .config(&config)
        .tools(cli.tools.iter().map(|t| t.trim().to_string()))
        .on_history_entry(print_entry)
        .build(cli.task())?;

    if let Err(err) = agent.run().await {
        eprintln!("{}", err.user_message());
        return Err(err.into());
    }

    match agent.final_answer() {
        Some(answer) => println!("\nFinal answer: {answer}"),
        None => println!(
            "\nNo final answer after {} iterations.",
            agent.iteration_count()
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "agent-cli",
            "--strategy",
            "native",
            "--max-iterations",
            "3",
            "--tools",
            "calculator,web_search",
            "--json",
            "What",
            "time",
            "is",
            "it?",
        ]);

        let config = cli.apply(AgentConfig::default());

        assert_eq!(cli.task(), "What time is it?");
        assert_eq!(cli.tools, vec!["calculator", "web_search"]);
        assert_eq!(config.strategy, StrategyKind::NativeToolCalling);
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.response_format, Some(ResponseFormat::Json));
        assert_eq!(config.model, AgentConfig::default().model);
    }

    #[test]
    fn test_unset_flags_keep_config() {
        let cli = Cli::parse_from(["agent-cli", "hello"]);
        let base = AgentConfig {
            model: "qwen2.5".into(),
            ..AgentConfig::default()
        };

        assert_eq!(cli.apply(base.clone()), base);
        assert_eq!(cli.tools, vec!["calculator", "current_time"]);
    }
}
