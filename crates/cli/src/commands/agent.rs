//! `tinyreact agent` — Interactive or single-task mode.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tinyreact_agent::{Agent, ExecuteOptions, ExecutionReport};
use tinyreact_config::AppConfig;
use tinyreact_core::CancellationToken;
use tinyreact_core::knowledge::KnowledgeBase;
use tinyreact_memory::FileStateStore;
use tinyreact_providers::RetryPolicy;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(message: Option<String>, knowledge: Vec<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() && config.provider == tinyreact_config::ProviderKind::OpenaiCompat {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    TINYREACT_API_KEY    (generic)");
        eprintln!("    DEEPSEEK_API_KEY");
        eprintln!("    OPENROUTER_API_KEY");
        eprintln!("    OPENAI_API_KEY");
        eprintln!();
        eprintln!("  Or add `api_key` to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let agent = build_agent(&config, &knowledge)?;

    match message {
        Some(task) => {
            let report = execute(&agent, &task).await;
            print_report(&report);
            if !report.is_success() {
                return Err(format!("execution ended: {}", report.termination).into());
            }
        }
        None => interactive(&config, &agent).await?,
    }

    Ok(())
}

/// Assemble the configured agent: provider, tools, knowledge and state store.
pub fn build_agent(config: &AppConfig, extra_knowledge: &[PathBuf]) -> Result<Arc<Agent>, Box<dyn std::error::Error>> {
    let provider = tinyreact_providers::build_from_config(config)?;
    let work_dir = config.agent.work_dir.clone();

    let mut knowledge = KnowledgeBase::default();
    let from_config = knowledge.load_files(&config.agent.knowledge_files, Some(&work_dir));
    let from_cli = knowledge.load_files(extra_knowledge, None);
    tracing::debug!(from_config, from_cli, "Knowledge files loaded");

    let agent = Agent::builder(config.agent_config(), provider)
        .tools(tinyreact_tools::default_registry(&work_dir))
        .knowledge(knowledge)
        .store(Arc::new(FileStateStore::new(AppConfig::state_dir())))
        .retry(RetryPolicy::from(&config.retry))
        .default_interceptors()
        .build();
    Ok(agent)
}

/// Run one task; Ctrl+C cancels it without leaving the process.
async fn execute(agent: &Agent, task: &str) -> ExecutionReport {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let report = agent
        .execute_with(
            task,
            ExecuteOptions {
                cancel: Some(cancel),
                timeout: None,
            },
        )
        .await;
    watcher.abort();
    report
}

async fn interactive(config: &AppConfig, agent: &Agent) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("  tinyreact — interactive mode");
    println!();
    println!("  Agent:     {}", agent.name());
    println!("  Provider:  {}", agent.provider_name());
    println!("  Model:     {}", config.model);
    println!("  Tools:     {}", agent.tool_names().join(", "));
    println!();
    println!("  Type a task and press Enter. /help lists commands.");
    println!("  Type 'exit' to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "exit" | "quit") {
            break;
        }

        let report = execute(agent, input).await;
        println!();
        for line in report.answer.lines() {
            println!("  {} > {line}", agent.name());
        }
        if !report.is_success() {
            eprintln!("  [{}]", report.termination);
        }
        println!();
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

fn print_report(report: &ExecutionReport) {
    println!("{}", report.answer);
    tracing::info!(
        agent = %report.agent,
        termination = report.termination.label(),
        rounds = report.rounds,
        tool_calls = report.tool_calls,
        "Task finished"
    );
    if !report.is_success() {
        eprintln!("[{}]", report.termination);
        if let Some(err) = &report.last_error {
            eprintln!("last error: {err}");
        }
    }
}
