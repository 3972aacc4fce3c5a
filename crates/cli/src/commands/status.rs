//! `tinyreact status` — Show configuration paths and persisted state.

use tinyreact_config::AppConfig;
use tinyreact_core::memory::StateStore;
use tinyreact_memory::FileStateStore;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let store = FileStateStore::new(AppConfig::state_dir());
    let agent = &config.agent.name;

    println!("tinyreact status");
    println!("================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Agent:        {agent}");
    println!("  Model:        {}", config.model);
    println!("  Max rounds:   {}", config.agent.max_rounds);
    println!("  Max depth:    {}", config.agent.max_depth);
    println!("  Compaction:   at ~{} tokens, keep {}", config.compaction.threshold_tokens, config.compaction.keep_recent);
    println!("  State file:   {}", store.state_path(agent).display());

    match store.load(agent).await? {
        Some(state) => {
            println!("  Compactions:  {}", state.compactions);
            println!("  Triggered at: ~{} tokens", state.last_trigger_tokens);
            if let Some(at) = state.last_compacted_at {
                println!("  Last run:     {}", at.to_rfc3339());
            }
            if !state.has_summary() {
                println!("  Summary:      (empty)");
            } else {
                println!("  Summary:");
                for line in state.summary.lines() {
                    println!("    {line}");
                }
            }
        }
        None => println!("\n  No persisted state yet."),
    }

    Ok(())
}
