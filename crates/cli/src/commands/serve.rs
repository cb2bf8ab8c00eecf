//! `larkbridge serve` — Start the webhook HTTP server.
//!
//! Wires the full pipeline once at startup: SQLite store, completion
//! engine, platform messenger, and the message handler behind the gateway.

use larkbridge_completion::OpenAiEngine;
use larkbridge_config::AppConfig;
use larkbridge_engine::{ContextBuilder, EvictionPolicy, FirstCharClassifier, MessageHandler};
use larkbridge_gateway::GatewayState;
use larkbridge_messenger::{LarkConfig, LarkMessenger};
use larkbridge_store::SqliteStore;
use std::sync::Arc;
use tracing::warn;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.server.port = port;
    }

    let report = config.self_check();
    if !report.is_ok() {
        // Serve anyway: the endpoint answers probes with the same report,
        // which is how operators diagnose a half-configured deployment.
        warn!(reason = %report.message.en_us, "Configuration self-check failed");
    }

    let store = Arc::new(SqliteStore::new(&config.server.db_path).await?);

    let completion = Arc::new(OpenAiEngine::new(
        &config.openai.api_url,
        &config.openai.api_key,
        &config.openai.model,
    ));

    let messenger = Arc::new(LarkMessenger::new(LarkConfig::new(
        &config.feishu.app_id,
        &config.feishu.app_secret,
    )));

    let handler = MessageHandler::new(
        store.clone(),
        store.clone(),
        completion,
        messenger,
        ContextBuilder::new(store.clone(), Arc::new(FirstCharClassifier)),
        EvictionPolicy::new(i64::from(config.openai.max_tokens)),
        config.feishu.bot_name.clone(),
        config.openai.max_tokens,
    );

    println!("🌉 larkbridge");
    println!(
        "   Listening: {}:{}",
        config.server.host, config.server.port
    );
    println!("   Database:  {}", config.server.db_path);
    println!("   Model:     {}", config.openai.model);

    larkbridge_gateway::start(Arc::new(GatewayState { config, handler })).await?;

    Ok(())
}
