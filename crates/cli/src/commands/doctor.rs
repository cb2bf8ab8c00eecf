//! `larkbridge doctor` — Run the configuration self-check.

use larkbridge_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 larkbridge Doctor — Configuration Self-Check");
    println!("===============================================\n");

    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let report = config.self_check();

    if report.is_ok() {
        println!("  ✅ {}", report.message.en_us);
        if let Some(meta) = &report.meta {
            println!();
            println!("  App ID:     {}", meta.app_id);
            println!("  Bot name:   {}", meta.bot_name);
            println!("  Model:      {}", meta.model);
            println!("  Max tokens: {}", meta.max_tokens);
        }
    } else {
        println!("  ❌ {}", report.message.zh_cn);
        println!("     {}", report.message.en_us);
        std::process::exit(1);
    }

    Ok(())
}
