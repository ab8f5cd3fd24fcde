use anyhow::Context;
use clap::Parser;
use tofuboi::utils::error::{BotError, ErrorSeverity};
use tofuboi::utils::{logger, validation::Validate};
use tofuboi::{Bot, CliConfig};

fn exit_code(e: &BotError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low | ErrorSeverity::High => 1,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::Critical => 3,
    }
}

fn fail(stage: &str, e: &BotError) -> ! {
    tracing::error!(
        "❌ {}: {} (Category: {:?}, Severity: {:?})",
        stage,
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(exit_code(e));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();
    let verbose = cli.verbose;
    let json_flag = cli.json_logs;

    let config = match cli.into_bot_config() {
        Ok(config) => config,
        Err(e) => {
            logger::init_logger(verbose, json_flag);
            fail("Failed to load configuration", &e);
        }
    };

    logger::init_logger(verbose, config.logging.json);
    tracing::info!("🚀 Launching Telegram bot...");

    if let Err(e) = config.validate() {
        fail("Configuration validation failed", &e);
    }

    let bot = Bot::from_config(&config).context("failed to build HTTP clients")?;

    match bot.identify().await {
        Ok(me) => tracing::info!(
            "🤖 Logged in as @{} ({})",
            me.username.as_deref().unwrap_or(&me.first_name),
            me.id
        ),
        Err(e) => fail("Telegram rejected the bot", &e),
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("❌ Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    if let Err(e) = bot.run(shutdown).await {
        fail("Bot stopped", &e);
    }

    tracing::info!("✅ Bot stopped cleanly");
    Ok(())
}
