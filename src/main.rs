use anyhow::Result;
use parlance::{
    topics, Bus, Config, OpenAiChatBackend, PagerService, SessionRegistry, TurnService,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cfg = Config::load("config/parlance")?;

    info!("Parlance v0.1.0");
    info!("Loaded config: {}", cfg.service.name);

    let bus = Bus::new();

    let backend = Arc::new(OpenAiChatBackend::new(cfg.chat.clone())?);
    let turns = SessionRegistry::new(
        &bus,
        Arc::new(TurnService::new(backend, cfg.chat.system_prompt.clone())),
    );
    let pagers = SessionRegistry::new(&bus, Arc::new(PagerService::new(cfg.audio.pager_config())));

    info!(
        "Awaiting transport session announcements on '{}'",
        topics::SESSION_NEW
    );

    tokio::try_join!(
        turns.run(shutdown_signal()),
        pagers.run(shutdown_signal()),
    )?;

    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
