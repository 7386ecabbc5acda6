use backend::{app::App, config::AppConfig, logger::init_tracing, metrics::counters::Counters};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppConfig::from_env()?;
    init_tracing(cfg.json_logs);

    tracing::info!("Starting goldwatch backend...");

    let app = App::build(&cfg).await?;

    // First cycle runs on the scheduler's immediate tick.
    app.scheduler.start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    app.scheduler.shutdown().await;

    let c = &app.counters;
    tracing::info!(
        cycles = Counters::get(&c.refresh_cycles),
        selected = Counters::get(&c.refresh_selected),
        empty = Counters::get(&c.refresh_empty),
        failed = Counters::get(&c.refresh_failed),
        persist_failed = Counters::get(&c.persist_failed),
        "refresh counters at shutdown"
    );

    Ok(())
}
