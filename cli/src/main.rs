pub mod cli;

use anyhow::Context;
use clap::Parser;
use serde_json::json;

use backend::app::App;
use backend::config::AppConfig;
use backend::logger::init_tracing;
use backend::service::trading_date;
use cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let cfg = AppConfig::from_env().context("loading configuration")?;
    let app = App::build(&cfg).await?;
    let service = &app.service;

    let out = match cli.command {
        Command::Candidates { date, with_data } => {
            let today = date.unwrap_or_else(|| trading_date(chrono::Utc::now()));
            if with_data {
                let rows = service.list_candidates_with_data_at(today).await?;
                let rows: Vec<_> = rows
                    .into_iter()
                    .map(|(candidate, snapshot)| json!({ "candidate": candidate, "snapshot": snapshot }))
                    .collect();
                json!(rows)
            } else {
                json!(service.list_candidates_at(today))
            }
        }

        Command::Show { ensure_fresh } => {
            let current = if ensure_fresh {
                service.ensure_fresh().await?
            } else {
                service.get_active_contract().await?
            };

            match current {
                Some(c) => {
                    let today = trading_date(chrono::Utc::now());
                    json!({
                        "contract": c.contract,
                        "freshness": c.freshness,
                        "days_until_expiry": c.contract.days_until_expiry(today),
                        "expiring_soon": c.contract.is_expiring_soon(today, 30),
                    })
                }
                None => json!(null),
            }
        }

        Command::Refresh => json!(service.refresh_active_contract().await?),

        Command::Analyze => json!(service.analyze_active_contract().await?),
    };

    println!("{}", serde_json::to_string_pretty(&out)?);

    Ok(())
}
