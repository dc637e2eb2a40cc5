use anyhow::Result;
use clap::{Parser, Subcommand};
use client_core::{config, ForgeClient, Outcome};
use shared::domain::{Dialect, VdbName};

#[derive(Parser, Debug)]
#[command(name = "vqlforge", about = "Translate and validate SQL against a Denodo VDB")]
struct Args {
    /// Backend base URL; overrides vqlforge.toml and environment settings.
    #[arg(long)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check backend health.
    Health,
    /// List the virtual databases the backend exposes.
    Vdbs,
    /// Translate a SQL query to VQL.
    Translate {
        #[arg(long)]
        dialect: String,
        #[arg(long)]
        vdb: String,
        sql: String,
    },
    /// Validate a VQL query against the backend.
    Validate { sql: String, vql: String },
    /// Run the agentic translate-validate-correct loop.
    Forge {
        #[arg(long)]
        dialect: String,
        #[arg(long)]
        vdb: String,
        sql: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let base_url = args
        .api_url
        .unwrap_or_else(|| config::load_settings().api_base_url);
    let client = ForgeClient::new(base_url);

    match args.command {
        Command::Health => {
            let health = client.health().await?;
            println!("backend status: {}", health.status);
        }
        Command::Vdbs => {
            client.load_vdb_options().await;
            let snapshot = client.snapshot().await;
            report("vdbs", &snapshot.translation);
            for option in snapshot.vdb_options {
                println!("{}\t{}", option.value, option.label);
            }
        }
        Command::Translate { dialect, vdb, sql } => {
            client.set_source_sql(sql).await;
            client.set_dialect(Some(Dialect::new(dialect))).await;
            client.set_vdb(Some(VdbName::new(vdb))).await;
            client.convert().await;

            let snapshot = client.snapshot().await;
            match snapshot.target.vql() {
                Some(vql) => println!("{vql}"),
                None => report("translation", &snapshot.translation),
            }
        }
        Command::Validate { sql, vql } => {
            client.set_source_sql(sql).await;
            client.apply_vql_suggestion(vql).await;
            client.validate_query().await;
            report("validation", &client.snapshot().await.validation);
        }
        Command::Forge { dialect, vdb, sql } => {
            client.set_source_sql(sql).await;
            client.set_dialect(Some(Dialect::new(dialect))).await;
            client.set_vdb(Some(VdbName::new(vdb))).await;
            client.forge().await;

            let snapshot = client.snapshot().await;
            if let Some(log) = &snapshot.final_log {
                for record in log {
                    let mark = if record.success { "ok" } else { "FAILED" };
                    println!("[{mark}] {}: {}", record.name, record.details);
                }
            }
            if let Some(vql) = snapshot.target.vql() {
                println!("{vql}");
            }
            if !matches!(snapshot.translation, Outcome::Idle | Outcome::Success { .. }) {
                report("translation", &snapshot.translation);
            }
            report("validation", &snapshot.validation);
        }
    }

    Ok(())
}

fn report(channel: &str, outcome: &Outcome) {
    match outcome {
        Outcome::Idle => {}
        Outcome::Success { message } | Outcome::Info { message } => {
            println!("{channel}: {message}");
        }
        Outcome::PlainError { message } => eprintln!("{channel} error: {message}"),
        Outcome::Analyzed(analysis) => {
            eprintln!("{channel} error: {}", analysis.explanation);
            if let Some(suggestion) = &analysis.sql_suggestion {
                eprintln!("suggested fix:\n{suggestion}");
            }
        }
    }
}
