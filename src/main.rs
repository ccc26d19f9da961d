use clap::Parser;
use homeledger::args::{
    Args, Command, DeleteSubcommand, InsertSubcommand, ListSubcommand, UpdateSubcommand,
};
use homeledger::{commands, Config, Result};
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with {} error: {e}", e.error_type());
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home: &Path = args.common().home();

    let _: () = match args.command() {
        Command::Init => commands::init(home).await?.print(),

        Command::Insert(insert_args) => {
            let config = Config::load(home).await?;
            match insert_args.entity() {
                InsertSubcommand::Account(args) => commands::insert_account(config, args.clone())
                    .await?
                    .print(),
                InsertSubcommand::Category(args) => {
                    commands::insert_category(config, args.clone())
                        .await?
                        .print()
                }
                InsertSubcommand::Transaction(args) => {
                    commands::insert_transaction(config, args.clone())
                        .await?
                        .print()
                }
                InsertSubcommand::Transfer(args) => commands::insert_transfer(config, args.clone())
                    .await?
                    .print(),
            }
        }

        Command::Update(update_args) => {
            let config = Config::load(home).await?;
            match update_args.entity() {
                UpdateSubcommand::Account(args) => commands::update_account(config, args.clone())
                    .await?
                    .print(),
                UpdateSubcommand::Category(args) => {
                    commands::update_category(config, args.clone())
                        .await?
                        .print()
                }
                UpdateSubcommand::Transaction(args) => {
                    commands::update_transaction(config, args.clone())
                        .await?
                        .print()
                }
            }
        }

        Command::Delete(delete_args) => {
            let config = Config::load(home).await?;
            match delete_args.entity() {
                DeleteSubcommand::Account { id } => {
                    commands::delete_account(config, *id).await?.print()
                }
                DeleteSubcommand::Category { id } => {
                    commands::delete_category(config, *id).await?.print()
                }
                DeleteSubcommand::Transaction { id } => {
                    commands::delete_transaction(config, *id).await?.print()
                }
            }
        }

        Command::List(list_args) => {
            let config = Config::load(home).await?;
            match list_args.entity() {
                ListSubcommand::Accounts => commands::list_accounts(config).await?.print(),
                ListSubcommand::Categories => commands::list_categories(config).await?.print(),
            }
        }

        Command::Balance(balance_args) => {
            let config = Config::load(home).await?;
            commands::balance(config, balance_args.account).await?.print()
        }

        Command::Query(query_args) => {
            let config = Config::load(home).await?;
            commands::query(config, query_args.clone()).await?.print()
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_CRATE_NAME"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
