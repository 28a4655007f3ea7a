//! Billing CLI
//!
//! Usage:
//!   pnl-billing accounts add --id alice --name "Alice" --email alice@example.com \
//!       --api-key ... --secret-key ... --passphrase ...
//!   pnl-billing report
//!   pnl-billing convert --input reports/billing_report_20240115_120000.json --output out.csv

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;

use pnl_billing::commands;
use pnl_billing::db::Database;
use pnl_billing::models::{
    AccountIdentity, AccountInput, BillingSettings, Credentials, SettingsOverrides,
};
use pnl_billing::output;

#[derive(Parser, Debug)]
#[command(name = "pnl-billing")]
#[command(about = "Aggregate exchange bills into realized PnL and profit-share fees")]
struct Cli {
    /// Settings file (TOML); defaults apply when it does not exist
    #[arg(long, short, default_value = "billing.toml", env = "PNL_BILLING_CONFIG")]
    config: PathBuf,

    #[command(flatten)]
    overrides: OverrideArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct OverrideArgs {
    #[arg(long, global = true)]
    report_name: Option<String>,

    #[arg(long, global = true)]
    lookback_days: Option<u32>,

    #[arg(long, global = true)]
    fee_rate: Option<Decimal>,

    /// IANA timezone for the date and time columns
    #[arg(long, global = true)]
    timezone: Option<String>,

    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[arg(long, global = true)]
    credential_store: Option<PathBuf>,

    /// Send the demo-trading header
    #[arg(long, global = true)]
    simulated: bool,
}

impl From<OverrideArgs> for SettingsOverrides {
    fn from(args: OverrideArgs) -> Self {
        SettingsOverrides {
            report_name: args.report_name,
            lookback_days: args.lookback_days,
            fee_rate: args.fee_rate,
            timezone: args.timezone,
            output_dir: args.output_dir,
            database_path: args.database,
            credential_store_dir: args.credential_store,
            simulated: args.simulated.then_some(true),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bill every active account and write the JSON and CSV reports
    Report,

    /// Manage registered accounts
    #[command(subcommand)]
    Accounts(AccountsCommand),

    /// Show recent billing runs
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Derive the CSV table from a stored JSON report
    Convert {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        output: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum AccountsCommand {
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        label: String,
        #[arg(long, env = "OKX_API_KEY", hide_env_values = true)]
        api_key: String,
        #[arg(long, env = "OKX_SECRET_KEY", hide_env_values = true)]
        secret_key: String,
        #[arg(long, env = "OKX_PASSPHRASE", hide_env_values = true)]
        passphrase: String,
        /// Register without billing it yet
        #[arg(long)]
        inactive: bool,
    },
    List,
    Remove {
        id: String,
    },
    Activate {
        id: String,
    },
    Deactivate {
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut settings = BillingSettings::load(&cli.config)
        .with_context(|| format!("Failed to load settings from {}", cli.config.display()))?;
    settings.apply(cli.overrides.into());
    settings.validate().context("Invalid settings")?;

    match cli.command {
        Command::Report => {
            let db = open_database(&settings)?;
            let outcome = commands::generate_okx_report(&settings, &db)
                .await
                .context("Billing run failed")?;

            for record in &outcome.records {
                println!(
                    "{:<24} spot {:>18} perps {:>18} invperps {:>18} fees {} / {}",
                    record.name,
                    record.spot_pnl,
                    record.perps_pnl,
                    record.invperps_pnl,
                    record.perps_fee,
                    record.invperps_fee
                );
            }
            for skipped in &outcome.report.skipped_accounts {
                println!("skipped {}: {}", skipped.id, skipped.reason);
            }
        }
        Command::Accounts(command) => run_accounts(&settings, command)?,
        Command::History { limit } => {
            let db = open_database(&settings)?;
            for run in commands::run_history(&db, limit)? {
                println!(
                    "{}  {}  {:<8} accounts {} skipped {}",
                    run.id,
                    run.report_name,
                    run.status,
                    run.total_accounts,
                    run.skipped_accounts.len()
                );
            }
        }
        Command::Convert { input, output: csv_path } => {
            let rows = output::csv::convert(&input, &csv_path, &settings.timezone)
                .with_context(|| format!("Failed to convert {}", input.display()))?;
            println!("Wrote {} row(s) to {}", rows, csv_path.display());
        }
    }

    Ok(())
}

fn open_database(settings: &BillingSettings) -> Result<Database> {
    Database::new(&settings.database_path).with_context(|| {
        format!(
            "Failed to open {} (backups are kept next to it in backups/)",
            settings.database_path.display()
        )
    })
}

fn run_accounts(settings: &BillingSettings, command: AccountsCommand) -> Result<()> {
    let db = open_database(settings)?;

    match command {
        AccountsCommand::Add {
            id,
            name,
            email,
            label,
            api_key,
            secret_key,
            passphrase,
            inactive,
        } => {
            let storage = commands::open_storage(settings)?;
            let input = AccountInput {
                identity: AccountIdentity {
                    id,
                    name,
                    email,
                    label,
                },
                exchange: "okx".to_string(),
                credentials: Credentials {
                    api_key,
                    secret_key,
                    passphrase,
                },
                is_active: Some(!inactive),
            };
            let account = commands::add_account(&db, &storage, input)?;
            println!("Registered {} ({})", account.identity.id, account.api_key_preview);
        }
        AccountsCommand::List => {
            for account in commands::list_accounts(&db)? {
                println!(
                    "{:<16} {:<24} {:<32} {:<10} {}",
                    account.identity.id,
                    account.identity.name,
                    account.identity.email,
                    account.api_key_preview,
                    if account.is_active { "active" } else { "inactive" }
                );
            }
        }
        AccountsCommand::Remove { id } => {
            let storage = commands::open_storage(settings)?;
            if !commands::remove_account(&db, &storage, &id)? {
                anyhow::bail!("No account named {}", id);
            }
        }
        AccountsCommand::Activate { id } => set_active(&db, &id, true)?,
        AccountsCommand::Deactivate { id } => set_active(&db, &id, false)?,
    }

    Ok(())
}

fn set_active(db: &Database, id: &str, is_active: bool) -> Result<()> {
    if !commands::set_account_active(db, id, is_active)? {
        anyhow::bail!("No account named {}", id);
    }
    Ok(())
}
