//! Referral ledger CLI - Command-line interface for the referral commission engine
//!
//! Registers members, feeds payment, signup and upgrade events to the engine,
//! reports balances, bonuses and ledger entries, runs payout transitions, and
//! drives concurrent load simulations against a ledger database.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use referral_ledger::{MemberSignedUp, MemberUpgraded, PaymentCompleted, ReferralEngine, Tier};
use referral_ledger_cli::commands::{
    self, ledger::LedgerFilter, parse_tier, simulate::SimulateCommand,
    simulate::SimulationScenario, OutputFormat,
};
use referral_ledger_cli::config::LedgerCliConfig;

#[derive(Parser, Debug)]
#[command(
    name = "referral-ledger",
    version,
    about = "Command-line interface for the referral commission and bonus ledger"
)]
struct Cli {
    /// Ledger database file
    #[arg(long)]
    db: Option<String>,

    /// Output format
    #[arg(long, value_enum)]
    output: Option<OutputFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register a member or move it to another tier or sponsor
    RegisterMember {
        /// Member identifier
        #[arg(long)]
        id: String,

        /// Subscription tier (FREE, BRONZE, SILVER, GOLD, DIAMOND, PARTNER)
        #[arg(long, value_parser = parse_tier)]
        tier: Tier,

        /// Direct sponsor of the member
        #[arg(long)]
        sponsor: Option<String>,
    },

    /// Process a completed payment and pay commission up the sponsor chain
    Pay {
        /// Delivery-stable event identifier
        #[arg(long)]
        event_id: String,

        /// Member who paid
        #[arg(long)]
        payer: String,

        /// Amount paid in minor units (e.g., 10000 = 100.00)
        #[arg(long)]
        amount: u64,
    },

    /// Record a signup and credit the referrer network once it is eligible
    Signup {
        /// Referring member
        #[arg(long)]
        referrer: String,

        /// Newly signed-up member
        #[arg(long)]
        new_member: String,

        /// Plan the new member signed up on
        #[arg(long, value_parser = parse_tier)]
        tier: Tier,

        /// Payment for the plan has been confirmed
        #[arg(long)]
        payment_confirmed: bool,

        /// The refund window has elapsed
        #[arg(long)]
        refund_window_elapsed: bool,
    },

    /// Record a plan change; a free to paid upgrade credits the pending signup
    Upgrade {
        /// Member who changed plans
        #[arg(long)]
        member: String,

        /// Previous plan
        #[arg(long, value_parser = parse_tier)]
        old_tier: Tier,

        /// New plan
        #[arg(long, value_parser = parse_tier)]
        new_tier: Tier,

        /// Payment for the new plan has been confirmed
        #[arg(long)]
        payment_confirmed: bool,

        /// The refund window has elapsed
        #[arg(long)]
        refund_window_elapsed: bool,
    },

    /// Ingest a JSON-lines file of event envelopes
    Ingest {
        /// Path to the events file
        #[arg(long)]
        file: String,
    },

    /// Show a member's commission balance
    Balance {
        /// Member identifier
        #[arg(long)]
        member: String,
    },

    /// List bonus records for a member, or every pending bonus
    Bonuses {
        /// Member identifier; omit to list pending bonuses across the ledger
        #[arg(long)]
        member: Option<String>,
    },

    /// Show a member's points with the per-depth rollup
    Points {
        /// Member identifier
        #[arg(long)]
        member: String,
    },

    /// List ledger entries for a beneficiary or a payment event
    Ledger {
        /// Beneficiary member identifier
        #[arg(long, conflicts_with = "event_id", required_unless_present = "event_id")]
        member: Option<String>,

        /// Payment event identifier
        #[arg(long)]
        event_id: Option<String>,
    },

    /// Mark every pending ledger entry of a payout week as paid
    MarkPaid {
        /// ISO payout week (e.g., 2026-W43)
        #[arg(long)]
        week: String,
    },

    /// Pay out a member's pending bonuses
    SettleBonuses {
        /// Member identifier
        #[arg(long)]
        member: String,
    },

    /// Check every balance against the sum of its ledger entries
    Audit,

    /// Run a seeded concurrent payment simulation
    Simulate {
        /// Simulation scenario
        #[arg(long, value_enum, default_value = "normal")]
        scenario: SimulationScenario,

        /// Members in the generated sponsor forest
        #[arg(long, default_value = "200")]
        members: usize,

        /// Payment events to process
        #[arg(long, default_value = "2000")]
        payments: u64,

        /// Concurrent workers, each with its own connection
        #[arg(long, default_value = "4")]
        workers: usize,

        /// Share of events redelivered (0.0 - 1.0)
        #[arg(long, default_value = "0.1")]
        replay_rate: f32,

        /// Seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = LedgerCliConfig::new();

    // Use configuration with CLI overrides
    let default_output_format = parse_output_format(&config.default_output_format)?;
    let output_format = cli.output.unwrap_or(default_output_format);

    // Execute command
    let result = execute_command(&cli, output_format, &config).await;

    // Handle output formatting
    match result {
        Ok(output) => match output_format {
            OutputFormat::Human => println!("{output}"),
            OutputFormat::Json => {
                let data = serde_json::from_str::<serde_json::Value>(&output)
                    .unwrap_or(serde_json::Value::String(output));
                let json_output = serde_json::json!({
                    "success": true,
                    "data": data
                });
                println!("{}", serde_json::to_string_pretty(&json_output)?);
            }
        },
        Err(e) => {
            match output_format {
                OutputFormat::Human => eprintln!("Error: {e:#}"),
                OutputFormat::Json => {
                    let json_output = serde_json::json!({
                        "success": false,
                        "error": format!("{e:#}")
                    });
                    println!("{}", serde_json::to_string_pretty(&json_output)?);
                }
            }
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Parse output format from string
fn parse_output_format(format_str: &str) -> Result<OutputFormat> {
    match format_str.to_lowercase().as_str() {
        "human" => Ok(OutputFormat::Human),
        "json" => Ok(OutputFormat::Json),
        _ => Err(anyhow::anyhow!("Invalid output format: {}", format_str)),
    }
}

fn open_engine(cli: &Cli, config: &LedgerCliConfig) -> Result<ReferralEngine> {
    let engine_config = config.engine_config(cli.db.as_deref());
    let path = engine_config.database_path.clone().unwrap_or_default();
    ReferralEngine::open(engine_config).with_context(|| format!("Failed to open ledger at {path}"))
}

async fn execute_command(
    cli: &Cli,
    output_format: OutputFormat,
    config: &LedgerCliConfig,
) -> Result<String> {
    match &cli.command {
        Commands::RegisterMember { id, tier, sponsor } => commands::execute_register_member(
            &mut open_engine(cli, config)?,
            id,
            *tier,
            sponsor.as_deref(),
            output_format,
        ),

        Commands::Pay {
            event_id,
            payer,
            amount,
        } => {
            let event = PaymentCompleted {
                event_id: event_id.clone(),
                payer_id: payer.clone(),
                amount_paid_minor: *amount,
            };
            commands::execute_payment(&mut open_engine(cli, config)?, &event, output_format, config)
        }

        Commands::Signup {
            referrer,
            new_member,
            tier,
            payment_confirmed,
            refund_window_elapsed,
        } => {
            let event = MemberSignedUp {
                referrer_id: referrer.clone(),
                new_member_id: new_member.clone(),
                tier: *tier,
                payment_confirmed: *payment_confirmed,
                refund_window_elapsed: *refund_window_elapsed,
            };
            commands::execute_signup(&mut open_engine(cli, config)?, &event, output_format, config)
        }

        Commands::Upgrade {
            member,
            old_tier,
            new_tier,
            payment_confirmed,
            refund_window_elapsed,
        } => {
            let event = MemberUpgraded {
                member_id: member.clone(),
                old_tier: *old_tier,
                new_tier: *new_tier,
                payment_confirmed: *payment_confirmed,
                refund_window_elapsed: *refund_window_elapsed,
            };
            commands::execute_upgrade(&mut open_engine(cli, config)?, &event, output_format, config)
        }

        Commands::Ingest { file } => {
            let mut engine = open_engine(cli, config)?;
            commands::execute_ingest(&mut engine, file, output_format).await
        }

        Commands::Balance { member } => {
            commands::execute_balance(&open_engine(cli, config)?, member, output_format, config)
        }

        Commands::Bonuses { member } => commands::execute_bonuses(
            &open_engine(cli, config)?,
            member.as_deref(),
            output_format,
            config,
        ),

        Commands::Points { member } => {
            commands::execute_points(&open_engine(cli, config)?, member, output_format, config)
        }

        Commands::Ledger { member, event_id } => {
            let filter = match (member, event_id) {
                (Some(member), _) => LedgerFilter::Beneficiary(member),
                (None, Some(event_id)) => LedgerFilter::Event(event_id),
                (None, None) => {
                    return Err(anyhow::anyhow!("Either --member or --event-id is required"))
                }
            };
            commands::execute_ledger(&open_engine(cli, config)?, filter, output_format, config)
        }

        Commands::MarkPaid { week } => {
            commands::execute_mark_paid(&mut open_engine(cli, config)?, week, output_format)
        }

        Commands::SettleBonuses { member } => commands::execute_settle_bonuses(
            &mut open_engine(cli, config)?,
            member,
            output_format,
            config,
        ),

        Commands::Audit => commands::execute_audit(&open_engine(cli, config)?, output_format),

        // The simulator opens its own connections
        Commands::Simulate {
            scenario,
            members,
            payments,
            workers,
            replay_rate,
            seed,
        } => {
            let command = SimulateCommand {
                db_path: cli
                    .db
                    .clone()
                    .unwrap_or_else(|| config.default_db_path.clone()),
                scenario: *scenario,
                members: *members,
                payments: *payments,
                workers: *workers,
                replay_rate: *replay_rate,
                seed: *seed,
            };
            commands::execute_simulate(command, config).await
        }
    }
}
