//! `safetymon` - CLI for the safety and compliance core

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;

use safetymon::cli::{
    AlertsCommand, Cli, Command, ConfigCommand, ScanCommand, ScoreCommand, SpiCommand,
};
use safetymon::risk::matrix::{Axis, RiskDomain};
use safetymon::{
    init_logging, AlertKind, AlertStore, Clock, Config, Error, FixedClock, InMemoryRecordStore,
    SafetyCore, SpiMonitor, SqliteAlertStore, SystemClock,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Score(cmd) => handle_score(&cmd),
        Command::Scan(cmd) => handle_scan(&config, &cmd),
        Command::Spi(cmd) => handle_spi(&config, &cmd),
        Command::Alerts(cmd) => handle_alerts(&config, cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

/// A rank if the argument is numeric, otherwise `None` to try it as a label.
fn numeric_rank(axis: &'static str, raw: &str) -> Option<safetymon::Result<u8>> {
    let rank: i64 = raw.trim().parse().ok()?;
    Some(u8::try_from(rank).map_err(|_| Error::InvalidRank { axis, rank }))
}

fn handle_score(cmd: &ScoreCommand) -> Result<()> {
    let domain = RiskDomain::from(cmd.domain);
    let likelihood = match numeric_rank("likelihood", &cmd.likelihood) {
        Some(rank) => rank?,
        None => domain.rank(Axis::Likelihood, &cmd.likelihood)?,
    };
    let severity = match numeric_rank("severity", &cmd.severity) {
        Some(rank) => rank?,
        None => domain.rank(Axis::Severity, &cmd.severity)?,
    };
    let score = safetymon::score_risk(likelihood, severity)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&score)?);
    } else {
        println!(
            "Likelihood: {} ({likelihood})",
            domain.label(Axis::Likelihood, likelihood).unwrap_or("?")
        );
        println!(
            "Severity:   {} ({severity})",
            domain.label(Axis::Severity, severity).unwrap_or("?")
        );
        println!("Score:      {}", score.score);
        println!("Tier:       {} {}", score.tier, score.color);
    }
    Ok(())
}

fn load_records(config: &Config, path: &std::path::Path) -> Result<InMemoryRecordStore> {
    InMemoryRecordStore::load(path, config.duty.ceilings)
        .with_context(|| format!("failed to load records from {}", path.display()))
}

fn open_alert_store(config: &Config) -> Result<SqliteAlertStore> {
    let path = config.database_path();
    SqliteAlertStore::open(&path, config.busy_timeout())
        .with_context(|| format!("failed to open alert database at {}", path.display()))
}

fn handle_scan(config: &Config, cmd: &ScanCommand) -> Result<()> {
    let records = load_records(config, &cmd.records)?;
    let alerts = open_alert_store(config)?;

    let mut core = SafetyCore::new(config.clone(), records, alerts);
    if let Some(date) = cmd.as_of {
        core = core.with_clock(FixedClock::on(date));
    }

    let report = core
        .scan(&cmd.tenant)
        .with_context(|| format!("compliance scan of tenant '{}' failed", cmd.tenant))?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Compliance scan: {}", cmd.tenant);
        println!("-----------------");
        println!("Persons scanned:       {}", report.persons_scanned);
        println!("Alerts created:        {}", report.alerts_created);
        println!("Duplicates suppressed: {}", report.duplicates_suppressed);
        println!("Facts skipped:         {}", report.facts_skipped);
        println!("Persons failed:        {}", report.persons_failed);
    }
    Ok(())
}

fn handle_spi(config: &Config, cmd: &SpiCommand) -> Result<()> {
    let records = load_records(config, &cmd.records)?;
    let reference = cmd.as_of.unwrap_or_else(|| SystemClock.today());

    let evaluations = SpiMonitor::new(&records)
        .evaluate(&cmd.tenant, reference)
        .with_context(|| format!("indicator evaluation for tenant '{}' failed", cmd.tenant))?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&evaluations)?);
        return Ok(());
    }

    if evaluations.is_empty() {
        println!("No indicators configured for {}.", cmd.tenant);
        return Ok(());
    }
    println!("{:<24} {:>10}  {:<16} {:<10}", "INDICATOR", "VALUE", "UNIT", "TIER");
    for evaluation in &evaluations {
        let value = evaluation
            .current_value
            .map_or_else(|| "n/a".to_string(), |value| format!("{value:.2}"));
        let tier = evaluation
            .tier
            .map_or_else(|| "no exposure".to_string(), |tier| tier.to_string());
        println!(
            "{:<24} {:>10}  {:<16} {:<10}",
            evaluation.definition.name, value, evaluation.definition.unit, tier
        );
    }
    Ok(())
}

fn handle_alerts(config: &Config, cmd: AlertsCommand) -> Result<()> {
    let store = open_alert_store(config)?;

    match cmd {
        AlertsCommand::List {
            tenant,
            person,
            kinds,
            json,
        } => {
            let kinds: Vec<AlertKind> = kinds.into_iter().map(AlertKind::from).collect();
            let filter = (!kinds.is_empty()).then_some(kinds.as_slice());
            let alerts = store.find_unacknowledged(&tenant, &person, filter)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&alerts)?);
            } else if alerts.is_empty() {
                println!("No open alerts for {person}.");
            } else {
                for alert in &alerts {
                    println!(
                        "#{:<6} {}  [{}] {}",
                        alert.id,
                        alert.created_at.format("%Y-%m-%d"),
                        alert.kind,
                        alert.title
                    );
                    if !alert.description.is_empty() {
                        println!("        {}", alert.description);
                    }
                }
            }
        }
        AlertsCommand::Ack { person, ids } => {
            let acknowledged = store.acknowledge(&ids, &person)?;
            println!("Acknowledged {acknowledged} of {} alert(s).", ids.len());
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:   {}", config.database_path().display());
                println!("  Busy timeout:    {} ms", config.storage.busy_timeout_ms);
                println!();
                println!("[Expiry]");
                println!("  Urgent (days):   {}", config.expiry.urgent_days);
                println!("  Warning (days):  {}", config.expiry.warning_days);
                println!();
                println!("[Duty]");
                let ceilings = &config.duty.ceilings;
                let windows = &config.duty.windows;
                println!(
                    "  Daily:   {} h over {} day(s)",
                    ceilings.daily_hours, windows.daily_days
                );
                println!(
                    "  Weekly:  {} h over {} day(s)",
                    ceilings.weekly_hours, windows.weekly_days
                );
                println!(
                    "  Monthly: {} h over {} day(s)",
                    ceilings.monthly_hours, windows.monthly_days
                );
                println!();
                println!("[Scan]");
                println!("  Workers:         {}", config.scan.workers);
                println!("  Dedup:           {:?}", config.scan.dedup);
                println!("  Write mode:      {:?}", config.scan.write_mode);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
