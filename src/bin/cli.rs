use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tabled::{settings::Style, Table};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sqldrift::error::{DatabaseError, SqlDriftError};
use sqldrift::{
    IntegrityChecker, Ledger, LedgerConfig, MigrationAction, MigrationRunner, MigrationSource,
    MigrationStatus, SourceLoader, SqliteDatabase, StatusTableRow,
};

#[derive(Parser)]
#[command(name = "sqldrift")]
#[command(about = "Checksum-tracked SQL migrations with safe re-application of changed migrations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to migrations directory
    #[arg(short, long, env = "SQLDRIFT_MIGRATIONS", default_value = "./migrations")]
    migrations: PathBuf,

    /// Path to the SQLite database file
    #[arg(short, long, env = "SQLDRIFT_DATABASE")]
    database: PathBuf,

    /// Name of the ledger table
    #[arg(long, env = "SQLDRIFT_TABLE", default_value = sqldrift::migration::DEFAULT_TABLE)]
    table: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the ledger table if it does not exist
    Init,

    /// Apply new migrations and re-apply changed ones
    Migrate {
        /// Show what would be applied without executing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the status of every migration version
    Status {
        /// Output format: table, yaml, json
        #[arg(short, long, default_value = "table")]
        output: OutputFormat,

        /// Show only pending migrations
        #[arg(long)]
        pending_only: bool,
    },

    /// Compare ledger checksums with current sources without applying anything
    Verify {
        /// Exit with an error when any drift is found
        #[arg(long)]
        strict: bool,

        /// Output format: table, yaml, json
        #[arg(short, long, default_value = "table")]
        output: OutputFormat,
    },

    /// Drop backup tables left behind by failed re-applies
    PruneBackups,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Yaml,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("sqldrift=debug,info")
    } else {
        EnvFilter::new("sqldrift=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(cli) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn print_error(err: &SqlDriftError) {
    if let Some(db_err) = err.database_error() {
        if !matches!(err, SqlDriftError::Database(_)) {
            eprintln!("{} {}", "✗ Error:".red(), err);
        }
        print_db_error(db_err);
        return;
    }

    eprintln!("{} {}", "✗ Error:".red(), err);
}

fn print_db_error(err: &DatabaseError) {
    eprintln!("\n{}", format!("✗ Database Error [{}]", err.error_code()).red());
    eprintln!("  {}", err);
    eprintln!("\n{}", "Suggestion:".yellow());
    for line in err.suggestion().lines() {
        eprintln!("  {}", line);
    }
    eprintln!();
}

fn run(cli: Cli) -> sqldrift::Result<()> {
    let config = LedgerConfig::new(cli.table.clone());
    config.validate()?;

    let db = SqliteDatabase::open(&cli.database)?;

    match cli.command {
        Commands::Init => {
            cmd_init(&db, &config)?;
        }

        Commands::Migrate { dry_run } => {
            let runner = MigrationRunner::from_dir(&db, &cli.migrations)?.with_config(config);
            cmd_migrate(&runner, dry_run)?;
        }

        Commands::Status { output, pending_only } => {
            let runner = MigrationRunner::from_dir(&db, &cli.migrations)?.with_config(config);
            cmd_status(&runner, output, pending_only)?;
        }

        Commands::Verify { strict, output } => {
            let sources = SourceLoader::new().load_dir(&cli.migrations)?;
            cmd_verify(&db, &sources, config, strict, output)?;
        }

        Commands::PruneBackups => {
            cmd_prune_backups(&db, &config)?;
        }
    }

    Ok(())
}

fn cmd_init(db: &SqliteDatabase, config: &LedgerConfig) -> sqldrift::Result<()> {
    info!("Initializing ledger table {}", config.table);
    let ledger = Ledger::new(db, config)?;
    ledger.ensure_schema()?;
    println!("{} Ledger table '{}' is ready", "✓".green(), config.table);
    Ok(())
}

fn cmd_migrate(runner: &MigrationRunner<'_>, dry_run: bool) -> sqldrift::Result<()> {
    if dry_run {
        info!("Dry run, nothing will be executed");
        let plan = runner.plan()?;
        let mut pending = 0;

        for step in &plan {
            let marker = match step.action {
                MigrationAction::Apply => "+".green(),
                MigrationAction::Reapply => "~".yellow(),
                MigrationAction::Skip => "=".dimmed(),
            };
            if step.action != MigrationAction::Skip {
                pending += 1;
            }
            println!("{} {} {:<8} {}", marker, step.version, step.action.as_str(), step.description);
        }

        println!("\n{} migration(s) would be applied", pending);
        return Ok(());
    }

    let applied = runner.run()?;
    if applied.is_empty() {
        println!("{} Database is up to date", "✓".green());
    } else {
        for version in &applied {
            println!("{} {}", "✓".green(), version);
        }
        println!("\nApplied {} migration(s)", applied.len());
    }
    Ok(())
}

fn cmd_status(
    runner: &MigrationRunner<'_>,
    output: OutputFormat,
    pending_only: bool,
) -> sqldrift::Result<()> {
    let mut report = runner.status()?;
    if pending_only {
        report.entries.retain(|e| e.status == MigrationStatus::Pending);
    }

    match output {
        OutputFormat::Table => {
            if report.entries.is_empty() {
                println!("No migrations found");
                return Ok(());
            }
            let rows: Vec<StatusTableRow> = report.entries.iter().map(StatusTableRow::from).collect();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{}", table);

            println!(
                "\n{} applied, {} pending, {} changed, {} missing",
                report.count(MigrationStatus::Applied),
                report.count(MigrationStatus::Pending),
                report.count(MigrationStatus::Changed),
                report.count(MigrationStatus::Missing),
            );
        }
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&report)?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}

fn cmd_verify(
    db: &SqliteDatabase,
    sources: &[MigrationSource],
    config: LedgerConfig,
    strict: bool,
    output: OutputFormat,
) -> sqldrift::Result<()> {
    let report = IntegrityChecker::new(db, sources).with_config(config).verify()?;

    match output {
        OutputFormat::Table => {
            if report.is_clean() {
                println!("{} All applied migrations match their sources", "✓".green());
            } else {
                for finding in &report.findings {
                    println!("{} {} {}", "⚠".yellow(), finding.version, finding.reason);
                }
            }
        }
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&report)?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if strict {
        report.into_result()?;
    }
    Ok(())
}

fn cmd_prune_backups(db: &SqliteDatabase, config: &LedgerConfig) -> sqldrift::Result<()> {
    let ledger = Ledger::new(db, config)?;
    let dropped = ledger.prune_backups()?;

    if dropped.is_empty() {
        println!("No backup tables found");
    } else {
        for name in &dropped {
            warn!("Dropped backup table {}", name);
            println!("{} dropped {}", "✓".green(), name);
        }
    }
    Ok(())
}
