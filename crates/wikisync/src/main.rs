use std::path::PathBuf;
use std::process;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use wikisync_core::catalog::{CatalogReport, build_catalog};
use wikisync_core::config::{CatalogConfig, ConfigError, SyncConfig};
use wikisync_core::error::PreconditionError;
use wikisync_core::export::{ExportReport, export_wiki};
use wikisync_core::import::{ImportOptions, ImportReport, import_tree};

#[derive(Debug, Parser)]
#[command(
    name = "wikisync",
    version,
    about = "Round-trip sync between an Azure DevOps wiki and a local knowledge tree"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "Path to wikisync.toml")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Emit the report as pretty JSON")]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Mirror the remote wiki hierarchy into a local directory")]
    Export(ExportArgs),
    #[command(about = "Upsert local knowledge folders as wiki pages")]
    Import(ImportArgs),
    #[command(about = "Aggregate an exported tree into a classified JSON catalog")]
    Catalog(CatalogArgs),
}

#[derive(Debug, Args)]
struct ExportArgs {
    #[arg(long, value_name = "PATH", help = "Override the export output directory")]
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ImportArgs {
    #[arg(long, value_name = "PATH", help = "Override the local knowledge root")]
    root: Option<PathBuf>,
    #[arg(
        long = "folder",
        value_name = "NAME",
        help = "Top-level folder to import (repeatable; defaults to the built-in allow list)"
    )]
    folders: Vec<String>,
    #[arg(long, help = "Plan every upsert without touching the remote wiki")]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct CatalogArgs {
    #[arg(long, value_name = "PATH", help = "Override the exported-tree input directory")]
    input_dir: Option<PathBuf>,
    #[arg(long, value_name = "PATH", help = "Override the catalog output file")]
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let result = match cli.command {
        Commands::Export(args) => run_export(cli.config.as_deref(), cli.json, args),
        Commands::Import(args) => run_import(cli.config.as_deref(), cli.json, args),
        Commands::Catalog(args) => run_catalog(cli.config.as_deref(), cli.json, args),
    };

    if let Err(error) = result {
        eprintln!("ERROR: {error:#}");
        process::exit(exit_code(&error));
    }
}

/// Configuration and precondition problems exit with 2, runtime failures
/// with 1.
fn exit_code(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<ConfigError>().is_some()
        || error.downcast_ref::<PreconditionError>().is_some()
    {
        2
    } else {
        1
    }
}

fn run_export(config_path: Option<&std::path::Path>, json: bool, args: ExportArgs) -> Result<()> {
    let mut config = SyncConfig::load(config_path)?;
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }

    let report = export_wiki(&config)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_export_report(&config, &report);
    }
    Ok(())
}

fn run_import(config_path: Option<&std::path::Path>, json: bool, args: ImportArgs) -> Result<()> {
    let mut config = SyncConfig::load(config_path)?;
    if let Some(root) = args.root {
        config.knowledge_root = root;
    }

    let mut options = ImportOptions::default();
    if !args.folders.is_empty() {
        options.folders = args.folders;
    }
    options.dry_run = args.dry_run;

    let report = import_tree(&config, &options)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_import_report(&config, &report);
    }
    ensure_import_succeeded(&report)
}

/// A run that recorded per-page conflicts or errors must not exit 0, even
/// though the report itself was printed.
fn ensure_import_succeeded(report: &ImportReport) -> Result<()> {
    if report.success {
        return Ok(());
    }
    bail!(
        "import finished with {} conflict(s) and {} error(s)",
        report.conflicts.len(),
        report.errors.len()
    );
}

fn run_catalog(config_path: Option<&std::path::Path>, json: bool, args: CatalogArgs) -> Result<()> {
    let mut config = CatalogConfig::load(config_path)?;
    if let Some(input_dir) = args.input_dir {
        config.input_dir = input_dir;
    }
    if let Some(output) = args.output {
        config.output_path = output;
    }

    let report = build_catalog(&config.input_dir, &config.output_path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_catalog_report(&config, &report);
    }
    Ok(())
}

fn print_export_report(config: &SyncConfig, report: &ExportReport) {
    println!("wiki export");
    println!("wiki: {}", report.wiki);
    println!("output_dir: {}", normalize_path(&config.output_dir));
    println!("requested_pages: {}", report.requested_pages);
    println!("exported: {}", report.exported);
    println!("created_dirs: {}", report.created_dirs);
    println!("skipped: {}", report.skipped);
    println!("request_count: {}", report.request_count);
    for page in &report.pages {
        match &page.detail {
            Some(detail) => println!("page.{}: {} ({detail})", page.action, page.path),
            None => println!("page.{}: {}", page.action, page.path),
        }
    }
}

fn print_import_report(config: &SyncConfig, report: &ImportReport) {
    println!("wiki import");
    println!("wiki: {}", report.wiki);
    println!("root: {}", normalize_path(&config.knowledge_root));
    println!("dry_run: {}", report.dry_run);
    println!("folders: {}", report.folders);
    println!("created: {}", report.created);
    println!("updated: {}", report.updated);
    println!("request_count: {}", report.request_count);
    for page in &report.pages {
        match &page.detail {
            Some(detail) => println!("page.{}: {} ({detail})", page.action, page.path),
            None => println!("page.{}: {}", page.action, page.path),
        }
    }
    if !report.conflicts.is_empty() {
        println!("conflicts:");
        for path in &report.conflicts {
            println!("  - {path}");
        }
    }
    if !report.errors.is_empty() {
        println!("errors:");
        for error in &report.errors {
            println!("  - {error}");
        }
    }
    println!("success: {}", report.success);
}

fn print_catalog_report(config: &CatalogConfig, report: &CatalogReport) {
    println!("knowledge catalog");
    println!("input_dir: {}", normalize_path(&config.input_dir));
    println!("output: {}", report.output_path);
    println!("items: {}", report.items);
    println!("category.Networking: {}", report.networking);
    println!("category.Security: {}", report.security);
    println!("category.DevOps: {}", report.devops);
}

fn normalize_path(path: &std::path::Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use wikisync_core::config::ConfigError;
    use wikisync_core::error::PreconditionError;
    use wikisync_core::import::ImportReport;

    use super::{ensure_import_succeeded, exit_code};

    fn report(conflicts: Vec<String>, errors: Vec<String>) -> ImportReport {
        ImportReport {
            success: conflicts.is_empty() && errors.is_empty(),
            dry_run: false,
            wiki: "ProjectWiki".to_string(),
            folders: 1,
            created: 0,
            updated: 0,
            conflicts,
            errors,
            pages: Vec::new(),
            request_count: 0,
        }
    }

    #[test]
    fn clean_import_report_passes_through() {
        assert!(ensure_import_succeeded(&report(Vec::new(), Vec::new())).is_ok());
    }

    #[test]
    fn conflicted_import_exits_nonzero() {
        let error = ensure_import_succeeded(&report(vec!["Networking/vpn".to_string()], Vec::new()))
            .expect_err("must fail");
        assert_eq!(exit_code(&error), 1);
        assert!(error.to_string().contains("1 conflict(s)"));
    }

    #[test]
    fn per_page_errors_exit_nonzero() {
        let error = ensure_import_succeeded(&report(
            Vec::new(),
            vec!["Networking/vpn: boom".to_string()],
        ))
        .expect_err("must fail");
        assert_eq!(exit_code(&error), 1);
    }

    #[test]
    fn config_and_precondition_errors_map_to_exit_2() {
        let config = anyhow::Error::new(ConfigError::Missing { name: "AZDO_PAT" });
        let precondition = anyhow::Error::new(PreconditionError::new("wiki not found"));
        let runtime = anyhow!("transport failure");
        assert_eq!(exit_code(&config), 2);
        assert_eq!(exit_code(&precondition), 2);
        assert_eq!(exit_code(&runtime), 1);
    }
}
