//! CLI argument parsing for the conversion workflow.
//!
//! The CLI stays thin: it selects a store, a backup root and a converter and
//! hands them to the pipeline, so the same core logic can be driven by tests.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "shopify-img-convert",
    version,
    about = "Re-encode PNG product images in a Shopify store as JPEG",
    after_help = "Commands:\n  convert   Convert every PNG product image to JPEG (originals backed up locally)\n  scan      List product images and whether they are PNG\n  seed      Create random fixture products on the sandbox store\n  purge     Delete every product on the sandbox store\n\nExamples:\n  shopify-img-convert scan\n  shopify-img-convert convert --backup-dir ./backups\n  shopify-img-convert convert --product 7694337025 --dry-run\n  shopify-img-convert --sandbox seed --count 3\n  shopify-img-convert --sandbox purge --yes",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to the JSON config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Use the `test` store section instead of `auth`
    #[arg(long, global = true)]
    pub sandbox: bool,

    /// Only log warnings and errors; text summaries are suppressed
    #[arg(long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log request-level detail
    #[arg(long, global = true)]
    pub verbose: bool,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Convert(ConvertArgs),
    Scan(ScanArgs),
    Seed(SeedArgs),
    Purge(PurgeArgs),
}

/// Convert command inputs.
#[derive(Parser, Debug)]
#[command(about = "Convert PNG product images to JPEG")]
pub struct ConvertArgs {
    /// Directory receiving per-product backups (overrides config `backup_dir`)
    #[arg(long, value_name = "DIR")]
    pub backup_dir: Option<PathBuf>,

    /// Only convert these product ids (repeatable)
    #[arg(long = "product", value_name = "ID")]
    pub products: Vec<u64>,

    /// Download, back up and convert, but leave the store untouched
    #[arg(long)]
    pub dry_run: bool,

    /// Emit the conversion report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Scan command inputs.
#[derive(Parser, Debug)]
#[command(about = "List product images and whether they are PNG")]
pub struct ScanArgs {
    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

/// Seed command inputs.
#[derive(Parser, Debug)]
#[command(about = "Create random fixture products on the sandbox store")]
pub struct SeedArgs {
    /// Number of products to create
    #[arg(long, default_value_t = 2)]
    pub count: usize,
}

/// Purge command inputs.
#[derive(Parser, Debug)]
#[command(about = "Delete every product on the sandbox store")]
pub struct PurgeArgs {
    /// Confirm deletion of every product
    #[arg(long)]
    pub yes: bool,
}
