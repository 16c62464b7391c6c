use anyhow::{anyhow, Context, Result};
use clap::Parser;

mod backup;
mod cli;
mod config;
mod convert;
mod fixtures;
mod logging;
mod pipeline;
mod shopify;
mod util;

use cli::{Command, ConvertArgs, GlobalArgs, PurgeArgs, RootArgs, ScanArgs, SeedArgs};
use config::{load_config, Config};
use convert::CommandConverter;
use pipeline::{ConversionReport, ConvertOptions, ScanReport};
use shopify::AdminClient;

fn main() -> Result<()> {
    let RootArgs { global, command } = RootArgs::parse();
    logging::init_logging(global.quiet, global.verbose);

    match command {
        Command::Convert(args) => cmd_convert(&global, args),
        Command::Scan(args) => cmd_scan(&global, args),
        Command::Seed(args) => cmd_seed(&global, args),
        Command::Purge(args) => cmd_purge(&global, args),
    }
}

fn load(global: &GlobalArgs) -> Result<(Config, AdminClient)> {
    let config = load_config(global.config.as_deref())?;
    let store = config.store(global.sandbox)?;
    tracing::debug!(store = %store.store, sandbox = store.sandbox, "selected store");
    let client = AdminClient::new(&store);
    Ok((config, client))
}

fn cmd_convert(global: &GlobalArgs, args: ConvertArgs) -> Result<()> {
    let (config, client) = load(global)?;
    let converter = CommandConverter::from_template(&config.converter)?;
    let program = converter.preflight()?;
    tracing::debug!(converter = %program.display(), "resolved converter");

    let options = ConvertOptions {
        backup_root: args.backup_dir.unwrap_or(config.backup_dir),
        products: args.products,
        dry_run: args.dry_run,
    };
    let report = pipeline::convert_all_products(&client, &converter, &options)?;

    if args.json {
        let text = serde_json::to_string_pretty(&report).context("serialize report")?;
        println!("{text}");
    } else if !global.quiet {
        print_conversion_summary(&report, &options);
    }
    Ok(())
}

fn cmd_scan(global: &GlobalArgs, args: ScanArgs) -> Result<()> {
    let (_, client) = load(global)?;
    let report = pipeline::scan_products(&client)?;

    if args.json {
        let text = serde_json::to_string_pretty(&report).context("serialize report")?;
        println!("{text}");
    } else if !global.quiet {
        print_scan(&report);
    }
    Ok(())
}

fn cmd_seed(global: &GlobalArgs, args: SeedArgs) -> Result<()> {
    fixtures::require_sandbox(global.sandbox, "seed")?;
    let (config, client) = load(global)?;
    let converter = CommandConverter::from_template(&config.converter)?;
    converter.preflight()?;

    let images = fixtures::MagickFixtureImages::new(converter.program());
    let ids = fixtures::seed_products(&client, &images, args.count)?;
    if !global.quiet {
        println!("Created {} fixture products.", ids.len());
        for id in ids {
            println!("  {id}");
        }
    }
    Ok(())
}

fn cmd_purge(global: &GlobalArgs, args: PurgeArgs) -> Result<()> {
    fixtures::require_sandbox(global.sandbox, "purge")?;
    if !args.yes {
        return Err(anyhow!("purge deletes every product; pass --yes to confirm"));
    }
    let (_, client) = load(global)?;
    let removed = fixtures::purge_products(&client)?;
    if !global.quiet {
        println!("Deleted {removed} products.");
    }
    Ok(())
}

fn print_conversion_summary(report: &ConversionReport, options: &ConvertOptions) {
    let verb = if report.dry_run {
        "Converted (dry run)"
    } else {
        "Converted"
    };
    println!(
        "{verb} {} of {} images across {} products ({} skipped).",
        report.converted, report.images, report.products, report.skipped
    );
    for item in &report.items {
        let replacement = item
            .replacement_image_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  product {} image {} -> {} at position {} (backup {})",
            item.product_id,
            item.original_image_id,
            replacement,
            item.position,
            util::display_path(&item.backup_path, Some(&options.backup_root))
        );
    }
}

fn print_scan(report: &ScanReport) {
    println!(
        "{} products, {} images, {} PNG.",
        report.products,
        report.images.len(),
        report.png_count()
    );
    for image in &report.images {
        let kind = if image.is_png {
            "PNG"
        } else {
            image.content_type.as_deref().unwrap_or("unknown")
        };
        println!(
            "  {}\t{}\t{}\t{}\t{}",
            image.product_id, image.image_id, image.position, kind, image.src
        );
    }
}
