mod classifier;
mod cli;
mod commands;
mod error;
mod evaluator;
mod facts;
mod lookup;
mod role;
mod schema;
mod ui;
mod unit;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use schema::SiteConfig;
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    if let Command::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        generate(*shell, &mut cmd, "converge", &mut io::stdout());
        return Ok(());
    }

    let config = SiteConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Classify(args) => commands::classify::run(&ctx, &config, &args.node),
        Command::Compile(args) => commands::compile::run(
            &ctx,
            &config,
            args.node.as_deref(),
            args.all,
            args.unit.as_deref(),
            args.format,
        ),
        Command::Apply(args) => {
            commands::apply::run(&ctx, &config, &args.node, args.dry_run, args.yes)
        }
        Command::Lookup(args) => commands::lookup::run(&ctx, &config, &args.node, &args.key),
        Command::Validate => commands::validate::run(&ctx, &config),
        Command::Completions { .. } => unreachable!("handled above"),
    }
}
