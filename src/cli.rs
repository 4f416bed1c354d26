// src/cli.rs
use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use std::{env, path::PathBuf};

use crate::infra::t;

pub mod commands {
    pub mod init;
    pub mod plan;
}

/// Pre-parses the command line arguments to find the language setting.
/// This allows i18n to be initialized before the full CLI is built.
/// It looks for a `--lang <VALUE>` argument.
fn pre_parse_language() -> String {
    let args: Vec<String> = env::args().collect();
    if let Some(pos) = args.iter().position(|arg| arg == "--lang") {
        if let Some(lang) = args.get(pos + 1) {
            return lang.clone();
        }
    }
    // Fallback to system language detection
    sys_locale::get_locale().unwrap_or_else(|| "en".to_string())
}

fn build_cli(locale: &str) -> Command {
    Command::new("matrix-harness")
        .version(env!("CARGO_PKG_VERSION"))
        .about(t!("cli.about", locale = locale).to_string())
        .arg(
            Arg::new("lang")
                .long("lang")
                .help(t!("cli.lang", locale = locale).to_string())
                .value_name("LANGUAGE")
                .global(true)
                .action(ArgAction::Set),
        )
        .subcommand(
            Command::new("plan")
                .about(t!("cli.plan_about", locale = locale).to_string())
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .help(t!("cli.arg_config", locale = locale).to_string())
                        .value_name("CONFIG")
                        .default_value(commands::init::DEFAULT_CONFIG_NAME)
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("filter")
                        .long("filter")
                        .help(t!("cli.arg_filter", locale = locale).to_string())
                        .value_name("FILTER")
                        .action(ArgAction::Set),
                ),
        )
        .subcommand(
            Command::new("init")
                .about(t!("cli.init_about", locale = locale).to_string())
                .arg(
                    Arg::new("path")
                        .long("path")
                        .help(t!("cli.arg_path", locale = locale).to_string())
                        .value_name("PATH")
                        .default_value(commands::init::DEFAULT_CONFIG_NAME)
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                ),
        )
}

pub async fn run() -> Result<()> {
    // Pre-parse language and initialize i18n first.
    let language = pre_parse_language();
    crate::set_language(&language);
    let language = rust_i18n::locale().to_string();

    let matches = build_cli(&language).get_matches();

    match matches.subcommand() {
        Some(("plan", plan_matches)) => {
            let config = plan_matches
                .get_one::<PathBuf>("config")
                .cloned()
                .unwrap_or_else(|| PathBuf::from(commands::init::DEFAULT_CONFIG_NAME));
            let filter = plan_matches.get_one::<String>("filter").cloned();
            // An explicit --lang wins over the file's language.
            let explicit = plan_matches.get_one::<String>("lang").map(|_| language.as_str());
            commands::plan::execute(&config, filter.as_deref(), explicit)?;
        }
        Some(("init", init_matches)) => {
            let path = init_matches
                .get_one::<PathBuf>("path")
                .cloned()
                .unwrap_or_else(|| PathBuf::from(commands::init::DEFAULT_CONFIG_NAME));
            commands::init::execute(&path, &language)?;
        }
        _ => {
            // No subcommand: print help like clap does for unknown input.
            build_cli(&language).print_help()?;
        }
    }
    Ok(())
}
