// Copyright 2024-2026 lm-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! lm-runtime entry point.
//!
//! - `lm-runtime` or `lm-runtime serve` - run the HTTP server (default)
//! - `lm-runtime download ...` - fetch a model into the store
//! - `lm-runtime models list` - list stored models
//! - `lm-runtime config show` - print effective configuration

use std::process::ExitCode;

use clap::Parser;
use lm_runtime::cli::{self, Cli, Command, ConfigCommand, ModelsCommand, ServeArgs};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command.unwrap_or_else(|| Command::Serve(ServeArgs::default())) {
        Command::Serve(args) => match cli::serve::run(&args).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        },
        Command::Download(args) => exit_code(cli::download_cmd::run(&args).await),
        Command::Models(ModelsCommand::List { models_dir }) => {
            exit_code(cli::models_cmd::run_list(models_dir))
        }
        Command::Config(ConfigCommand::Show) => {
            cli::config_cmd::run_show();
            ExitCode::SUCCESS
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
