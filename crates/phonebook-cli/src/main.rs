//! Phonebook CLI - offline-first contacts from the terminal
//!
//! Reads and writes go through the same sync engine as every other front
//! end; changes made while the backend is unreachable are queued locally.

mod cli;
mod commands;
mod config_profiles;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::avatar::run_avatar;
use crate::commands::common::AppContext;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::list::run_list;
use crate::commands::pending::run_pending;
use crate::commands::resend::run_resend;
use crate::commands::search::{run_search, run_sort};
use crate::commands::show::run_show;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "phonebook=warn".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let context = match cli.command {
        Commands::Config { command } => {
            return run_config(command, cli.profile.as_deref(), cli.store_path);
        }
        Commands::Completions { shell, output } => {
            return run_completions(shell, output.as_deref());
        }
        _ => AppContext::resolve(cli.profile.as_deref(), cli.store_path)?,
    };

    match cli.command {
        Commands::List {
            page,
            limit,
            all,
            json,
        } => run_list(&context, page, limit, all, json).await?,
        Commands::Search { term, json } => run_search(&context, term.as_deref(), json).await?,
        Commands::Sort { field, order, json } => {
            run_sort(&context, field.into(), order.into(), json).await?;
        }
        Commands::Add {
            name,
            phone,
            avatar,
        } => run_add(&context, &name, &phone, avatar.as_deref()).await?,
        Commands::Edit {
            id,
            name,
            phone,
            avatar,
            clear_photo,
        } => run_edit(&context, &id, name, phone, avatar.as_deref(), clear_photo).await?,
        Commands::Delete { id } => run_delete(&context, &id).await?,
        Commands::Avatar { id, file } => run_avatar(&context, &id, &file).await?,
        Commands::Resend { id } => run_resend(&context, &id).await?,
        Commands::Sync { json } => run_sync(&context, json).await?,
        Commands::Pending { json } => run_pending(&context, json).await?,
        Commands::Show { id, json } => run_show(&context, &id, json).await?,
        Commands::Config { .. } | Commands::Completions { .. } => {}
    }

    Ok(())
}
