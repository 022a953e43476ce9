use std::path::PathBuf;

use phonebook_core::config::{ClientConfig, Transport};
use serde::Serialize;

use crate::cli::{ConfigCommands, TransportArg};
use crate::commands::common::AppContext;
use crate::config_profiles::{default_config_path, normalize_text_option, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(
    command: ConfigCommands,
    global_profile: Option<&str>,
    global_store_path: Option<PathBuf>,
) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            api_url,
            transport,
            graphql_path,
            timeout,
            page_size,
            store,
            no_activate,
        } => {
            let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let options = ProfileInit {
                api_url,
                transport,
                graphql_path,
                timeout,
                page_size,
                store: store.or(global_store_path),
                no_activate,
            };
            let profile_name = init_profile(&mut config, global_profile, options)?;
            let path = config.save().map_err(CliError::Config)?;
            println!(
                "Profile '{}' initialized at {}",
                profile_name,
                path.display()
            );
            Ok(())
        }
        ConfigCommands::Show { json } => {
            let context = AppContext::resolve(global_profile, global_store_path)?;
            show_config(&context, json)
        }
    }
}

/// Values supplied to `config init`; unset fields keep the stored profile's values.
#[derive(Debug, Default)]
pub struct ProfileInit {
    pub api_url: Option<String>,
    pub transport: Option<TransportArg>,
    pub graphql_path: Option<String>,
    pub timeout: Option<u64>,
    pub page_size: Option<u32>,
    pub store: Option<PathBuf>,
    pub no_activate: bool,
}

/// Merge `options` into the resolved profile and validate the result.
pub fn init_profile(
    config: &mut CliProfilesConfig,
    profile_name: Option<&str>,
    options: ProfileInit,
) -> Result<String, CliError> {
    let profile_name = config.resolve_profile_name(profile_name);
    let profile = config.profile_mut_or_default(&profile_name);

    if let Some(url) = normalize_text_option(options.api_url) {
        profile.api_base_url = Some(url);
    }
    if let Some(transport) = options.transport {
        profile.transport = Some(transport.into());
    }
    if let Some(path) = normalize_text_option(options.graphql_path) {
        profile.graphql_path = Some(path);
    }
    if let Some(timeout) = options.timeout {
        profile.request_timeout_secs = Some(timeout);
    }
    if let Some(page_size) = options.page_size {
        profile.page_size = Some(page_size);
    }
    if let Some(store) = options.store {
        profile.store_path = Some(store.display().to_string());
    }

    let normalized = profile.client_config().normalized()?;
    profile.api_base_url = Some(normalized.api_base_url);

    if !options.no_activate {
        config.active_profile = Some(profile_name.clone());
    }
    Ok(profile_name)
}

#[derive(Debug, Serialize)]
struct ConfigOutput<'a> {
    profile: &'a str,
    config_path: Option<String>,
    store_path: String,
    #[serde(flatten)]
    client: &'a ClientConfig,
}

fn show_config(context: &AppContext, as_json: bool) -> Result<(), CliError> {
    let output = ConfigOutput {
        profile: &context.profile,
        config_path: default_config_path()
            .ok()
            .map(|path| path.display().to_string()),
        store_path: context.store_path.display().to_string(),
        client: &context.config,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Profile:     {}", output.profile);
    if let Some(path) = &output.config_path {
        println!("Config file: {path}");
    }
    println!("Store:       {}", output.store_path);
    println!("API:         {}", context.config.api_base_url);
    println!("Transport:   {}", context.config.transport);
    if context.config.transport == Transport::Graphql {
        println!("GraphQL:     {}", context.config.graphql_endpoint());
    }
    println!("Timeout:     {}s", context.config.request_timeout_secs);
    println!("Page size:   {}", context.config.page_size);
    Ok(())
}
