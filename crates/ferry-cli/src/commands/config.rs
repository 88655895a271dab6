use ferry_core::transport::HttpTransportConfig;
use ferry_core::{ConflictMode, ResolutionStrategy};

use crate::cli::{ConfigCommands, ConflictModeArg, StrategyArg};
use crate::config_profiles::{is_http_url, normalize_text_option, CliProfile, CliProfilesConfig};
use crate::credentials::{clear_auth_token, load_auth_token, store_auth_token};
use crate::error::CliError;

/// Settings passed to `ferry config init`
#[derive(Debug, Default)]
pub struct ProfileInit {
    pub endpoint: Option<String>,
    pub auth_token: Option<String>,
    pub timeout_secs: Option<u64>,
    pub batch_size: Option<usize>,
    pub max_retries: Option<u32>,
    pub strategy: Option<StrategyArg>,
    pub conflict_mode: Option<ConflictModeArg>,
}

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            endpoint,
            auth_token,
            timeout_secs,
            batch_size,
            max_retries,
            strategy,
            conflict_mode,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            ProfileInit {
                endpoint,
                auth_token,
                timeout_secs,
                batch_size,
                max_retries,
                strategy,
                conflict_mode,
            },
            no_activate,
        ),
        ConfigCommands::Show { profile } => run_config_show(profile.as_deref().or(global_profile)),
        ConfigCommands::ClearToken { profile } => {
            let config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            clear_auth_token(&profile_name)?;
            println!("Auth token removed for profile '{profile_name}'");
            Ok(())
        }
    }
}

pub fn run_config_init(
    profile_name: Option<&str>,
    init: ProfileInit,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);

    let profile = config.profile_mut_or_default(&profile_name);
    apply_profile_init(profile, &init)?;

    if let Some(token) = normalize_text_option(init.auth_token) {
        store_auth_token(&profile_name, &token)?;
    }

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let ready = config
        .profile(&profile_name)
        .and_then(CliProfile::resolved_endpoint)
        .is_some();
    if ready {
        println!("Profile '{profile_name}' is ready. Run `ferry sync` to push pending changes.");
    } else {
        println!("Profile '{profile_name}' is missing: endpoint");
    }
    Ok(())
}

/// Merge explicit settings into `profile`, validating the result
pub fn apply_profile_init(profile: &mut CliProfile, init: &ProfileInit) -> Result<(), CliError> {
    if let Some(endpoint) = normalize_text_option(init.endpoint.clone()) {
        profile.endpoint = Some(normalize_endpoint(endpoint)?);
    }
    if let Some(timeout_secs) = init.timeout_secs {
        if timeout_secs == 0 {
            return Err(CliError::Config(
                "timeout_secs must be at least 1".to_string(),
            ));
        }
        profile.timeout_secs = Some(timeout_secs);
    }

    let mut engine = profile.engine.clone();
    if let Some(batch_size) = init.batch_size {
        engine = engine.with_batch_size(batch_size);
    }
    if let Some(max_retries) = init.max_retries {
        engine = engine.with_max_retries(max_retries);
    }
    if let Some(strategy) = init.strategy {
        engine = engine.with_strategy(ResolutionStrategy::from(strategy));
    }
    if let Some(conflict_mode) = init.conflict_mode {
        engine = engine.with_conflict_mode(ConflictMode::from(conflict_mode));
    }
    profile.engine = engine
        .validate()
        .map_err(|error| CliError::Config(error.to_string()))?;
    Ok(())
}

pub fn normalize_endpoint(url: String) -> Result<String, CliError> {
    let normalized = normalize_text_option(Some(url))
        .ok_or_else(|| CliError::Config("endpoint must not be empty".to_string()))?;
    if !is_http_url(&normalized) {
        return Err(CliError::Config(
            "endpoint must include http:// or https://".to_string(),
        ));
    }
    Ok(normalized.trim_end_matches('/').to_string())
}

fn run_config_show(profile_name: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let profile = config.profile(&profile_name).cloned().unwrap_or_default();

    let token = if profile.resolved_endpoint().is_some() {
        load_auth_token(&profile_name)?
    } else {
        None
    };
    let transport: Option<HttpTransportConfig> = profile.transport_config(token);

    println!("Profile: {profile_name}");
    match &transport {
        Some(transport) => println!("Transport: {transport:?}"),
        None => println!("Transport: not configured"),
    }
    println!("{}", serde_json::to_string_pretty(&profile.engine)?);
    Ok(())
}
