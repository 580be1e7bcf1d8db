use std::path::PathBuf;
use std::time::Duration;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use coverset_lib::settings::{
    load_settings_from, load_settings_string, save_output_dir, settings_path,
};
use coverset_scraper::{CredentialSource, Credentials, credential_sources};

use crate::commands::crawl::{connect_spotify, print_credentials_hint};
use crate::error::CliError;

fn mask_value(s: &str) -> String {
    if s.chars().count() <= 2 {
        "****".to_string()
    } else {
        format!("{}****", s.chars().take(2).collect::<String>())
    }
}

/// Show the settings file, its effective values, and where each credential
/// comes from.
pub(crate) fn run_config_show() -> Result<(), CliError> {
    let path = settings_path();

    log::info!(
        "{}",
        "coverset configuration".if_supports_color(Stdout, |t| t.bold()),
    );
    log::info!("");

    if path.exists() {
        log::info!(
            "  Settings file: {} {}",
            path.display().if_supports_color(Stdout, |t| t.cyan()),
            "(exists)".if_supports_color(Stdout, |t| t.green()),
        );
    } else {
        log::info!(
            "  Settings file: {} {}",
            path.display().if_supports_color(Stdout, |t| t.cyan()),
            "(not found)".if_supports_color(Stdout, |t| t.dimmed()),
        );
    }
    log::info!("");

    // Resolved per field; Credentials::load_from fails if either is missing
    let sources = credential_sources(&path);
    let creds = Credentials::load_from(&path).ok();

    let fields = [
        (
            "client_id",
            &sources.client_id,
            creds.as_ref().map(|c| c.client_id.clone()),
        ),
        (
            "client_secret",
            &sources.client_secret,
            creds.as_ref().map(|c| mask_value(&c.client_secret)),
        ),
    ];

    for (name, source, value) in fields {
        let source_str = format!("({})", source);
        let value = match source {
            CredentialSource::Missing => None,
            _ => value,
        };
        match value {
            Some(v) => log::info!(
                "  {} {} {}",
                format!("{}:", name).if_supports_color(Stdout, |t| t.cyan()),
                v,
                source_str.if_supports_color(Stdout, |t| t.dimmed()),
            ),
            None => log::info!(
                "  {} {} {}",
                format!("{}:", name).if_supports_color(Stdout, |t| t.cyan()),
                "not set".if_supports_color(Stdout, |t| t.yellow()),
                source_str.if_supports_color(Stdout, |t| t.dimmed()),
            ),
        }
    }
    log::info!("");

    let settings = load_settings_from(&path)?;
    log::info!(
        "  {} {}",
        "output_dir:".if_supports_color(Stdout, |t| t.cyan()),
        settings.resolve_output_dir(None).display(),
    );

    if let Some(contents) = load_settings_string(&path) {
        log::info!("");
        for line in contents.lines() {
            log::info!("  {}", line.if_supports_color(Stdout, |t| t.dimmed()));
        }
    }
    Ok(())
}

/// Request an access token with the configured credentials.
pub(crate) fn run_config_test(quiet: bool) -> Result<(), CliError> {
    let creds = match Credentials::load() {
        Ok(c) => c,
        Err(e) => {
            log::warn!(
                "{} Failed to load credentials: {}",
                "\u{2718}".if_supports_color(Stdout, |t| t.red()),
                e,
            );
            print_credentials_hint();
            return Err(CliError::config("no Spotify credentials configured"));
        }
    };
    let settings = load_settings_from(&settings_path())?;
    let timeout = Duration::from_secs(settings.request_timeout_secs);

    let rt = tokio::runtime::Runtime::new().map_err(|e| CliError::runtime(e.to_string()))?;
    rt.block_on(async {
        connect_spotify(creds, timeout, quiet).await?;
        log::info!(
            "{} Credentials are valid!",
            "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        );
        Ok::<(), CliError>(())
    })
}

/// Print the settings file path.
pub(crate) fn run_config_path() -> Result<(), CliError> {
    log::info!("{}", settings_path().display());
    Ok(())
}

/// Set or clear `crawl.output_dir` in the settings file.
pub(crate) fn run_config_set_output(dir: Option<PathBuf>) -> Result<(), CliError> {
    let path = settings_path();
    save_output_dir(&path, dir.as_deref())?;
    match dir {
        Some(d) => log::info!(
            "{} Default output directory set to {}",
            "\u{2714}".if_supports_color(Stdout, |t| t.green()),
            d.display().if_supports_color(Stdout, |t| t.cyan()),
        ),
        None => log::info!(
            "{} Default output directory cleared",
            "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        ),
    }
    Ok(())
}
