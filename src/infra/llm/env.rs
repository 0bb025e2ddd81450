use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::domain::GenerationError;

pub(crate) const ENV_GLOBAL_TIMEOUT_SECS: &str = "TABULA_LLM_TIMEOUT_SECS";
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub(crate) fn read_env_var(name: &str) -> Result<Option<String>, GenerationError> {
    match std::env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(error) => Err(GenerationError::configuration(format!(
            "{name} could not be read: {error}"
        ))),
    }
}

pub(crate) fn parse_timeout_seconds(name: &str, value: &str) -> Result<Duration, GenerationError> {
    let parsed = value.trim().parse::<u64>().map_err(|_| {
        GenerationError::configuration(format!("{name} must be a positive integer in seconds"))
    })?;
    seconds_to_timeout(name, parsed)
}

fn seconds_to_timeout(name: &str, seconds: u64) -> Result<Duration, GenerationError> {
    if seconds == 0 {
        return Err(GenerationError::configuration(format!(
            "{name} must be greater than 0 seconds"
        )));
    }
    Ok(Duration::from_secs(seconds))
}

pub(crate) fn read_timeout_from_env<E>(
    name: &str,
    env: &E,
) -> Result<Option<Duration>, GenerationError>
where
    E: Fn(&str) -> Result<Option<String>, GenerationError>,
{
    let Some(value) = env(name)? else {
        return Ok(None);
    };
    Ok(Some(parse_timeout_seconds(name, &value)?))
}

/// Configured seconds win, then the backend variable, then the global one.
pub(crate) fn resolve_timeout<E>(
    configured_secs: Option<u64>,
    backend_env: &str,
    env: &E,
) -> Result<Duration, GenerationError>
where
    E: Fn(&str) -> Result<Option<String>, GenerationError>,
{
    if let Some(seconds) = configured_secs {
        return seconds_to_timeout("timeout_secs", seconds);
    }

    if let Some(timeout) = read_timeout_from_env(backend_env, env)? {
        return Ok(timeout);
    }

    Ok(read_timeout_from_env(ENV_GLOBAL_TIMEOUT_SECS, env)?.unwrap_or(DEFAULT_TIMEOUT))
}

/// Explicit credential first, then the first non-blank variable in `env_names`.
pub(crate) fn resolve_credential<E>(
    explicit: Option<SecretString>,
    env_names: &[&str],
    label: &str,
    env: &E,
) -> Result<SecretString, GenerationError>
where
    E: Fn(&str) -> Result<Option<String>, GenerationError>,
{
    if let Some(secret) = explicit {
        if secret.expose_secret().trim().is_empty() {
            return Err(GenerationError::configuration(format!(
                "{label} must not be empty"
            )));
        }
        return Ok(secret);
    }

    for name in env_names.iter().copied() {
        if let Some(value) = env(name)?
            && !value.trim().is_empty()
        {
            return Ok(SecretString::from(value.trim().to_string()));
        }
    }

    Err(GenerationError::configuration(format!(
        "{label} is missing (set {})",
        env_names.join(" or ")
    )))
}

pub(crate) fn resolve_base_url<E>(
    configured: Option<String>,
    backend_env: &str,
    default_url: &str,
    env: &E,
) -> Result<String, GenerationError>
where
    E: Fn(&str) -> Result<Option<String>, GenerationError>,
{
    let base_url = match configured {
        Some(url) => url,
        None => env(backend_env)?.unwrap_or_else(|| default_url.to_string()),
    };
    let base_url = base_url.trim();
    if base_url.is_empty() {
        return Err(GenerationError::configuration("base URL must not be empty"));
    }
    reqwest::Url::parse(base_url).map_err(|err| {
        GenerationError::configuration(format!("base URL '{base_url}' is invalid: {err}"))
    })?;
    Ok(base_url.trim_end_matches('/').to_string())
}

pub(crate) fn resolve_model(
    configured: Option<String>,
    default_model: &str,
) -> Result<String, GenerationError> {
    let model = configured.unwrap_or_else(|| default_model.to_string());
    let model = model.trim();
    if model.is_empty() {
        return Err(GenerationError::configuration("model must not be empty"));
    }
    Ok(model.to_string())
}

#[cfg(test)]
pub(crate) fn env_from<'a>(
    pairs: &'a [(&'a str, &'a str)],
) -> impl Fn(&str) -> Result<Option<String>, GenerationError> + 'a {
    move |name| {
        Ok(pairs
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| (*value).to_string()))
    }
}
