use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use error::ConfigError;
pub use settings::{QuerySettings, Settings, SslMode};

/// Prefix of the environment variables that override file values,
/// e.g. `PG_QUERY__PASSWORD`.
pub const ENV_PREFIX: &str = "PG_QUERY";

/// Loads and validates the input configuration from a TOML file.
///
/// Values from the environment (`PG_QUERY__<KEY>`) take precedence over the
/// file, which keeps secrets such as the password out of it. Any error
/// returned here is fatal: the input must not start.
pub fn load_config(path: &Path) -> Result<Settings, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path).required(true))
        .add_source(environment(None));

    build(builder)
}

/// The `PG_QUERY__<KEY>` overlay, read from the process environment unless
/// `vars` is given.
///
/// Values stay strings until deserialization, so a password such as `0123`
/// is passed through untouched while numeric fields still parse.
fn environment(vars: Option<config::Map<String, String>>) -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX).separator("__").source(vars)
}

/// Loads and validates the input configuration from an in-memory TOML document.
pub fn load_config_from_str(toml: &str) -> Result<Settings, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from_str(toml, config::FileFormat::Toml));

    build(builder)
}

fn build(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<Settings, ConfigError> {
    // Attempt to deserialize the entire configuration into our `Settings` struct
    let settings = builder.build()?.try_deserialize::<Settings>()?;
    settings.validate()?;

    tracing::debug!(
        tag = %settings.tag,
        queries = settings.queries.len(),
        "Configuration loaded."
    );
    Ok(settings)
}
