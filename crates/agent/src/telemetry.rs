use anyhow::{anyhow, Result};
use arthur_core::config::{AppConfig, LogFormat};
use tracing::Level;

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &AppConfig) -> Result<()> {
    let builder =
        tracing_subscriber::fmt().with_target(false).with_max_level(parse_level(&config.logging.level));

    let installed = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    installed.map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

fn parse_level(level: &str) -> Level {
    level.trim().parse::<Level>().unwrap_or(Level::INFO)
}

#[cfg(test)]
mod tests {
    use arthur_core::config::{AppConfig, LogFormat};
    use tracing::Level;

    use super::{init_logging, parse_level};

    #[test]
    fn level_parsing_tolerates_padding_and_case() {
        assert_eq!(parse_level(" debug "), Level::DEBUG);
        assert_eq!(parse_level("WARN"), Level::WARN);
        assert_eq!(parse_level("verbose"), Level::INFO);
    }

    #[test]
    fn second_install_is_rejected() {
        let mut config = AppConfig::default();
        config.logging.format = LogFormat::Json;
        let _ = init_logging(&config);

        let error = init_logging(&config).expect_err("global subscriber is already set");

        assert!(error.to_string().contains("tracing subscriber"));
    }
}
