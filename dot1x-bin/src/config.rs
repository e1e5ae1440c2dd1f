use anyhow::{Context, Result};
use clap::Parser;
use dot1x_core::{Config, LogLevel};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(short, long, value_parser, default_value = "/etc/dot1x/dot1x.toml")]
    pub config_file: PathBuf,

    /// Where to write the test result and summary once the run ends.
    #[clap(short, long, value_parser)]
    pub result_file: Option<PathBuf>,
}

pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let config_contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: Config = toml::from_str(&config_contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Maximum tracing level for `config`; `debug = true` always means DEBUG.
pub fn tracing_level(config: &Config) -> Level {
    if config.debug {
        return Level::DEBUG;
    }
    match config.loglevel {
        LogLevel::Emerg | LogLevel::Alert | LogLevel::Crit | LogLevel::Err => Level::ERROR,
        LogLevel::Warning => Level::WARN,
        LogLevel::Notice | LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "interface = \"veth0\"\nradiussecret = \"testing123\"\nloglevel = \"warning\"").unwrap();

        let config = load_config_from_path(file.path()).unwrap();
        assert_eq!(config.interface, "veth0");
        assert_eq!(config.radiussecret, "testing123");
        assert_eq!(config.radiusport, 1812);
        assert_eq!(tracing_level(&config), Level::WARN);
    }

    #[test]
    fn test_missing_config_file() {
        let err = load_config_from_path(Path::new("/nonexistent/dot1x.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/dot1x.toml"));
    }

    #[test]
    fn test_debug_overrides_loglevel() {
        let config = Config {
            debug: true,
            loglevel: LogLevel::Err,
            ..Config::default()
        };
        assert_eq!(tracing_level(&config), Level::DEBUG);
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["dot1x-authenticator"]);
        assert_eq!(args.config_file, PathBuf::from("/etc/dot1x/dot1x.toml"));
        assert!(args.result_file.is_none());

        let args = Args::parse_from(["dot1x-authenticator", "-c", "/tmp/a.toml", "--result-file", "/tmp/r"]);
        assert_eq!(args.config_file, PathBuf::from("/tmp/a.toml"));
        assert_eq!(args.result_file, Some(PathBuf::from("/tmp/r")));
    }
}
