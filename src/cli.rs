use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use crate::types::{DEFAULT_REGION, ScanConfig};

const BUILD_INFO_HUMAN: &str = env!("BUILD_INFO_HUMAN");

#[derive(Parser, Debug)]
#[command(
    name = "needs-approval",
    about = "List open CodeCommit pull requests waiting on your approval (or, with --mine, the ones you opened)"
)]
#[command(version, long_version = BUILD_INFO_HUMAN)]
struct CliArgs {
    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// AWS region to query and to link to
    #[arg(long, default_value = DEFAULT_REGION, value_name = "REGION")]
    pub region: String,

    /// List open PRs created by me
    #[arg(long)]
    pub mine: bool,

    /// AWS shared-config profile to load credentials from
    #[arg(long, value_name = "NAME")]
    pub profile: Option<String>,

    /// Give up on the whole scan after this long (e.g. 90s, 10m, 1h; unitless implies minutes)
    #[arg(long, default_value = "10m", value_name = "DURATION")]
    pub timeout: String,
}

fn parse_timeout(value: &str) -> Result<Duration> {
    let value = value.trim();

    let (number, unit_secs) = if let Some(secs) = value.strip_suffix('s') {
        (secs, 1)
    } else if let Some(mins) = value.strip_suffix('m') {
        (mins, 60)
    } else if let Some(hours) = value.strip_suffix('h') {
        (hours, 3600)
    } else {
        (value, 60)
    };

    let count: u64 = number.parse().with_context(|| {
        format!(
            "Invalid timeout '{}'. Supported formats: unitless number (minutes), '30s', '5m', '2h'",
            value
        )
    })?;

    if count == 0 {
        anyhow::bail!("Timeout must be greater than zero, got '{}'", value);
    }

    count
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .with_context(|| format!("Timeout '{}' is too large", value))
}

fn build_config(cli: CliArgs) -> Result<ScanConfig> {
    let region = cli.region.trim().to_string();
    if region.is_empty() {
        anyhow::bail!("--region must not be empty");
    }

    Ok(ScanConfig {
        region,
        return_mine: cli.mine,
        debug: cli.debug,
        profile: cli.profile.filter(|p| !p.trim().is_empty()),
        timeout: parse_timeout(&cli.timeout)?,
    })
}

/// Parses command-line arguments into a scan configuration.
///
/// Help and version requests surface as a `clap::Error` inside the returned
/// error so the caller can print them and exit successfully.
pub fn parse_args<I, T>(args: I) -> Result<ScanConfig>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = CliArgs::try_parse_from(args)?;
    build_config(cli)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_TIMEOUT;

    #[test]
    fn test_defaults() {
        let config = parse_args(["needs-approval"]).unwrap();

        assert_eq!(config, ScanConfig::default());
        assert_eq!(config.region, "us-east-2");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_all_flags() {
        let config = parse_args([
            "needs-approval",
            "--debug",
            "--mine",
            "--region",
            "eu-west-1",
            "--profile",
            "work",
            "--timeout",
            "90s",
        ])
        .unwrap();

        assert!(config.debug);
        assert!(config.return_mine);
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.profile.as_deref(), Some("work"));
        assert_eq!(config.timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_timeout_formats() {
        assert_eq!(parse_timeout("5").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_timeout("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_timeout("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_timeout("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_timeout(" 10m ").unwrap(), Duration::from_secs(600));
    }

    #[test]
    fn test_timeout_rejects_bad_values() {
        assert!(parse_timeout("0").is_err());
        assert!(parse_timeout("abc").is_err());
        assert!(parse_timeout("5d").is_err());
        assert!(parse_timeout("").is_err());
        assert!(
            parse_args(["needs-approval", "--timeout", "soon"])
                .unwrap_err()
                .to_string()
                .contains("Invalid timeout")
        );
    }

    #[test]
    fn test_empty_region_rejected() {
        let err = parse_args(["needs-approval", "--region", " "]).unwrap_err();
        assert!(err.to_string().contains("--region"));
    }

    #[test]
    fn test_help_is_a_clap_error() {
        let err = parse_args(["needs-approval", "--help"]).unwrap_err();
        let clap_err = err.downcast_ref::<clap::Error>().unwrap();
        assert_eq!(clap_err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(parse_args(["needs-approval", "--approve"]).is_err());
    }
}
