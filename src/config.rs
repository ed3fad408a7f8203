use anyhow::{Context, Result, bail};
use clap::Parser;
use secrecy::SecretString;
use std::{env, str::FromStr, time::Duration};

use crate::{models::storage_event::DEFAULT_WATCH_PREFIX, services::ocr_client::PollPolicy};

const DEFAULT_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    /// Object names under this prefix are sent for analysis.
    pub watch_prefix: String,
    pub ocr: OcrSettings,
}

/// Connection details of the read (OCR) service. Never compiled in.
#[derive(Debug)]
pub struct OcrSettings {
    /// Full URL of the analyze endpoint that accepts image uploads.
    pub endpoint: String,
    pub api_key: SecretString,
    /// Header carrying the API key.
    pub key_header: String,
    pub poll: PollPolicy,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Certificate image OCR analysis service")]
pub struct Args {
    /// Host to bind to (overrides CERT_ANALYZER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides CERT_ANALYZER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where objects are stored (overrides CERT_ANALYZER_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides CERT_ANALYZER_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Object name prefix to analyse (overrides CERT_ANALYZER_WATCH_PREFIX)
    #[arg(long)]
    pub watch_prefix: Option<String>,

    /// OCR analyze endpoint URL (overrides CERT_ANALYZER_OCR_ENDPOINT)
    #[arg(long)]
    pub ocr_endpoint: Option<String>,

    /// Apply the database schema and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::resolve(args, |name| env::var(name).ok(), migrate)?;
        Ok((cfg, migrate))
    }

    /// Merge CLI args over values looked up through `lookup` over defaults.
    ///
    /// OCR endpoint and key are only required when the server will run
    /// (`migrate_only == false`).
    pub fn resolve(
        args: Args,
        lookup: impl Fn(&str) -> Option<String>,
        migrate_only: bool,
    ) -> Result<Self> {
        let host = args
            .host
            .or_else(|| lookup("CERT_ANALYZER_HOST"))
            .unwrap_or_else(|| "0.0.0.0".into());
        let port = match args.port {
            Some(port) => port,
            None => parse_var(&lookup, "CERT_ANALYZER_PORT")?.unwrap_or(3000),
        };
        let storage_dir = args
            .storage_dir
            .or_else(|| lookup("CERT_ANALYZER_STORAGE_DIR"))
            .unwrap_or_else(|| "./data/objects".into());
        let database_url = args
            .database_url
            .or_else(|| lookup("CERT_ANALYZER_DATABASE_URL"))
            .unwrap_or_else(|| "sqlite://./data/meta/certificate_analyzer.db".into());
        let watch_prefix = args
            .watch_prefix
            .or_else(|| lookup("CERT_ANALYZER_WATCH_PREFIX"))
            .unwrap_or_else(|| DEFAULT_WATCH_PREFIX.into());

        let endpoint = args
            .ocr_endpoint
            .or_else(|| lookup("CERT_ANALYZER_OCR_ENDPOINT"))
            .unwrap_or_default();
        let api_key = lookup("CERT_ANALYZER_OCR_API_KEY").unwrap_or_default();
        if !migrate_only {
            if endpoint.is_empty() {
                bail!("CERT_ANALYZER_OCR_ENDPOINT (or --ocr-endpoint) must be set");
            }
            if api_key.is_empty() {
                bail!("CERT_ANALYZER_OCR_API_KEY must be set");
            }
        }

        let key_header = lookup("CERT_ANALYZER_OCR_KEY_HEADER")
            .unwrap_or_else(|| DEFAULT_KEY_HEADER.into());

        let defaults = PollPolicy::default();
        let max_attempts = parse_var(&lookup, "CERT_ANALYZER_OCR_POLL_ATTEMPTS")?
            .unwrap_or(defaults.max_attempts);
        if max_attempts == 0 {
            bail!("CERT_ANALYZER_OCR_POLL_ATTEMPTS must be at least 1");
        }
        let interval = parse_var::<u64>(&lookup, "CERT_ANALYZER_OCR_POLL_INTERVAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.interval);

        Ok(Self {
            host,
            port,
            storage_dir,
            database_url,
            watch_prefix,
            ocr: OcrSettings {
                endpoint,
                api_key: SecretString::from(api_key),
                key_header,
                poll: PollPolicy {
                    max_attempts,
                    interval,
                },
            },
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|value| {
            value
                .parse::<T>()
                .with_context(|| format!("parsing {} value `{}`", name, value))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    const OCR_VARS: [(&str, &str); 2] = [
        ("CERT_ANALYZER_OCR_ENDPOINT", "https://ocr.example/vision/v3.2/read/analyze"),
        ("CERT_ANALYZER_OCR_API_KEY", "k-123"),
    ];

    #[test]
    fn defaults_apply_when_only_ocr_is_configured() {
        let cfg = AppConfig::resolve(Args::default(), lookup(&OCR_VARS), false).unwrap();

        assert_eq!(cfg.addr(), "0.0.0.0:3000");
        assert_eq!(cfg.watch_prefix, "certificates/");
        assert_eq!(cfg.ocr.key_header, "Ocp-Apim-Subscription-Key");
        assert_eq!(cfg.ocr.api_key.expose_secret(), "k-123");
        assert_eq!(cfg.ocr.poll, PollPolicy::default());
    }

    #[test]
    fn cli_overrides_environment() {
        let mut vars = OCR_VARS.to_vec();
        vars.push(("CERT_ANALYZER_PORT", "8080"));
        vars.push(("CERT_ANALYZER_HOST", "127.0.0.1"));
        let args = Args {
            port: Some(9090),
            ocr_endpoint: Some("https://cli.example/analyze".into()),
            ..Args::default()
        };

        let cfg = AppConfig::resolve(args, lookup(&vars), false).unwrap();
        assert_eq!(cfg.addr(), "127.0.0.1:9090");
        assert_eq!(cfg.ocr.endpoint, "https://cli.example/analyze");
    }

    #[test]
    fn poll_policy_from_environment() {
        let mut vars = OCR_VARS.to_vec();
        vars.push(("CERT_ANALYZER_OCR_POLL_ATTEMPTS", "4"));
        vars.push(("CERT_ANALYZER_OCR_POLL_INTERVAL_MS", "250"));

        let cfg = AppConfig::resolve(Args::default(), lookup(&vars), false).unwrap();
        assert_eq!(cfg.ocr.poll.max_attempts, 4);
        assert_eq!(cfg.ocr.poll.interval, Duration::from_millis(250));
    }

    #[test]
    fn missing_credentials_fail_unless_migrating() {
        let err = AppConfig::resolve(Args::default(), lookup(&[]), false).unwrap_err();
        assert!(err.to_string().contains("CERT_ANALYZER_OCR_ENDPOINT"));

        assert!(AppConfig::resolve(Args::default(), lookup(&[]), true).is_ok());
    }

    #[test]
    fn malformed_numbers_are_reported() {
        let mut vars = OCR_VARS.to_vec();
        vars.push(("CERT_ANALYZER_PORT", "eighty"));
        let err = AppConfig::resolve(Args::default(), lookup(&vars), false).unwrap_err();
        assert!(err.to_string().contains("CERT_ANALYZER_PORT"));

        let mut vars = OCR_VARS.to_vec();
        vars.push(("CERT_ANALYZER_OCR_POLL_ATTEMPTS", "0"));
        assert!(AppConfig::resolve(Args::default(), lookup(&vars), false).is_err());
    }
}
