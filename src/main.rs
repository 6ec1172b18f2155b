use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use haviwa::config::{BindingStatus, Config};
use haviwa::device::{hardware_addresses, Fingerprint, FingerprintDeriver, SystemInterfaces};
use haviwa::network::{self, JsonPoster};
use haviwa::util;

#[derive(Parser)]
#[command(name = "haviwa")]
#[command(version, about = "Helpers for the haviwa browser-interaction script")]
struct CommandLine {
    /// Accept the disclaimer without prompting
    #[arg(short, long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive this machine's fingerprint
    #[command(alias = "fp")]
    Fingerprint,
    /// Store the current fingerprint in the config file
    Bind,
    /// Check the current fingerprint against the stored one
    Verify,
    /// List the usable host addresses of a CIDR block
    Hosts { cidr: String },
    /// List every address from START to END
    Range { start: Ipv4Addr, end: Ipv4Addr },
    /// List the hardware address of every interface
    Macs,
    /// POST a JSON document to each URL and print the response bodies
    Post {
        /// JSON text, or @FILE to read it from a file
        json: String,
        #[arg(required = true)]
        urls: Vec<String>,
        /// Extra header as "Name: value"; repeatable
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },
    /// Print a random 32-character id
    UniqueId,
    /// Decode \uXXXX escapes
    Decode { text: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let commands = CommandLine::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("haviwa=info")),
        )
        .init();

    print_banner();
    if !commands.yes && !agree_disclaimer()? {
        println!("Disclaimer declined, exiting.");
        return Ok(());
    }

    let config = Config::load()?;

    match commands.command {
        Commands::Fingerprint => {
            let fingerprint = derive_or_exit(&config).await;
            println!("{fingerprint}");
        }
        Commands::Bind => {
            let fingerprint = derive_or_exit(&config).await;
            let mut config = config;
            let binding = config.bind(fingerprint).clone();
            config.save(&Config::config_path())?;
            info!("✅ Bound to {} (first seen {})", binding.fingerprint, binding.first_seen.format("%Y-%m-%d %H:%M:%S"));
        }
        Commands::Verify => {
            let fingerprint = derive_or_exit(&config).await;
            match config.verify(&fingerprint) {
                BindingStatus::Matches(binding) => {
                    info!("✅ Device binding verified");
                    info!("   First seen: {}", binding.first_seen.format("%Y-%m-%d %H:%M:%S"));
                }
                BindingStatus::Unbound => {
                    warn!("⚠️  No device binding stored yet, run `haviwa bind` first");
                    std::process::exit(2);
                }
                BindingStatus::Mismatch { expected } => {
                    error!("❌ DEVICE FINGERPRINT MISMATCH!");
                    error!("   Expected: {}", expected);
                    error!("   Actual:   {}", fingerprint);
                    error!("   If the hardware was replaced, run `haviwa bind` again.");
                    std::process::exit(1);
                }
            }
        }
        Commands::Hosts { cidr } => {
            for host in network::hosts(&cidr)? {
                println!("{host}");
            }
        }
        Commands::Range { start, end } => {
            for addr in network::ip_range(start, end) {
                println!("{addr}");
            }
        }
        Commands::Macs => {
            for mac in hardware_addresses(&SystemInterfaces)? {
                println!("{mac}");
            }
        }
        Commands::Post { json, urls, headers } => {
            let body = load_body(&json)?;
            let headers = parse_headers(&headers)?;
            let poster = JsonPoster::new(Duration::from_secs(config.http.timeout_secs))?;
            let pool = config.worker_pool(urls.len());

            let results = poster.post_json_each(&pool, &urls, &headers, &body).await;
            let mut failed = 0;
            for (url, result) in urls.iter().zip(results) {
                match result {
                    Ok(text) => println!("{text}"),
                    Err(e) => {
                        error!("❌ {}: {:#}", url, e);
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{} of {} requests failed", failed, urls.len());
            }
        }
        Commands::UniqueId => println!("{}", util::unique_id()),
        Commands::Decode { text } => println!("{}", util::decode_unicode_escapes(&text)),
    }

    Ok(())
}

/// The binary, not the library, decides that a missing identifier is fatal.
async fn derive_or_exit(config: &Config) -> Fingerprint {
    let deriver = FingerprintDeriver::system().with_deadline(config.fingerprint.query_timeout());
    match deriver.derive().await {
        Ok(fingerprint) => fingerprint,
        Err(e) => {
            error!("❌ Failed to derive device fingerprint:");
            error!("   {}", e);
            std::process::exit(1);
        }
    }
}

/// `@path` reads the body from a file.
fn load_body(raw: &str) -> Result<serde_json::Value> {
    let text = match raw.strip_prefix('@') {
        Some(path) => util::read_text(Path::new(path))?,
        None => raw.to_string(),
    };
    serde_json::from_str(&text).context("Request body is not valid JSON")
}

fn parse_headers(raw: &[String]) -> Result<HashMap<String, String>> {
    raw.iter()
        .map(|header| {
            let (name, value) = header
                .split_once(':')
                .with_context(|| format!("Header {header:?} is not in \"Name: value\" form"))?;
            Ok((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

fn print_banner() {
    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║                   HAVIWA TOOLKIT v{:<8}             ║", env!("CARGO_PKG_VERSION"));
    println!("╚════════════════════════════════════════════════════════╝\n");
}

fn agree_disclaimer() -> Result<bool> {
    println!("Disclaimer:");
    println!("  This tool is for personal testing and for assisting users who cannot");
    println!("  operate a browser by hand. Do not use it for anything unlawful.");
    println!("  Continuing means you accept these terms.");
    print!("Enter 1 to agree, anything else to decline: ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim() == "1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_pairs() {
        let headers = parse_headers(&["X-Token: abc".to_string(), "Accept:*/*".to_string()]).unwrap();
        assert_eq!(headers.get("X-Token").map(String::as_str), Some("abc"));
        assert_eq!(headers.get("Accept").map(String::as_str), Some("*/*"));
    }

    #[test]
    fn rejects_header_without_colon() {
        assert!(parse_headers(&["broken".to_string()]).is_err());
    }

    #[test]
    fn body_is_inline_or_read_from_file() {
        assert_eq!(load_body("{\"a\":1}").unwrap()["a"], 1);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("body.json");
        std::fs::write(&path, "{\"name\": \"haviwa\"}").unwrap();
        let body = load_body(&format!("@{}", path.display())).unwrap();
        assert_eq!(body["name"], "haviwa");

        assert!(load_body("@/definitely/not/here.json").is_err());
        assert!(load_body("not json").is_err());
    }

    #[test]
    fn cli_parses_post_with_several_urls() {
        let cli = CommandLine::try_parse_from([
            "haviwa", "post", "{}", "http://a/x", "http://b/x", "-H", "X-Token: abc",
        ])
        .unwrap();
        match cli.command {
            Commands::Post { urls, headers, .. } => {
                assert_eq!(urls, vec!["http://a/x", "http://b/x"]);
                assert_eq!(headers, vec!["X-Token: abc"]);
            }
            _ => panic!("expected post"),
        }
        assert!(CommandLine::try_parse_from(["haviwa", "post", "{}"]).is_err());
    }

    #[test]
    fn cli_parses_range() {
        let cli = CommandLine::try_parse_from(["haviwa", "-y", "range", "10.0.0.1", "10.0.0.3"]).unwrap();
        assert!(cli.yes);
        assert!(matches!(cli.command, Commands::Range { .. }));
    }
}
