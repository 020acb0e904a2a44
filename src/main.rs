//! cloudimg-upload CLI entry point.
//!
//! Validates upload configurations, previews the request they build and
//! replays captured provider responses through their URL queries. It never
//! talks to the network itself.

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::Parser;
use cloudimg_upload::{build_request, parse_response, UploadConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "cloudimg-upload")]
#[command(
    author,
    version,
    about = "Declarative image upload templates for third-party image hosts"
)]
struct Args {
    /// Configuration file path (YAML or JSON)
    #[arg(short, long, env = "CLOUDIMG_CONFIG")]
    config: Option<PathBuf>,

    /// Build the request for this image and print it without sending
    #[arg(long)]
    image: Option<PathBuf>,

    /// Extract the URLs from a captured response body
    #[arg(long)]
    response: Option<PathBuf>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print example configuration and exit.
    #[arg(long)]
    example_config: bool,

    /// Validate configuration and exit.
    #[arg(long)]
    validate: bool,
}

fn print_example_config() {
    let example = r#"# Upload configuration example
name: "sm.ms"

# Base URL, without a query string
request_url: "https://sm.ms/api/upload"
# get, post, put, patch or delete
request_method: post

# Values substituted into $key$ tokens below
values:
  token: "abc123"

request_querystring:
  format: json

request_headers:
  Authorization: "Basic $token$"

# "$input$" binds the raw image bytes; it may only be a whole formdata value
request_formdata:
  smfile: "$input$"

# $json:path$, $xml:path$ or $regex:pattern$ (first capture group);
# text around the token is kept. Empty means "not provided".
image_url_querystr: "$json:data.url$"
thumbnail_url_querystr: ""
delete_url_querystr: "$json:data.delete$"
"#;
    println!("{}", example);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    if args.example_config {
        print_example_config();
        return Ok(());
    }

    let Some(config_path) = &args.config else {
        bail!("--config is required unless --example-config is given");
    };
    let config = UploadConfig::from_path(config_path)
        .await
        .with_context(|| format!("Failed to load config file: {}", config_path.display()))?;

    if args.validate {
        config
            .validate()
            .with_context(|| format!("Invalid configuration: {}", config_path.display()))?;
        info!(config = %config.name, "Configuration is valid");
        return Ok(());
    }

    if let Some(image_path) = &args.image {
        let payload = tokio::fs::read(image_path)
            .await
            .with_context(|| format!("Failed to read image: {}", image_path.display()))?;
        let request = build_request(&config, Bytes::from(payload))
            .context("Failed to build upload request")?;

        info!(
            config = %config.name,
            method = %request.method,
            url = %request.url,
            "Built upload request (dry run)"
        );
        println!("{}", serde_json::to_string_pretty(&request)?);
    }

    if let Some(response_path) = &args.response {
        let body = tokio::fs::read_to_string(response_path)
            .await
            .with_context(|| format!("Failed to read response: {}", response_path.display()))?;
        let urls = parse_response(&config, &body).context("Failed to parse response")?;

        info!(config = %config.name, image_url = %urls.image_url, "Extracted URLs");
        println!("{}", serde_json::to_string_pretty(&urls)?);
    }

    if args.image.is_none() && args.response.is_none() {
        bail!("nothing to do: pass --validate, --image or --response");
    }

    Ok(())
}
