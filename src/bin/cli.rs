//! KSave CLI
//!
//! Command-line interface for the KSave gateway:
//! - Encode JSON payloads to line protocol (offline)
//! - Write payloads through a running gateway
//! - Query current readings, tags and devices
//! - Check upstream status
//! - Print the default configuration

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ksave_gateway::config::generate_default_config;
use ksave_gateway::device::{AliasTable, DeviceResolver};
use ksave_gateway::line_protocol::{encode_batch, point_from_json, split_points, EncodingOptions};

#[derive(Parser)]
#[command(name = "ksave")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Client for the KSave telemetry gateway")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Gateway URL
    #[arg(long, default_value = "http://localhost:8082", global = true)]
    pub gateway_url: String,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Encode a JSON payload to line protocol without sending it
    Encode {
        /// JSON file (default: stdin)
        input: Option<PathBuf>,
        /// Quote nulls and mark whole numbers as integers
        #[arg(long)]
        registration: bool,
        /// Device alias in RAW=CANONICAL format
        #[arg(short, long)]
        alias: Vec<String>,
    },

    /// Send a JSON payload to the write endpoint
    Write {
        /// JSON file (default: stdin)
        input: Option<PathBuf>,
        /// Value of the x-write-token header
        #[arg(long)]
        write_token: Option<String>,
    },

    /// Show current-like readings
    Currents {
        /// Relative range (e.g., -15m, -6h, -7d)
        #[arg(short, long)]
        range: Option<String>,
        /// Instant to look around (RFC 3339 or epoch)
        #[arg(long)]
        at: Option<String>,
    },

    /// List known locations and device ids
    Tags,

    /// Look up the latest readings of a device
    Device {
        /// Device id
        id: String,
    },

    /// Show upstream service status
    Status,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.gateway_url.trim_end_matches('/');
    let json_output = cli.format == "json";

    match cli.command {
        Commands::Encode {
            input,
            registration,
            alias,
        } => {
            let body = read_json(input.as_deref())?;
            let resolver = DeviceResolver::new(Arc::new(parse_aliases(&alias)?));
            let options = if registration {
                EncodingOptions::registration()
            } else {
                EncodingOptions::generic_write()
            };

            let points = split_points(&body)
                .into_iter()
                .map(|payload| point_from_json(payload, &resolver));
            let batch = encode_batch(points, &options)?;

            for rejected in &batch.rejected {
                eprintln!("point {} rejected: {}", rejected.index, rejected.error);
            }
            println!("{}", batch.body());
        }

        Commands::Write { input, write_token } => {
            let body = read_json(input.as_deref())?;

            let mut request = client.post(format!("{}/api/influx/write", base)).json(&body);
            if let Some(token) = write_token {
                request = request.header("x-write-token", token);
            }

            let data = expect_success(request.send().await?).await?;

            if json_output {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                println!(
                    "Wrote {} line(s) to {}",
                    data["written"].as_u64().unwrap_or(0),
                    data["bucket"].as_str().unwrap_or("-")
                );
                if let Some(rejected) = data["rejected"].as_array() {
                    for item in rejected {
                        println!(
                            "  rejected #{}: {}",
                            item["index"],
                            item["error"].as_str().unwrap_or("-")
                        );
                    }
                }
            }
        }

        Commands::Currents { range, at } => {
            let mut query = Vec::new();
            if let Some(range) = range {
                query.push(("range", range));
            }
            if let Some(at) = at {
                query.push(("at", at));
            }

            let request = client
                .get(format!("{}/api/influx/currents", base))
                .query(&query);
            let data = expect_success(request.send().await?).await?;

            if json_output {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                print_currents(&data);
            }
        }

        Commands::Tags => {
            let response = client.get(format!("{}/api/influx/tags", base)).send().await?;
            let data = expect_success(response).await?;

            if json_output {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                println!("Locations:");
                for location in data["locations"].as_array().into_iter().flatten() {
                    println!("  {}", location.as_str().unwrap_or("-"));
                }
                println!();
                println!("Device ids:");
                for id in data["ids"].as_array().into_iter().flatten() {
                    println!("  {}", id.as_str().unwrap_or("-"));
                }
            }
        }

        Commands::Device { id } => {
            let request = client
                .get(format!("{}/api/influx/device", base))
                .query(&[("id", id.as_str())]);
            let data = expect_success(request.send().await?).await?;

            if json_output {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                print_device(&id, &data["parsed"]);
            }
        }

        Commands::Status => {
            let response = client
                .get(format!("{}/api/status", base))
                .send()
                .await
                .with_context(|| format!("cannot connect to gateway at {}", base))?;
            let data = expect_success(response).await?;

            if json_output {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                println!("KSave gateway at {}", base);
                println!();
                if let Some(services) = data["services"].as_object() {
                    for (name, status) in services {
                        let state = match status["ok"].as_bool() {
                            Some(true) => "ok".to_string(),
                            _ => status["status"]
                                .as_u64()
                                .map(|s| format!("error (HTTP {})", s))
                                .or_else(|| status["error"].as_str().map(|e| format!("error ({})", e)))
                                .unwrap_or_else(|| "error".to_string()),
                        };
                        println!("  {:<10} {}", name, state);
                    }
                }
            }
        }

        Commands::Config { output } => {
            let config = generate_default_config();

            if let Some(path) = output {
                std::fs::write(&path, &config)
                    .with_context(|| format!("cannot write {}", path.display()))?;
                println!("Config written to {:?}", path);
            } else {
                println!("{}", config);
            }
        }
    }

    Ok(())
}

/// Read a JSON document from a file or stdin
fn read_json(path: Option<&Path>) -> anyhow::Result<Value> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            text
        }
    };

    serde_json::from_str(&text).context("input is not valid JSON")
}

/// Parse `RAW=CANONICAL` pairs
fn parse_aliases(pairs: &[String]) -> anyhow::Result<AliasTable> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((raw, canonical)) if !raw.is_empty() && !canonical.is_empty() => {
                Ok((raw.to_string(), canonical.to_string()))
            }
            _ => bail!("invalid alias '{}', expected RAW=CANONICAL", pair),
        })
        .collect()
}

/// JSON body of a success response, or an error carrying the gateway's message
async fn expect_success(response: reqwest::Response) -> anyhow::Result<Value> {
    let status = response.status();
    let text = response.text().await?;
    let data: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

    if !status.is_success() {
        let message = data["error"].as_str().unwrap_or(text.as_str());
        bail!("gateway returned {}: {}", status, message);
    }

    Ok(data)
}

fn print_currents(data: &Value) {
    let rows = data["rows"].as_array().map(Vec::as_slice).unwrap_or_default();

    if rows.is_empty() {
        println!("No readings in range.");
        return;
    }

    println!(
        "{:<26} {:<12} {:<12} {:<10} {}",
        "Time", "Device", "Location", "Field", "Value"
    );
    println!("{}", "-".repeat(72));

    for row in rows {
        let device = row["device"].as_str().or_else(|| row["ksave"].as_str());
        let value = row["value"]
            .as_f64()
            .map(|v| format!("{:.3}", v))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<26} {:<12} {:<12} {:<10} {}",
            row["time"].as_str().unwrap_or("-"),
            device.unwrap_or("-"),
            row["location"].as_str().unwrap_or("-"),
            row["field"].as_str().unwrap_or("-"),
            value
        );
    }
}

fn print_device(id: &str, parsed: &Value) {
    println!("Device {}", id);
    println!();

    let text = |key: &str| parsed[key].as_str().unwrap_or("-").to_string();
    println!("  Series name: {}", text("seriesName"));
    println!("  Series no:   {}", text("seriesNo"));
    println!("  Location:    {}", text("location"));
    println!("  Last seen:   {}", text("lastTime"));

    if let Some(seconds) = parsed["secondsAgo"].as_i64() {
        let fresh = if parsed["ok"].as_bool() == Some(true) { "fresh" } else { "stale" };
        println!("               {}s ago ({})", seconds, fresh);
    }

    let Some(fields) = parsed.as_object() else {
        return;
    };
    let readings: Vec<(&String, f64)> = fields
        .iter()
        .filter_map(|(key, value)| value.as_f64().map(|v| (key, v)))
        .filter(|(key, _)| key.as_str() != "secondsAgo")
        .collect();

    if !readings.is_empty() {
        println!();
        println!("Readings:");
        for (key, value) in readings {
            println!("  {:<14} {}", key, value);
        }
    }
}
