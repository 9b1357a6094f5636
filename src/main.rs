//! Run the channel lifecycle against a simulated light.
//!
//! Usage:
//!   cargo run -- --zcl-v4
//!   cargo run -- --zcl-v4 --no-color-temp --fail-report current_x
//!   cargo run -- --profile bulb.json

use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use zigbee_channels::config::{self, Config};
use zigbee_channels::transport::{ClusterHandle, DeviceProfile, SimulatedCluster};
use zigbee_channels::zcl::color::ColorAttribute;
use zigbee_channels::zcl::{AttributeValue, ClusterId};
use zigbee_channels::{ChannelPool, ChannelRegistry, TransportError};

#[derive(Parser)]
#[command(name = "channel-probe")]
#[command(about = "Configure and initialize the channels of a simulated color light")]
struct Cli {
    /// Simulate a ZCL revision 4 light without the color_capabilities attribute
    #[arg(long)]
    zcl_v4: bool,

    /// Answer color_temperature reads with UNSUPPORTED_ATTRIBUTE
    #[arg(long)]
    no_color_temp: bool,

    /// Make configure-reporting time out for this attribute (repeatable)
    #[arg(long = "fail-report", value_name = "ATTRIBUTE")]
    fail_report: Vec<String>,

    /// Load the color cluster from a JSON device profile instead
    #[arg(long, env = "CHANNEL_PROBE_PROFILE")]
    profile: Option<PathBuf>,

    /// Skip configuration, as for a device restored at startup
    #[arg(long)]
    restore: bool,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn color_cluster(cli: &Cli) -> Result<SimulatedCluster, Box<dyn std::error::Error>> {
    if let Some(path) = &cli.profile {
        let profile: DeviceProfile = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        return Ok(SimulatedCluster::from_profile(profile));
    }

    let cluster = SimulatedCluster::new(ClusterId::ColorControl.id(), 1)
        .with_value(
            ColorAttribute::CurrentX.name(),
            AttributeValue::Unsigned(24939),
        )
        .with_value(
            ColorAttribute::CurrentY.name(),
            AttributeValue::Unsigned(24701),
        );
    if cli.no_color_temp {
        cluster.set_unsupported(ColorAttribute::ColorTemperature.name());
    } else {
        cluster.set_value(
            ColorAttribute::ColorTemperature.name(),
            AttributeValue::Unsigned(370),
        );
    }
    if !cli.zcl_v4 {
        let bits = if cli.no_color_temp { 0x08 } else { 0x18 };
        cluster.set_value(
            ColorAttribute::ColorCapabilities.name(),
            AttributeValue::Bitmap(bits),
        );
    }
    for attribute in &cli.fail_report {
        cluster.fail_reporting(
            attribute,
            TransportError::Timeout {
                operation: format!("configure reporting for {}", attribute),
            },
        );
    }
    Ok(cluster)
}

fn main() {
    config::load_dotenv();
    init_logger();
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };
    runtime.block_on(run(cli, config));
}

async fn run(cli: Cli, config: Config) {
    info!(
        "Reporting defaults: {}-{}s, change {}",
        config.reporting.min_interval,
        config.reporting.max_interval,
        config.reporting.reportable_change
    );

    let color = match color_cluster(&cli) {
        Ok(cluster) => Arc::new(cluster),
        Err(e) => {
            error!("Failed to build simulated cluster: {}", e);
            std::process::exit(1);
        }
    };
    let on_off = Arc::new(
        SimulatedCluster::new(ClusterId::OnOff.id(), 1)
            .with_value("on_off", AttributeValue::Bool(true)),
    );
    let level = Arc::new(
        SimulatedCluster::new(ClusterId::LevelControl.id(), 1)
            .with_value("current_level", AttributeValue::Unsigned(254)),
    );

    let in_clusters: Vec<Arc<dyn ClusterHandle>> = vec![on_off, level, color.clone()];
    let out_clusters: Vec<Arc<dyn ClusterHandle>> = vec![Arc::new(SimulatedCluster::new(
        ClusterId::ColorControl.id(),
        1,
    ))];
    let registry = ChannelRegistry::with_defaults();
    let pool = ChannelPool::new(1, in_clusters, out_clusters, &registry, &config);

    let report = pool.async_setup(!cli.restore).await;

    for channel in pool.channels() {
        let outcome = match report.get(&channel.id()) {
            Some(Err(e)) => e.to_string(),
            Some(Ok(())) => "ok".to_string(),
            None => "skipped".to_string(),
        };
        info!(
            "  {:<12} {:<16} {} ({})",
            channel.name(),
            channel.id(),
            channel.state(),
            outcome
        );
    }

    if let Some(channel) = pool.server_channel(ClusterId::ColorControl.id()) {
        match channel.get_color_capabilities() {
            Some(capabilities) => info!(
                "Color capabilities: 0x{:04X} {:?}",
                capabilities.bits(),
                capabilities
            ),
            None => info!("Color capabilities: unknown"),
        }
    }
    info!("Color cluster requests issued: {}", color.request_count());
}
