use clap::Parser;
use easycontrols_mqtt::{server, Result};
use url::Url;

#[derive(Parser, Debug)]
#[clap(
    name = "easycontrols-mqtt",
    version,
    about = "A bridge between Helios EasyControls ventilation units and MQTT"
)]
struct Cli {
    /// MQTT broker to connect to; the first path segment becomes the topic
    /// prefix the bridge listens and publishes under.
    #[clap(
        env = "MQTT_URL",
        default_value = "mqtt://localhost:1883/easycontrols",
        value_hint = clap::ValueHint::Url
    )]
    url: Url,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let mut args = Cli::parse();

    let prefix = args
        .url
        .path()
        .trim_start_matches('/')
        .split('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or(env!("CARGO_PKG_NAME"))
        .to_owned();

    args.url
        .query_pairs_mut()
        .append_pair("client_id", env!("CARGO_PKG_NAME"))
        .finish();

    server::run(prefix, args.url.try_into()?, tokio::signal::ctrl_c()).await?;

    Ok(())
}
