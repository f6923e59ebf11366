//! Stream tap - connect, subscribe to topics and print decoded frames

use adapter_service::{StreamClient, StreamSettings};
use anyhow::{Context, Result};
use clap::Parser;
use futures_util::StreamExt;
use tracing::{info, warn};
use types::Topic;

#[derive(Parser, Debug)]
#[command(name = "stream_tap", about = "Print live frames for one or more topics")]
struct Args {
    /// Stream URL
    #[arg(long, default_value = config::service::stream::DEFAULT_URL)]
    url: String,

    /// Topics to subscribe, e.g. kline.5.BTCUSDT
    #[arg(required = true)]
    topics: Vec<String>,

    /// Stop after this many frames
    #[arg(long)]
    limit: Option<usize>,

    /// Emit JSON logs
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    config::init_logging(
        "stream_tap",
        &config::LoggingConfig {
            json: args.json,
            ..Default::default()
        },
    )?;

    let settings = StreamSettings {
        url: config::expand_env(&args.url)?,
        ..Default::default()
    };
    settings.validate()?;
    let client = StreamClient::new(settings.to_connection_config());
    client.connect().await.context("initial connection failed")?;

    let mut merged = futures_util::stream::select_all(
        args.topics
            .iter()
            .map(|t| client.messages_for(Topic::from(t.as_str())).into_stream().boxed()),
    );
    for topic in &args.topics {
        client.subscribe(topic.as_str())?;
    }

    let mut seen = 0usize;
    loop {
        tokio::select! {
            msg = merged.next() => match msg {
                Some(frame) => {
                    println!("{} {}", frame.topic, frame.data);
                    seen += 1;
                    if args.limit.is_some_and(|l| seen >= l) {
                        break;
                    }
                }
                None => {
                    warn!("All topic channels closed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    client.dispose().await;
    info!(frames = seen, stats = ?client.stats(), "Stream tap finished");
    Ok(())
}
