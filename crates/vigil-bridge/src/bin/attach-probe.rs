//! One-shot diagnostic: attach to a single camera and print everything
//! its event stream produces. Useful for checking credentials and
//! seeing which codes a camera actually emits before writing a roster.

use anyhow::{Context, Result};
use clap::Parser;
use futures_util::StreamExt;
use tracing_subscriber::EnvFilter;

use vigil_bridge::CameraConfig;
use vigil_bridge::transport;
use vigil_core::{EventLineParser, Indication, STATUS_OK_LINE, codes};

#[derive(Parser, Debug)]
#[command(name = "attach-probe")]
#[command(about = "Attach to one camera and print its raw event stream")]
#[command(version)]
struct Args {
    /// Camera hostname or IP
    host: String,

    #[arg(long, default_value = "80")]
    port: u16,

    #[arg(long, short)]
    username: String,

    #[arg(long, short)]
    password: String,

    /// Event codes to subscribe to (comma-separated)
    #[arg(long, value_delimiter = ',', default_value = codes::ALL)]
    codes: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();
    let camera = CameraConfig {
        name: args.host.clone(),
        host: args.host,
        port: args.port,
        username: args.username,
        password: args.password,
        topic: String::new(),
        events: args.codes,
    };

    let client = transport::build_client()?;
    tracing::info!("Attaching to {}", camera.attach_url());
    let response = transport::attach(&client, &camera)
        .await
        .context("Attach failed")?;
    tracing::info!("Attached, status {}", response.status());

    let mut parser = EventLineParser::new(&camera.name);
    // reqwest consumes the real status line; replay it so the parser sees
    // the stream go live, same as the bridge does.
    report(parser.push(format!("{STATUS_OK_LINE}\r\n").as_bytes()));

    let mut stream = response.bytes_stream();
    while let Some(piece) = stream.next().await {
        let bytes = piece.context("Stream read failed")?;
        report(parser.push(&bytes));
    }

    tracing::info!("Stream ended");
    Ok(())
}

fn report(indications: Vec<Indication>) {
    for indication in indications {
        match indication {
            Indication::Connected => tracing::info!("Stream live"),
            Indication::Event(event) => {
                tracing::info!("{} {} fields={:?}", event.code, event.action, event.fields);
            }
            Indication::Error(err) => tracing::warn!("Unparseable line: {}", err),
        }
    }
}
