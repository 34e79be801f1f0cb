use anyhow::Result;
use clap::Parser;
use frame_api::handle_frame;
use frame_server::config::load_settings;
use shared::protocol::{FrameActionPayload, Route};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Runs one allowance check against the configured upstreams and prints the
/// resulting frame.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    fid: u64,
    /// Treat a missing identity as an error instead of partial data.
    #[arg(long)]
    strict: bool,
    /// Print the JSON document instead of the meta-tag page.
    #[arg(long)]
    json: bool,
    #[arg(long)]
    landing: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings()?;
    if args.strict {
        settings.required_fields = "identity,allowance".into();
    }
    let ctx = settings.frame_context()?;

    let route = if args.landing {
        Route::Landing
    } else {
        Route::CheckRequested
    };
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let payload = FrameActionPayload::with_fid(args.fid);
    let document = handle_frame(&ctx, route, &payload, &cancel).await;
    info!(fid = args.fid, screen = ?document.screen, "probe finished");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&document)?);
    } else {
        println!("{}", document.to_html());
    }
    Ok(())
}
