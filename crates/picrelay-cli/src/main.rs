//! picrelay binary entry point.
//!
//! Usage: picrelay [OPTIONS] <IMAGE_URL>...
//!
//! Queues the given images for delivery, waits until the pipeline drains (or
//! the drain timeout / Ctrl-C hits), then shuts down and prints the shutdown
//! report as JSON.

use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use picrelay_core::domain::caption::with_seed;
use picrelay_core::{ConfigOverrides, DeliveryCoordinator, ImageRef, observability};
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// One URL → single image, several → one batch.
    Auto,
    /// Always one batch.
    Batch,
    /// One independent delivery per URL.
    Separate,
}

/// Deliver images with captions to a Telegram chat.
#[derive(Parser, Debug)]
#[command(name = "picrelay")]
#[command(about = "Queue images for best-effort delivery to a Telegram chat")]
struct Args {
    /// Image URLs to deliver.
    #[arg(required = true)]
    image_urls: Vec<String>,

    /// Bot API token. Overrides TELEGRAM_BOT_TOKEN.
    #[arg(long)]
    bot_token: Option<String>,

    /// Target chat id (numeric, `-100…` for groups, or @channel).
    /// Overrides TELEGRAM_CHAT_ID.
    #[arg(long, allow_hyphen_values = true)]
    chat_id: Option<String>,

    /// Bot API base URL. Overrides TELEGRAM_API_URL.
    #[arg(long)]
    api_url: Option<String>,

    /// Caption text (the prompt for generated images).
    #[arg(long, default_value = "")]
    prompt: String,

    /// Source label shown in the caption suffix.
    #[arg(long, default_value = "picrelay")]
    source: String,

    /// Seed per image, in URL order. Repeatable.
    #[arg(long = "seed")]
    seeds: Vec<u64>,

    #[arg(long, value_enum, default_value_t = Mode::Auto)]
    mode: Mode,

    /// Give up waiting for delivery after this many seconds.
    #[arg(long, default_value = "300")]
    drain_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            bot_token: self.bot_token.clone(),
            chat_id: self.chat_id.clone(),
            api_base_url: self.api_url.clone(),
        }
    }

    fn images(&self) -> Vec<ImageRef> {
        self.image_urls
            .iter()
            .enumerate()
            .map(|(i, url)| {
                ImageRef::new(
                    url,
                    with_seed(&self.prompt, self.seeds.get(i).copied()),
                    &self.source,
                )
            })
            .collect()
    }
}

/// worker が全部片付けるまで待つ（timeout 付き）
async fn wait_until_idle(coordinator: &DeliveryCoordinator, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    loop {
        let status = coordinator.status();
        if status.is_idle() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        info!(%status, "waiting for deliveries");
        sleep(Duration::from_secs(1)).await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    observability::init(&args.log_level);

    info!(images = args.image_urls.len(), mode = ?args.mode, "starting");

    let coordinator = DeliveryCoordinator::telegram_from_env(args.overrides())
        .await
        .context("failed to start delivery")?;

    match args.mode {
        Mode::Auto => {
            coordinator.submit_generated(
                args.image_urls.as_slice(),
                &args.prompt,
                &args.source,
                &args.seeds,
            );
        }
        Mode::Batch => {
            coordinator.submit_batch(args.images())?;
        }
        Mode::Separate => {
            coordinator.submit_images(args.images());
        }
    }

    let drained = tokio::select! {
        drained = wait_until_idle(&coordinator, Duration::from_secs(args.drain_timeout_secs)) => drained,
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
            false
        }
    };
    if !drained {
        warn!(status = %coordinator.status(), "stopping with deliveries still pending");
    }

    let report = coordinator.shutdown().await;
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repeated_seeds_and_mode() {
        let args = Args::try_parse_from([
            "picrelay",
            "--bot-token",
            "1:a",
            "--chat-id",
            "-100",
            "--prompt",
            "fox",
            "--seed",
            "1",
            "--seed",
            "2",
            "--mode",
            "separate",
            "https://img.example/1.png",
            "https://img.example/2.png",
        ])
        .unwrap();

        assert_eq!(args.chat_id.as_deref(), Some("-100"));
        assert_eq!(args.mode, Mode::Separate);
        assert_eq!(args.seeds, vec![1, 2]);
        let images = args.images();
        assert_eq!(images[1].caption, "fox\n\nSeed: 2");
        assert_eq!(images[0].source_label, "picrelay");
    }

    #[test]
    fn credentials_are_optional_and_become_overrides() {
        let args = Args::try_parse_from([
            "picrelay",
            "--chat-id",
            "-1002502277172",
            "https://img.example/1.png",
        ])
        .unwrap();

        let overrides = args.overrides();
        assert_eq!(overrides.chat_id.as_deref(), Some("-1002502277172"));
        assert!(overrides.bot_token.is_none());
        assert!(overrides.api_base_url.is_none());
    }

    #[test]
    fn requires_at_least_one_url() {
        let result = Args::try_parse_from(["picrelay", "--bot-token", "1:a", "--chat-id", "-100"]);
        assert!(result.is_err());
    }
}
