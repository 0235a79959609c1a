//! `analyst-console` -- follow a research job from the terminal.
//!
//! Submits one stock or sector research job to the backend, then follows
//! its progress stream and prints a status line whenever the visible
//! state changes. Exits with status 0 when the job completes and 1 on
//! any failure or interrupt.
//!
//! # Environment variables
//!
//! See [`analyst_console::config`] and `analyst_stream::config`.

use analyst_console::config::ConsoleConfig;
use analyst_console::render::{self, LineRenderer};
use analyst_core::view::ProgressView;
use analyst_stream::aggregator::ProgressAggregator;
use analyst_stream::api::ResearchApi;
use analyst_stream::client::StreamClient;

use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "analyst_console=info,analyst_stream=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ConsoleConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    tracing::info!(
        kind = %config.request.kind(),
        research_target = config.request.target(),
        api_url = %config.stream.base_url,
        "Starting analyst-console",
    );

    let http = reqwest_client();
    let api = ResearchApi::with_client(http.clone(), &config.stream.base_url);
    if !api.health_check().await {
        tracing::warn!("Backend health check failed, submitting anyway");
    }

    let token = config.auth_token.as_deref();
    let session_id = match api.submit(&config.request, token).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(error = %e, "Failed to submit research");
            std::process::exit(1);
        }
    };

    let (tx, mut views) = mpsc::unbounded_channel::<ProgressView>();
    let client = StreamClient::with_client(http, &config.stream);
    let aggregator = ProgressAggregator::start(
        &client,
        config.request.kind(),
        session_id,
        token,
        move |view| {
            let _ = tx.send(view);
        },
    );

    let mut renderer = LineRenderer::new();
    let mut last: Option<ProgressView> = None;

    loop {
        tokio::select! {
            view = views.recv() => {
                let Some(view) = view else { break };
                if let Some(line) = renderer.next(&view) {
                    println!("{line}");
                }
                last = Some(view);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(session_id = aggregator.session_id(), "Interrupted");
                break;
            }
        }
    }
    aggregator.dispose();

    let code = match last.as_ref() {
        Some(view) if view.completed => {
            if let Some(summary) = render::summary(view) {
                println!("{summary}");
            }
            if let Some(report) = view.result.as_ref().and_then(render::report_text) {
                println!("\n{report}");
            }
            0
        }
        Some(view) if view.error.is_some() => {
            if let Some(summary) = render::summary(view) {
                eprintln!("{summary}");
            }
            1
        }
        _ => 1,
    };
    std::process::exit(code);
}

fn reqwest_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("analyst-console/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to build HTTP client");
            std::process::exit(1);
        })
}
