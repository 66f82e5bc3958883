//! sockroute demo server
//!
//! - Loads `sockroute.yaml` (strict parsing + validate)
//! - Registers a few sample routes and a `news` channel
//! - Broadcasts a tick on `news` every few seconds
//! - Serves until Ctrl-C, then closes and removes the socket file

use std::time::Duration;

use serde_json::json;
use tracing_subscriber::{fmt, EnvFilter};

use sockroute_core::error::{IpcError, Result};
use sockroute_server::{config, error_handler, handler, App, Broadcast};

const CONFIG_PATH: &str = "sockroute.yaml";

fn register_routes(app: &App) -> Result<()> {
    app.middleware(handler(|ctx| async move {
        tracing::debug!(method = %ctx.req.method(), url = ctx.req.url(), "request");
        ctx.next.call().await
    }))?;

    app.get(
        "/ping",
        handler(|ctx| async move { ctx.res.send(json!({ "pong": true })) }),
    )?;

    app.get(
        "/users/:id",
        handler(|ctx| async move {
            let id = ctx.req.param("id").unwrap_or_default().to_owned();
            ctx.res.send(json!({ "id": id }))
        }),
    )?;

    app.post(
        "/echo",
        handler(|ctx| async move { ctx.res.send(ctx.req.body().clone()) }),
    )?;

    app.get(
        "/fail",
        vec![
            handler(|ctx| async move {
                ctx.next
                    .fail(IpcError::handler("DEMO_FAILURE", "this route always fails"))
                    .await
            }),
            error_handler(|err, ctx| async move { ctx.res.send_error(&err) }),
        ],
    )?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cfg = config::load_from_file(CONFIG_PATH)?;
    let app = App::from_config(&cfg)?;
    register_routes(&app)?;
    if !app.server().channel_exists("news") {
        app.create_channels(["news"])?;
    }

    let socket_path = app
        .listen(&cfg.server.address, cfg.server.listen_options())
        .await?;
    tracing::info!(socket_path = %socket_path.display(), "sockroute-server started");

    let ticker = app.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(5));
        let mut n: u64 = 0;
        loop {
            tick.tick().await;
            n += 1;
            if let Err(e) = ticker.broadcast(Broadcast::new("news", json!({ "tick": n }))) {
                tracing::warn!(error = %e, "tick broadcast failed");
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    app.close();
    Ok(())
}
