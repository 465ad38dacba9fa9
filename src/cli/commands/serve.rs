//! Web server command.

use std::net::{SocketAddr, ToSocketAddrs};

use console::style;

use super::helpers::open_pipeline;
use crate::config::{Config, Settings};
use crate::scheduler::Scheduler;

/// Start the HTTP server, with the scheduler unless disabled.
pub async fn cmd_serve(
    settings: &Settings,
    config: &Config,
    bind: &str,
    no_scheduler: bool,
) -> anyhow::Result<()> {
    let addr = parse_bind_address(bind)?;

    println!("{} Opening database...", style("→").cyan());
    let pipeline = open_pipeline(settings, config, None).await?;
    println!("  {} Database ready", style("✓").green());

    if config.scheduler.enabled && !no_scheduler {
        let period = config.scheduler.interval();
        Scheduler::new(pipeline.clone(), period).spawn();
        println!(
            "  {} Scheduler running every {}s",
            style("✓").green(),
            period.as_secs()
        );
    } else {
        println!("  {} Scheduler disabled", style("!").yellow());
    }

    println!(
        "{} Starting footage server at http://{}",
        style("→").cyan(),
        addr
    );
    println!("  Press Ctrl+C to stop");

    crate::server::serve(pipeline, addr).await
}

/// Parse a bind address that can be:
/// - Just a port: "3030" -> 127.0.0.1:3030
/// - Just a host: "0.0.0.0" -> 0.0.0.0:3030
/// - Host and port: "0.0.0.0:3030" -> 0.0.0.0:3030
fn parse_bind_address(bind: &str) -> anyhow::Result<SocketAddr> {
    let (host, port) = if let Ok(port) = bind.parse::<u16>() {
        ("127.0.0.1", port)
    } else if let Some(pair) = bind
        .rsplit_once(':')
        .and_then(|(host, port)| port.parse::<u16>().ok().map(|p| (host, p)))
    {
        pair
    } else {
        (bind, 3030)
    };

    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| anyhow::anyhow!("cannot resolve bind address {}", bind))
}
