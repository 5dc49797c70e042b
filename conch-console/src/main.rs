/**
 * CONCH CONSOLE - Terminal front end for the rack view model
 *
 * ROLE: Loads config (.env, conch.yaml, CONCH_* variables), logs in when the
 * backend asks for it, then runs one command against the dashboard: list
 * rooms, show a rack, assign devices, list relays, locate or flag a device.
 */

mod cli;
mod render;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Args, Command};
use conch_rack::{load_config, Access, AuthGate, ConchApi, ConchConfig, Dashboard, HttpApi, RackSession};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default = if verbose { "conch_rack=debug,conch_console=debug" } else { "conch_rack=info,conch_console=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// Builds the dashboard, logging in with configured credentials on a redirect.
async fn connect(cfg: &ConchConfig) -> Result<Dashboard> {
    let timeout = cfg.api.timeout_secs.map(Duration::from_secs);
    let api: Arc<dyn ConchApi> = Arc::new(HttpApi::new(&cfg.api.base_url, timeout)?);
    let gate = Arc::new(AuthGate::new(api.clone()));

    if let Access::Granted(dashboard) = Dashboard::connect(api.clone(), gate.clone(), cfg).await? {
        return Ok(dashboard);
    }
    let Some(creds) = &cfg.credentials else {
        bail!("login required: set CONCH_USER and CONCH_PASSWORD");
    };
    if !gate.login(&creds.user, &creds.password).await? {
        bail!("login rejected for {}", creds.user);
    }
    match Dashboard::connect(api, gate, cfg).await? {
        Access::Granted(dashboard) => Ok(dashboard),
        Access::Redirect => bail!("session not accepted after login"),
    }
}

fn granted<T>(access: Access<T>) -> Result<T> {
    match access {
        Access::Granted(value) => Ok(value),
        Access::Redirect => bail!("session expired, log in again"),
    }
}

fn print_rack(session: &RackSession) -> Result<()> {
    let layout = session
        .layout()
        .with_context(|| format!("rack {} could not be loaded", session.rack_id()))?;
    print!("{}", render::layout(&layout));
    Ok(())
}

async fn run(dashboard: &Dashboard, command: Command) -> Result<()> {
    match command {
        Command::Rooms => {
            let rooms = granted(dashboard.load_rack_list().await?)?;
            print!("{}", render::rooms(&rooms));
        }
        Command::Rack { rack_id, device } => {
            let session = granted(dashboard.open_rack(&rack_id, device).await?)?;
            print_rack(&session)?;
        }
        Command::Assign { rack_id, set } => {
            let session = granted(dashboard.open_rack(&rack_id, None).await?)?;
            for (slot, device) in set {
                if session.rack().and_then(|r| r.slot(slot).cloned()).is_none() {
                    warn!(rack_id = %rack_id, slot, "slot not in rack, ignored");
                }
                session.input(slot, device);
            }
            let report = granted(session.submit().await?)?;
            println!("{}", render::submit(&report));
            print_rack(&session)?;
        }
        Command::Relays { all } => {
            let relays = if all {
                dashboard.relays().load_relays().await
            } else {
                dashboard.relays().load_active_relays().await
            };
            let relays = match relays {
                Err(e) if e.is_unauthorized() => bail!("session expired, log in again"),
                other => other?,
            };
            print!("{}", render::relays(&relays));
        }
        Command::Locate { device_id } => match granted(dashboard.open_device(&device_id).await?)? {
            Some(session) => print_rack(&session)?,
            None => println!("device {device_id} has no rack location"),
        },
        Command::Flag { rack_id, slot } => {
            let session = granted(dashboard.open_rack(&rack_id, None).await?)?;
            match session.flag_device(slot) {
                Some(handle) => {
                    handle.await?;
                    println!("flag sent for slot {slot}");
                }
                None => bail!("slot {slot} of rack {rack_id} has no device"),
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut cfg = load_config().await;
    if let Some(url) = args.url {
        cfg.api.base_url = url;
    }
    if let Some(ws) = args.workspace {
        cfg.workspace = Some(ws);
    }
    info!(url = %cfg.api.base_url, "conch console starting");

    let dashboard = connect(&cfg).await?;
    run(&dashboard, args.command).await
}
