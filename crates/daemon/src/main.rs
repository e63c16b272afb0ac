mod logging;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use wa_client::BridgeFactory;
use wa_core::SessionManager;

#[derive(Parser, Debug)]
#[command(name = "wa-daemon", about = "Multi-session WhatsApp API daemon")]
struct Args {
	/// Address to bind.
	#[arg(long, default_value = "0.0.0.0")]
	host: String,

	/// Port to listen on.
	#[arg(long, default_value_t = 7123)]
	port: u16,

	/// Root directory for per-session credential storage.
	#[arg(long, default_value = "./wa_sessions")]
	session_dir: PathBuf,

	/// Skip bootstrapping the implicit "default" session at startup.
	#[arg(long)]
	no_default_session: bool,

	/// Increase log verbosity (-v, -vv).
	#[arg(short, long, action = clap::ArgAction::Count)]
	verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	logging::init_logging(args.verbose);

	let factory = BridgeFactory::new(&args.session_dir)
		.context("failed to locate the WhatsApp bridge")?;
	let manager = SessionManager::new(Arc::new(factory));

	if !args.no_default_session {
		// Same invariant-checked path as API-driven creation.
		match manager.create_session("default") {
			Ok(()) => info!(target = "wa.daemon", "default session bootstrapped"),
			Err(e) => error!(target = "wa.daemon", error = %e, "default session bootstrap failed"),
		}
	}

	let addr = format!("{}:{}", args.host, args.port);
	let listener = TcpListener::bind(&addr)
		.await
		.with_context(|| format!("failed to bind {addr}"))?;

	server::serve(manager, listener, shutdown_signal()).await?;
	info!(target = "wa.daemon", "bye");
	Ok(())
}

/// Resolves on ctrl-c or SIGTERM.
async fn shutdown_signal() {
	let ctrl_c = async {
		let _ = tokio::signal::ctrl_c().await;
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			}
			Err(e) => {
				error!(target = "wa.daemon", error = %e, "failed to install SIGTERM handler");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {}
		_ = terminate => {}
	}
}
