use tracing_subscriber::EnvFilter;

/// Default directives per verbosity tier. The bridge plumbing logs under
/// the dotted targets `wa.bridge`, `wa.transport` and `wa.driver`, so the
/// quiet-by-default directives have to name those targets rather than the
/// `wa_client` module path.
fn filter_for(verbosity: u8) -> &'static str {
	match verbosity {
		// 0 = info for the daemon, engine plumbing quiet
		0 => "info,wa.bridge=warn,wa.transport=warn,wa.driver=warn",
		// 1 (-v) = debug for the orchestrator, info for the bridge
		1 => "debug,wa.bridge=info,wa.transport=info,wa.driver=info",
		// 2+ (-vv) = debug/trace for everything
		_ => "trace",
	}
}

pub fn init_logging(verbosity: u8) {
	let env_filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(filter_for(verbosity)));

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(std::io::stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use tracing_subscriber::Layer;
	use tracing_subscriber::layer::{Context, SubscriberExt};

	struct CountingLayer(Arc<AtomicUsize>);

	impl<S: tracing::Subscriber> Layer<S> for CountingLayer {
		fn on_event(&self, _event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
			self.0.fetch_add(1, Ordering::SeqCst);
		}
	}

	fn events_passing(directives: &str, emit: impl FnOnce()) -> usize {
		let count = Arc::new(AtomicUsize::new(0));
		let subscriber = tracing_subscriber::registry()
			.with(CountingLayer(Arc::clone(&count)).with_filter(EnvFilter::new(directives)));
		tracing::subscriber::with_default(subscriber, emit);
		count.load(Ordering::SeqCst)
	}

	#[test]
	fn quiet_tier_silences_bridge_plumbing_but_not_the_daemon() {
		let passed = events_passing(filter_for(0), || {
			tracing::info!(target: "wa.bridge", "handshake chatter");
			tracing::info!(target: "wa.transport", "frame sent");
			tracing::debug!(target: "wa.driver", "resolved path");
			tracing::info!(target: "wa.daemon", "listening");
			tracing::info!(target: "wa.session", "state change");
		});
		assert_eq!(passed, 2);
	}

	#[test]
	fn verbose_tier_admits_bridge_info_but_not_its_debug() {
		let passed = events_passing(filter_for(1), || {
			tracing::info!(target: "wa.bridge", "handshake chatter");
			tracing::debug!(target: "wa.bridge", "raw frame");
			tracing::debug!(target: "wa.session", "state change");
		});
		assert_eq!(passed, 2);
	}
}
