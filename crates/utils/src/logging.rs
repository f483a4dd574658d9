use anyhow::Result;
use tracing::subscriber::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer, Registry};

/// Log filter applied when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str = "info";

/// Configures the global tracing subscriber.
///
/// Output is written to stdout and filtered using the `RUST_LOG` environment variable, falling
/// back to [`DEFAULT_LOG_FILTER`].
pub fn setup_tracing() -> Result<()> {
    let subscriber = Registry::default().with(stdout_layer());
    tracing::subscriber::set_global_default(subscriber).map_err(Into::into)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into())
}

#[cfg(not(feature = "tracing-forest"))]
fn stdout_layer<S>() -> Box<dyn tracing_subscriber::Layer<S> + Send + Sync + 'static>
where
    S: Subscriber,
    for<'a> S: tracing_subscriber::registry::LookupSpan<'a>,
{
    use tracing_subscriber::fmt::format::FmtSpan;

    tracing_subscriber::fmt::layer()
        .pretty()
        .compact()
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_filter(env_filter())
        .boxed()
}

#[cfg(feature = "tracing-forest")]
fn stdout_layer<S>() -> Box<dyn tracing_subscriber::Layer<S> + Send + Sync + 'static>
where
    S: Subscriber,
    for<'a> S: tracing_subscriber::registry::LookupSpan<'a>,
{
    tracing_forest::ForestLayer::default().with_filter(env_filter()).boxed()
}
