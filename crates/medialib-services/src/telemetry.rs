use tracing_subscriber::{
    fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter. `LOG_FORMAT=json` switches the
/// console output to one JSON object per event. Fails when a subscriber is
/// already installed.
pub fn init_tracing() -> anyhow::Result<()> {
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json().with_target(true));
    let console_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer().event_format(
            Format::default()
                .compact()
                .with_target(false)
                .without_time(),
        )
    });

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "medialib=debug".into()),
        )
        .with(json_layer)
        .with(console_layer)
        .try_init()?;

    tracing::debug!(json, "Tracing initialised");
    Ok(())
}
