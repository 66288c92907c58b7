use std::sync::Once;

use tracing_subscriber::{filter::FilterFn, layer::SubscriberExt, util::SubscriberInitExt};

const CRATE_PREFIX: &str = "nearby";

/// Route `tracing` output to logcat on Android and stderr elsewhere.
///
/// Only events from this workspace's crates are kept.
pub(crate) fn setup_logging() {
    static LOGGING_SETUP: Once = Once::new();

    LOGGING_SETUP.call_once(|| {
        if let Err(error) = install() {
            eprintln!("failed to set up logging: {error:?}");
        }
    });
}

fn ours() -> FilterFn<impl Fn(&tracing::Metadata<'_>) -> bool> {
    FilterFn::new(|metadata| {
        metadata
            .module_path()
            .unwrap_or_default()
            .starts_with(CRATE_PREFIX)
    })
}

#[cfg(target_os = "android")]
fn install() -> eyre::Result<()> {
    use eyre::WrapErr;
    use tracing_logcat::{LogcatMakeWriter, LogcatTag};
    use tracing_subscriber::fmt::format::Format;

    let tag = LogcatTag::Fixed("Nearby-Rust".to_owned());
    let writer = LogcatMakeWriter::new(tag).wrap_err("failed to initialize logcat writer")?;
    let layer = tracing_subscriber::fmt::layer()
        .event_format(Format::default().with_level(false).without_time())
        .with_writer(writer)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(layer)
        .with(ours())
        .try_init()
        .wrap_err("a global subscriber is already installed")
}

#[cfg(not(target_os = "android"))]
fn install() -> eyre::Result<()> {
    use eyre::WrapErr;

    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(layer)
        .with(ours())
        .try_init()
        .wrap_err("a global subscriber is already installed")
}
