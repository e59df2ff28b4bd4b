//! Main entrypoint for running driftfield

use clap::Parser as _;
use color_eyre::eyre::{ContextCompat as _, Result};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, Layer as _};

use crate::cli_args::CliArgs;
use crate::config::Config;
use crate::environment::Environment;

/// Commands to control the various tasks/threads
#[non_exhaustive]
#[derive(Clone, Debug)]
pub enum Protocol {
    /// The pointer moved to a new surface-local position, in pixels.
    PointerMove {
        /// Horizontal position.
        x: f32,
        /// Vertical position.
        y: f32,
    },
    /// The pointer left the surface.
    PointerLeave,
    /// The drawing surface was resized, in pixels.
    Resize {
        /// Width of the new surface.
        width: f32,
        /// Height of the new surface.
        height: f32,
    },
    /// The entire application is exiting.
    End,
}

/// Main entrypoint
pub async fn run() -> Result<()> {
    let cli_args = CliArgs::parse();
    let mut config = Config::load(cli_args.config.as_deref())?;
    config.apply_cli_overrides(&cli_args);
    setup_logging(&config)?;

    tracing::info!("Starting driftfield");
    tracing::debug!("Loaded config: {config:?}");

    let environment = Environment::detect(&config)?;
    tracing::debug!("Environment snapshot: {environment:?}");

    // The preference is snapshotted exactly once: when it's set the field is simply never
    // constructed and the terminal is left alone.
    if environment.reduced_motion {
        tracing::info!("Reduced motion preference is set, not animating anything");
        return Ok(());
    }

    let (protocol_tx, _) = tokio::sync::broadcast::channel(1024);
    let input_thread_handle = crate::input::Input::start(protocol_tx.clone());

    let result = crate::field::main::start(protocol_tx.clone(), &config, &environment).await;
    broadcast_protocol_end(&protocol_tx);

    if input_thread_handle.is_finished() {
        // The STDIN loop can't exit of its own accord, so it's only joinable when it finished
        // because of its own error.
        input_thread_handle
            .join()
            .map_err(|err| color_eyre::eyre::eyre!("STDIN handle: {err:?}"))??;
    }

    tracing::trace!("Leaving driftfield's main `run()` function");
    result
}

/// Signal all task/thread loops to exit.
///
/// We keep it in its own function because we need to handle the error separately. If the error
/// were to be bubbled with `?` as usual, there's a chance it would never be logged, because the
/// protocol end signal is itself what allows the central error handler to even be reached.
pub(crate) fn broadcast_protocol_end(protocol_tx: &tokio::sync::broadcast::Sender<Protocol>) {
    tracing::debug!("Broadcasting the protocol `End` message to all listeners");
    let result = protocol_tx.send(Protocol::End);
    if let Err(error) = result {
        tracing::error!("{error:?}");
    }
}

/// Setup logging
fn setup_logging(config: &Config) -> Result<()> {
    let are_log_filters_manually_set = std::env::var("DRIFTFIELD_LOG").is_ok();

    let is_loggable = !matches!(config.log_level, crate::config::LogLevel::Off)
        || are_log_filters_manually_set;
    if !is_loggable {
        return Ok(());
    }

    let directory = config
        .log_path
        .parent()
        .context("Couldn't get log path's parent")?;
    std::fs::create_dir_all(directory)?;
    let file = std::fs::File::create(&config.log_path)?;

    let level_as_string = format!("{:?}", config.log_level).to_lowercase();
    let filters = if are_log_filters_manually_set {
        if let Ok(user_filters) = std::env::var("DRIFTFIELD_LOG") {
            std::env::set_var("RUST_LOG", user_filters);
        }

        tracing_subscriber::EnvFilter::builder()
            .with_default_directive("error".parse()?)
            .from_env_lossy()
    } else {
        tracing_subscriber::EnvFilter::builder()
            .with_default_directive("off".parse()?)
            .from_env_lossy()
            .add_directive(format!("driftfield={level_as_string}").parse()?)
    };

    let logfile_layer = tracing_subscriber::fmt::layer()
        .with_writer(file)
        .with_filter(filters);

    tracing_subscriber::registry().with(logfile_layer).init();

    Ok(())
}
