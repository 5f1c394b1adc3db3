//! Main entrypoint for running Constellation

use std::sync::Arc;

use clap::Parser as _;
use color_eyre::eyre::{ContextCompat as _, Result};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, Layer as _};

use crate::cli_args::CliArgs;
use crate::renderer::Renderer;
use crate::shared_state::SharedState;

/// The message type of the frames channel. The renderer reacts to these as they arrive rather
/// than polling on its own clock.
#[non_exhaustive]
pub enum FrameUpdate {
    /// A finished frame of an effect's pixel canvas.
    EffectFrame(crate::canvas::PixelCanvas),
}

/// Commands to control the various tasks/threads
#[non_exhaustive]
#[derive(Clone, Debug)]
pub enum Protocol {
    /// The entire application is exiting.
    End,
    /// User's TTY is resized.
    Resize {
        /// Width of new terminal.
        width: u16,
        /// Height of new terminal.
        height: u16,
    },
    /// Constellation's configuration.
    Config(crate::config::Config),
}

/// Main entrypoint
pub async fn run(state_arc: &Arc<SharedState>) -> Result<()> {
    let protocol_tx = state_arc.protocol_tx.clone();
    let cli_args = setup(state_arc).await?;

    let (renderer, frames_tx) = Renderer::start(Arc::clone(state_arc), protocol_tx.clone());
    let config_handle = crate::config::Config::watch(Arc::clone(state_arc));
    let input_thread_handle = crate::raw_input::RawInput::start(protocol_tx.clone());

    let result = crate::effects::constellation::main::Constellation::start(
        Arc::clone(state_arc),
        frames_tx,
        cli_args.max_frames,
    )
    .await;
    tracing::debug!("Left the effect loop, exiting Constellation...");
    broadcast_protocol_end(&protocol_tx);

    if input_thread_handle.is_finished() {
        // The STDIN loop blocks on `read()`, so it can't listen to the global protocol and exit
        // its loop. Therefore we should only join it if it finished of its own accord.
        input_thread_handle
            .join()
            .map_err(|err| color_eyre::eyre::eyre!("STDIN handle: {err:?}"))??;
    }
    renderer.await??;
    config_handle.await??;

    tracing::trace!("Leaving Constellation's main `run()` function");
    result
}

/// Signal all task/thread loops to exit.
///
/// We keep it in its own function because we need to handle the error separately. If the error
/// were to be bubbled with `?` as usual, there's a chance it would never be logged, because the
/// protocol end signal is itself what allows the central error handler to even be reached.
pub fn broadcast_protocol_end(protocol_tx: &tokio::sync::broadcast::Sender<Protocol>) {
    tracing::debug!("Broadcasting the protocol `End` message to all listeners");
    let result = protocol_tx.send(Protocol::End);
    if let Err(error) = result {
        tracing::error!("{error:?}");
    }
}

/// Prepare the application to start.
async fn setup(state: &Arc<SharedState>) -> Result<CliArgs> {
    let cli_args = CliArgs::parse();

    let directory_result =
        crate::config::Config::setup_directory(cli_args.config_dir.clone(), state).await;
    if let Err(directory_error) = directory_result {
        color_eyre::eyre::bail!("Error setting up config directory: {directory_error:?}");
    }

    let config_result = crate::config::Config::load_config_into_shared_state(state).await;
    if let Err(config_error) = config_result {
        let path = crate::config::Config::main_config_path(state).await;
        color_eyre::eyre::bail!(
            "Bad config file: {config_error:?}\n\nConfig path: {}",
            path.display()
        );
    }

    setup_logging(cli_args.clone(), state).await?;

    if let Some(frame_rate) = cli_args.frame_rate {
        state.config.write().await.frame_rate = frame_rate;
    }

    // Assuming true colour makes the renderer simpler, and the vast majority of terminals
    // that anyone would run eye-candy in have it anyway.
    std::env::set_var("COLORTERM", "truecolor");

    tracing::info!("Starting Constellation");
    tracing::debug!("Loaded config: {:?}", state.config.read().await);

    let tty_size = Renderer::get_users_tty_size()?;
    state
        .set_tty_size(tty_size.cols.try_into()?, tty_size.rows.try_into()?)
        .await;

    Ok(cli_args)
}

/// Setup logging
async fn setup_logging(cli_args: CliArgs, state: &Arc<SharedState>) -> Result<()> {
    let are_log_filters_manually_set = std::env::var("CONSTELLATION_LOG").is_ok();
    let mut path = state.config.read().await.log_path.clone();

    if let Some(cli_override_path) = cli_args.log_path {
        path = cli_override_path;
    }

    let mut level = state.config.read().await.log_level.clone();
    if let Some(cli_override_level) = cli_args.log_level {
        level = cli_override_level;
    }
    let level_as_string = format!("{level:?}").to_lowercase();

    let is_loggable =
        !matches!(level, crate::config::LogLevel::Off) || are_log_filters_manually_set;

    if !is_loggable {
        return Ok(());
    }

    let directory = path.parent().context("Couldn't get log path's parent")?;
    std::fs::create_dir_all(directory)?;
    let file = std::fs::File::create(path)?;

    let filters = if are_log_filters_manually_set {
        if let Ok(user_filters) = std::env::var("CONSTELLATION_LOG") {
            std::env::set_var("RUST_LOG", user_filters);
        }

        tracing_subscriber::EnvFilter::builder()
            .with_default_directive("error".parse()?)
            .from_env_lossy()
    } else {
        tracing_subscriber::EnvFilter::builder()
            .with_default_directive("off".parse()?)
            .from_env_lossy()
            .add_directive(format!("constellation={level_as_string}").parse()?)
    };

    let logfile_layer = tracing_subscriber::fmt::layer()
        .with_writer(file)
        .with_filter(filters);

    tracing_subscriber::registry().with(logfile_layer).init();

    let mut is_logging = state.is_logging.write().await;
    *is_logging = true;
    drop(is_logging);

    Ok(())
}
