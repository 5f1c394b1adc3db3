//! Shared state and behaviour useful to all effects.

use color_eyre::eyre::Result;

/// Shared state and behaviour useful to all effects.
pub struct Effecter {
    /// A unique identifier.
    pub id: String,
    /// A channel to send finished frames on.
    pub output_channel: tokio::sync::mpsc::Sender<crate::run::FrameUpdate>,
    /// The canvas on which this effect's frames are drawn.
    pub canvas: crate::canvas::PixelCanvas,
    /// TTY width
    pub width: u16,
    /// TTY height
    pub height: u16,
    /// The target frame rate.
    pub frame_rate: u32,
    /// The time at which the previous frame was rendered.
    pub last_frame_tick: std::time::Instant,
}

impl Effecter {
    /// Instantiate
    pub fn new(
        id: String,
        output_channel: tokio::sync::mpsc::Sender<crate::run::FrameUpdate>,
    ) -> Self {
        Self {
            id,
            output_channel,
            canvas: crate::canvas::PixelCanvas::new(0, 0),
            width: 0,
            height: 0,
            frame_rate: 30,
            last_frame_tick: std::time::Instant::now(),
        }
    }

    /// Is the effect ready to be drawn?
    pub const fn is_ready(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// The pixel dimensions of the effect's surface: every terminal cell is 2 pixels tall.
    #[must_use]
    pub fn canvas_size(&self) -> (usize, usize) {
        (usize::from(self.width), usize::from(self.height) * 2)
    }

    /// Create an empty canvas matching the current TTY size.
    pub fn initialise_canvas(&mut self) {
        let (width, height) = self.canvas_size();
        self.canvas = crate::canvas::PixelCanvas::new(width, height);
    }

    /// Keep track of the size of the user's terminal.
    pub const fn set_tty_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
    }

    /// Handle the protocol messages every effect needs to react to, like resizing and config
    /// reloads.
    pub fn handle_common_protocol_messages(&mut self, message: crate::run::Protocol) -> Result<()> {
        tracing::trace!("'{}' effect received protocol message: {message:?}", self.id);

        #[expect(
            clippy::wildcard_enum_match_arm,
            reason = "We're just handling the common cases here."
        )]
        match message {
            crate::run::Protocol::Resize { width, height } => {
                self.set_tty_size(width, height);
            }
            crate::run::Protocol::Config(config) => self.frame_rate = config.frame_rate,
            _ => (),
        }

        Ok(())
    }

    /// Send the finished frame to the main renderer.
    pub fn send_output(&self) -> Result<()> {
        let result = self
            .output_channel
            .try_send(crate::run::FrameUpdate::EffectFrame(self.canvas.clone()));

        match result {
            Ok(()) => (),
            Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {
                // The renderer is behind. Dropping a cosmetic frame is better than queueing it.
                tracing::trace!("'{}' effect dropped a frame", self.id);
            }
            Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => {
                // The renderer only goes away at shutdown, the `End` message is on its way.
                tracing::debug!("'{}' effect's output channel closed", self.id);
            }
        }

        Ok(())
    }

    /// Sleep until the next frame render is due.
    pub async fn sleep_until_next_frame_tick(&mut self) {
        let frame_rate = u64::from(self.frame_rate.max(1));
        let target = crate::renderer::ONE_MICROSECOND.wrapping_div(frame_rate);
        let target_frame_rate_micro = std::time::Duration::from_micros(target);
        if let Some(wait) = target_frame_rate_micro.checked_sub(self.last_frame_tick.elapsed()) {
            tokio::time::sleep(wait).await;
        }
        self.last_frame_tick = std::time::Instant::now();
    }
}
