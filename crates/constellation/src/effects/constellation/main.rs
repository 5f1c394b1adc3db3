//! Dots drift inside the terminal, bounce off its edges, and nearby dots are joined by lines
//! that fade with separation. The same night-sky effect that decorates a thousand landing
//! pages, except in your terminal.

use std::sync::Arc;

use color_eyre::eyre::Result;

use super::field::Field;
use crate::canvas::Canvas as _;
use crate::effects::effecter::Effecter;
use crate::shared_state::SharedState;

/// `Constellation`
pub struct Constellation {
    /// The base effect struct.
    effecter: Effecter,
    /// The dot field simulation.
    field: Field,
    /// How many frames have been rendered so far.
    frame_count: u64,
    /// Stop by ourselves after this many frames.
    max_frames: Option<u64>,
}

impl Constellation {
    /// Instantiate
    async fn new(
        state: &Arc<SharedState>,
        output: tokio::sync::mpsc::Sender<crate::run::FrameUpdate>,
        max_frames: Option<u64>,
    ) -> Result<Self> {
        let config = state.config.read().await.clone();
        let tty_size = state.get_tty_size().await;

        let mut effecter = Effecter::new("constellation".to_owned(), output);
        effecter.frame_rate = config.frame_rate;
        effecter.set_tty_size(tty_size.width, tty_size.height);
        effecter.initialise_canvas();

        Ok(Self {
            effecter,
            field: Field::new(config.constellation)?,
            frame_count: 0,
            max_frames,
        })
    }

    /// Our main entrypoint.
    pub async fn start(
        state: Arc<SharedState>,
        output: tokio::sync::mpsc::Sender<crate::run::FrameUpdate>,
        max_frames: Option<u64>,
    ) -> Result<()> {
        let mut constellation = Self::new(&state, output, max_frames).await?;
        let mut protocol = state.protocol_tx.subscribe();

        #[expect(
            clippy::integer_division_remainder_used,
            reason = "This is caused by the `tokio::select!`"
        )]
        loop {
            tokio::select! {
                () = constellation.effecter.sleep_until_next_frame_tick() => {
                    constellation.render()?;
                    if constellation.is_frame_budget_spent() {
                        tracing::debug!("Frame budget spent, broadcasting the protocol `End` message");
                        crate::run::broadcast_protocol_end(&state.protocol_tx);
                        break;
                    }
                },
                Ok(message) = protocol.recv() => {
                    if matches!(message, crate::run::Protocol::End) {
                        break;
                    }
                    constellation.handle_protocol_message(message)?;
                }
            }
        }

        Ok(())
    }

    /// Resizes and config reloads both restart the field from scratch. Dots are cheap to
    /// make, and no dot's identity is worth reflow maths on a decoration.
    fn handle_protocol_message(&mut self, message: crate::run::Protocol) -> Result<()> {
        self.effecter
            .handle_common_protocol_messages(message.clone())?;

        #[expect(
            clippy::wildcard_enum_match_arm,
            reason = "The rest of the protocol is already handled by the effecter."
        )]
        match message {
            crate::run::Protocol::Resize { .. } => {
                self.effecter.initialise_canvas();
                self.reset_field();
            }
            crate::run::Protocol::Config(config) => match Field::new(config.constellation) {
                Ok(field) => {
                    self.field = field;
                    self.reset_field();
                }
                // A typo'd colour in a live-edited config file shouldn't kill the animation.
                Err(error) => tracing::error!("Ignoring reloaded config: {error:?}"),
            },
            _ => (),
        }

        Ok(())
    }

    /// Scatter a fresh field over the current canvas.
    #[expect(
        clippy::cast_precision_loss,
        clippy::as_conversions,
        reason = "Terminal dimensions are nowhere near f32's integer limit"
    )]
    fn reset_field(&mut self) {
        let (width, height) = self.effecter.canvas_size();
        self.field.reset(width as f32, height as f32);
    }

    /// One frame of the effect: move everything, then draw everything.
    fn render(&mut self) -> Result<()> {
        if !self.effecter.is_ready() {
            return Ok(());
        }

        if !self.field.is_ready() {
            self.reset_field();
        }

        self.effecter.canvas.clear();
        self.field.advance();
        self.field.draw(&mut self.effecter.canvas);

        self.frame_count = self.frame_count.saturating_add(1);
        self.effecter.send_output()
    }

    /// Has the `--max-frames` budget been used up?
    fn is_frame_budget_spent(&self) -> bool {
        self.max_frames
            .is_some_and(|max_frames| self.frame_count >= max_frames)
    }
}
