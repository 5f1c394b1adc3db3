//! Render the effect frames to the user's terminal

use std::sync::Arc;

use color_eyre::eyre::Result;
use tokio::sync::mpsc;

use termwiz::surface::Surface as TermwizSurface;
use termwiz::surface::{Change as TermwizChange, Position as TermwizPosition};
use termwiz::terminal::buffered::BufferedTerminal;
use termwiz::terminal::{ScreenSize, Terminal as TermwizTerminal};

use crate::canvas::{Colour, PixelCanvas};
use crate::run::FrameUpdate;
use crate::shared_state::SharedState;

/// The number of microseconds in a second.
pub const ONE_MICROSECOND: u64 = 1_000_000;

/// This is the colour a translucent pixel is blended onto before it reaches the terminal.
/// Most terminals use a dark theme, so when alpha blending, say that the default background
/// is pure black. `BufferedTerminal` ignores alpha values in colour attributes, so the
/// blending has to happen on our side.
pub const DEFAULT_BACKGROUND: Colour = (0.0, 0.0, 0.0, 1.0);

/// A pixel needs at least this much alpha to be worth a cell change.
const VISIBLE_ALPHA: f32 = 0.001;

/// `Render`
pub struct Renderer {
    /// Shared app state
    pub state: Arc<SharedState>,
    /// The terminal's width
    pub width: u16,
    /// The terminal's height
    pub height: u16,
}

impl Renderer {
    /// Create a renderer to render to a user's terminal
    fn new(state: Arc<SharedState>) -> Result<Self> {
        let mut renderer = Self {
            state,
            width: Default::default(),
            height: Default::default(),
        };

        let size = Self::get_users_tty_size()?;
        renderer.width = size.cols.try_into()?;
        renderer.height = size.rows.try_into()?;

        Ok(renderer)
    }

    /// Instantiate and run in its own Tokio task. Returns the task's handle and the channel
    /// on which effects should send their finished frames.
    pub fn start(
        state: Arc<SharedState>,
        protocol_tx: tokio::sync::broadcast::Sender<crate::run::Protocol>,
    ) -> (
        tokio::task::JoinHandle<Result<()>>,
        mpsc::Sender<FrameUpdate>,
    ) {
        let (frames_tx, frames_rx) = mpsc::channel(16);
        let protocol_rx = protocol_tx.subscribe();
        let handle = tokio::spawn(async move {
            match Self::new(Arc::clone(&state)) {
                Ok(mut renderer) => {
                    let result = renderer
                        .run(frames_rx, protocol_rx, protocol_tx.clone())
                        .await;

                    if let Err(error) = result {
                        crate::run::broadcast_protocol_end(&protocol_tx);
                        return Err(error);
                    };
                }
                Err(error) => {
                    crate::run::broadcast_protocol_end(&protocol_tx);
                    return Err(error);
                }
            };

            Ok(())
        });

        (handle, frames_tx)
    }

    /// We need this just because I can't figure out how to pass `Box<dyn Terminal>` to
    /// `BufferedTerminal::new()`
    fn get_termwiz_terminal() -> Result<impl TermwizTerminal> {
        let capabilities = termwiz::caps::Capabilities::new_from_env()?;
        Ok(termwiz::terminal::new_terminal(capabilities)?)
    }

    /// Just for initialisation
    pub fn get_users_tty_size() -> Result<ScreenSize> {
        let mut terminal = Self::get_termwiz_terminal()?;
        Ok(terminal.get_screen_size()?)
    }

    /// Get the user's current terminal size and propagate it
    async fn handle_resize<T: TermwizTerminal + Send>(
        &mut self,
        composited_terminal: &mut BufferedTerminal<T>,
        protocol_tx: &tokio::sync::broadcast::Sender<crate::run::Protocol>,
    ) -> Result<()> {
        let is_resized = composited_terminal.check_for_resize()?;
        if !is_resized {
            return Ok(());
        }

        composited_terminal.repaint()?;

        let (width, height) = composited_terminal.dimensions();
        self.width = width.try_into()?;
        self.height = height.try_into()?;
        self.state.set_tty_size(self.width, self.height).await;
        protocol_tx.send(crate::run::Protocol::Resize {
            width: self.width,
            height: self.height,
        })?;

        Ok(())
    }

    /// Listen for frame updates from the effects.
    /// It lives in its own method so that we can catch any errors and ensure that the user's
    /// terminal is always returned to cooked mode.
    async fn run(
        &mut self,
        mut frames: mpsc::Receiver<FrameUpdate>,
        mut protocol_rx: tokio::sync::broadcast::Receiver<crate::run::Protocol>,
        protocol_tx: tokio::sync::broadcast::Sender<crate::run::Protocol>,
    ) -> Result<()> {
        tracing::debug!("Putting user's terminal into raw mode");
        let mut copy_of_users_terminal = Self::get_termwiz_terminal()?;
        copy_of_users_terminal.set_raw_mode()?;
        let mut composited_terminal = BufferedTerminal::new(copy_of_users_terminal)?;
        composited_terminal.add_change(TermwizChange::CursorVisibility(
            termwiz::surface::CursorVisibility::Hidden,
        ));
        composited_terminal.flush()?;

        tracing::debug!("Starting render loop");
        #[expect(
            clippy::integer_division_remainder_used,
            reason = "`tokio::select!` generates this."
        )]
        loop {
            tokio::select! {
                Some(update) = frames.recv() => {
                    self.handle_resize(&mut composited_terminal, &protocol_tx).await?;
                    self.render(&update, &mut composited_terminal)?;
                }
                Ok(message) = protocol_rx.recv() => {
                    if matches!(message, crate::run::Protocol::End) {
                        break;
                    }
                }
            }
        }
        tracing::debug!("Exited render loop");

        composited_terminal.add_change(TermwizChange::CursorVisibility(
            termwiz::surface::CursorVisibility::Visible,
        ));
        composited_terminal.flush()?;

        tracing::debug!("Setting user's terminal to cooked mode");
        composited_terminal.terminal().set_cooked_mode()?;

        Ok(())
    }

    /// Do a single render to the user's actual terminal. `BufferedTerminal` uses a diffing
    /// algorithm to make the minimum number of changes.
    fn render(
        &self,
        update: &FrameUpdate,
        composited_terminal: &mut BufferedTerminal<impl TermwizTerminal + Send>,
    ) -> Result<()> {
        let FrameUpdate::EffectFrame(canvas) = update;
        let frame = Self::canvas_to_cells(canvas, self.width, self.height);

        composited_terminal.draw_from_screen(&frame, 0, 0);
        composited_terminal.flush()?;

        Ok(())
    }

    /// Convert a canvas of pixels into a surface of terminal cells. Every cell stacks 2
    /// pixels with the UTF8 half-block trick: the upper "pixel" is the cell's foreground
    /// colour on a "▀" and the lower "pixel" is its background colour. Cells where both
    /// pixels are invisible are left untouched so the terminal's own background shows.
    fn canvas_to_cells(canvas: &PixelCanvas, width: u16, height: u16) -> TermwizSurface {
        let mut frame = TermwizSurface::new(width.into(), height.into());
        for row in 0..usize::from(height) {
            for col in 0..usize::from(width) {
                let upper = canvas.pixel(col, row * 2);
                let lower = canvas.pixel(col, row * 2 + 1);
                let is_upper_visible = upper.3 > VISIBLE_ALPHA;
                let is_lower_visible = lower.3 > VISIBLE_ALPHA;

                if !is_upper_visible && !is_lower_visible {
                    continue;
                }

                frame.add_change(TermwizChange::CursorPosition {
                    x: TermwizPosition::Absolute(col),
                    y: TermwizPosition::Absolute(row),
                });

                if is_upper_visible && is_lower_visible {
                    frame.add_changes(vec![
                        Self::make_fg_colour(Self::over_terminal_background(upper)),
                        Self::make_bg_colour(Self::over_terminal_background(lower)),
                    ]);
                    frame.add_change("▀");
                    continue;
                }

                // Only one of the pair is visible, so the other half of the cell keeps the
                // terminal's default background.
                let (character, colour) = if is_upper_visible {
                    ("▀", upper)
                } else {
                    ("▄", lower)
                };
                frame.add_changes(vec![
                    Self::make_fg_colour(Self::over_terminal_background(colour)),
                    TermwizChange::Attribute(termwiz::cell::AttributeChange::Background(
                        termwiz::color::ColorAttribute::Default,
                    )),
                ]);
                frame.add_change(character);
            }
        }

        frame
    }

    /// Flatten a translucent pixel onto the assumed terminal background.
    #[must_use]
    fn over_terminal_background(colour: Colour) -> Colour {
        crate::canvas::blend_over(colour, DEFAULT_BACKGROUND)
    }

    /// Make a Termwiz colour attribute
    #[must_use]
    pub const fn make_colour_attribute(colour: Colour) -> termwiz::color::ColorAttribute {
        // `BufferedTerminal` seems to completely ignore any colour that has an alpha value
        // below 1.0, so the alpha is pinned here and blended beforehand.
        termwiz::color::ColorAttribute::TrueColorWithDefaultFallback(termwiz::color::SrgbaTuple(
            colour.0, colour.1, colour.2, 1.0,
        ))
    }

    /// Make a Termwiz background colour
    #[must_use]
    pub const fn make_bg_colour(colour: Colour) -> TermwizChange {
        let colour_attribute = Self::make_colour_attribute(colour);
        TermwizChange::Attribute(termwiz::cell::AttributeChange::Background(colour_attribute))
    }

    /// Make a Termwiz foreground colour
    #[must_use]
    pub const fn make_fg_colour(colour: Colour) -> TermwizChange {
        let colour_attribute = Self::make_colour_attribute(colour);
        TermwizChange::Attribute(termwiz::cell::AttributeChange::Foreground(colour_attribute))
    }
}

#[expect(
    clippy::indexing_slicing,
    clippy::default_numeric_fallback,
    reason = "Tests aren't so strict"
)]
