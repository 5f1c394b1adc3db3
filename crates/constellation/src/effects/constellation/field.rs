//! All the maths for the dot field: drift, edge reflection and proximity links.

use color_eyre::eyre::Result;
use glam::Vec2;
use rand::Rng as _;

use super::config::Config;
use crate::canvas::{Canvas, Colour};

/// A single drifting dot.
#[derive(Clone, Debug)]
pub struct Dot {
    /// Position in canvas pixels.
    pub position: Vec2,
    /// Drift per frame, in pixels. Deliberately unscaled by elapsed time: the field runs a
    /// little faster on faster displays and that's fine for decoration.
    pub velocity: Vec2,
    /// Radius of the rendered dot.
    pub radius: f32,
}

impl Dot {
    /// Scatter a new dot uniformly over the surface.
    fn random(width: f32, height: f32) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            position: Vec2::new(uniform(&mut rng, width), uniform(&mut rng, height)),
            velocity: Vec2::new(rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5)),
            radius: rng.gen_range(0.0..1.5),
        }
    }
}

/// `gen_range` panics on an empty range, and a zero-sized surface is legal: it just clusters
/// every dot at the origin.
fn uniform(rng: &mut impl rand::Rng, limit: f32) -> f32 {
    if limit > 0.0 {
        rng.gen_range(0.0..limit)
    } else {
        0.0
    }
}

/// The dot field itself.
pub struct Field {
    /// Width of the surface in pixels.
    pub width: f32,
    /// Height of the surface in pixels.
    pub height: f32,
    /// All the dots.
    pub dots: Vec<Dot>,
    /// The field's user config.
    config: Config,
    /// The colour dots are filled with.
    dot_colour: Colour,
    /// The colour of a joining line at zero separation.
    link_colour: Colour,
}

impl Field {
    /// Instantiate an empty field. It renders nothing until the first [`Self::reset`].
    pub fn new(config: Config) -> Result<Self> {
        let dot_colour = config.colour_at(config.dot_opacity)?;
        let link_colour = config.colour_at(1.0)?;
        Ok(Self {
            width: 0.0,
            height: 0.0,
            dots: Vec::default(),
            config,
            dot_colour,
            link_colour,
        })
    }

    /// Has the field been given a surface yet?
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// How many dots a surface of the given width gets. Wide surfaces can carry a denser
    /// field without the links becoming a solid web.
    fn density(&self, width: f32) -> usize {
        if width > self.config.wide_surface_threshold {
            self.config.dense_count
        } else {
            self.config.sparse_count
        }
    }

    /// Throw away the current dots and scatter a fresh set over the given surface. Dots are
    /// cheap to make, so a resize restarts the field rather than reflowing it.
    pub fn reset(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
        self.dots = (0..self.density(width))
            .map(|_| Dot::random(width, height))
            .collect();
        tracing::debug!(
            "Field reset: {} dots over {width}x{height}",
            self.dots.len()
        );
    }

    /// Drift every dot one step and reverse any that left the surface.
    ///
    /// Positions are never clamped: a dot can render one frame out of bounds before its
    /// reversed velocity carries it back. That soft edge reads better than dots sticking to
    /// the border.
    pub fn advance(&mut self) {
        for dot in &mut self.dots {
            dot.position += dot.velocity;
            if dot.position.x < 0.0 || dot.position.x > self.width {
                dot.velocity.x = -dot.velocity.x;
            }
            if dot.position.y < 0.0 || dot.position.y > self.height {
                dot.velocity.y = -dot.velocity.y;
            }
        }
    }

    /// Draw one frame: every dot as a filled circle, then the joining lines. All movement for
    /// the frame has already happened by the time the first circle lands.
    pub fn draw(&self, canvas: &mut impl Canvas) {
        for dot in &self.dots {
            canvas.fill_circle(dot.position, dot.radius, self.dot_colour);
        }
        self.link(canvas);
    }

    /// Join every pair of dots closer than `link_distance` with a line whose opacity fades
    /// linearly to nothing at the threshold.
    ///
    /// The inner iterator starts at the outer index, so every unordered pair is considered
    /// exactly once. That includes each dot paired with itself: a zero-length segment
    /// underneath its own circle, which costs nothing and draws nothing new.
    fn link(&self, canvas: &mut impl Canvas) {
        for (index, dot) in self.dots.iter().enumerate() {
            for other in self.dots.iter().skip(index) {
                let separation = dot.position.distance(other.position);
                if separation < self.config.link_distance {
                    let fade = 1.0 - separation / self.config.link_distance;
                    let colour = (
                        self.link_colour.0,
                        self.link_colour.1,
                        self.link_colour.2,
                        self.link_colour.3 * fade,
                    );
                    canvas.stroke_line(
                        dot.position,
                        other.position,
                        self.config.link_width,
                        colour,
                    );
                }
            }
        }
    }
}

#[expect(
    clippy::default_numeric_fallback,
    clippy::indexing_slicing,
    reason = "Tests aren't so strict"
)]
#[cfg(test)]
mod tests {
    use super::*;

    /// A canvas that records what was asked of it instead of rasterising anything.
    #[derive(Default)]
    struct RecordingCanvas {
        clears: usize,
        circles: Vec<(Vec2, f32, Colour)>,
        lines: Vec<(Vec2, Vec2, f32, Colour)>,
    }

    impl Canvas for RecordingCanvas {
        fn width(&self) -> f32 {
            1000.0
        }

        fn height(&self) -> f32 {
            800.0
        }

        fn clear(&mut self) {
            self.clears += 1;
        }

        fn fill_circle(&mut self, centre: Vec2, radius: f32, colour: Colour) {
            self.circles.push((centre, radius, colour));
        }

        fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, colour: Colour) {
            self.lines.push((from, to, width, colour));
        }
    }

    fn make_field() -> Field {
        Field::new(Config::default()).unwrap()
    }

    fn dot_at(x: f32, y: f32, velocity_x: f32, velocity_y: f32) -> Dot {
        Dot {
            position: Vec2::new(x, y),
            velocity: Vec2::new(velocity_x, velocity_y),
            radius: 1.0,
        }
    }

    #[test]
    fn density_is_two_tiered() {
        let mut field = make_field();
        field.reset(1000.0, 800.0);
        assert_eq!(field.dots.len(), 100);
        field.reset(768.0, 800.0);
        assert_eq!(field.dots.len(), 40);
        field.reset(769.0, 800.0);
        assert_eq!(field.dots.len(), 100);
        field.reset(80.0, 48.0);
        assert_eq!(field.dots.len(), 40);
    }

    #[test]
    fn reset_scatters_within_bounds() {
        let mut field = make_field();
        field.reset(1000.0, 800.0);
        assert_eq!(field.dots.len(), 100);
        for dot in &field.dots {
            assert!((0.0..1000.0).contains(&dot.position.x));
            assert!((0.0..800.0).contains(&dot.position.y));
            assert!((-0.5..0.5).contains(&dot.velocity.x));
            assert!((-0.5..0.5).contains(&dot.velocity.y));
            assert!((0.0..1.5).contains(&dot.radius));
        }
    }

    #[test]
    fn reset_count_is_stable_for_a_given_width() {
        let mut field = make_field();
        field.reset(500.0, 500.0);
        let first_count = field.dots.len();
        field.reset(500.0, 500.0);
        assert_eq!(field.dots.len(), first_count);
    }

    #[test]
    fn zero_sized_surfaces_are_legal() {
        let mut field = make_field();
        field.reset(0.0, 0.0);
        assert_eq!(field.dots.len(), 40);
        for dot in &field.dots {
            assert_eq!(dot.position, Vec2::ZERO);
        }
    }

    #[test]
    fn dots_drift_by_their_velocity() {
        let mut field = make_field();
        field.reset(1000.0, 800.0);
        field.dots = vec![dot_at(100.0, 200.0, 0.25, -0.25)];
        field.advance();
        assert_eq!(field.dots[0].position, Vec2::new(100.25, 199.75));
        assert_eq!(field.dots[0].velocity, Vec2::new(0.25, -0.25));
    }

    #[test]
    fn n_frames_of_drift_accumulate_exactly() {
        let mut field = make_field();
        field.reset(1000.0, 800.0);
        field.dots = vec![dot_at(100.0, 200.0, 0.25, -0.125)];
        for _ in 0..10 {
            field.advance();
        }
        assert_eq!(field.dots[0].position, Vec2::new(102.5, 198.75));
    }

    #[test]
    fn dots_reflect_off_the_left_edge() {
        let mut field = make_field();
        field.reset(1000.0, 800.0);
        field.dots = vec![dot_at(0.0, 400.0, -0.3, 0.1)];

        field.advance();
        assert!(field.dots[0].position.x < 0.0);
        assert!((field.dots[0].velocity.x - 0.3).abs() < f32::EPSILON);

        // The reversed velocity carries it back onto the surface.
        field.advance();
        assert!(field.dots[0].position.x >= 0.0);
    }

    #[test]
    fn dots_reflect_off_the_right_and_bottom_edges() {
        let mut field = make_field();
        field.reset(1000.0, 800.0);
        field.dots = vec![dot_at(999.9, 799.9, 0.4, 0.4)];

        field.advance();
        assert!((field.dots[0].velocity.x + 0.4).abs() < f32::EPSILON);
        assert!((field.dots[0].velocity.y + 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn inbound_dots_are_left_alone() {
        let mut field = make_field();
        field.reset(1000.0, 800.0);
        field.dots = vec![dot_at(500.0, 400.0, 0.5, -0.5)];
        for _ in 0..100 {
            field.advance();
        }
        assert!((field.dots[0].velocity.x - 0.5).abs() < f32::EPSILON);
        assert!((field.dots[0].velocity.y + 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn links_fade_linearly_with_separation() {
        let mut field = make_field();
        field.reset(1000.0, 800.0);
        field.dots = vec![dot_at(100.0, 100.0, 0.0, 0.0), dot_at(190.0, 100.0, 0.0, 0.0)];

        let mut canvas = RecordingCanvas::default();
        field.draw(&mut canvas);

        assert_eq!(canvas.circles.len(), 2);
        let pair_lines: Vec<_> = canvas.lines.iter().filter(|line| line.0 != line.1).collect();
        assert_eq!(pair_lines.len(), 1);
        // 90 pixels apart with a 150 pixel threshold: 1 - 90/150.
        assert!((pair_lines[0].3 .3 - 0.4).abs() < 1e-5);
        assert!((pair_lines[0].2 - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn distant_dots_are_not_linked() {
        let mut field = make_field();
        field.reset(1000.0, 800.0);
        // Exactly at the threshold: the comparison is strict, so no line.
        field.dots = vec![dot_at(100.0, 100.0, 0.0, 0.0), dot_at(250.0, 100.0, 0.0, 0.0)];

        let mut canvas = RecordingCanvas::default();
        field.draw(&mut canvas);

        let pair_lines: Vec<_> = canvas.lines.iter().filter(|line| line.0 != line.1).collect();
        assert!(pair_lines.is_empty());
    }

    #[test]
    fn coincident_dots_link_at_full_opacity() {
        let mut field = make_field();
        field.reset(1000.0, 800.0);
        field.dots = vec![dot_at(300.0, 300.0, 0.0, 0.0), dot_at(300.0, 300.0, 0.0, 0.0)];

        let mut canvas = RecordingCanvas::default();
        field.draw(&mut canvas);

        // Two self-pairs and the coincident pair, all at zero separation.
        assert_eq!(canvas.lines.len(), 3);
        for line in &canvas.lines {
            assert!((line.3 .3 - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn every_unordered_pair_is_considered_once() {
        let mut field = make_field();
        field.reset(1000.0, 800.0);
        field.dots = vec![
            dot_at(100.0, 100.0, 0.0, 0.0),
            dot_at(110.0, 100.0, 0.0, 0.0),
            dot_at(100.0, 110.0, 0.0, 0.0),
        ];

        let mut canvas = RecordingCanvas::default();
        field.draw(&mut canvas);

        // Three self-pairs plus three distinct pairs, all within the threshold.
        assert_eq!(canvas.lines.len(), 6);
    }

    #[test]
    fn dots_are_drawn_with_the_configured_fill() {
        let mut field = make_field();
        field.reset(1000.0, 800.0);
        field.dots = vec![dot_at(10.0, 10.0, 0.0, 0.0)];

        let mut canvas = RecordingCanvas::default();
        field.draw(&mut canvas);

        assert_eq!(canvas.circles.len(), 1);
        let (centre, radius, colour) = canvas.circles[0];
        assert_eq!(centre, Vec2::new(10.0, 10.0));
        assert!((radius - 1.0).abs() < f32::EPSILON);
        assert_eq!(colour, (1.0, 1.0, 1.0, 0.8));
        // Clearing is the frame loop's job, not the field's.
        assert_eq!(canvas.clears, 0);
    }

    #[test]
    fn a_lone_dot_only_links_to_itself() {
        let mut field = make_field();
        field.reset(1000.0, 800.0);
        field.dots = vec![dot_at(50.0, 50.0, 0.0, 0.0)];

        let mut canvas = RecordingCanvas::default();
        field.draw(&mut canvas);

        assert_eq!(canvas.lines.len(), 1);
        assert_eq!(canvas.lines[0].0, canvas.lines[0].1);
    }
}
