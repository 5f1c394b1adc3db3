//! All the variables that can be configured for the dot field.

use color_eyre::eyre::Result;

/// All the config for the dot field.
#[derive(serde::Deserialize, Debug, Clone)]
#[serde(default)]
#[non_exhaustive]
pub struct Config {
    /// The surface width, in pixels, above which the dense dot tier is used.
    pub wide_surface_threshold: f32,
    /// The number of dots scattered on surfaces wider than the threshold.
    pub dense_count: usize,
    /// The number of dots scattered on narrower surfaces.
    pub sparse_count: usize,
    /// Dots closer than this many pixels are joined by a line.
    pub link_distance: f32,
    /// The stroke width of the joining lines.
    pub link_width: f32,
    /// The colour of the dots and their joining lines, as a `#rrggbb` string.
    pub colour: String,
    /// The opacity the dots are filled with.
    pub dot_opacity: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wide_surface_threshold: 768.0,
            dense_count: 100,
            sparse_count: 40,
            link_distance: 150.0,
            link_width: 0.5,
            colour: "#ffffff".to_owned(),
            dot_opacity: 0.8,
        }
    }
}

impl Config {
    /// The configured colour at the given opacity.
    pub fn colour_at(&self, opacity: f32) -> Result<crate::canvas::Colour> {
        let srgb = self
            .colour
            .parse::<palette::Srgb<u8>>()
            .map_err(|error| {
                color_eyre::eyre::eyre!("Parsing colour '{}': {error}", self.colour)
            })?;
        let srgb_float: palette::Srgb<f32> = srgb.into_format();
        Ok((srgb_float.red, srgb_float.green, srgb_float.blue, opacity))
    }
}
