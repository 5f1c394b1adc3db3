//! Generally useful shared code.

/// The ANSI escape sequence that returns the user's terminal to its startup state.
pub const RESET_SCREEN: &str = "\x1bc";
