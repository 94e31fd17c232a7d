//! Colors used for the status lines.

use nu_ansi_term::Color;

/// The attention color (skipped steps, failures).
pub(crate) const ATTENTION_COLOR: Color = Color::Red;

/// The color of components installed by this run.
pub(crate) const FRESH_COLOR: Color = Color::Green;

/// The information color.
pub(crate) const INFO_COLOR: Color = Color::Cyan;

/// The color used to colorise paths.
pub(crate) const PATH_COLOR: Color = Color::LightBlue;
