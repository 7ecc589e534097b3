//! Fallback skins for widgets whose assets the host could not report

use crate::model::{ParamKind, Rgba};

pub const DEFAULT_PANEL_COLOR: Rgba = Rgba::new(0.9, 0.9, 0.9, 1.0);
pub const DEFAULT_PORT_COLOR: Rgba = Rgba::new(0.62, 0.62, 0.62, 1.0);
pub const DEFAULT_PORT_SVG: &str = "res/ComponentLibrary/PJ301M.svg";

const LIB: &str = "res/ComponentLibrary";

/// Knob skin by width in centimetres: [background, knob, foreground]
pub fn default_knob_svgs(width_cm: f32) -> Vec<String> {
    let base = if width_cm < 0.8 {
        "Trimpot"
    } else if width_cm < 1.1 {
        "RoundSmallBlackKnob"
    } else if width_cm < 1.5 {
        "RoundBlackKnob"
    } else {
        "RoundLargeBlackKnob"
    };
    vec![
        format!("{LIB}/{base}_bg.svg"),
        format!("{LIB}/{base}.svg"),
        String::new(),
    ]
}

const MAX_SWITCH_POSITIONS: f32 = 64.0;

/// Positions of a snapping param spanning `min..=max`, at least two
pub fn switch_positions(min: f32, max: f32) -> usize {
    (max - min).round().max(1.0).min(MAX_SWITCH_POSITIONS) as usize + 1
}

/// One frame per switch position; anything wider than two positions gets
/// the three-way toggle
pub fn default_switch_svgs(positions: usize) -> Vec<String> {
    if positions > 2 {
        (0..3).map(|i| format!("{LIB}/CKSSThree_{i}.svg")).collect()
    } else {
        (0..2).map(|i| format!("{LIB}/CKSS_{i}.svg")).collect()
    }
}

pub fn default_button_svgs() -> Vec<String> {
    vec![
        format!("{LIB}/VCVButton_0.svg"),
        format!("{LIB}/VCVButton_1.svg"),
    ]
}

/// [track, handle]
pub fn default_slider_svgs() -> Vec<String> {
    vec![
        format!("{LIB}/VCVSlider.svg"),
        format!("{LIB}/VCVSliderHandle.svg"),
    ]
}

/// Defaults for a param of `kind`; `positions` only matters for switches
pub fn default_param_svgs(kind: ParamKind, width_cm: f32, positions: usize) -> Vec<String> {
    match kind {
        ParamKind::Knob => default_knob_svgs(width_cm),
        ParamKind::Switch => default_switch_svgs(positions),
        ParamKind::Button => default_button_svgs(),
        ParamKind::Slider => default_slider_svgs(),
        ParamKind::Unknown => Vec::new(),
    }
}
