//! Units and coordinate spaces
//!
//! The host lays widgets out in pixels with a top-left origin and a y axis
//! that grows downward. The renderer wants centimetres, children positioned
//! relative to their parent's centre, and y growing upward.

use serde::{Deserialize, Serialize};

/// Pixels per centimetre for a host drawing at 75 px per inch
pub const DEFAULT_PX_PER_CM: f32 = 75.0 / 2.54;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn to_cm(self, px_per_cm: f32) -> Self {
        Self::new(self.x / px_per_cm, self.y / px_per_cm)
    }

    pub fn to_px(self, px_per_cm: f32) -> Self {
        Self::new(self.x * px_per_cm, self.y * px_per_cm)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub pos: Vec2,
    pub size: Vec2,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            pos: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    pub fn to_cm(self, px_per_cm: f32) -> Self {
        Self {
            pos: self.pos.to_cm(px_per_cm),
            size: self.size.to_cm(px_per_cm),
        }
    }

    /// Same size, position moved into the parent's centre-origin space
    pub fn centred_in(self, parent_size: Vec2) -> Self {
        Self {
            pos: ue_correct_pos(parent_size, &self),
            size: self.size,
        }
    }
}

/// Move a child from top-left-origin space into the renderer's space:
/// origin at the parent's centre, measured to the child's centre, y up.
pub fn ue_correct_pos(parent_size: Vec2, child: &Rect) -> Vec2 {
    let x = (child.pos.x - parent_size.x * 0.5) + child.size.x * 0.5;
    let y = (child.pos.y - parent_size.y * 0.5) + child.size.y * 0.5;
    Vec2::new(x, -y)
}

/// Inverse of [`ue_correct_pos`]
pub fn ue_restore_pos(parent_size: Vec2, pos: Vec2, child_size: Vec2) -> Vec2 {
    let x = pos.x + parent_size.x * 0.5 - child_size.x * 0.5;
    let y = -pos.y + parent_size.y * 0.5 - child_size.y * 0.5;
    Vec2::new(x, y)
}
