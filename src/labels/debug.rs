use super::{LabelState, Labels, label_ref};
use crate::geometry::rotate_by;
use crate::tile::{Marker, Tile};
use glam::Vec2;
use serde::Serialize;

/// Overlay shapes describing the last frame's placement decisions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum DebugPrimitive {
    Quad { points: [Vec2; 4], color: u32 },
    Line { from: Vec2, to: Vec2, color: u32 },
    Rect { min: Vec2, max: Vec2, color: u32 },
}

pub fn state_color(state: LabelState) -> u32 {
    match state {
        LabelState::Sleeping => 0xdddddd,
        LabelState::Visible => 0x000000,
        LabelState::None => 0x0000ff,
        LabelState::Dead => 0xff00ff,
        LabelState::FadingIn => 0xffff00,
        LabelState::FadingOut => 0xff0000,
        LabelState::OutOfScreen => 0x999999,
    }
}

pub const GRID_COLOR: u32 = 0x7ef586;

impl Labels {
    /// Debug overlay for the last update; empty unless label debugging was
    /// enabled for that frame.
    pub fn debug_primitives(&self, tiles: &[Tile], markers: &[Marker]) -> Vec<DebugPrimitive> {
        let mut out = Vec::new();
        if !self.options.debug_labels {
            return out;
        }

        for entry in &self.entries {
            let Some(label) = label_ref(tiles, markers, entry.key) else {
                continue;
            };
            let color = state_color(label.state());
            for obb in label.boxes() {
                out.push(DebugPrimitive::Quad {
                    points: obb.quad(),
                    color,
                });
            }

            let position = label.transform().position;
            let parent = entry
                .parent_key()
                .and_then(|key| label_ref(tiles, markers, key));
            if let Some(parent) = parent {
                out.push(DebugPrimitive::Line {
                    from: position,
                    to: parent.transform().position,
                    color: 0xff0000,
                });
            }

            let mut offset = label.options().offset;
            if let Some(parent) = parent {
                offset += parent.options().offset;
            }
            let offset = rotate_by(offset, label.transform().rotation);
            out.push(DebugPrimitive::Line {
                from: position,
                to: position - offset,
                color: 0x000000,
            });

            out.push(DebugPrimitive::Rect {
                min: position - Vec2::ONE,
                max: position + Vec2::ONE,
                color: 0x0000ff,
            });
        }

        for cell in self.grid.cell_rects() {
            out.push(DebugPrimitive::Rect {
                min: cell.min,
                max: cell.max,
                color: GRID_COLOR,
            });
        }
        out
    }
}
