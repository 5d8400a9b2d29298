use super::Labels;
use super::label::Properties;
use crate::geometry::Obb;
use crate::tile::{Style, Tile, View};
use glam::Vec2;
use std::sync::Arc;

/// One interactive label under the pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct TouchItem {
    pub properties: Arc<Properties>,
    pub position: Vec2,
    pub distance: f32,
}

impl Labels {
    /// Interactive labels whose boxes overlap a square hit box centred on
    /// (`x`, `y`), nearest first.
    ///
    /// With `visible_only` only labels currently shown are considered;
    /// otherwise labels not evaluated this frame are re-projected on demand.
    pub fn features_at_point(
        &mut self,
        view: &View,
        styles: &[Style],
        tiles: &mut [Tile],
        x: f32,
        y: f32,
        visible_only: bool,
    ) -> &[TouchItem] {
        self.touch_items.clear();

        let touch = Vec2::new(x, y);
        let size = self.config.hit_box_size;
        let hit_box = Obb::axis_aligned(touch, size, size);
        let threshold = self.config.activation_distance_threshold;

        for tile in tiles.iter_mut() {
            let params = self.frame_params(tile.mvp, view);
            for style in styles {
                let Some(set) = tile.label_set_mut(style.id) else {
                    continue;
                };
                for label in set.labels_mut() {
                    if !label.options().interactive {
                        continue;
                    }
                    if visible_only {
                        if !label.visible_state() {
                            continue;
                        }
                    } else if label.evaluated_frame() != Some(self.frame) {
                        label.update_screen_transform(&params, false);
                        label.update_bboxes(threshold);
                    }

                    if label.boxes().iter().any(|b| b.intersects(&hit_box)) {
                        let position = label.center();
                        self.touch_items.push(TouchItem {
                            properties: Arc::clone(&label.options().properties),
                            position,
                            distance: position.distance(touch),
                        });
                    }
                }
            }
        }

        self.touch_items
            .sort_by(|a, b| a.distance.total_cmp(&b.distance));
        &self.touch_items
    }
}
