pub mod debug;
mod label;
mod label_set;
pub mod picking;
mod spatial;

pub use label::{
    Anchor, Label, LabelGeometry, LabelKind, LabelOptions, LabelState, Properties,
    ScreenTransform,
};
pub use label_set::{LabelSet, LinkError};
pub use picking::TouchItem;
pub use spatial::CollisionGrid;

use crate::config::{FrameOptions, LabelConfig};
use crate::geometry::Obb;
use crate::tile::{Marker, SourceId, Style, StyleId, Tile, TileCache, TileId, View};
use glam::{Mat4, Vec2};
use label::FrameParams;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::ops::Range;

/// Where a label lives: an index into the frame's tile or marker slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelOwner {
    Tile(usize),
    Marker(usize),
}

/// Identity of a label for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LabelKey {
    pub owner: LabelOwner,
    pub style: StyleId,
    pub index: usize,
}

impl LabelKey {
    fn with_index(self, index: usize) -> LabelKey {
        LabelKey { index, ..self }
    }
}

/// Sort record for one collidable label, captured when the label is collected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelEntry {
    pub key: LabelKey,
    pub tile: Option<TileId>,
    pub proxy: bool,
    pub priority: f32,
    pub occluded_last_frame: bool,
    pub visible: bool,
    /// Squared source segment length for straight line labels.
    pub line_length_sq: Option<f32>,
    pub hash: u64,
    pub parent: Option<usize>,
}

impl LabelEntry {
    fn new(key: LabelKey, label: &Label, tile: Option<TileId>, proxy: bool) -> Self {
        Self {
            key,
            tile,
            proxy,
            priority: label.options().priority,
            occluded_last_frame: label.occluded_last_frame(),
            visible: label.visible_state(),
            line_length_sq: (label.kind() == LabelKind::Line).then(|| label.segment_length_sq()),
            hash: label.hash(),
            parent: label.parent(),
        }
    }

    pub fn parent_key(&self) -> Option<LabelKey> {
        self.parent.map(|index| self.key.with_index(index))
    }
}

/// Precedence order, `Less` meaning `a` is placed before `b`.
///
/// Mixed line/non-line pairs compare as if the non-line label had a
/// zero-length segment, which keeps the order transitive.
pub fn compare_entries(a: &LabelEntry, b: &LabelEntry) -> Ordering {
    a.proxy
        .cmp(&b.proxy)
        .then_with(|| a.priority.total_cmp(&b.priority))
        .then_with(|| b.tile.is_some().cmp(&a.tile.is_some()))
        .then_with(|| match (a.tile, b.tile) {
            (Some(ta), Some(tb)) => tb.z.cmp(&ta.z),
            _ => Ordering::Equal,
        })
        // Depends on navigation history, so placement is not reproducible
        // across sessions.
        .then_with(|| a.occluded_last_frame.cmp(&b.occluded_last_frame))
        .then_with(|| b.visible.cmp(&a.visible))
        .then_with(|| {
            let la = a.line_length_sq.unwrap_or(0.0);
            let lb = b.line_length_sq.unwrap_or(0.0);
            lb.total_cmp(&la)
        })
        .then_with(|| a.hash.cmp(&b.hash))
        .then_with(|| a.key.cmp(&b.key))
}

/// Move children directly behind their parent when the sort put them first.
fn order_parents_first(entries: &mut Vec<LabelEntry>) {
    let present: HashSet<LabelKey> = entries.iter().map(|e| e.key).collect();
    let mut emitted: HashSet<LabelKey> = HashSet::with_capacity(entries.len());
    let mut waiting: HashMap<LabelKey, Vec<LabelEntry>> = HashMap::new();
    let mut ordered = Vec::with_capacity(entries.len());

    for entry in entries.drain(..) {
        if let Some(parent) = entry.parent_key() {
            if present.contains(&parent) && !emitted.contains(&parent) {
                waiting.entry(parent).or_default().push(entry);
                continue;
            }
        }
        emitted.insert(entry.key);
        ordered.push(entry);
        if let Some(children) = waiting.remove(&entry.key) {
            for child in children {
                emitted.insert(child.key);
                ordered.push(child);
            }
        }
    }
    debug_assert!(waiting.is_empty());
    *entries = ordered;
}

/// A surviving label's transform, handed to the external mesh builder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedLabel {
    pub key: LabelKey,
    pub kind: LabelKind,
    pub state: LabelState,
    pub position: Vec2,
    pub rotation: Vec2,
    pub alpha: f32,
    pub anchor: Anchor,
    pub boxes: Vec<Obb>,
}

fn push_transform(placed: &mut Vec<PlacedLabel>, key: LabelKey, label: &Label) {
    if !label.visible_state() {
        return;
    }
    let transform = label.transform();
    placed.push(PlacedLabel {
        key,
        kind: label.kind(),
        state: label.state(),
        position: label.center(),
        rotation: transform.rotation,
        alpha: transform.alpha,
        anchor: label.anchor(),
        boxes: label.boxes().to_vec(),
    });
}

pub(crate) fn label_ref<'a>(
    tiles: &'a [Tile],
    markers: &'a [Marker],
    key: LabelKey,
) -> Option<&'a Label> {
    match key.owner {
        LabelOwner::Tile(i) => tiles.get(i)?.label_set(key.style)?.get(key.index),
        LabelOwner::Marker(i) => {
            let marker = markers.get(i)?;
            if marker.style != key.style {
                return None;
            }
            marker.mesh.as_ref()?.labels()?.get(key.index)
        }
    }
}

pub(crate) fn label_mut<'a>(
    tiles: &'a mut [Tile],
    markers: &'a mut [Marker],
    key: LabelKey,
) -> Option<&'a mut Label> {
    match key.owner {
        LabelOwner::Tile(i) => tiles.get_mut(i)?.label_set_mut(key.style)?.get_mut(key.index),
        LabelOwner::Marker(i) => {
            let marker = markers.get_mut(i)?;
            if marker.style != key.style {
                return None;
            }
            marker.label_set_mut()?.get_mut(key.index)
        }
    }
}

/// Find a proxy tile, preferring the currently visible set over the cache.
fn find_proxy<'a>(
    source: SourceId,
    id: TileId,
    tiles: &'a [Tile],
    cache: &'a dyn TileCache,
) -> Option<&'a Tile> {
    tiles
        .iter()
        .find(|t| t.id == id && t.source == source)
        .or_else(|| cache.contains(source, id))
}

/// Labels of `tile` still in their initial state that have an equivalent
/// visible label in `proxy`.
fn matching_new_labels(
    styles: &[StyleId],
    tile_idx: usize,
    tile: &Tile,
    proxy: &Tile,
    marks: &mut Vec<(usize, StyleId, usize)>,
) {
    for &style in styles {
        let Some(current) = tile.label_set(style) else {
            continue;
        };
        let Some(previous) = proxy.label_set(style) else {
            continue;
        };
        for (index, l0) in current.labels().iter().enumerate() {
            if !l0.can_occlude() || l0.state() != LabelState::None {
                continue;
            }
            let radius = l0.dimension().x.max(l0.dimension().y);
            let matched = previous.labels().iter().any(|l1| {
                l1.visible_state()
                    && l1.can_occlude()
                    // Repeat group rather than content hash, so labels with
                    // zoom-dependent style properties still match.
                    && l0.options().repeat_group == l1.options().repeat_group
                    && l0.center().distance(l1.center()) < radius
            });
            if matched {
                marks.push((tile_idx, style, index));
            }
        }
    }
}

/// The occlusion engine. Holds only per-frame scratch state plus the last
/// zoom used to detect integer zoom crossings.
#[derive(Debug, Clone)]
pub struct Labels {
    config: LabelConfig,
    entries: Vec<LabelEntry>,
    grid: CollisionGrid,
    repeat_groups: HashMap<u64, Vec<Vec2>>,
    // Boxes of accepted entries; `entry_boxes[i]` indexes into `boxes`.
    boxes: Vec<Obb>,
    entry_boxes: Vec<Option<Range<usize>>>,
    placed: Vec<PlacedLabel>,
    touch_items: Vec<TouchItem>,
    need_update: bool,
    last_zoom: f32,
    frame: u64,
    options: FrameOptions,
}

impl Default for Labels {
    fn default() -> Self {
        Self::new(LabelConfig::default())
    }
}

impl Labels {
    pub fn new(config: LabelConfig) -> Self {
        Self {
            config,
            entries: Vec::new(),
            grid: CollisionGrid::default(),
            repeat_groups: HashMap::new(),
            boxes: Vec::new(),
            entry_boxes: Vec::new(),
            placed: Vec::new(),
            touch_items: Vec::new(),
            need_update: false,
            last_zoom: 0.0,
            frame: 0,
            options: FrameOptions::default(),
        }
    }

    pub fn config(&self) -> &LabelConfig {
        &self.config
    }

    /// True when labels are still animating and another frame is needed even
    /// if the camera does not move.
    pub fn needs_update(&self) -> bool {
        self.need_update
    }

    /// Collidable labels of the last full update, in resolution order.
    pub fn entries(&self) -> &[LabelEntry] {
        &self.entries
    }

    /// Transforms pushed during the last update.
    pub fn placed(&self) -> &[PlacedLabel] {
        &self.placed
    }

    pub fn grid(&self) -> &CollisionGrid {
        &self.grid
    }

    pub fn last_zoom(&self) -> f32 {
        self.last_zoom
    }

    fn frame_params(&self, mvp: Mat4, view: &View) -> FrameParams {
        FrameParams {
            mvp,
            screen: view.screen_size(),
            frame: self.frame,
            draw_all: self.options.draw_all_labels,
            activation_threshold: self.config.activation_distance_threshold,
            line_min_ratio: self.config.line_min_length_ratio,
        }
    }

    /// Full update: collect, sort, skip transitions on zoom crossings,
    /// resolve occlusions, then evaluate and push every collected label.
    #[allow(clippy::too_many_arguments)]
    pub fn update_label_set(
        &mut self,
        view: &View,
        dt: f32,
        styles: &[Style],
        tiles: &mut [Tile],
        markers: &mut [Marker],
        cache: &dyn TileCache,
        options: FrameOptions,
    ) {
        self.options = options;
        self.collect_labels(view, dt, styles, tiles, markers, false);

        self.entries.sort_by(compare_entries);
        order_parents_first(&mut self.entries);

        if self.last_zoom as i32 != view.zoom as i32 {
            self.skip_transitions(styles, tiles, cache, view.zoom);
            self.last_zoom = view.zoom;
        }

        self.grid
            .resize(view.screen_size(), self.config.grid_cell_target);
        self.handle_occlusions(view, tiles, markers);

        let mut occluded = 0usize;
        for i in 0..self.entries.len() {
            let key = self.entries[i].key;
            let Some(label) = label_mut(tiles, markers, key) else {
                continue;
            };
            if label.is_occluded() {
                occluded += 1;
            }
            self.need_update |= label.eval_state(dt);
            push_transform(&mut self.placed, key, label);
        }

        tracing::trace!(
            frame = self.frame,
            candidates = self.entries.len(),
            occluded,
            placed = self.placed.len(),
            need_update = self.need_update,
            "label frame resolved"
        );
    }

    /// Cheap update for frames without camera movement: labels keep last
    /// frame's occlusion decision and only their fades advance.
    pub fn update_transitions(
        &mut self,
        view: &View,
        dt: f32,
        styles: &[Style],
        tiles: &mut [Tile],
        markers: &mut [Marker],
        options: FrameOptions,
    ) {
        self.options = options;
        self.collect_labels(view, dt, styles, tiles, markers, true);
    }

    fn collect_labels(
        &mut self,
        view: &View,
        dt: f32,
        styles: &[Style],
        tiles: &mut [Tile],
        markers: &mut [Marker],
        only_transitions: bool,
    ) {
        // Entries stay around in transition-only frames for debug output.
        if !only_transitions {
            self.entries.clear();
        }
        self.placed.clear();
        self.need_update = false;
        self.frame += 1;

        for (tile_idx, tile) in tiles.iter_mut().enumerate() {
            let params = self.frame_params(tile.mvp, view);
            let tile_id = tile.id;
            let proxy = tile.proxy;
            for style in styles {
                let Some(set) = tile.label_set_mut(style.id) else {
                    continue;
                };
                let owner = LabelOwner::Tile(tile_idx);
                self.process_label_set(
                    set,
                    owner,
                    style.id,
                    Some(tile_id),
                    proxy,
                    &params,
                    dt,
                    only_transitions,
                );
            }
        }

        for (marker_idx, marker) in markers.iter_mut().enumerate() {
            if !styles.iter().any(|s| s.id == marker.style) {
                continue;
            }
            let params = self.frame_params(view.view_projection * marker.model, view);
            let style = marker.style;
            let Some(set) = marker.label_set_mut() else {
                continue;
            };
            let owner = LabelOwner::Marker(marker_idx);
            self.process_label_set(
                set,
                owner,
                style,
                None,
                false,
                &params,
                dt,
                only_transitions,
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn process_label_set(
        &mut self,
        set: &mut LabelSet,
        owner: LabelOwner,
        style: StyleId,
        tile: Option<TileId>,
        proxy: bool,
        params: &FrameParams,
        dt: f32,
        only_transitions: bool,
    ) {
        for (index, label) in set.labels_mut().iter_mut().enumerate() {
            if !label.update(params) {
                continue;
            }
            let key = LabelKey {
                owner,
                style,
                index,
            };
            if only_transitions {
                if label.occluded_last_frame() {
                    label.occlude();
                }
                if label.visible_state() || !label.can_occlude() {
                    self.need_update |= label.eval_state(dt);
                    push_transform(&mut self.placed, key, label);
                }
            } else if label.can_occlude() {
                self.entries.push(LabelEntry::new(key, label, tile, proxy));
            } else {
                self.need_update |= label.eval_state(dt);
                push_transform(&mut self.placed, key, label);
            }
        }
    }

    /// Mark labels that already showed in a proxy tile of the previous zoom
    /// level so they appear without fading in.
    fn skip_transitions(
        &self,
        styles: &[Style],
        tiles: &mut [Tile],
        cache: &dyn TileCache,
        zoom: f32,
    ) {
        let label_styles: Vec<StyleId> = styles
            .iter()
            .filter(|s| s.kind.is_label_style())
            .map(|s| s.id)
            .collect();
        let zooming_in = self.last_zoom < zoom;

        let mut marks = Vec::new();
        {
            let visible: &[Tile] = &*tiles;
            for (tile_idx, tile) in visible.iter().enumerate() {
                let proxy_ids: Vec<TileId> = if zooming_in {
                    vec![tile.id.parent()]
                } else {
                    (0..4).map(|i| tile.id.child(i)).collect()
                };
                for proxy_id in proxy_ids {
                    if proxy_id == tile.id {
                        continue;
                    }
                    if let Some(proxy) = find_proxy(tile.source, proxy_id, visible, cache) {
                        matching_new_labels(&label_styles, tile_idx, tile, proxy, &mut marks);
                    }
                }
            }
        }

        tracing::debug!(
            from = self.last_zoom,
            to = zoom,
            zooming_in,
            skipped = marks.len(),
            "zoom level crossed, skipping transitions"
        );

        for (tile_idx, style, index) in marks {
            if let Some(label) = tiles[tile_idx]
                .label_set_mut(style)
                .and_then(|set| set.get_mut(index))
            {
                label.skip_transitions();
            }
        }
    }

    fn within_repeat_distance(&self, group: u64, center: Vec2, distance: f32) -> bool {
        let threshold2 = distance * distance;
        self.repeat_groups
            .get(&group)
            .is_some_and(|centers| centers.iter().any(|c| c.distance_squared(center) < threshold2))
    }

    /// Whether `boxes` overlap any accepted box other than the parent's.
    fn collides(&self, label: &Label, parent: Option<LabelKey>) -> bool {
        for owner in self.grid.query(&label.extent()) {
            if Some(self.entries[owner].key) == parent {
                continue;
            }
            let Some(range) = self.entry_boxes[owner].clone() else {
                continue;
            };
            let others = &self.boxes[range];
            if label
                .boxes()
                .iter()
                .any(|own| others.iter().any(|other| own.intersects(other)))
            {
                return true;
            }
        }
        false
    }

    fn handle_occlusions(&mut self, view: &View, tiles: &mut [Tile], markers: &mut [Marker]) {
        let screen = view.screen_size();
        let threshold = self.config.activation_distance_threshold;

        self.grid.clear();
        self.repeat_groups.clear();
        self.boxes.clear();
        self.entry_boxes.clear();
        self.entry_boxes.resize(self.entries.len(), None);

        for i in 0..self.entries.len() {
            let entry = self.entries[i];
            let parent_key = entry.parent_key();

            // Parents were resolved earlier, so their occlusion is final.
            if let Some(parent) = parent_key {
                if label_ref(tiles, markers, parent).is_some_and(|p| p.is_occluded()) {
                    if let Some(label) = label_mut(tiles, markers, entry.key) {
                        label.occlude();
                    }
                    continue;
                }
            }

            let Some(label) = label_mut(tiles, markers, entry.key) else {
                continue;
            };

            let repeat_distance = label.options().repeat_distance;
            let repeat_group = label.options().repeat_group;
            if repeat_distance > 0.0
                && self.within_repeat_distance(repeat_group, label.center(), repeat_distance)
            {
                label.occlude();
                continue;
            }

            let start = label.anchor_index();
            let mut accepted = false;
            let mut skipped_offscreen = false;
            let mut first = true;
            loop {
                if label.off_viewport(screen) {
                    if first {
                        skipped_offscreen = true;
                        break;
                    }
                } else if !(repeat_distance > 0.0
                    && self.within_repeat_distance(repeat_group, label.center(), repeat_distance))
                    && !self.collides(label, parent_key)
                {
                    accepted = true;
                    break;
                }
                first = false;
                if !label.next_anchor() {
                    break;
                }
                label.update_bboxes(threshold);
                if label.anchor_index() == start {
                    break;
                }
            }

            if skipped_offscreen {
                label.set_occluded(false);
                continue;
            }

            if accepted {
                label.set_occluded(false);
                let range = self.boxes.len()..self.boxes.len() + label.boxes().len();
                self.boxes.extend_from_slice(label.boxes());
                self.entry_boxes[i] = Some(range);
                self.grid.insert(label.extent(), i);
                if repeat_distance > 0.0 {
                    self.repeat_groups
                        .entry(repeat_group)
                        .or_default()
                        .push(label.center());
                }
                continue;
            }

            label.occlude();
            let required = label.options().required;
            if required {
                if let Some(parent) = parent_key {
                    self.revoke(parent, tiles, markers);
                }
            }
        }
    }

    /// Occlude an already accepted label and withdraw its boxes and
    /// repeat-group center from the rest of the pass.
    fn revoke(&mut self, key: LabelKey, tiles: &mut [Tile], markers: &mut [Marker]) {
        let Some(label) = label_mut(tiles, markers, key) else {
            return;
        };
        label.occlude();
        if let Some(idx) = self.entries.iter().position(|e| e.key == key) {
            self.entry_boxes[idx] = None;
        }
        if label.options().repeat_distance > 0.0 {
            let center = label.center();
            if let Some(centers) = self.repeat_groups.get_mut(&label.options().repeat_group) {
                if let Some(pos) = centers.iter().position(|c| *c == center) {
                    centers.swap_remove(pos);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests;
