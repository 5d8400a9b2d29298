use crate::geometry::{Aabb, Obb, rotate_by, world_to_screen};
use glam::{Mat4, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Feature properties handed back by the touch picker.
pub type Properties = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    Center,
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Anchor {
    /// Unit-ish direction in screen space (y down) the label is pushed towards.
    pub fn direction(self) -> Vec2 {
        match self {
            Anchor::Center => Vec2::ZERO,
            Anchor::Top => Vec2::new(0.0, -1.0),
            Anchor::Bottom => Vec2::new(0.0, 1.0),
            Anchor::Left => Vec2::new(-1.0, 0.0),
            Anchor::Right => Vec2::new(1.0, 0.0),
            Anchor::TopLeft => Vec2::new(-1.0, -1.0),
            Anchor::TopRight => Vec2::new(1.0, -1.0),
            Anchor::BottomLeft => Vec2::new(-1.0, 1.0),
            Anchor::BottomRight => Vec2::new(1.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    Point,
    Line,
    Curved,
    Debug,
}

/// Source geometry in world units, one variant per placement algorithm.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelGeometry {
    Point { position: Vec2 },
    /// Straight label centred on a segment and rotated along it.
    Line { start: Vec2, end: Vec2 },
    /// Label bent along a polyline, centred on `anchor_vertex`.
    Curved { line: Vec<Vec2>, anchor_vertex: usize },
    Debug { position: Vec2 },
}

impl LabelGeometry {
    pub fn kind(&self) -> LabelKind {
        match self {
            LabelGeometry::Point { .. } => LabelKind::Point,
            LabelGeometry::Line { .. } => LabelKind::Line,
            LabelGeometry::Curved { .. } => LabelKind::Curved,
            LabelGeometry::Debug { .. } => LabelKind::Debug,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelState {
    None,
    Sleeping,
    FadingIn,
    Visible,
    FadingOut,
    OutOfScreen,
    Dead,
}

#[derive(Debug, Clone)]
pub struct LabelOptions {
    /// Candidate anchors, tried in order starting at the active one.
    pub anchors: Vec<Anchor>,
    pub repeat_group: u64,
    pub repeat_distance: f32,
    /// Lower wins.
    pub priority: f32,
    pub required: bool,
    pub interactive: bool,
    /// Labels with `collide == false` are drawn without occlusion tests.
    pub collide: bool,
    pub offset: Vec2,
    /// Glyph buffer included in the measured dimension, trimmed from the
    /// collision box.
    pub buffer: Vec2,
    /// Fade-in duration in seconds.
    pub show_transition: f32,
    /// Fade-out duration in seconds.
    pub hide_transition: f32,
    pub properties: Arc<Properties>,
}

impl Default for LabelOptions {
    fn default() -> Self {
        Self {
            anchors: vec![Anchor::Center],
            repeat_group: 0,
            repeat_distance: 0.0,
            priority: 0.0,
            required: false,
            interactive: false,
            collide: true,
            offset: Vec2::ZERO,
            buffer: Vec2::ZERO,
            show_transition: 0.2,
            hide_transition: 0.2,
            properties: Arc::new(Properties::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScreenTransform {
    pub position: Vec2,
    /// Unit rotation vector (cos, sin).
    pub rotation: Vec2,
    pub alpha: f32,
}

impl Default for ScreenTransform {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation: Vec2::X,
            alpha: 0.0,
        }
    }
}

/// Per-frame values every label update needs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameParams {
    pub mvp: Mat4,
    pub screen: Vec2,
    pub frame: u64,
    pub draw_all: bool,
    pub activation_threshold: f32,
    pub line_min_ratio: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct Fade {
    elapsed: f32,
    duration: f32,
    fade_in: bool,
}

impl Fade {
    /// Start a fade that continues from the current alpha.
    fn starting_at(alpha: f32, duration: f32, fade_in: bool) -> Self {
        let progress = if fade_in { alpha } else { 1.0 - alpha };
        Self {
            elapsed: progress.clamp(0.0, 1.0) * duration,
            duration,
            fade_in,
        }
    }

    fn update(&mut self, dt: f32) -> f32 {
        self.elapsed += dt.max(0.0);
        let t = if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        };
        if self.fade_in { t } else { 1.0 - t }
    }

    fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }
}

#[derive(Debug, Clone)]
pub struct Label {
    geometry: LabelGeometry,
    options: LabelOptions,
    dimension: Vec2,
    transform: ScreenTransform,
    state: LabelState,
    occluded: bool,
    occluded_last_frame: bool,
    anchor_index: usize,
    anchor_offset: Vec2,
    parent: Option<usize>,
    parent_dimension: Vec2,
    boxes: Vec<Obb>,
    extent: Aabb,
    center: Vec2,
    // Projected polyline and cumulative arc lengths of curved labels.
    screen_path: Vec<Vec2>,
    path_lengths: Vec<f32>,
    fade: Fade,
    skip_transitions: bool,
    evaluated_frame: Option<u64>,
    hash: u64,
}

impl Label {
    pub fn new(geometry: LabelGeometry, dimension: Vec2, mut options: LabelOptions) -> Self {
        if options.anchors.is_empty() {
            options.anchors.push(Anchor::Center);
        }
        let hash = content_hash(&geometry, dimension, &options);
        let mut label = Self {
            geometry,
            options,
            dimension,
            transform: ScreenTransform::default(),
            state: LabelState::None,
            occluded: false,
            occluded_last_frame: false,
            anchor_index: 0,
            anchor_offset: Vec2::ZERO,
            parent: None,
            parent_dimension: Vec2::ZERO,
            boxes: Vec::new(),
            extent: Aabb::new(Vec2::ZERO, Vec2::ZERO),
            center: Vec2::ZERO,
            screen_path: Vec::new(),
            path_lengths: Vec::new(),
            fade: Fade::default(),
            skip_transitions: false,
            evaluated_frame: None,
            hash,
        };
        label.apply_anchor();
        label
    }

    pub fn kind(&self) -> LabelKind {
        self.geometry.kind()
    }

    pub fn geometry(&self) -> &LabelGeometry {
        &self.geometry
    }

    pub fn options(&self) -> &LabelOptions {
        &self.options
    }

    pub fn dimension(&self) -> Vec2 {
        self.dimension
    }

    pub fn transform(&self) -> &ScreenTransform {
        &self.transform
    }

    pub fn state(&self) -> LabelState {
        self.state
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// Index of the parent label inside the owning `LabelSet`.
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn boxes(&self) -> &[Obb] {
        &self.boxes
    }

    pub fn extent(&self) -> Aabb {
        self.extent
    }

    /// Screen-space center of the label's current placement.
    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn anchor_index(&self) -> usize {
        self.anchor_index
    }

    pub fn anchor(&self) -> Anchor {
        self.options.anchors[self.anchor_index]
    }

    pub fn anchor_offset(&self) -> Vec2 {
        self.anchor_offset
    }

    pub fn is_occluded(&self) -> bool {
        self.occluded
    }

    pub fn occluded_last_frame(&self) -> bool {
        self.occluded_last_frame
    }

    pub fn can_occlude(&self) -> bool {
        self.options.collide && self.kind() != LabelKind::Debug
    }

    pub fn visible_state(&self) -> bool {
        matches!(
            self.state,
            LabelState::FadingIn | LabelState::Visible | LabelState::FadingOut
        )
    }

    pub(crate) fn evaluated_frame(&self) -> Option<u64> {
        self.evaluated_frame
    }

    /// Squared world length of a straight label's segment; zero otherwise.
    pub fn segment_length_sq(&self) -> f32 {
        match &self.geometry {
            LabelGeometry::Line { start, end } => (*end - *start).length_squared(),
            _ => 0.0,
        }
    }

    pub fn occlude(&mut self) {
        self.occluded = true;
    }

    pub(crate) fn set_occluded(&mut self, occluded: bool) {
        self.occluded = occluded;
    }

    /// Marks the label as permanently gone; it is skipped from now on.
    pub fn kill(&mut self) {
        self.enter_state(LabelState::Dead, 0.0);
    }

    /// Jump straight to the target state on the next `eval_state`.
    pub fn skip_transitions(&mut self) {
        self.skip_transitions = true;
    }

    pub(crate) fn set_parent(&mut self, parent: usize, parent_dimension: Vec2) {
        self.parent = Some(parent);
        self.parent_dimension = parent_dimension;
        self.apply_anchor();
    }

    /// Select an anchor; indices out of range fall back to the first anchor.
    pub fn set_anchor_index(&mut self, index: usize) {
        self.anchor_index = if index < self.options.anchors.len() {
            index
        } else {
            0
        };
        self.apply_anchor();
    }

    /// Advance to the next anchor, wrapping. Returns false when there is
    /// only one anchor to choose from.
    pub fn next_anchor(&mut self) -> bool {
        let current = self.anchor_index;
        self.set_anchor_index((current + 1) % self.options.anchors.len());
        self.anchor_index != current
    }

    fn apply_anchor(&mut self) {
        if self.anchor_index >= self.options.anchors.len() {
            self.anchor_index = 0;
        }
        let direction = self.options.anchors[self.anchor_index].direction();
        self.anchor_offset = match self.geometry {
            LabelGeometry::Point { .. } | LabelGeometry::Debug { .. } => {
                direction * (self.dimension + self.parent_dimension) * 0.5
            }
            LabelGeometry::Line { .. } => direction * self.dimension * 0.5,
            LabelGeometry::Curved { .. } => Vec2::ZERO,
        };
    }

    pub(crate) fn enter_state(&mut self, state: LabelState, alpha: f32) {
        self.state = state;
        self.transform.alpha = alpha;
    }

    /// Re-project the label for a new frame. Returns false when the label
    /// contributes nothing this frame (dead, or a placement rule failed).
    pub(crate) fn update(&mut self, params: &FrameParams) -> bool {
        self.occluded_last_frame = self.occluded;
        self.occluded = false;
        self.evaluated_frame = Some(params.frame);

        if self.state == LabelState::Dead {
            return false;
        }

        if !self.update_screen_transform(params, true) {
            self.occluded = true;
            self.enter_state(LabelState::Sleeping, 0.0);
            return false;
        }

        self.update_bboxes(params.activation_threshold);

        if self.off_viewport(params.screen) {
            self.enter_state(LabelState::OutOfScreen, 0.0);
        } else if self.state == LabelState::OutOfScreen {
            if self.occluded_last_frame {
                self.enter_state(LabelState::Sleeping, 0.0);
            } else {
                self.enter_state(LabelState::Visible, 1.0);
            }
        }
        true
    }

    /// Project the source geometry to screen space. With `test_visibility`
    /// the per-type placement rules are applied and may reject the label.
    pub(crate) fn update_screen_transform(
        &mut self,
        params: &FrameParams,
        test_visibility: bool,
    ) -> bool {
        let mvp = &params.mvp;
        let screen = params.screen;
        let enforce = test_visibility && !params.draw_all;

        match &self.geometry {
            LabelGeometry::Point { position } | LabelGeometry::Debug { position } => {
                let (p, clipped) = world_to_screen(mvp, *position, screen);
                if clipped && test_visibility {
                    return false;
                }
                self.transform.position = p + self.options.offset;
                self.transform.rotation = Vec2::X;
                true
            }
            LabelGeometry::Line { start, end } => {
                let (a, clipped_a) = world_to_screen(mvp, *start, screen);
                let (b, clipped_b) = world_to_screen(mvp, *end, screen);
                if enforce && (clipped_a || clipped_b) {
                    return false;
                }
                let length = (b - a).length();
                if enforce && length < self.dimension.x * params.line_min_ratio {
                    return false;
                }
                // Keep the center on the world midpoint; less sliding when tilted.
                let (mid, _) = world_to_screen(mvp, (*start + *end) * 0.5, screen);
                let rotation = if length > f32::EPSILON {
                    if a.x <= b.x { (b - a) / length } else { (a - b) / length }
                } else {
                    Vec2::X
                };
                self.transform.position = mid + rotate_by(self.options.offset, rotation);
                self.transform.rotation = rotation;
                true
            }
            LabelGeometry::Curved { line, anchor_vertex } => {
                let anchor_vertex = *anchor_vertex;
                self.screen_path.clear();
                self.path_lengths.clear();
                let mut inside = false;
                let mut total = 0.0;
                for p in line {
                    let (sp, clipped) = world_to_screen(mvp, *p, screen);
                    if clipped && test_visibility {
                        return false;
                    }
                    if let Some(prev) = self.screen_path.last() {
                        total += (sp - *prev).length();
                    }
                    self.path_lengths.push(total);
                    self.screen_path.push(sp);
                    if sp.x >= 0.0 && sp.x <= screen.x && sp.y >= 0.0 && sp.y <= screen.y {
                        inside = true;
                    }
                }
                if self.screen_path.len() < 2 || anchor_vertex >= self.screen_path.len() {
                    return false;
                }
                if test_visibility && (!inside || total < self.dimension.x) {
                    return false;
                }
                let center = self.path_lengths[anchor_vertex];
                let half = self.dimension.x * 0.5;
                if test_visibility && (center - half < 0.0 || center + half > total) {
                    return false;
                }
                let segment = anchor_vertex.min(self.screen_path.len() - 2);
                let dir = self.screen_path[segment + 1] - self.screen_path[segment];
                let rotation = dir.try_normalize().unwrap_or(Vec2::X);
                let rotation = if rotation.x < 0.0 { -rotation } else { rotation };
                self.transform.position = self.screen_path[anchor_vertex];
                self.transform.rotation = rotation;
                true
            }
        }
    }

    /// Recompute collision boxes for the current transform and anchor.
    pub(crate) fn update_bboxes(&mut self, activation_threshold: f32) {
        let mut dim = (self.dimension - self.options.buffer).max(Vec2::ZERO);
        if self.occluded_last_frame {
            dim += Vec2::splat(activation_threshold);
        }
        self.boxes.clear();

        match self.geometry {
            LabelGeometry::Point { .. } | LabelGeometry::Debug { .. } => {
                let center = self.transform.position + self.anchor_offset;
                self.boxes.push(Obb::axis_aligned(center, dim.x, dim.y));
            }
            LabelGeometry::Line { .. } => {
                let rotation = self.transform.rotation;
                let center = self.transform.position + rotate_by(self.anchor_offset, rotation);
                self.boxes.push(Obb::new(center, rotation, dim.x, dim.y));
            }
            LabelGeometry::Curved { anchor_vertex, .. } => {
                self.push_curved_boxes(anchor_vertex, dim);
            }
        }

        if self.boxes.is_empty() {
            self.boxes.push(Obb::axis_aligned(self.transform.position, dim.x, dim.y));
        }
        self.center = match self.geometry {
            LabelGeometry::Curved { .. } => self.transform.position,
            _ => self.boxes[0].center,
        };
        let mut extent = self.boxes[0].extent();
        for obb in &self.boxes[1..] {
            extent = extent.union(&obb.extent());
        }
        self.extent = extent;
    }

    fn push_curved_boxes(&mut self, anchor_vertex: usize, dim: Vec2) {
        if self.screen_path.len() < 2 || anchor_vertex >= self.path_lengths.len() {
            return;
        }
        let center = self.path_lengths[anchor_vertex];
        let start = center - dim.x * 0.5;
        let end = center + dim.x * 0.5;
        for i in 0..self.screen_path.len() - 1 {
            let (l0, l1) = (self.path_lengths[i], self.path_lengths[i + 1]);
            let from = start.max(l0);
            let to = end.min(l1);
            if to - from <= f32::EPSILON || l1 - l0 <= f32::EPSILON {
                continue;
            }
            let (p0, p1) = (self.screen_path[i], self.screen_path[i + 1]);
            let a = p0.lerp(p1, (from - l0) / (l1 - l0));
            let b = p0.lerp(p1, (to - l0) / (l1 - l0));
            self.boxes
                .push(Obb::new((a + b) * 0.5, p1 - p0, to - from, dim.y));
        }
    }

    /// True when the label's extent lies entirely outside the screen.
    pub fn off_viewport(&self, screen: Vec2) -> bool {
        let viewport = Aabb::new(Vec2::ZERO, screen);
        !self.extent.intersects(&viewport)
    }

    /// Advance the fade state machine. Returns true while anything visible
    /// changed or is still animating.
    pub fn eval_state(&mut self, dt: f32) -> bool {
        if self.skip_transitions {
            self.skip_transitions = false;
            match self.state {
                LabelState::None
                | LabelState::Sleeping
                | LabelState::FadingIn
                | LabelState::FadingOut
                | LabelState::Visible => {
                    if self.occluded {
                        let changed = self.state != LabelState::Sleeping;
                        self.enter_state(LabelState::Sleeping, 0.0);
                        return changed;
                    }
                    let changed =
                        self.state != LabelState::Visible || self.transform.alpha != 1.0;
                    self.enter_state(LabelState::Visible, 1.0);
                    return changed;
                }
                LabelState::OutOfScreen | LabelState::Dead => {}
            }
        }

        match self.state {
            LabelState::Visible => {
                if !self.occluded {
                    return false;
                }
                if self.options.hide_transition > 0.0 {
                    self.fade = Fade::starting_at(1.0, self.options.hide_transition, false);
                    self.state = LabelState::FadingOut;
                } else {
                    self.enter_state(LabelState::Sleeping, 0.0);
                }
                true
            }
            LabelState::FadingIn => {
                if self.occluded {
                    self.enter_state(LabelState::Sleeping, 0.0);
                    return true;
                }
                self.transform.alpha = self.fade.update(dt);
                if self.fade.is_finished() {
                    self.enter_state(LabelState::Visible, 1.0);
                }
                true
            }
            LabelState::FadingOut => {
                if !self.occluded {
                    let alpha = self.transform.alpha;
                    self.fade = Fade::starting_at(alpha, self.options.show_transition, true);
                    self.state = LabelState::FadingIn;
                    return true;
                }
                self.transform.alpha = self.fade.update(dt);
                if self.fade.is_finished() {
                    self.enter_state(LabelState::Sleeping, 0.0);
                }
                true
            }
            LabelState::None | LabelState::Sleeping => {
                if self.occluded {
                    return false;
                }
                if self.options.show_transition > 0.0 {
                    self.fade = Fade::starting_at(0.0, self.options.show_transition, true);
                    self.enter_state(LabelState::FadingIn, 0.0);
                } else {
                    self.enter_state(LabelState::Visible, 1.0);
                }
                true
            }
            LabelState::OutOfScreen | LabelState::Dead => false,
        }
    }
}

fn content_hash(geometry: &LabelGeometry, dimension: Vec2, options: &LabelOptions) -> u64 {
    let mut hasher = DefaultHasher::new();
    geometry.kind().hash(&mut hasher);
    let mut write_vec = |v: Vec2| {
        v.x.to_bits().hash(&mut hasher);
        v.y.to_bits().hash(&mut hasher);
    };
    match geometry {
        LabelGeometry::Point { position } | LabelGeometry::Debug { position } => {
            write_vec(*position)
        }
        LabelGeometry::Line { start, end } => {
            write_vec(*start);
            write_vec(*end);
        }
        LabelGeometry::Curved { line, .. } => {
            for p in line {
                write_vec(*p);
            }
        }
    }
    write_vec(dimension);
    options.repeat_group.hash(&mut hasher);
    options.priority.to_bits().hash(&mut hasher);
    hasher.finish()
}
