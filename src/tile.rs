use crate::labels::LabelSet;
use glam::{Mat4, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StyleId(pub u32);

/// Slippy-map tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl TileId {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn parent(&self) -> TileId {
        if self.z <= 0 {
            return *self;
        }
        TileId {
            x: self.x >> 1,
            y: self.y >> 1,
            z: self.z - 1,
        }
    }

    /// Child `index` in 0..4, row-major: 0 top-left, 1 top-right,
    /// 2 bottom-left, 3 bottom-right.
    pub fn child(&self, index: usize) -> TileId {
        let index = (index & 3) as i32;
        TileId {
            x: self.x * 2 + (index & 1),
            y: self.y * 2 + (index >> 1),
            z: self.z + 1,
        }
    }

    pub fn is_valid(&self) -> bool {
        if !(0..31).contains(&self.z) {
            return false;
        }
        let max = 1i64 << self.z;
        (0..max).contains(&(self.x as i64)) && (0..max).contains(&(self.y as i64))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleKind {
    Text,
    Point,
    Polygon,
    Line,
}

impl StyleKind {
    /// Only label-producing styles take part in transition skipping.
    pub fn is_label_style(self) -> bool {
        matches!(self, StyleKind::Text | StyleKind::Point)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub id: StyleId,
    pub name: String,
    pub kind: StyleKind,
}

/// A tile's or marker's mesh for one style. Geometry meshes carry no labels
/// and are ignored by the label engine.
#[derive(Debug, Clone)]
pub enum StyledMesh {
    Labels(LabelSet),
    Geometry { vertex_count: usize },
}

impl StyledMesh {
    pub fn labels(&self) -> Option<&LabelSet> {
        match self {
            StyledMesh::Labels(set) => Some(set),
            StyledMesh::Geometry { .. } => None,
        }
    }

    pub fn labels_mut(&mut self) -> Option<&mut LabelSet> {
        match self {
            StyledMesh::Labels(set) => Some(set),
            StyledMesh::Geometry { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tile {
    pub id: TileId,
    pub source: SourceId,
    /// Set when the tile is drawn only to cover a missing tile of another zoom.
    pub proxy: bool,
    pub mvp: Mat4,
    pub meshes: BTreeMap<StyleId, StyledMesh>,
}

impl Tile {
    pub fn new(id: TileId, source: SourceId, mvp: Mat4) -> Self {
        Self {
            id,
            source,
            proxy: false,
            mvp,
            meshes: BTreeMap::new(),
        }
    }

    pub fn mesh(&self, style: StyleId) -> Option<&StyledMesh> {
        self.meshes.get(&style)
    }

    pub fn mesh_mut(&mut self, style: StyleId) -> Option<&mut StyledMesh> {
        self.meshes.get_mut(&style)
    }

    pub fn label_set(&self, style: StyleId) -> Option<&LabelSet> {
        self.mesh(style).and_then(StyledMesh::labels)
    }

    pub fn label_set_mut(&mut self, style: StyleId) -> Option<&mut LabelSet> {
        self.mesh_mut(style).and_then(StyledMesh::labels_mut)
    }
}

#[derive(Debug, Clone)]
pub struct Marker {
    pub id: u32,
    pub style: StyleId,
    pub model: Mat4,
    pub mesh: Option<StyledMesh>,
}

impl Marker {
    pub fn label_set_mut(&mut self) -> Option<&mut LabelSet> {
        self.mesh.as_mut().and_then(StyledMesh::labels_mut)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct View {
    pub width: f32,
    pub height: f32,
    pub zoom: f32,
    pub view_projection: Mat4,
}

impl View {
    pub fn screen_size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }
}

/// Read-only lookup into a tile cache owned elsewhere. Results borrow the
/// cache and therefore cannot be kept past the current frame.
pub trait TileCache {
    fn contains(&self, source: SourceId, id: TileId) -> Option<&Tile>;
}

impl TileCache for HashMap<(SourceId, TileId), Tile> {
    fn contains(&self, source: SourceId, id: TileId) -> Option<&Tile> {
        self.get(&(source, id))
    }
}

impl TileCache for BTreeMap<(SourceId, TileId), Tile> {
    fn contains(&self, source: SourceId, id: TileId) -> Option<&Tile> {
        self.get(&(source, id))
    }
}
