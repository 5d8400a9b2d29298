use crate::config::{FrameOptions, LabelConfig};
use crate::geometry::screen_ortho;
use crate::labels::{
    Anchor, Label, LabelGeometry, LabelOptions, LabelSet, Labels, LinkError, Properties,
    TouchItem,
};
use crate::tile::{Marker, SourceId, Style, StyleId, StyledMesh, Tile, TileId, View};
use glam::{Mat4, Vec2, Vec3};
use serde::Deserialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("invalid scene json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("style {style} is declared more than once")]
    DuplicateStyle { style: u32 },
    #[error("{owner} references undeclared style {style}")]
    UnknownStyle { owner: String, style: u32 },
    #[error("tile {x}/{y}/{z} is outside its zoom level")]
    InvalidTile { x: i32, y: i32, z: i32 },
    #[error("{owner}: {source}")]
    Link {
        owner: String,
        #[source]
        source: LinkError,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDesc {
    pub width: f32,
    pub height: f32,
    pub zoom: f32,
    /// World point shown at the middle of the screen. Without it world
    /// coordinates are screen coordinates.
    #[serde(default)]
    pub center: Option<Vec2>,
    #[serde(default = "one")]
    pub scale: f32,
}

fn one() -> f32 {
    1.0
}

impl ViewDesc {
    fn view(&self) -> View {
        let ortho = screen_ortho(self.width, self.height);
        let view_projection = match self.center {
            Some(center) => {
                let half = Vec3::new(self.width * 0.5, self.height * 0.5, 0.0);
                ortho
                    * Mat4::from_translation(half)
                    * Mat4::from_scale(Vec3::new(self.scale, self.scale, 1.0))
                    * Mat4::from_translation(-center.extend(0.0))
            }
            None => ortho * Mat4::from_scale(Vec3::new(self.scale, self.scale, 1.0)),
        };
        View {
            width: self.width,
            height: self.height,
            zoom: self.zoom,
            view_projection,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeometryDesc {
    Point { position: Vec2 },
    Line { start: Vec2, end: Vec2 },
    Curved {
        line: Vec<Vec2>,
        #[serde(rename = "anchorVertex")]
        anchor_vertex: usize,
    },
    Debug { position: Vec2 },
}

impl From<GeometryDesc> for LabelGeometry {
    fn from(desc: GeometryDesc) -> Self {
        match desc {
            GeometryDesc::Point { position } => LabelGeometry::Point { position },
            GeometryDesc::Line { start, end } => LabelGeometry::Line { start, end },
            GeometryDesc::Curved {
                line,
                anchor_vertex,
            } => LabelGeometry::Curved {
                line,
                anchor_vertex,
            },
            GeometryDesc::Debug { position } => LabelGeometry::Debug { position },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelDesc {
    #[serde(flatten)]
    pub geometry: GeometryDesc,
    pub size: Vec2,
    #[serde(default)]
    pub anchors: Option<Vec<Anchor>>,
    /// Initial anchor index.
    #[serde(default)]
    pub anchor: usize,
    #[serde(default)]
    pub priority: f32,
    #[serde(default)]
    pub repeat_group: Option<String>,
    #[serde(default)]
    pub repeat_distance: f32,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub interactive: bool,
    #[serde(default = "yes")]
    pub collide: bool,
    #[serde(default)]
    pub offset: Vec2,
    #[serde(default)]
    pub buffer: Vec2,
    #[serde(default)]
    pub show_transition: Option<f32>,
    #[serde(default)]
    pub hide_transition: Option<f32>,
    /// Index of the parent label in the same set.
    #[serde(default)]
    pub parent: Option<usize>,
    #[serde(default)]
    pub properties: Properties,
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabelSetDesc {
    pub style: u32,
    #[serde(default)]
    pub labels: Vec<LabelDesc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileDesc {
    pub id: TileId,
    #[serde(default)]
    pub source: i32,
    #[serde(default)]
    pub proxy: bool,
    /// World position of the tile's local origin.
    #[serde(default)]
    pub origin: Vec2,
    #[serde(default)]
    pub label_sets: Vec<LabelSetDesc>,
    /// Styles drawn on the tile without labels.
    #[serde(default)]
    pub geometry_styles: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkerDesc {
    pub id: u32,
    pub style: u32,
    pub position: Vec2,
    #[serde(default)]
    pub labels: Vec<LabelDesc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneDesc {
    pub view: ViewDesc,
    pub styles: Vec<Style>,
    #[serde(default)]
    pub tiles: Vec<TileDesc>,
    #[serde(default)]
    pub markers: Vec<MarkerDesc>,
    #[serde(default)]
    pub cache: Vec<TileDesc>,
}

/// A loaded scene, ready to be driven frame by frame.
#[derive(Debug, Clone)]
pub struct Scene {
    pub view: View,
    pub styles: Vec<Style>,
    pub tiles: Vec<Tile>,
    pub markers: Vec<Marker>,
    pub cache: HashMap<(SourceId, TileId), Tile>,
}

impl Scene {
    pub fn from_json(input: &str, config: &LabelConfig) -> Result<Scene, SceneError> {
        let desc: SceneDesc = serde_json::from_str(input)?;
        Scene::from_desc(desc, config)
    }

    pub fn from_desc(desc: SceneDesc, config: &LabelConfig) -> Result<Scene, SceneError> {
        let mut declared = HashSet::new();
        for style in &desc.styles {
            if !declared.insert(style.id) {
                return Err(SceneError::DuplicateStyle { style: style.id.0 });
            }
        }

        let view = desc.view.view();
        let mut tiles = Vec::with_capacity(desc.tiles.len());
        for tile in desc.tiles {
            tiles.push(build_tile(tile, &view, &declared, config)?);
        }

        let mut cache = HashMap::new();
        for tile in desc.cache {
            let tile = build_tile(tile, &view, &declared, config)?;
            cache.insert((tile.source, tile.id), tile);
        }

        let mut markers = Vec::with_capacity(desc.markers.len());
        for marker in desc.markers {
            let owner = format!("marker {}", marker.id);
            let style = StyleId(marker.style);
            if !declared.contains(&style) {
                return Err(SceneError::UnknownStyle {
                    owner,
                    style: marker.style,
                });
            }
            let set = build_label_set(marker.labels, config, &owner)?;
            markers.push(Marker {
                id: marker.id,
                style,
                model: Mat4::from_translation(marker.position.extend(0.0)),
                mesh: Some(StyledMesh::Labels(set)),
            });
        }

        tracing::debug!(
            tiles = tiles.len(),
            markers = markers.len(),
            cached = cache.len(),
            "scene loaded"
        );

        Ok(Scene {
            view,
            styles: desc.styles,
            tiles,
            markers,
            cache,
        })
    }

    /// Run one full label update over the scene.
    pub fn update(&mut self, engine: &mut Labels, dt: f32, options: FrameOptions) {
        engine.update_label_set(
            &self.view,
            dt,
            &self.styles,
            &mut self.tiles,
            &mut self.markers,
            &self.cache,
            options,
        );
    }

    pub fn pick<'a>(
        &mut self,
        engine: &'a mut Labels,
        x: f32,
        y: f32,
        visible_only: bool,
    ) -> &'a [TouchItem] {
        engine.features_at_point(&self.view, &self.styles, &mut self.tiles, x, y, visible_only)
    }

    /// Labels of the visible tiles and markers, for dumps and rendering.
    pub fn labels(&self) -> impl Iterator<Item = &Label> + '_ {
        let tiled = self
            .tiles
            .iter()
            .flat_map(|t| t.meshes.values())
            .filter_map(StyledMesh::labels);
        let marked = self
            .markers
            .iter()
            .filter_map(|m| m.mesh.as_ref())
            .filter_map(StyledMesh::labels);
        tiled.chain(marked).flat_map(|set| set.labels().iter())
    }
}

fn build_tile(
    desc: TileDesc,
    view: &View,
    declared: &HashSet<StyleId>,
    config: &LabelConfig,
) -> Result<Tile, SceneError> {
    let id = desc.id;
    if !id.is_valid() {
        return Err(SceneError::InvalidTile {
            x: id.x,
            y: id.y,
            z: id.z,
        });
    }
    let mvp = view.view_projection * Mat4::from_translation(desc.origin.extend(0.0));
    let mut tile = Tile::new(id, SourceId(desc.source), mvp);
    tile.proxy = desc.proxy;

    let owner = format!("tile {}/{}/{}", id.x, id.y, id.z);
    for style in desc.geometry_styles {
        tile.meshes
            .insert(StyleId(style), StyledMesh::Geometry { vertex_count: 0 });
    }
    for set in desc.label_sets {
        let style = StyleId(set.style);
        if !declared.contains(&style) {
            return Err(SceneError::UnknownStyle {
                owner,
                style: set.style,
            });
        }
        let labels = build_label_set(set.labels, config, &owner)?;
        tile.meshes.insert(style, StyledMesh::Labels(labels));
    }
    Ok(tile)
}

fn build_label_set(
    descs: Vec<LabelDesc>,
    config: &LabelConfig,
    owner: &str,
) -> Result<LabelSet, SceneError> {
    let mut set = LabelSet::default();
    let mut links = Vec::new();
    for desc in descs {
        if let Some(parent) = desc.parent {
            links.push((set.len(), parent));
        }
        set.push(build_label(desc, config, owner));
    }
    for (child, parent) in links {
        set.link_parent(child, parent)
            .map_err(|source| SceneError::Link {
                owner: owner.to_string(),
                source,
            })?;
    }
    Ok(set)
}

fn build_label(desc: LabelDesc, config: &LabelConfig, owner: &str) -> Label {
    let anchors = match desc.anchors {
        Some(anchors) if anchors.is_empty() => {
            tracing::warn!(owner, "empty anchor list, using center");
            vec![Anchor::Center]
        }
        Some(anchors) => anchors,
        None => vec![Anchor::Center],
    };
    if desc.anchor >= anchors.len() {
        tracing::warn!(
            owner,
            anchor = desc.anchor,
            anchors = anchors.len(),
            "anchor index out of range, using the first anchor"
        );
    }

    let options = LabelOptions {
        anchors,
        repeat_group: desc.repeat_group.as_deref().map_or(0, repeat_group_id),
        repeat_distance: desc.repeat_distance,
        priority: desc.priority,
        required: desc.required,
        interactive: desc.interactive,
        collide: desc.collide,
        offset: desc.offset,
        buffer: desc.buffer,
        show_transition: desc.show_transition.unwrap_or(config.fade_in_time),
        hide_transition: desc.hide_transition.unwrap_or(config.fade_out_time),
        properties: Arc::new(desc.properties),
    };
    let mut label = Label::new(desc.geometry.into(), desc.size, options);
    label.set_anchor_index(desc.anchor);
    label
}

/// Stable numeric id for a named repeat group.
pub fn repeat_group_id(name: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish()
}
