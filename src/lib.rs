#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod frame_dump;
pub mod geometry;
pub mod labels;
pub mod render;
pub mod scene;
pub mod tile;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, FrameOptions, LabelConfig, load_config};
pub use labels::{Label, LabelOptions, LabelSet, LabelState, Labels, PlacedLabel, TouchItem};
pub use scene::{Scene, SceneError};
pub use tile::{Marker, SourceId, Style, StyleId, StyleKind, Tile, TileCache, TileId, View};
