use crate::labels::debug::DebugPrimitive;
use crate::labels::{LabelKey, Labels, PlacedLabel, TouchItem, label_ref};
use crate::scene::Scene;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct FrameDump {
    pub width: f32,
    pub height: f32,
    pub zoom: f32,
    pub frames: usize,
    pub needs_update: bool,
    pub placed: Vec<PlacedLabel>,
    pub occluded: Vec<LabelKey>,
    pub touches: Vec<TouchDump>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub debug: Vec<DebugPrimitive>,
}

#[derive(Debug, Serialize)]
pub struct TouchDump {
    pub x: f32,
    pub y: f32,
    pub distance: f32,
    pub properties: serde_json::Value,
}

impl From<&TouchItem> for TouchDump {
    fn from(item: &TouchItem) -> Self {
        TouchDump {
            x: item.position.x,
            y: item.position.y,
            distance: item.distance,
            properties: serde_json::Value::Object((*item.properties).clone()),
        }
    }
}

impl FrameDump {
    pub fn from_frame(engine: &Labels, scene: &Scene, frames: usize, touches: &[TouchItem]) -> Self {
        let occluded = engine
            .entries()
            .iter()
            .filter(|entry| {
                label_ref(&scene.tiles, &scene.markers, entry.key).is_some_and(|l| l.is_occluded())
            })
            .map(|entry| entry.key)
            .collect();

        FrameDump {
            width: scene.view.width,
            height: scene.view.height,
            zoom: scene.view.zoom,
            frames,
            needs_update: engine.needs_update(),
            placed: engine.placed().to_vec(),
            occluded,
            touches: touches.iter().map(TouchDump::from).collect(),
            debug: engine.debug_primitives(&scene.tiles, &scene.markers),
        }
    }
}

/// Write the dump as pretty JSON to `path`, or to stdout without one.
pub fn write_frame_dump(dump: &FrameDump, path: Option<&Path>) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, dump)?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, dump)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}
