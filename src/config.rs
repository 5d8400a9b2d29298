use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DebugFlags {
    /// Disable rule-based hiding (clipped or too-short line labels).
    pub draw_all_labels: bool,
    /// Collect debug primitives for the label overlay.
    pub labels: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelConfig {
    pub fade_in_time: f32,
    pub fade_out_time: f32,
    pub hit_box_size: f32,
    pub grid_cell_target: f32,
    pub activation_distance_threshold: f32,
    pub line_min_length_ratio: f32,
    pub debug: DebugFlags,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            fade_in_time: 0.2,
            fade_out_time: 0.2,
            hit_box_size: 50.0,
            grid_cell_target: 256.0,
            activation_distance_threshold: 2.0,
            line_min_length_ratio: 0.7,
            debug: DebugFlags::default(),
        }
    }
}

impl LabelConfig {
    pub fn frame_options(&self) -> FrameOptions {
        FrameOptions {
            draw_all_labels: self.debug.draw_all_labels,
            debug_labels: self.debug.labels,
        }
    }
}

/// Toggles passed explicitly into every label update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameOptions {
    pub draw_all_labels: bool,
    pub debug_labels: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderConfig {
    pub background: String,
    pub grid_color: String,
    pub font_family: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            background: "#FFFFFF".to_string(),
            grid_color: "#7EF586".to_string(),
            font_family: "Inter".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub labels: LabelConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    labels: Option<LabelConfig>,
    render: Option<RenderConfig>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed = parse_config(&contents)?;
    if let Some(labels) = parsed.labels {
        config.labels = labels;
    }
    if let Some(render) = parsed.render {
        config.render = render;
    }
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

fn parse_config(contents: &str) -> anyhow::Result<ConfigFile> {
    Ok(serde_json::from_str(contents)?)
}
