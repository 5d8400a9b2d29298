use crate::config::RenderConfig;
use crate::frame_dump::FrameDump;
use crate::labels::debug::{DebugPrimitive, state_color};
use anyhow::Result;
use glam::Vec2;
use std::path::Path;

/// SVG overlay of one frame: placed label boxes, touch results and, when
/// present, the debug primitives.
pub fn render_svg(dump: &FrameDump, config: &RenderConfig) -> String {
    let mut svg = String::new();
    let width = dump.width.max(1.0);
    let height = dump.height.max(1.0);

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        escape_xml(&config.background)
    ));

    for prim in &dump.debug {
        if let DebugPrimitive::Rect { min, max, color } = prim {
            if *color == crate::labels::debug::GRID_COLOR {
                svg.push_str(&format!(
                    "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"none\" stroke=\"{}\" stroke-width=\"0.5\"/>",
                    min.x,
                    min.y,
                    max.x - min.x,
                    max.y - min.y,
                    escape_xml(&config.grid_color)
                ));
            }
        }
    }

    for label in &dump.placed {
        let color = hex_color(state_color(label.state));
        for obb in &label.boxes {
            svg.push_str(&format!(
                "<polygon points=\"{}\" fill=\"{color}\" fill-opacity=\"{:.2}\" stroke=\"{color}\" stroke-width=\"1\"/>",
                polygon_points(&obb.quad()),
                label.alpha * 0.3
            ));
        }
        svg.push_str(&format!(
            "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"1.5\" fill=\"{color}\"/>",
            label.position.x, label.position.y
        ));
    }

    for prim in &dump.debug {
        match prim {
            DebugPrimitive::Quad { points, color } => {
                svg.push_str(&format!(
                    "<polygon points=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1\"/>",
                    polygon_points(points),
                    hex_color(*color)
                ));
            }
            DebugPrimitive::Line { from, to, color } => {
                svg.push_str(&format!(
                    "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" stroke=\"{}\" stroke-width=\"1\"/>",
                    from.x,
                    from.y,
                    to.x,
                    to.y,
                    hex_color(*color)
                ));
            }
            DebugPrimitive::Rect { min, max, color } => {
                if *color == crate::labels::debug::GRID_COLOR {
                    continue;
                }
                svg.push_str(&format!(
                    "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\"/>",
                    min.x,
                    min.y,
                    max.x - min.x,
                    max.y - min.y,
                    hex_color(*color)
                ));
            }
        }
    }

    for touch in &dump.touches {
        svg.push_str(&format!(
            "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"4\" fill=\"none\" stroke=\"#E4572E\" stroke-width=\"1.5\"/>",
            touch.x, touch.y
        ));
    }

    svg.push_str("</svg>");
    svg
}

fn polygon_points(points: &[Vec2]) -> String {
    points
        .iter()
        .map(|p| format!("{:.2},{:.2}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}

fn hex_color(color: u32) -> String {
    format!("#{:06X}", color & 0xFF_FFFF)
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = render_cfg.font_family.clone();

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(not(feature = "png"))]
pub fn write_output_png(_svg: &str, _output: &Path, _render_cfg: &RenderConfig) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
