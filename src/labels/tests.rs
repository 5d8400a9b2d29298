use super::*;
use crate::geometry::screen_ortho;
use crate::tile::{StyleKind, StyledMesh};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

const W: f32 = 800.0;
const H: f32 = 600.0;
const STYLE: StyleId = StyleId(1);

type Cache = HashMap<(SourceId, TileId), Tile>;

fn view(zoom: f32) -> View {
    View {
        width: W,
        height: H,
        zoom,
        view_projection: screen_ortho(W, H),
    }
}

fn styles() -> Vec<Style> {
    vec![Style {
        id: STYLE,
        name: "places".to_string(),
        kind: StyleKind::Text,
    }]
}

fn opts(priority: f32) -> LabelOptions {
    LabelOptions {
        priority,
        ..LabelOptions::default()
    }
}

fn point(x: f32, y: f32, w: f32, h: f32, options: LabelOptions) -> Label {
    Label::new(
        LabelGeometry::Point {
            position: Vec2::new(x, y),
        },
        Vec2::new(w, h),
        options,
    )
}

fn tile_with(id: TileId, labels: Vec<Label>) -> Tile {
    let mut tile = Tile::new(id, SourceId(0), screen_ortho(W, H));
    tile.meshes
        .insert(STYLE, StyledMesh::Labels(LabelSet::new(labels)));
    tile
}

fn default_tile(labels: Vec<Label>) -> Tile {
    tile_with(TileId::new(10, 10, 10), labels)
}

fn run(engine: &mut Labels, tiles: &mut [Tile], zoom: f32, dt: f32) {
    engine.update_label_set(
        &view(zoom),
        dt,
        &styles(),
        tiles,
        &mut [],
        &Cache::new(),
        FrameOptions::default(),
    );
}

fn label(tiles: &[Tile], tile: usize, index: usize) -> &Label {
    tiles[tile].label_set(STYLE).unwrap().get(index).unwrap()
}

fn accepted(tiles: &[Tile]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    for (t, tile) in tiles.iter().enumerate() {
        for (i, l) in tile.label_set(STYLE).unwrap().labels().iter().enumerate() {
            if !l.is_occluded() {
                out.push((t, i));
            }
        }
    }
    out
}

#[test]
fn higher_priority_wins_overlap() {
    let mut engine = Labels::default();
    let mut tiles = vec![default_tile(vec![
        point(110.0, 100.0, 40.0, 10.0, opts(2.0)),
        point(100.0, 100.0, 40.0, 10.0, opts(1.0)),
    ])];
    run(&mut engine, &mut tiles, 10.0, 0.016);

    assert!(label(&tiles, 0, 0).is_occluded());
    assert!(!label(&tiles, 0, 1).is_occluded());
    assert_eq!(engine.placed().len(), 1);
    assert_eq!(engine.placed()[0].key.index, 1);
}

#[test]
fn repeat_group_spacing_occludes_without_collision() {
    let grouped = |priority| LabelOptions {
        priority,
        repeat_group: 7,
        repeat_distance: 50.0,
        ..LabelOptions::default()
    };
    let mut engine = Labels::default();
    let mut tiles = vec![default_tile(vec![
        point(100.0, 100.0, 8.0, 8.0, grouped(1.0)),
        point(110.0, 100.0, 8.0, 8.0, grouped(2.0)),
    ])];
    run(&mut engine, &mut tiles, 10.0, 0.016);

    let a = label(&tiles, 0, 0);
    let b = label(&tiles, 0, 1);
    assert!(!a.boxes()[0].intersects(&b.boxes()[0]));
    assert!(!a.is_occluded());
    assert!(b.is_occluded());

    // Same layout without spacing: both fit.
    let mut engine = Labels::default();
    let mut tiles = vec![default_tile(vec![
        point(100.0, 100.0, 8.0, 8.0, opts(1.0)),
        point(110.0, 100.0, 8.0, 8.0, opts(2.0)),
    ])];
    run(&mut engine, &mut tiles, 10.0, 0.016);
    assert_eq!(accepted(&tiles).len(), 2);
}

fn icon_and_caption(required: bool, blocker: Label) -> Tile {
    let mut set = LabelSet::default();
    let icon = set.push(point(300.0, 300.0, 20.0, 20.0, opts(1.0)));
    let caption = set.push(point(
        300.0,
        300.0,
        60.0,
        10.0,
        LabelOptions {
            priority: 1.0,
            required,
            anchors: vec![Anchor::Bottom],
            ..LabelOptions::default()
        },
    ));
    set.link_parent(caption, icon).unwrap();
    set.push(blocker);
    let mut tile = Tile::new(TileId::new(10, 10, 10), SourceId(0), screen_ortho(W, H));
    tile.meshes.insert(STYLE, StyledMesh::Labels(set));
    tile
}

#[test]
fn required_caption_failing_hides_its_icon() {
    // Covers the caption slot below the icon but not the icon itself.
    let blocker = point(300.0, 325.0, 100.0, 20.0, opts(0.0));
    let mut engine = Labels::default();
    let mut tiles = vec![icon_and_caption(true, blocker)];
    run(&mut engine, &mut tiles, 10.0, 0.016);

    assert!(!label(&tiles, 0, 2).is_occluded());
    assert!(label(&tiles, 0, 1).is_occluded());
    assert!(label(&tiles, 0, 0).is_occluded());
}

#[test]
fn optional_caption_failing_keeps_its_icon() {
    let blocker = point(300.0, 325.0, 100.0, 20.0, opts(0.0));
    let mut engine = Labels::default();
    let mut tiles = vec![icon_and_caption(false, blocker)];
    run(&mut engine, &mut tiles, 10.0, 0.016);

    assert!(label(&tiles, 0, 1).is_occluded());
    assert!(!label(&tiles, 0, 0).is_occluded());
}

#[test]
fn occluded_parent_hides_child() {
    // Overlaps the icon only; the caption slot stays free.
    let blocker = point(285.0, 299.0, 20.0, 18.0, opts(0.0));
    let mut engine = Labels::default();
    let mut tiles = vec![icon_and_caption(false, blocker)];
    run(&mut engine, &mut tiles, 10.0, 0.016);

    assert!(label(&tiles, 0, 0).is_occluded());
    assert!(label(&tiles, 0, 1).is_occluded());
}

#[test]
fn revoked_icon_stops_blocking_later_labels() {
    let blocker = point(300.0, 325.0, 100.0, 20.0, opts(0.0));
    let mut engine = Labels::default();
    let mut tiles = vec![icon_and_caption(true, blocker)];
    let late = tiles[0]
        .label_set_mut(STYLE)
        .unwrap()
        .push(point(300.0, 290.0, 10.0, 10.0, opts(5.0)));
    run(&mut engine, &mut tiles, 10.0, 0.016);

    assert!(label(&tiles, 0, 0).is_occluded());
    assert!(label(&tiles, 0, 1).is_occluded());
    assert!(!label(&tiles, 0, late).is_occluded());
}

#[test]
fn revoked_icon_releases_its_repeat_slot() {
    let mut set = LabelSet::default();
    let icon = set.push(point(
        300.0,
        300.0,
        20.0,
        20.0,
        LabelOptions {
            priority: 1.0,
            repeat_group: 3,
            repeat_distance: 50.0,
            ..LabelOptions::default()
        },
    ));
    let caption = set.push(point(
        300.0,
        300.0,
        60.0,
        10.0,
        LabelOptions {
            priority: 1.0,
            required: true,
            anchors: vec![Anchor::Bottom],
            ..LabelOptions::default()
        },
    ));
    set.link_parent(caption, icon).unwrap();
    set.push(point(300.0, 325.0, 100.0, 20.0, opts(0.0)));
    // 40 units above the icon, no box overlap.
    let late = set.push(point(
        300.0,
        260.0,
        10.0,
        10.0,
        LabelOptions {
            priority: 5.0,
            repeat_group: 3,
            repeat_distance: 50.0,
            ..LabelOptions::default()
        },
    ));
    let mut tile = Tile::new(TileId::new(10, 10, 10), SourceId(0), screen_ortho(W, H));
    tile.meshes.insert(STYLE, StyledMesh::Labels(set));
    let mut tiles = vec![tile];

    let mut engine = Labels::default();
    run(&mut engine, &mut tiles, 10.0, 0.016);
    assert!(label(&tiles, 0, icon).is_occluded());
    assert!(!label(&tiles, 0, late).is_occluded());
}

#[test]
fn parents_are_resolved_before_children() {
    let mut set = LabelSet::default();
    let icon = set.push(point(300.0, 300.0, 20.0, 20.0, opts(5.0)));
    let caption = set.push(point(300.0, 300.0, 60.0, 10.0, opts(0.0)));
    set.link_parent(caption, icon).unwrap();
    let mut tile = Tile::new(TileId::new(1, 1, 2), SourceId(0), screen_ortho(W, H));
    tile.meshes.insert(STYLE, StyledMesh::Labels(set));
    let mut tiles = vec![tile];

    let mut engine = Labels::default();
    run(&mut engine, &mut tiles, 2.0, 0.016);
    let order: Vec<usize> = engine.entries().iter().map(|e| e.key.index).collect();
    assert_eq!(order, vec![icon, caption]);
    // The parent does not occlude its own child.
    assert!(!label(&tiles, 0, caption).is_occluded());
}

#[test]
fn falls_back_to_next_anchor() {
    let mut engine = Labels::default();
    let mut tiles = vec![default_tile(vec![
        point(200.0, 192.0, 40.0, 10.0, opts(1.0)),
        point(
            200.0,
            200.0,
            40.0,
            10.0,
            LabelOptions {
                priority: 2.0,
                anchors: vec![Anchor::Center, Anchor::Bottom],
                ..LabelOptions::default()
            },
        ),
    ])];
    run(&mut engine, &mut tiles, 10.0, 0.016);

    let b = label(&tiles, 0, 1);
    assert!(!b.is_occluded());
    assert_eq!(b.anchor(), Anchor::Bottom);
}

#[test]
fn fallback_anchor_respects_repeat_distance() {
    let grouped = |priority, anchors| LabelOptions {
        priority,
        anchors,
        repeat_group: 9,
        repeat_distance: 50.0,
        ..LabelOptions::default()
    };
    let mut engine = Labels::default();
    let mut tiles = vec![default_tile(vec![
        point(100.0, 100.0, 20.0, 10.0, grouped(1.0, vec![Anchor::Center])),
        point(
            155.0,
            100.0,
            20.0,
            10.0,
            grouped(2.0, vec![Anchor::Center, Anchor::Left]),
        ),
        point(160.0, 100.0, 4.0, 4.0, opts(0.0)),
    ])];
    run(&mut engine, &mut tiles, 10.0, 0.016);

    assert!(!label(&tiles, 0, 0).is_occluded());
    assert!(!label(&tiles, 0, 2).is_occluded());
    // Center collides with the blocker and Left lands 45 units from the
    // first group member.
    assert!(label(&tiles, 0, 1).is_occluded());
}

#[test]
fn label_without_room_stays_alive_and_returns_later() {
    let mut engine = Labels::default();
    let mut tiles = vec![default_tile(vec![
        point(200.0, 200.0, 200.0, 200.0, opts(1.0)),
        point(
            200.0,
            200.0,
            40.0,
            10.0,
            LabelOptions {
                priority: 2.0,
                anchors: vec![Anchor::Center, Anchor::Bottom, Anchor::Right],
                ..LabelOptions::default()
            },
        ),
    ])];
    run(&mut engine, &mut tiles, 10.0, 0.016);
    {
        let b = label(&tiles, 0, 1);
        assert!(b.is_occluded());
        assert_eq!(b.anchor_index(), 0);
        assert_ne!(b.state(), LabelState::Dead);
    }

    tiles[0]
        .label_set_mut(STYLE)
        .unwrap()
        .get_mut(0)
        .unwrap()
        .kill();
    run(&mut engine, &mut tiles, 10.0, 0.016);
    assert!(!label(&tiles, 0, 1).is_occluded());
}

#[test]
fn resolution_is_idempotent_without_time() {
    let grouped = |priority| LabelOptions {
        priority,
        repeat_group: 3,
        repeat_distance: 80.0,
        ..LabelOptions::default()
    };
    let mut engine = Labels::default();
    let mut tiles = vec![default_tile(vec![
        point(100.0, 100.0, 40.0, 10.0, opts(1.0)),
        point(110.0, 104.0, 40.0, 10.0, opts(2.0)),
        point(400.0, 300.0, 20.0, 10.0, grouped(1.0)),
        point(440.0, 300.0, 20.0, 10.0, grouped(1.5)),
        point(600.0, 300.0, 20.0, 10.0, grouped(3.0)),
    ])];
    run(&mut engine, &mut tiles, 10.0, 0.0);
    let first = accepted(&tiles);
    run(&mut engine, &mut tiles, 10.0, 0.0);
    assert_eq!(accepted(&tiles), first);
    assert_eq!(first, vec![(0, 0), (0, 2), (0, 4)]);
}

#[test]
fn zoom_crossing_with_cached_parent_skips_fade_in() {
    let grouped = || LabelOptions {
        repeat_group: 42,
        ..LabelOptions::default()
    };
    let parent_id = TileId::new(300, 200, 9);
    let mut engine = Labels::default();
    let mut visible = vec![tile_with(
        parent_id,
        vec![point(400.0, 300.0, 60.0, 12.0, grouped())],
    )];
    run(&mut engine, &mut visible, 9.9, 0.016);
    run(&mut engine, &mut visible, 9.9, 0.5);
    assert_eq!(label(&visible, 0, 0).state(), LabelState::Visible);

    let mut cache = Cache::new();
    cache.insert((SourceId(0), parent_id), visible.remove(0));

    let mut tiles = vec![tile_with(
        parent_id.child(0),
        vec![point(405.0, 300.0, 60.0, 12.0, grouped())],
    )];
    engine.update_label_set(
        &view(10.1),
        0.016,
        &styles(),
        &mut tiles,
        &mut [],
        &cache,
        FrameOptions::default(),
    );
    let fresh = label(&tiles, 0, 0);
    assert_eq!(fresh.state(), LabelState::Visible);
    assert_eq!(fresh.transform().alpha, 1.0);
    assert_eq!(engine.last_zoom(), 10.1);
}

#[test]
fn proxy_match_radius_is_exclusive() {
    let grouped = || LabelOptions {
        repeat_group: 42,
        ..LabelOptions::default()
    };
    let parent_id = TileId::new(300, 200, 9);
    let mut engine = Labels::default();
    let mut visible = vec![tile_with(
        parent_id,
        vec![point(400.0, 300.0, 60.0, 12.0, grouped())],
    )];
    run(&mut engine, &mut visible, 9.9, 0.016);
    run(&mut engine, &mut visible, 9.9, 0.5);
    let mut cache = Cache::new();
    cache.insert((SourceId(0), parent_id), visible.remove(0));

    // Exactly the larger dimension away.
    let mut tiles = vec![tile_with(
        parent_id.child(0),
        vec![point(460.0, 300.0, 60.0, 12.0, grouped())],
    )];
    engine.update_label_set(
        &view(10.1),
        0.016,
        &styles(),
        &mut tiles,
        &mut [],
        &cache,
        FrameOptions::default(),
    );
    assert_eq!(label(&tiles, 0, 0).state(), LabelState::FadingIn);
}

#[test]
fn zoom_crossing_without_proxy_fades_in() {
    let mut engine = Labels::default();
    let mut tiles = vec![default_tile(vec![point(400.0, 300.0, 60.0, 12.0, opts(0.0))])];
    run(&mut engine, &mut tiles, 9.9, 0.016);
    run(&mut engine, &mut tiles, 10.1, 0.016);
    assert_eq!(label(&tiles, 0, 0).state(), LabelState::FadingIn);
}

#[test]
fn zooming_out_matches_cached_children() {
    let grouped = || LabelOptions {
        repeat_group: 9,
        ..LabelOptions::default()
    };
    let parent_id = TileId::new(100, 100, 9);
    let child_id = parent_id.child(2);

    let mut engine = Labels::default();
    let mut visible = vec![tile_with(
        child_id,
        vec![point(300.0, 300.0, 50.0, 10.0, grouped())],
    )];
    run(&mut engine, &mut visible, 10.5, 0.016);
    let mut cache = Cache::new();
    cache.insert((SourceId(0), child_id), visible.remove(0));

    let mut tiles = vec![tile_with(
        parent_id,
        vec![point(310.0, 302.0, 50.0, 10.0, grouped())],
    )];
    engine.update_label_set(
        &view(9.5),
        0.016,
        &styles(),
        &mut tiles,
        &mut [],
        &cache,
        FrameOptions::default(),
    );
    assert_eq!(label(&tiles, 0, 0).state(), LabelState::Visible);
}

#[test]
fn different_repeat_group_does_not_skip() {
    let parent_id = TileId::new(300, 200, 9);
    let mut engine = Labels::default();
    let mut visible = vec![tile_with(
        parent_id,
        vec![point(
            400.0,
            300.0,
            60.0,
            12.0,
            LabelOptions {
                repeat_group: 1,
                ..LabelOptions::default()
            },
        )],
    )];
    run(&mut engine, &mut visible, 9.9, 0.016);
    let mut cache = Cache::new();
    cache.insert((SourceId(0), parent_id), visible.remove(0));

    let mut tiles = vec![tile_with(
        parent_id.child(0),
        vec![point(
            400.0,
            300.0,
            60.0,
            12.0,
            LabelOptions {
                repeat_group: 2,
                ..LabelOptions::default()
            },
        )],
    )];
    engine.update_label_set(
        &view(10.1),
        0.016,
        &styles(),
        &mut tiles,
        &mut [],
        &cache,
        FrameOptions::default(),
    );
    assert_eq!(label(&tiles, 0, 0).state(), LabelState::FadingIn);
}

#[test]
fn needs_update_while_fading() {
    let mut engine = Labels::default();
    let mut tiles = vec![default_tile(vec![point(100.0, 100.0, 40.0, 10.0, opts(0.0))])];
    run(&mut engine, &mut tiles, 10.0, 0.016);
    assert!(engine.needs_update());
    run(&mut engine, &mut tiles, 10.0, 1.0);
    assert_eq!(label(&tiles, 0, 0).state(), LabelState::Visible);
    run(&mut engine, &mut tiles, 10.0, 0.016);
    assert!(!engine.needs_update());
}

#[test]
fn non_colliding_labels_bypass_occlusion() {
    let mut engine = Labels::default();
    let mut tiles = vec![default_tile(vec![
        point(100.0, 100.0, 40.0, 10.0, opts(0.0)),
        point(
            100.0,
            100.0,
            40.0,
            10.0,
            LabelOptions {
                priority: 9.0,
                collide: false,
                ..LabelOptions::default()
            },
        ),
    ])];
    run(&mut engine, &mut tiles, 10.0, 0.016);
    assert_eq!(engine.entries().len(), 1);
    assert_eq!(engine.placed().len(), 2);
}

#[test]
fn proxy_tile_labels_yield_to_regular_tiles() {
    let mut proxy = tile_with(
        TileId::new(5, 5, 9),
        vec![point(100.0, 100.0, 40.0, 10.0, opts(0.0))],
    );
    proxy.proxy = true;
    let regular = tile_with(
        TileId::new(10, 10, 10),
        vec![point(100.0, 100.0, 40.0, 10.0, opts(5.0))],
    );
    let mut tiles = vec![proxy, regular];
    let mut engine = Labels::default();
    run(&mut engine, &mut tiles, 10.0, 0.016);
    assert!(label(&tiles, 0, 0).is_occluded());
    assert!(!label(&tiles, 1, 0).is_occluded());
}

#[test]
fn tiled_labels_outrank_marker_labels() {
    let mut tiles = vec![default_tile(vec![point(100.0, 100.0, 40.0, 10.0, opts(1.0))])];
    let mut markers = vec![Marker {
        id: 1,
        style: STYLE,
        model: Mat4::IDENTITY,
        mesh: Some(StyledMesh::Labels(LabelSet::new(vec![point(
            105.0,
            100.0,
            40.0,
            10.0,
            opts(1.0),
        )]))),
    }];
    let mut engine = Labels::default();
    engine.update_label_set(
        &view(10.0),
        0.016,
        &styles(),
        &mut tiles,
        &mut markers,
        &Cache::new(),
        FrameOptions::default(),
    );
    let marker_label = markers[0].mesh.as_ref().unwrap().labels().unwrap().get(0).unwrap();
    assert!(marker_label.is_occluded());
    assert!(!label(&tiles, 0, 0).is_occluded());
}

#[test]
fn transitions_only_frame_keeps_decisions() {
    let mut engine = Labels::default();
    let mut tiles = vec![default_tile(vec![
        point(100.0, 100.0, 40.0, 10.0, opts(1.0)),
        point(110.0, 100.0, 40.0, 10.0, opts(2.0)),
    ])];
    run(&mut engine, &mut tiles, 10.0, 0.016);
    engine.update_transitions(
        &view(10.0),
        0.1,
        &styles(),
        &mut tiles,
        &mut [],
        FrameOptions::default(),
    );
    assert!(label(&tiles, 0, 1).is_occluded());
    assert!(!label(&tiles, 0, 0).is_occluded());
    assert_eq!(engine.placed().len(), 1);
    assert!(engine.needs_update());
    assert_eq!(engine.entries().len(), 2);
}

#[test]
fn non_label_meshes_contribute_nothing() {
    let mut tile = Tile::new(TileId::new(0, 0, 1), SourceId(0), screen_ortho(W, H));
    tile.meshes
        .insert(STYLE, StyledMesh::Geometry { vertex_count: 12 });
    tile.meshes.insert(
        StyleId(99),
        StyledMesh::Labels(LabelSet::new(vec![point(1.0, 1.0, 4.0, 4.0, opts(0.0))])),
    );
    let mut tiles = vec![tile];
    let mut engine = Labels::default();
    run(&mut engine, &mut tiles, 1.0, 0.016);
    assert!(engine.entries().is_empty());
    assert!(engine.placed().is_empty());
}

#[test]
fn offscreen_labels_are_not_inserted() {
    let mut engine = Labels::default();
    let mut tiles = vec![default_tile(vec![
        point(-200.0, 100.0, 40.0, 10.0, opts(0.0)),
        point(100.0, 100.0, 40.0, 10.0, opts(1.0)),
    ])];
    run(&mut engine, &mut tiles, 10.0, 0.016);
    let off = label(&tiles, 0, 0);
    assert_eq!(off.state(), LabelState::OutOfScreen);
    assert!(!off.is_occluded());
    assert_eq!(engine.grid().len(), 1);
}

fn interactive(x: f32, y: f32, name: &str) -> Label {
    let mut properties = Properties::new();
    properties.insert("name".to_string(), serde_json::Value::from(name));
    point(
        x,
        y,
        20.0,
        10.0,
        LabelOptions {
            interactive: true,
            properties: Arc::new(properties),
            ..LabelOptions::default()
        },
    )
}

#[test]
fn picking_returns_nearest_interactive_label() {
    let mut engine = Labels::default();
    let mut tiles = vec![default_tile(vec![
        interactive(100.0, 100.0, "first"),
        interactive(500.0, 500.0, "second"),
    ])];
    let items = engine.features_at_point(&view(10.0), &styles(), &mut tiles, 110.0, 105.0, false);
    assert_eq!(items.len(), 1);
    assert!((items[0].distance - 125f32.sqrt()).abs() < 1e-2);
    assert_eq!(items[0].properties.get("name").unwrap(), "first");
}

#[test]
fn picking_sorts_by_distance_and_skips_non_interactive() {
    let mut engine = Labels::default();
    let mut tiles = vec![default_tile(vec![
        interactive(120.0, 100.0, "far"),
        interactive(102.0, 100.0, "near"),
        point(100.0, 100.0, 20.0, 10.0, opts(0.0)),
    ])];
    let items = engine.features_at_point(&view(10.0), &styles(), &mut tiles, 100.0, 100.0, false);
    let names: Vec<&str> = items
        .iter()
        .map(|i| i.properties.get("name").unwrap().as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["near", "far"]);
}

#[test]
fn visible_only_picking_needs_a_shown_label() {
    let mut engine = Labels::default();
    let mut tiles = vec![default_tile(vec![interactive(100.0, 100.0, "first")])];
    let before = engine
        .features_at_point(&view(10.0), &styles(), &mut tiles, 100.0, 100.0, true)
        .len();
    assert_eq!(before, 0);
    run(&mut engine, &mut tiles, 10.0, 0.016);
    let after = engine
        .features_at_point(&view(10.0), &styles(), &mut tiles, 100.0, 100.0, true)
        .len();
    assert_eq!(after, 1);
}

#[test]
fn debug_primitives_follow_frame_options() {
    let mut engine = Labels::default();
    let mut tiles = vec![default_tile(vec![point(100.0, 100.0, 40.0, 10.0, opts(0.0))])];
    run(&mut engine, &mut tiles, 10.0, 0.016);
    assert!(engine.debug_primitives(&tiles, &[]).is_empty());

    engine.update_label_set(
        &view(10.0),
        0.016,
        &styles(),
        &mut tiles,
        &mut [],
        &Cache::new(),
        FrameOptions {
            debug_labels: true,
            ..FrameOptions::default()
        },
    );
    let primitives = engine.debug_primitives(&tiles, &[]);
    let quads = primitives
        .iter()
        .filter(|p| matches!(p, debug::DebugPrimitive::Quad { .. }))
        .count();
    assert_eq!(quads, 1);
    let (cols, rows) = engine.grid().dimensions();
    let cells = primitives
        .iter()
        .filter(|p| matches!(p, debug::DebugPrimitive::Rect { color, .. } if *color == debug::GRID_COLOR))
        .count();
    assert_eq!(cells, (cols * rows) as usize);
}

fn entry_strategy() -> impl Strategy<Value = LabelEntry> {
    (
        any::<bool>(),
        0u8..3,
        prop::option::of(0i32..3),
        any::<bool>(),
        any::<bool>(),
        prop::option::of(0u8..3),
        0u64..4,
        0usize..3,
    )
        .prop_map(|(proxy, priority, z, olf, visible, line, hash, index)| LabelEntry {
            key: LabelKey {
                owner: LabelOwner::Tile(0),
                style: STYLE,
                index,
            },
            tile: z.map(|z| TileId::new(0, 0, z)),
            proxy,
            priority: priority as f32,
            occluded_last_frame: olf,
            visible,
            line_length_sq: line.map(|l| l as f32),
            hash,
            parent: None,
        })
}

proptest! {
    #[test]
    fn comparator_is_strict_weak_ordering(
        a in entry_strategy(),
        b in entry_strategy(),
        c in entry_strategy(),
    ) {
        prop_assert_eq!(compare_entries(&a, &a), Ordering::Equal);
        prop_assert_eq!(compare_entries(&a, &b), compare_entries(&b, &a).reverse());
        if compare_entries(&a, &b) == Ordering::Less && compare_entries(&b, &c) == Ordering::Less {
            prop_assert_eq!(compare_entries(&a, &c), Ordering::Less);
        }
        if compare_entries(&a, &b) == Ordering::Equal && compare_entries(&b, &c) == Ordering::Equal {
            prop_assert_eq!(compare_entries(&a, &c), Ordering::Equal);
        }
    }

    #[test]
    fn accepted_repeat_group_members_keep_their_distance(
        members in prop::collection::vec(
            ((20.0f32..780.0, 20.0f32..580.0), prop::collection::vec(0usize..9, 1..4)),
            2..40,
        ),
        blockers in prop::collection::vec((20.0f32..780.0, 20.0f32..580.0), 0..20),
    ) {
        const ANCHORS: [Anchor; 9] = [
            Anchor::Center,
            Anchor::Top,
            Anchor::Bottom,
            Anchor::Left,
            Anchor::Right,
            Anchor::TopLeft,
            Anchor::TopRight,
            Anchor::BottomLeft,
            Anchor::BottomRight,
        ];
        let mut labels: Vec<Label> = members
            .iter()
            .enumerate()
            .map(|(i, ((x, y), anchors))| {
                point(*x, *y, 30.0, 12.0, LabelOptions {
                    priority: i as f32,
                    anchors: anchors.iter().map(|a| ANCHORS[*a]).collect(),
                    repeat_group: 5,
                    repeat_distance: 50.0,
                    ..LabelOptions::default()
                })
            })
            .collect();
        labels.extend(blockers.iter().map(|(x, y)| {
            point(*x, *y, 8.0, 8.0, LabelOptions {
                priority: -1.0,
                repeat_group: 6,
                ..LabelOptions::default()
            })
        }));
        let mut tiles = vec![default_tile(labels)];
        let mut engine = Labels::default();
        run(&mut engine, &mut tiles, 10.0, 0.016);

        let centers: Vec<Vec2> = tiles[0]
            .label_set(STYLE)
            .unwrap()
            .labels()
            .iter()
            .filter(|l| l.options().repeat_group == 5 && !l.is_occluded())
            .map(|l| l.center())
            .collect();
        for i in 0..centers.len() {
            for j in (i + 1)..centers.len() {
                prop_assert!(centers[i].distance(centers[j]) >= 50.0);
            }
        }
    }
}
