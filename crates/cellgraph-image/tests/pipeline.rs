//! Integration tests for Constant -> Reformat pipelines.

use std::sync::Arc;

use cellgraph_core::{Box2i, Context, Format, V2i};
use cellgraph_engine::{dirty_set, Engine, UnboundedPolicy};
use cellgraph_image::{connect_image, tile_origins, Constant, Reformat, ReformatMode, TILE_SIZE};

struct Pipeline {
    engine: Engine,
    constant: Arc<Constant>,
    reformat: Arc<Reformat>,
}

fn pipeline(input: Format, output: Format) -> Pipeline {
    let engine = Engine::with_policy(Default::default(), Box::new(UnboundedPolicy::new()));
    let constant = engine.add_node("constant", Constant::build);
    let reformat = engine.add_node("reformat", Reformat::build);
    connect_image(&engine, &constant.out, &reformat.input).unwrap();
    engine.set_value(constant.format, input).unwrap();
    engine.set_value(reformat.format, output).unwrap();
    Pipeline {
        engine,
        constant,
        reformat,
    }
}

#[test]
fn test_scale_law_through_the_graph() {
    let p = pipeline(Format::new(100, 50), Format::new(200, 50));
    let ctx = Context::new();
    let cases = [
        (ReformatMode::Width, (2.0, 2.0)),
        (ReformatMode::Height, (1.0, 1.0)),
        (ReformatMode::Fit, (1.0, 1.0)),
        (ReformatMode::Fill, (2.0, 2.0)),
        (ReformatMode::Distort, (2.0, 1.0)),
    ];
    for (mode, (x, y)) in cases {
        p.engine.set_value(p.reformat.mode, mode.as_i32()).unwrap();
        assert_eq!(p.engine.get(p.reformat.scale_x, &ctx).unwrap(), x, "{mode:?}");
        assert_eq!(p.engine.get(p.reformat.scale_y, &ctx).unwrap(), y, "{mode:?}");
    }
}

#[test]
fn test_centered_fit_origin_golden() {
    let p = pipeline(Format::new(100, 200), Format::new(100, 100));
    p.engine.set_value(p.reformat.mode, ReformatMode::Fit.as_i32()).unwrap();
    p.engine.set_value(p.reformat.center_enabled, true).unwrap();
    let ctx = Context::new();

    assert_eq!(p.engine.get(p.reformat.origin_x, &ctx).unwrap(), -50.0);
    assert_eq!(p.engine.get(p.reformat.origin_y, &ctx).unwrap(), 0.0);
    assert_eq!(p.engine.get(p.reformat.scale_x, &ctx).unwrap(), 0.5);

    // (0,0)-(100,200) scaled by 0.5 about (-50, 0).
    assert_eq!(
        p.engine.get(p.reformat.out.data_window, &ctx).unwrap(),
        Box2i::new(V2i::new(-25, 0), V2i::new(25, 100))
    );
}

#[test]
fn test_output_format_and_forwarded_channels() {
    let p = pipeline(Format::new(100, 50), Format::new(200, 100));
    let ctx = Context::new();
    assert_eq!(
        p.engine.get(p.reformat.out.format, &ctx).unwrap(),
        Format::new(200, 100)
    );
    assert_eq!(
        p.engine.get(p.reformat.out.channel_names, &ctx).unwrap(),
        p.engine.get(p.constant.out.channel_names, &ctx).unwrap()
    );

    p.engine.set_value(p.constant.value, 0.25).unwrap();
    let tile_ctx = Context::tile("B", V2i::new(0, 0));
    let tile = p.engine.get(p.reformat.out.channel_data, &tile_ctx).unwrap();
    assert_eq!(tile.len(), (TILE_SIZE * TILE_SIZE) as usize);
    assert!(tile.iter().all(|&v| v == 0.25));
}

#[test]
fn test_matching_formats_pass_through() {
    let p = pipeline(Format::new(64, 64), Format::new(64, 64));
    let tile_ctx = Context::tile("R", V2i::new(0, 0));
    let r = &p.reformat;

    for ctx in [Context::new(), tile_ctx] {
        for (out, input) in r.out.cells().into_iter().zip(r.input.cells()) {
            assert_eq!(
                p.engine.hash(out, &ctx).unwrap(),
                p.engine.hash(input, &ctx).unwrap()
            );
        }
    }
    p.engine.get(r.out.channel_data, &Context::tile("R", V2i::new(0, 0))).unwrap();
    // The constant's format (read by the enabled check), the two unit scale
    // factors (read by the nested scale) and the requested tile.
    assert_eq!(p.engine.stats().computes, 4);
}

#[test]
fn test_disabled_reformat_passes_through() {
    let p = pipeline(Format::new(100, 50), Format::new(200, 100));
    let ctx = Context::new();
    let enabled_hash = p.engine.hash(p.reformat.out.data_window, &ctx).unwrap();

    p.engine.set_value(p.reformat.enabled, false).unwrap();
    let disabled_hash = p.engine.hash(p.reformat.out.data_window, &ctx).unwrap();
    assert_ne!(enabled_hash, disabled_hash);
    assert_eq!(
        disabled_hash,
        p.engine.hash(p.reformat.input.data_window, &ctx).unwrap()
    );
    assert_eq!(
        p.engine.get(p.reformat.out.data_window, &ctx).unwrap(),
        Box2i::from_size(100, 50)
    );
}

#[test]
fn test_empty_input_format_fails_compute() {
    let p = pipeline(Format::new(0, 0), Format::new(100, 100));
    let err = p.engine.get(p.reformat.scale_x, &Context::new()).unwrap_err();
    assert!(matches!(
        err,
        cellgraph_engine::EngineError::ComputeFailure { cell, .. } if cell == p.reformat.scale_x.cell()
    ));
}

#[test]
fn test_mode_change_dirties_geometry_and_scaled_outputs() {
    let p = pipeline(Format::new(100, 50), Format::new(200, 100));
    let r = &p.reformat;
    let s = &r.scale;
    let snapshot = p.engine.snapshot();

    let dirty = dirty_set(&snapshot, r.mode.cell()).unwrap();
    assert_eq!(
        dirty,
        vec![
            r.mode.cell(),
            r.scale_x.cell(),
            s.scale_x.cell(),
            s.out.data_window.cell(),
            r.out.data_window.cell(),
            s.out.channel_data.cell(),
            r.out.channel_data.cell(),
            r.scale_y.cell(),
            s.scale_y.cell(),
            r.origin_x.cell(),
            s.origin_x.cell(),
            r.origin_y.cell(),
            s.origin_y.cell(),
        ]
    );
    assert!(!dirty.contains(&r.out.format.cell()));
}

#[test]
fn test_constant_value_change_reaches_reformat_channel_data() {
    let p = pipeline(Format::new(100, 50), Format::new(200, 100));
    let snapshot = p.engine.snapshot();
    let dirty = dirty_set(&snapshot, p.constant.value.cell()).unwrap();
    assert_eq!(
        dirty,
        vec![
            p.constant.value.cell(),
            p.constant.out.channel_data.cell(),
            p.reformat.input.channel_data.cell(),
            p.reformat.scale.input.channel_data.cell(),
            p.reformat.scale.out.channel_data.cell(),
            p.reformat.out.channel_data.cell(),
        ]
    );
    assert!(!dirty.contains(&p.reformat.out.data_window.cell()));
}

#[test]
fn test_unrelated_edit_keeps_data_window_memoized() {
    let p = pipeline(Format::new(100, 50), Format::new(200, 100));
    let ctx = Context::new();
    p.engine.get(p.reformat.out.data_window, &ctx).unwrap();
    let computes = p.engine.stats().computes;

    p.engine.set_value(p.constant.value, 0.75).unwrap();
    p.engine.get(p.reformat.out.data_window, &ctx).unwrap();
    assert_eq!(p.engine.stats().computes, computes);
}

#[test]
fn test_reformat_delegates_to_nested_scale() {
    let p = pipeline(Format::new(100, 50), Format::new(200, 100));
    let r = &p.reformat;
    let ctx = Context::new();

    assert_eq!(p.engine.cell_name(r.scale.out.data_window), "reformat.__scale.out.dataWindow");
    assert_eq!(
        p.engine.get(r.scale.scale_x, &ctx).unwrap(),
        p.engine.get(r.scale_x, &ctx).unwrap()
    );
    assert_eq!(
        p.engine.hash(r.out.data_window, &ctx).unwrap(),
        p.engine.hash(r.scale.out.data_window, &ctx).unwrap()
    );
    assert_eq!(
        p.engine.get(r.out.data_window, &ctx).unwrap(),
        Box2i::from_size(200, 100)
    );

    let id = p.engine.node_of(r.format).unwrap();
    p.engine.remove_node(id).unwrap();
    assert!(matches!(
        p.engine.value(r.scale.out.data_window, &ctx).unwrap_err(),
        cellgraph_engine::EngineError::CellNotFound(_)
    ));
    assert_eq!(p.engine.outputs(p.constant.out.data_window), vec![]);
}

#[test]
fn test_format_is_read_once_for_every_tile() {
    let p = pipeline(Format::new(200, 100), Format::new(100, 50));
    for origin in tile_origins(&Box2i::from_size(200, 100)) {
        for channel in ["R", "G"] {
            let ctx = Context::tile(channel, origin);
            p.engine.hash(p.reformat.out.format, &ctx).unwrap();
        }
    }
    // Only the constant's format, evaluated once without the tile variables.
    assert_eq!(p.engine.stats().computes, 1);
}

#[test]
fn test_extreme_display_window_hashes_without_overflow() {
    let wide = Format {
        display_window: Box2i::new(V2i::new(-2_000_000_000, 0), V2i::new(2_000_000_000, 10)),
        ..Format::new(0, 0)
    };
    let p = pipeline(wide, Format::new(1920, 1080));
    let ctx = Context::new();

    p.engine.hash(p.reformat.scale_x, &ctx).unwrap();
    p.engine.hash(p.reformat.scale_y, &ctx).unwrap();
    let scale_x = p.engine.get(p.reformat.scale_x, &ctx).unwrap();
    assert_eq!(scale_x, (1920.0f64 / 4_000_000_000.0) as f32);
    let window = p.engine.get(p.reformat.out.data_window, &ctx).unwrap();
    assert_eq!(window.min, V2i::new(-2_000_000_000, 0));
}

#[test]
fn test_unrepresentable_output_window_fails_compute() {
    let full = Format {
        display_window: Box2i::new(V2i::new(i32::MIN, 0), V2i::new(i32::MAX, 10)),
        ..Format::new(0, 0)
    };
    let p = pipeline(Format::new(1, 10), full);
    p.engine.set_value(p.reformat.mode, ReformatMode::Distort.as_i32()).unwrap();
    let ctx = Context::new();

    p.engine.hash(p.reformat.out.data_window, &ctx).unwrap();
    let err = p.engine.get(p.reformat.out.data_window, &ctx).unwrap_err();
    assert!(matches!(
        err,
        cellgraph_engine::EngineError::ComputeFailure { cell, .. } if cell == p.reformat.scale.out.data_window.cell()
    ));
}

#[test]
fn test_empty_matching_formats_pass_through() {
    let p = pipeline(Format::new(0, 0), Format::new(0, 0));
    let ctx = Context::new();
    assert_eq!(p.engine.get(p.reformat.scale_x, &ctx).unwrap(), 1.0);
    assert_eq!(
        p.engine.hash(p.reformat.out.data_window, &ctx).unwrap(),
        p.engine.hash(p.reformat.input.data_window, &ctx).unwrap()
    );
}
