//! Reference scenarios for the rasterizer fast paths and soft limits

mod common;

use common::{config, init_tracing, record, render};
use ctx_core::{strhash, Capacities, Color, LineCap, Matrix, PixelFormat};
use ctx_render::Context;

#[test]
fn test_rect_fast_path_matches_general_path() {
    let config = config(24, 24);
    let fast = record(&config, |ctx| {
        ctx.rgba(0.3, 0.6, 0.9, 0.75);
        ctx.rectangle(3.0, 5.0, 14.0, 9.0);
        ctx.fill();
    });
    // The extra collinear vertex keeps the polygon off the rectangle fast path
    let general = record(&config, |ctx| {
        ctx.rgba(0.3, 0.6, 0.9, 0.75);
        ctx.move_to(3.0, 5.0);
        ctx.line_to(10.0, 5.0);
        ctx.line_to(17.0, 5.0);
        ctx.line_to(17.0, 14.0);
        ctx.line_to(3.0, 14.0);
        ctx.close_path();
        ctx.fill();
    });
    let (fast, _) = render(&config, &fast);
    let (general, _) = render(&config, &general);
    assert_eq!(fast.data(), general.data());
    assert_eq!(fast.pixel(3, 5), fast.pixel(16, 13));
    assert_eq!(fast.pixel(2, 5), [0, 0, 0, 0]);
    assert_eq!(fast.pixel(17, 5), [0, 0, 0, 0]);
}

#[test]
fn test_zero_length_round_cap_draws_disk() {
    let config = config(16, 16);
    let list = record(&config, |ctx| {
        ctx.color(Color::WHITE);
        ctx.line_width(10.0);
        ctx.line_cap(LineCap::Round);
        ctx.move_to(8.0, 8.0);
        ctx.line_to(8.0, 8.0);
        ctx.stroke();
    });
    let (buffer, _) = render(&config, &list);
    let area: f32 = (0..16)
        .flat_map(|y| (0..16).map(move |x| (x, y)))
        .map(|(x, y)| buffer.pixel(x, y)[3] as f32 / 255.0)
        .sum();
    let expected = std::f32::consts::PI * 25.0;
    assert!((area - expected).abs() < 3.0, "area {area}");
    assert_eq!(buffer.pixel(8, 8), [255, 255, 255, 255]);
    assert_eq!(buffer.pixel(8, 2), [0, 0, 0, 0]);
}

#[test]
fn test_edge_overflow_truncates_and_continues() {
    init_tracing();
    let config = config(32, 32).with_capacities(Capacities::standard().with_edge_table(16));
    let mut ctx = Context::new_framebuffer(&config).unwrap();
    ctx.start_frame();
    ctx.color(Color::RED);
    // 40-point star, more edges than the table holds
    for i in 0..40 {
        let angle = i as f32 * std::f32::consts::TAU / 40.0;
        let radius = if i % 2 == 0 { 14.0 } else { 8.0 };
        ctx.line_to(16.0 + radius * angle.cos(), 16.0 + radius * angle.sin());
    }
    ctx.close_path();
    ctx.fill();
    ctx.color(Color::BLUE);
    ctx.rectangle(0.0, 0.0, 4.0, 4.0);
    ctx.fill();
    let diagnostics = ctx.end_frame().unwrap();

    assert!(diagnostics.edge_overflow);
    assert_eq!(ctx.framebuffer().pixel(1, 1), [0, 0, 255, 255]);
}

#[test]
fn test_three_stop_gradient_quarter_is_midpoint() {
    let config = config(64, 1);
    let list = record(&config, |ctx| {
        ctx.linear_gradient(-0.5, 0.0, 63.5, 0.0);
        ctx.gradient_add_stop(0.0, Color::BLACK);
        ctx.gradient_add_stop(0.5, Color::RED);
        ctx.gradient_add_stop(1.0, Color::WHITE);
        ctx.paint();
    });
    let (buffer, _) = render(&config, &list);
    let [r, g, b, a] = buffer.pixel(15, 0);
    assert!((126..=129).contains(&r), "red {r}");
    assert_eq!((g, b, a), (0, 0, 255));
}

#[test]
fn test_far_away_vertices_fill_visible_part() {
    init_tracing();
    let mut ctx = Context::new_framebuffer(&config(64, 64)).unwrap();
    ctx.start_frame();
    ctx.color(Color::WHITE);
    ctx.move_to(-1e30, -1e30);
    ctx.line_to(0.0, 50.0);
    ctx.line_to(50.0, 50.0);
    ctx.close_path();
    ctx.fill();
    let diagnostics = ctx.end_frame().unwrap();

    assert!(!diagnostics.edge_overflow);
    let fb = ctx.framebuffer();
    assert_eq!(fb.pixel(20, 48), [255, 255, 255, 255]);
    assert_eq!(fb.pixel(5, 10), [255, 255, 255, 255]);
    assert_eq!(fb.pixel(30, 10), [0, 0, 0, 0]);
    assert_eq!(fb.pixel(20, 55), [0, 0, 0, 0]);
}

#[test]
fn test_far_away_dashed_stroke_keeps_rendering() {
    let mut ctx = Context::new_framebuffer(&config(16, 16)).unwrap();
    ctx.start_frame();
    ctx.color(Color::WHITE);
    ctx.line_width(2.0);
    ctx.line_dash(&[2.0, 3.0]);
    ctx.move_to(-1e30, 8.0);
    ctx.line_to(1e30, 8.0);
    ctx.stroke();
    ctx.move_to(-1e30, -1e30);
    ctx.line_to(1e30, 1e30);
    ctx.stroke();
    ctx.color(Color::BLUE);
    ctx.rectangle(12.0, 0.0, 4.0, 4.0);
    ctx.fill();
    ctx.end_frame().unwrap();

    assert_eq!(ctx.framebuffer().pixel(13, 1), [0, 0, 255, 255]);
}

#[test]
fn test_straight_alpha_texture_composites_as_premultiplied() {
    let mut ctx = Context::new_framebuffer(&config(8, 8)).unwrap();
    ctx.start_frame();
    ctx.color(Color::BLACK);
    ctx.paint();
    ctx.image_smoothing(false);
    let eid = ctx.define_texture(None, 1, 1, PixelFormat::Rgba8, 4, &[255, 255, 255, 128]);
    ctx.draw_texture(&eid, 0.0, 0.0, 8.0, 8.0);
    let diagnostics = ctx.end_frame().unwrap();

    assert_eq!(diagnostics.missing_textures, 0);
    assert_eq!(ctx.framebuffer().pixel(3, 3), [128, 128, 128, 255]);

    ctx.start_frame();
    ctx.color(Color::WHITE);
    ctx.paint();
    ctx.image_smoothing(false);
    let eid = ctx.define_texture(None, 1, 1, PixelFormat::Rgba8, 4, &[255, 255, 255, 128]);
    ctx.draw_texture(&eid, 0.0, 0.0, 8.0, 8.0);
    ctx.end_frame().unwrap();
    assert_eq!(ctx.framebuffer().pixel(5, 2), [255, 255, 255, 255]);
}

#[test]
fn test_far_perspective_texture_coordinates_render() {
    let mut ctx = Context::new_framebuffer(&config(16, 16)).unwrap();
    ctx.start_frame();
    let texels = [255, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255, 255, 255, 255, 255];
    for smoothing in [false, true] {
        ctx.image_smoothing(smoothing);
        let eid = ctx.define_texture(Some("checker"), 2, 2, PixelFormat::Rgba8, 8, &texels);
        ctx.texture(&eid, 0.0, 0.0);
        // unit determinant; the inverse shears x by 1e20 per row
        ctx.source_transform(&Matrix {
            m: [[1.0, -1e20, 0.0], [0.0, 1.0, 0.0], [0.0, -1e-3, 1.0]],
        });
        ctx.rectangle(0.0, 0.0, 16.0, 16.0);
        ctx.fill();
    }
    let diagnostics = ctx.end_frame().unwrap();
    assert_eq!(diagnostics.missing_textures, 0);
}

#[test]
fn test_repeated_key_writes_keep_latest_value() {
    let mut ctx = Context::new_framebuffer(&config(4, 4)).unwrap();
    ctx.start_frame();
    let x = strhash("x");
    for i in 0..200 {
        ctx.set_float(x, i as f32);
    }
    let label = strhash("label");
    for i in 0..2000 {
        ctx.set_string(label, &format!("frame-label-{i}"));
    }
    assert_eq!(ctx.get_float(x), Some(199.0));
    assert_eq!(ctx.get_string(label), Some("frame-label-1999"));

    ctx.save();
    for i in 0..200 {
        ctx.set_float(x, -(i as f32));
    }
    assert_eq!(ctx.get_float(x), Some(-199.0));
    ctx.restore();
    assert_eq!(ctx.get_float(x), Some(199.0));

    let diagnostics = ctx.end_frame().unwrap();
    assert_eq!(diagnostics.keydb_overflow, 0);
}
