//! End-to-end properties of recording and rendering

mod common;

use common::{config, init_tracing, record, render, scene};
use ctx_core::{Color, Drawlist, FillRule, LineCap};
use ctx_render::Context;

#[test]
fn test_binary_round_trip_renders_identically() {
    init_tracing();
    let config = config(48, 64);
    let list = record(&config, scene);
    let restored = Drawlist::from_bytes(list.as_bytes(), list.capacity()).unwrap();
    assert_eq!(restored.as_bytes(), list.as_bytes());

    let (a, diagnostics) = render(&config, &list);
    let (b, _) = render(&config, &restored);
    assert!(diagnostics.is_clean(), "{diagnostics:?}");
    assert_eq!(a.data(), b.data());
    assert_eq!(a.pixel(1, 1), [255, 255, 255, 255]);
}

#[test]
fn test_text_round_trip_renders_identically() {
    init_tracing();
    let config = config(48, 64);
    let list = record(&config, scene);
    let parsed = Drawlist::parse(&list.to_text(), list.capacity()).unwrap();
    assert_eq!(parsed.as_bytes(), list.as_bytes());
    assert_eq!(render(&config, &parsed).0.data(), render(&config, &list).0.data());
}

#[test]
fn test_packed_list_renders_identically() {
    let config = config(48, 64);
    let list = record(&config, scene);
    let packed = list.pack();
    assert!(packed.len() < list.len());
    assert_eq!(render(&config, &packed).0.data(), render(&config, &list).0.data());
}

#[test]
fn test_fill_without_preserve_is_idempotent() {
    let config = config(24, 24);
    let draw = |fills: usize| {
        record(&config, |ctx| {
            ctx.rgba(1.0, 0.0, 0.0, 0.5);
            ctx.arc(12.0, 12.0, 7.5, 0.0, std::f32::consts::TAU, false);
            for _ in 0..fills {
                ctx.fill();
            }
        })
    };
    let once = render(&config, &draw(1)).0;
    let twice = render(&config, &draw(2)).0;
    assert_eq!(once.data(), twice.data());

    let preserved = record(&config, |ctx| {
        ctx.rgba(1.0, 0.0, 0.0, 0.5);
        ctx.arc(12.0, 12.0, 7.5, 0.0, std::f32::consts::TAU, false);
        ctx.preserve();
        ctx.fill();
        ctx.fill();
    });
    assert_ne!(render(&config, &preserved).0.data(), once.data());
}

#[test]
fn test_fill_rules_agree_on_simple_polygons() {
    let config = config(32, 32);
    let draw = |rule: FillRule| {
        record(&config, move |ctx| {
            ctx.fill_rule(rule);
            ctx.color(Color::GREEN);
            ctx.move_to(2.0, 2.0);
            ctx.line_to(30.0, 5.5);
            ctx.line_to(18.0, 17.0);
            ctx.line_to(10.25, 29.0);
            ctx.close_path();
            ctx.fill();
        })
    };
    let non_zero = render(&config, &draw(FillRule::Winding)).0;
    let even_odd = render(&config, &draw(FillRule::EvenOdd)).0;
    assert_eq!(non_zero.data(), even_odd.data());
    assert!(non_zero.data().iter().any(|b| *b != 0));
}

#[test]
fn test_save_restore_is_symmetric() {
    let mut ctx = Context::new_drawlist(&config(16, 16)).unwrap();
    ctx.start_frame();
    ctx.color(Color::BLUE);
    let before = ctx.state().clone();

    ctx.save();
    ctx.translate(4.0, 2.0);
    ctx.scale(2.0, 3.0);
    ctx.rectangle(0.0, 0.0, 4.0, 4.0);
    ctx.clip();
    ctx.rgba(0.1, 0.2, 0.3, 0.4);
    ctx.line_width(7.0);
    ctx.line_cap(LineCap::Square);
    ctx.line_dash(&[1.0, 2.0]);
    ctx.global_alpha(0.5);
    ctx.font_size(30.0);
    ctx.restore();

    assert_eq!(ctx.state(), &before);
    assert!(ctx.end_frame().unwrap().is_clean());
}

#[test]
fn test_restore_discards_drawing_state_for_later_ops() {
    let config = config(16, 16);
    let plain = record(&config, |ctx| {
        ctx.color(Color::RED);
        ctx.rectangle(2.0, 2.0, 6.0, 6.0);
        ctx.fill();
    });
    let scoped = record(&config, |ctx| {
        ctx.color(Color::RED);
        ctx.save();
        ctx.translate(5.0, 5.0);
        ctx.color(Color::BLUE);
        ctx.restore();
        ctx.rectangle(2.0, 2.0, 6.0, 6.0);
        ctx.fill();
    });
    assert_eq!(render(&config, &plain).0.data(), render(&config, &scoped).0.data());
}

#[test]
fn test_gradient_hits_stop_colors() {
    let config = config(65, 2);
    let list = record(&config, |ctx| {
        ctx.linear_gradient(0.5, 0.0, 64.5, 0.0);
        ctx.gradient_add_stop(0.0, Color::RED);
        ctx.gradient_add_stop(0.5, Color::GREEN);
        ctx.gradient_add_stop(1.0, Color::BLUE);
        ctx.paint();
    });
    let (buffer, _) = render(&config, &list);
    let close = |got: [u8; 4], want: [u8; 4]| got.iter().zip(want).all(|(g, w)| (*g as i32 - w as i32).abs() <= 1);
    assert!(close(buffer.pixel(0, 0), [255, 0, 0, 255]), "{:?}", buffer.pixel(0, 0));
    assert!(close(buffer.pixel(32, 1), [0, 255, 0, 255]), "{:?}", buffer.pixel(32, 1));
    assert!(close(buffer.pixel(64, 0), [0, 0, 255, 255]), "{:?}", buffer.pixel(64, 0));
}
