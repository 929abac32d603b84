//! Shared helpers for the integration tests

#![allow(dead_code)]

use ctx_core::{Color, Diagnostics, Drawlist, LineJoin};
use ctx_raster::PixelBuffer;
use ctx_render::{Context, RenderConfig, Renderer, TextureCache};
use tracing_subscriber::EnvFilter;

/// Route `tracing` output through the test harness; `RUST_LOG` selects levels
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn config(width: u32, height: u32) -> RenderConfig {
    RenderConfig::standard().with_size(width, height)
}

/// Render a drawlist into a fresh buffer
pub fn render(config: &RenderConfig, list: &Drawlist) -> (PixelBuffer, Diagnostics) {
    let mut renderer = Renderer::new(config).unwrap();
    let mut textures = TextureCache::new(config.capacities.texture_slots);
    let mut buffer = PixelBuffer::new(config.width, config.height, config.format).unwrap();
    let diagnostics = renderer.render(list, buffer.view_mut(), &mut textures);
    (buffer, diagnostics)
}

/// Record a frame with a drawlist-only context
pub fn record(config: &RenderConfig, draw: impl FnOnce(&mut Context<ctx_render::DrawlistBackend>)) -> Drawlist {
    let mut ctx = Context::new_drawlist(config).unwrap();
    ctx.start_frame();
    draw(&mut ctx);
    ctx.drawlist().clone()
}

/// A frame exercising paths, transforms, gradients, strokes and pixels
pub fn scene(ctx: &mut Context<ctx_render::DrawlistBackend>) {
    ctx.rgba(0.2, 0.4, 0.8, 1.0);
    ctx.round_rectangle(4.0, 4.0, 40.0, 24.0, 6.0);
    ctx.fill();

    ctx.save();
    ctx.translate(30.0, 30.0);
    ctx.rotate(0.3);
    ctx.linear_gradient(0.0, 0.0, 20.0, 0.0);
    ctx.gradient_add_stop(0.0, Color::RED);
    ctx.gradient_add_stop(1.0, Color::rgba(1.0, 1.0, 0.0, 0.5));
    ctx.rectangle(0.0, 0.0, 20.0, 10.0);
    ctx.fill();
    ctx.restore();

    ctx.line_width(3.0);
    ctx.line_join(LineJoin::Round);
    ctx.rgba8(20, 200, 40, 200);
    ctx.move_to(2.0, 60.0);
    ctx.rel_line_to(8.0, -4.0);
    ctx.rel_line_to(8.0, 4.0);
    ctx.rel_line_to(8.0, -4.0);
    ctx.rel_line_to(8.0, 4.0);
    ctx.curve_to(40.0, 40.0, 44.0, 70.0, 46.0, 50.0);
    ctx.stroke();

    ctx.set_pixel(1, 1, 255, 255, 255, 255);
}
