//! Backends agree with the reference renderer

mod common;

use std::sync::{Arc, Mutex};

use ctx_core::{Color, PixelFormat};
use ctx_raster::PixelBuffer;
use ctx_render::{Context, DrawlistBackend, RenderConfig};

use common::{config, init_tracing, record, render, scene};

/// Copy pushed regions into a full-size image
fn compositor(image: Arc<Mutex<PixelBuffer>>, pushes: Arc<Mutex<usize>>) -> impl FnMut(u32, u32, u32, u32, &[u8]) + Send {
    move |x, y, w, h, data: &[u8]| {
        let mut image = image.lock().unwrap();
        let bpp = image.format().bytes_per_pixel() as usize;
        let (stride, row_bytes) = (image.stride(), w as usize * bpp);
        for row in 0..h as usize {
            let dst = (y as usize + row) * stride + x as usize * bpp;
            let src = row * row_bytes;
            image.data_mut()[dst..dst + row_bytes].copy_from_slice(&data[src..src + row_bytes]);
        }
        *pushes.lock().unwrap() += 1;
    }
}

fn replay(ctx: &mut Context<impl ctx_render::Backend>, config: &RenderConfig) {
    let list = record(config, scene);
    ctx.set_drawlist(list.as_bytes()).unwrap();
}

#[test]
fn test_framebuffer_backend_matches_renderer() {
    init_tracing();
    let config = config(48, 64);
    let (expected, _) = render(&config, &record(&config, scene));

    let mut ctx = Context::new_framebuffer(&config).unwrap();
    ctx.start_frame();
    replay(&mut ctx, &config);
    assert!(ctx.end_frame().unwrap().is_clean());
    assert_eq!(ctx.framebuffer().data(), expected.data());
}

#[test]
fn test_callback_chunks_reassemble_frame() {
    init_tracing();
    let config = config(48, 64)
        .with_render_threads(3)
        .with_memory_budget(48 * 4 * 7);
    let (expected, _) = render(&config, &record(&config, scene));

    let image = Arc::new(Mutex::new(PixelBuffer::new(48, 64, PixelFormat::Rgba8).unwrap()));
    let pushes = Arc::new(Mutex::new(0));
    let mut ctx = Context::new_callback(&config, compositor(image.clone(), pushes.clone())).unwrap();
    ctx.start_frame();
    replay(&mut ctx, &config);
    ctx.end_frame().unwrap();

    assert_eq!(*pushes.lock().unwrap(), 10);
    assert_eq!(image.lock().unwrap().data(), expected.data());
}

#[test]
fn test_callback_hash_cache_pushes_only_changes() {
    let config = config(48, 64).with_hash_cache(true);
    let image = Arc::new(Mutex::new(PixelBuffer::new(48, 64, PixelFormat::Rgba8).unwrap()));
    let pushes = Arc::new(Mutex::new(0));
    let mut ctx = Context::new_callback(&config, compositor(image.clone(), pushes.clone())).unwrap();

    let frame = |ctx: &mut Context<_>, color: Color| {
        ctx.start_frame();
        ctx.color(color);
        ctx.rectangle(2.0, 2.0, 4.0, 4.0);
        ctx.fill();
        ctx.end_frame().unwrap();
    };

    frame(&mut ctx, Color::RED);
    assert_eq!(ctx.backend().damage().len(), 32);
    frame(&mut ctx, Color::RED);
    assert!(ctx.backend().damage().is_empty());
    frame(&mut ctx, Color::GREEN);
    // Square 2..6 padded to 1..7 spans the first two 6-pixel tile columns
    assert_eq!(ctx.backend().damage().len(), 2);

    let (expected, _) = render(
        &config,
        &record(&config, |ctx| {
            ctx.color(Color::GREEN);
            ctx.rectangle(2.0, 2.0, 4.0, 4.0);
            ctx.fill();
        }),
    );
    assert_eq!(image.lock().unwrap().data(), expected.data());
}

#[test]
fn test_threaded_backend_renders_after_wait() {
    init_tracing();
    let config = config(48, 64).with_render_threads(2);
    let (expected, _) = render(&config, &record(&config, scene));

    let mut ctx = Context::new_threaded(&config).unwrap();
    for _ in 0..3 {
        ctx.start_frame();
        replay(&mut ctx, &config);
        ctx.end_frame().unwrap();
    }
    ctx.wait_for_renderer();
    let backend = ctx.backend();
    assert_eq!(backend.completed(), 3);
    assert!(backend.frames_rendered() >= 1);
    assert_eq!(backend.with_framebuffer(|fb| fb.data().to_vec()), expected.data());
}

#[test]
fn test_drawlist_backend_only_records() {
    let config = config(16, 16);
    let mut ctx: Context<DrawlistBackend> = Context::new_drawlist(&config).unwrap();
    ctx.start_frame();
    ctx.color(Color::RED);
    ctx.fill_rect(0.0, 0.0, 4.0, 4.0);
    assert!(ctx.end_frame().unwrap().is_clean());
    assert_eq!(ctx.drawlist().iter().count(), 2);
}
