use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ctx_core::{Antialias, Color, GraphicsState, PaintSource, PathSegment, PixelFormat, Point};
use ctx_raster::{NoTextures, Painter, PixelBuffer};

fn star(cx: f32, cy: f32, r: f32, points: usize) -> Vec<PathSegment> {
    let mut path = Vec::with_capacity(points * 2 + 1);
    for i in 0..points * 2 {
        let a = i as f32 * std::f32::consts::PI / points as f32;
        let radius = if i % 2 == 0 { r } else { r * 0.45 };
        let p = Point::new(cx + radius * a.cos(), cy + radius * a.sin());
        path.push(if i == 0 {
            PathSegment::MoveTo(p)
        } else {
            PathSegment::LineTo(p)
        });
    }
    path.push(PathSegment::Close);
    path
}

fn bench_fill(c: &mut Criterion) {
    let path = star(256.0, 256.0, 240.0, 12);
    let mut state = GraphicsState::new(512, 512);
    state.fill_source = PaintSource::Solid(Color::rgba(0.2, 0.5, 0.8, 0.9));

    for aa in [Antialias::None, Antialias::Default, Antialias::Full] {
        let mut buffer = PixelBuffer::new(512, 512, PixelFormat::Rgba8).unwrap();
        let mut painter = Painter::new(16 * 1024, aa, 16);
        c.bench_function(&format!("fill_star_{}", aa.name()), |b| {
            b.iter(|| {
                black_box(painter.fill(&mut buffer.view_mut(), &path, &state, &NoTextures));
            })
        });
    }
}

fn bench_stroke(c: &mut Criterion) {
    let path = star(256.0, 256.0, 240.0, 12);
    let mut state = GraphicsState::new(512, 512);
    state.stroke_source = PaintSource::Solid(Color::BLACK);
    state.line.width = 6.0;

    let mut buffer = PixelBuffer::new(512, 512, PixelFormat::Rgba8).unwrap();
    let mut painter = Painter::new(16 * 1024, Antialias::Default, 16);
    c.bench_function("stroke_star", |b| {
        b.iter(|| {
            black_box(painter.stroke(&mut buffer.view_mut(), &path, &state, &NoTextures));
        })
    });
}

fn bench_formats(c: &mut Criterion) {
    let path = star(128.0, 128.0, 120.0, 7);
    let mut state = GraphicsState::new(256, 256);
    state.fill_source = PaintSource::Solid(Color::rgba(1.0, 0.3, 0.1, 0.7));

    for format in [PixelFormat::Rgba8, PixelFormat::Rgb565, PixelFormat::Gray8] {
        let mut buffer = PixelBuffer::new(256, 256, format).unwrap();
        let mut painter = Painter::new(4096, Antialias::Default, 4);
        c.bench_function(&format!("fill_{}", format.name()), |b| {
            b.iter(|| {
                black_box(painter.fill(&mut buffer.view_mut(), &path, &state, &NoTextures));
            })
        });
    }
}

criterion_group!(raster_benches, bench_fill, bench_stroke, bench_formats);
criterion_main!(raster_benches);
