//! Dedicated render thread
//!
//! [`ThreadedBackend`] hands each finished drawlist to a render thread over
//! a one-slot channel, so at most one frame is queued while another is
//! being rendered. A queued frame is skipped when a newer one has been
//! submitted or when the host cancelled it, and hosts synchronise with
//! [`ThreadedBackend::wait_for_renderer`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use ctx_core::{Diagnostics, Drawlist};
use ctx_raster::PixelBuffer;
use parking_lot::{Condvar, Mutex};

use crate::backend::Backend;
use crate::config::RenderConfig;
use crate::error::{RenderError, Result};
use crate::font::FontEngine;
use crate::renderer::Renderer;
use crate::texture::TextureCache;

enum Job {
    Frame { generation: u64, list: Drawlist },
    DropEid(String),
    TextureClock(u64),
    FontEngine(Option<Arc<dyn FontEngine>>),
}

struct Shared {
    submitted: AtomicU64,
    cancelled: AtomicU64,
    running: AtomicBool,
    rendered: AtomicU64,
    skipped: AtomicU64,
    completed: Mutex<u64>,
    done: Condvar,
    framebuffer: Mutex<PixelBuffer>,
    diagnostics: Mutex<Diagnostics>,
}

impl Shared {
    fn complete(&self, generation: u64) {
        let mut completed = self.completed.lock();
        *completed = generation;
        self.done.notify_all();
    }
}

/// Marks the renderer stopped and wakes waiters, also when the render
/// loop unwinds
struct ExitGuard(Arc<Shared>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let _completed = self.0.completed.lock();
        self.0.running.store(false, Ordering::Release);
        self.0.done.notify_all();
    }
}

fn render_loop(
    jobs: Receiver<Job>,
    mut renderer: Renderer,
    mut textures: TextureCache,
    shared: Arc<Shared>,
    keep_data: bool,
) {
    let _guard = ExitGuard(shared.clone());
    tracing::debug!("render thread started");
    for job in jobs {
        match job {
            Job::Frame { generation, list } => {
                let stale = generation <= shared.cancelled.load(Ordering::Acquire)
                    || generation < shared.submitted.load(Ordering::Acquire);
                if stale {
                    tracing::trace!(generation, "frame skipped");
                    shared.skipped.fetch_add(1, Ordering::Relaxed);
                } else {
                    let mut framebuffer = shared.framebuffer.lock();
                    if !keep_data {
                        framebuffer.fill([0; 4]);
                    }
                    let diagnostics = renderer.render(&list, framebuffer.view_mut(), &mut textures);
                    drop(framebuffer);
                    *shared.diagnostics.lock() = diagnostics;
                    shared.rendered.fetch_add(1, Ordering::Relaxed);
                }
                shared.complete(generation);
            }
            Job::DropEid(eid) => {
                textures.drop_eid(&eid);
            }
            Job::TextureClock(frame) => textures.set_clock(frame),
            Job::FontEngine(engine) => renderer.set_font_engine(engine),
        }
    }
    tracing::debug!(
        rendered = shared.rendered.load(Ordering::Relaxed),
        skipped = shared.skipped.load(Ordering::Relaxed),
        "render thread stopped"
    );
}

/// Renders frames on a dedicated thread into an owned framebuffer
pub struct ThreadedBackend {
    jobs: Option<SyncSender<Job>>,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

impl ThreadedBackend {
    pub fn new(config: &RenderConfig) -> Result<Self> {
        let renderer = Renderer::new(config)?;
        let framebuffer = PixelBuffer::new(config.width, config.height, config.format)?;
        let shared = Arc::new(Shared {
            submitted: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            running: AtomicBool::new(true),
            rendered: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            completed: Mutex::new(0),
            done: Condvar::new(),
            framebuffer: Mutex::new(framebuffer),
            diagnostics: Mutex::new(Diagnostics::default()),
        });

        let (sender, receiver) = sync_channel(1);
        let textures = TextureCache::new(config.capacities.texture_slots);
        let keep_data = config.flags.keep_data;
        let thread_shared = shared.clone();
        let handle = std::thread::Builder::new()
            .name("ctx-render".into())
            .spawn(move || render_loop(receiver, renderer, textures, thread_shared, keep_data))?;

        Ok(Self {
            jobs: Some(sender),
            shared,
            handle: Some(handle),
            generation: 0,
        })
    }

    fn send(&self, job: Job) -> Result<()> {
        self.jobs
            .as_ref()
            .ok_or(RenderError::RendererStopped)?
            .send(job)
            .map_err(|_| RenderError::RendererStopped)
    }

    /// Generation of the last submitted frame
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Generation of the last frame the render thread finished or skipped
    pub fn completed(&self) -> u64 {
        *self.shared.completed.lock()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Block until every submitted frame has been rendered or skipped
    pub fn wait_for_renderer(&self) {
        let mut completed = self.shared.completed.lock();
        while *completed < self.generation && self.shared.running.load(Ordering::Acquire) {
            self.shared.done.wait(&mut completed);
        }
    }

    /// Like [`ThreadedBackend::wait_for_renderer`], giving up after
    /// `timeout`. Returns whether the renderer caught up.
    pub fn wait_for_renderer_timeout(&self, timeout: Duration) -> bool {
        let mut completed = self.shared.completed.lock();
        while *completed < self.generation && self.shared.running.load(Ordering::Acquire) {
            if self.shared.done.wait_for(&mut completed, timeout).timed_out() {
                break;
            }
        }
        *completed >= self.generation
    }

    /// Skip every submitted frame the render thread has not started yet
    pub fn cancel_frame(&self) {
        self.shared.cancelled.store(self.generation, Ordering::Release);
    }

    /// Access the framebuffer. Blocks while a frame is being rendered.
    pub fn with_framebuffer<R>(&self, f: impl FnOnce(&PixelBuffer) -> R) -> R {
        f(&self.shared.framebuffer.lock())
    }

    /// Frames rendered so far
    pub fn frames_rendered(&self) -> u64 {
        self.shared.rendered.load(Ordering::Relaxed)
    }

    /// Frames skipped as stale or cancelled
    pub fn frames_skipped(&self) -> u64 {
        self.shared.skipped.load(Ordering::Relaxed)
    }
}

impl Backend for ThreadedBackend {
    fn name(&self) -> &'static str {
        "threaded"
    }

    /// Submits the frame and returns the faults of the last completed one
    fn end_frame(&mut self, list: &Drawlist) -> Result<Diagnostics> {
        self.generation += 1;
        self.shared.submitted.store(self.generation, Ordering::Release);
        self.send(Job::Frame {
            generation: self.generation,
            list: list.clone(),
        })?;
        Ok(*self.shared.diagnostics.lock())
    }

    fn set_font_engine(&mut self, engine: Option<Arc<dyn FontEngine>>) {
        if self.send(Job::FontEngine(engine)).is_err() {
            tracing::warn!("font engine not delivered, render thread stopped");
        }
    }

    fn drop_eid(&mut self, eid: &str) {
        if self.send(Job::DropEid(eid.to_owned())).is_err() {
            tracing::warn!(%eid, "texture drop not delivered, render thread stopped");
        }
    }

    fn set_texture_clock(&mut self, frame: u64) {
        if self.send(Job::TextureClock(frame)).is_err() {
            tracing::warn!(frame, "texture clock not delivered, render thread stopped");
        }
    }
}

impl Drop for ThreadedBackend {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("render thread panicked");
            }
        }
    }
}
