//! Spinning cube demo
//!
//! Opens a window, renders a textured cube rotating about +Z and exits with
//! status 0 when the window is closed, or 1 after logging a fatal error.

use std::rc::Rc;

use cube_engine::config::EngineConfig;
use cube_engine::foundation::logging;
use cube_engine::foundation::time::FpsCounter;
use cube_engine::render::vulkan::{VulkanRenderer, Window};
use cube_engine::render::{FrameOutcome, FrameSynchronizer, ResizeSignal};

struct CubeApp {
    // Dropped before the window, which owns the GLFW context
    renderer: VulkanRenderer,
    window: Window,
    frames: FrameSynchronizer,
    resize: Rc<ResizeSignal>,
    fps: FpsCounter,
}

impl CubeApp {
    fn new(config: &EngineConfig) -> Result<Self, Box<dyn std::error::Error>> {
        config.validate()?;

        let mut window = Window::new(
            &config.window.title,
            config.window.width,
            config.window.height,
            config.window.resizable,
        )?;
        let renderer = VulkanRenderer::new(&mut window, config)?;
        let resize = renderer.resize_signal();
        let frames = FrameSynchronizer::new(config.max_frames_in_flight)?;

        Ok(Self {
            renderer,
            window,
            frames,
            resize,
            fps: FpsCounter::new(),
        })
    }

    fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        log::info!("Entering render loop");

        while !self.window.should_close() {
            self.window.poll_events();

            // Zero-sized framebuffer: nothing can be presented until restored
            while self.resize.is_minimized() && !self.window.should_close() {
                self.window.wait_events();
            }
            if self.window.should_close() {
                break;
            }

            match self.frames.draw_frame(&mut self.renderer, &self.resize)? {
                FrameOutcome::Skipped { image_index } => log::debug!("Frame for image {} dropped", image_index),
                // Surface reports no area even though the framebuffer does; block until it changes
                FrameOutcome::Deferred => self.window.wait_events(),
                FrameOutcome::Presented { .. } | FrameOutcome::Recreated => {}
            }
            self.renderer.diagnostics().check()?;

            if let Some(fps) = self.fps.tick() {
                log::info!("FPS: {}", fps);
            }
        }

        self.renderer.wait_idle()?;

        let stats = self.frames.stats();
        log::info!(
            "Render loop finished: {} frames presented, {} swapchain rebuilds ({} deferred), {} frames skipped",
            stats.frames_presented,
            stats.recreations,
            stats.deferred_rebuilds,
            stats.skipped_frames
        );
        Ok(())
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::from_env()?;
    let mut app = CubeApp::new(&config)?;
    app.run()
}

fn main() {
    logging::init();
    log::info!("Starting spinning cube");

    match run() {
        Ok(()) => log::info!("Shut down cleanly"),
        Err(e) => {
            log::error!("Fatal error: {}", e);
            std::process::exit(1);
        }
    }
}
