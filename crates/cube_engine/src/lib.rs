//! # Cube Engine
//!
//! A small Vulkan renderer that draws a spinning, textured cube.
//!
//! ## Layout
//!
//! - [`render::vulkan`]: device selection, resource wrappers, the swapchain
//!   manager and the [`render::vulkan::VulkanRenderer`] backend
//! - [`render::frame`]: the frames-in-flight state machine, generic over a
//!   [`render::FrameBackend`]
//! - [`scene`]: cube geometry and the per-frame uniform payload
//! - [`config`]: engine settings loaded from TOML or RON
//! - [`foundation`]: logging setup, transforms and frame timing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cube_engine::config::EngineConfig;
//! use cube_engine::render::vulkan::{VulkanRenderer, Window};
//! use cube_engine::render::FrameSynchronizer;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default();
//!     let mut window = Window::new(&config.window.title, config.window.width, config.window.height, true)?;
//!     let mut renderer = VulkanRenderer::new(&mut window, &config)?;
//!     let resize = renderer.resize_signal();
//!     let mut frames = FrameSynchronizer::new(config.max_frames_in_flight)?;
//!
//!     while !window.should_close() {
//!         window.poll_events();
//!         frames.draw_frame(&mut renderer, &resize)?;
//!     }
//!     renderer.wait_idle()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod foundation;
pub mod render;
pub mod scene;
