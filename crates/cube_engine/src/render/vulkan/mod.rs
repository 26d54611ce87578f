//! Vulkan rendering backend
//!
//! Leaf modules wrap one kind of Vulkan object each and destroy it on drop.
//! [`VulkanRenderer`] assembles them and implements the frame loop's backend.

pub mod buffer;
pub mod commands;
pub mod descriptors;
pub mod device;
pub mod diagnostics;
pub mod error;
pub mod framebuffer;
pub mod image;
pub mod instance;
pub mod render_pass;
pub mod renderer;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod upload;
pub mod vertex_layout;
pub mod window;

pub use diagnostics::ValidationCounter;
pub use error::{VulkanError, VulkanResult};
pub use renderer::VulkanRenderer;
pub use swapchain::SwapchainState;
pub use window::{Window, WindowError};
