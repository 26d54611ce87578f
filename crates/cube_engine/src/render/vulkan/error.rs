//! Fatal error kinds for the Vulkan backend
//!
//! Everything in [`VulkanError`] aborts the frame loop. Conditions the loop
//! recovers from locally (out-of-date surfaces, suboptimal presentation, a
//! stray image index) are modelled as outcome enums in `render::frame` and
//! never travel through this type.

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

/// Vulkan backend errors. All variants are fatal to the render loop.
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Setup step failed before the loop started
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No memory type satisfies the requested bitmask and property flags
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// No enumerated device passed the suitability checks
    #[error("No suitable GPU found ({examined} device(s) examined)")]
    NoSuitableDevice {
        /// Number of physical devices that were scored
        examined: usize,
    },

    /// No candidate format supports the requested tiling features
    #[error("No supported format among {candidates:?}")]
    NoSupportedFormat {
        /// Formats that were tried, in preference order
        candidates: Vec<vk::Format>,
    },

    /// Image layout transition with no known barrier parameters
    #[error("Unsupported layout transition {old:?} -> {new:?}")]
    UnsupportedLayoutTransition {
        /// Layout the image is currently in
        old: vk::ImageLayout,
        /// Layout that was requested
        new: vk::ImageLayout,
    },

    /// Staging write larger than the buffer's declared element capacity
    #[error("Staging write of {requested} elements exceeds capacity of {capacity}")]
    CapacityExceeded {
        /// Number of elements the caller tried to write
        requested: usize,
        /// Declared maximum element count
        capacity: usize,
    },

    /// Shader bytecode could not be read or is not valid SPIR-V
    #[error("Failed to load shader {path:?}: {source}")]
    ShaderLoad {
        /// Path that was read
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Texture file could not be decoded
    #[error("Failed to load texture {path:?}: {reason}")]
    TextureLoad {
        /// Path that was read
        path: PathBuf,
        /// Decoder message
        reason: String,
    },

    /// Too many validation errors were reported by the diagnostics callback
    #[error("Validation error count {count} reached threshold {threshold}")]
    ValidationThresholdExceeded {
        /// Errors counted so far
        count: u32,
        /// Configured threshold
        threshold: u32,
    },

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Windowing collaborator failure
    #[error("Window error: {0}")]
    Window(String),
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;
