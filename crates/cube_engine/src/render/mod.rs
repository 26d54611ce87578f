//! Rendering: the backend-independent frame loop and its Vulkan backend

pub mod frame;
pub mod vulkan;

pub use frame::{
    AcquireOutcome, FrameBackend, FrameOutcome, FrameStats, FrameSynchronizer, PresentOutcome, RebuildOutcome, ResizeSignal,
};
