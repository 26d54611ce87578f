//! Swapchain and the resources that depend on its extent
//!
//! [`SwapchainManager`] owns the chain, its image views, one framebuffer per
//! presentable image and the shared depth attachment. Recreation always tears
//! all of it down after a device-idle wait and rebuilds it against the
//! surface's current capabilities.
//!
//! The selection rules (format, present mode, extent, image count) are free
//! functions over query results, combined into a [`SwapchainPlan`], so they
//! can be checked without a device. A surface with no area (a minimized
//! window) yields no plan; the chain then stays `Stale` until it has one.

use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device};

use super::framebuffer::Framebuffer;
use crate::render::frame::RebuildOutcome;
use super::image::{create_image_view, GpuImage};
use super::{VulkanError, VulkanResult};

/// Preferred surface format and color space
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Preferred pair if offered, otherwise the first format listed
pub fn choose_surface_format(available: &[vk::SurfaceFormatKHR]) -> VulkanResult<vk::SurfaceFormatKHR> {
    available
        .iter()
        .copied()
        .find(|sf| {
            sf.format == PREFERRED_SURFACE_FORMAT.format && sf.color_space == PREFERRED_SURFACE_FORMAT.color_space
        })
        .or_else(|| available.first().copied())
        .ok_or_else(|| VulkanError::InitializationFailed("Surface reports no formats".to_string()))
}

/// Mailbox if offered, otherwise the always-available FIFO
pub fn choose_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if available.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Surface's fixed extent, or the framebuffer size clamped to the allowed range
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, framebuffer_size: (u32, u32)) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: framebuffer_size.0.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: framebuffer_size.1.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more than the minimum, capped by the maximum when one is declared
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// Chain parameters decided from one surface query
#[derive(Debug, Clone, Copy)]
pub struct SwapchainPlan {
    /// Image format and color space
    pub format: vk::SurfaceFormatKHR,
    /// Presentation mode
    pub present_mode: vk::PresentModeKHR,
    /// Image extent
    pub extent: vk::Extent2D,
    /// Minimum image count requested from the driver
    pub image_count: u32,
    /// Surface transform applied at presentation
    pub transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainPlan {
    /// Apply the selection rules to the surface's capabilities, formats and modes
    pub fn choose(
        capabilities: &vk::SurfaceCapabilitiesKHR,
        formats: &[vk::SurfaceFormatKHR],
        present_modes: &[vk::PresentModeKHR],
        framebuffer_size: (u32, u32),
    ) -> VulkanResult<Self> {
        Ok(Self {
            format: choose_surface_format(formats)?,
            present_mode: choose_present_mode(present_modes),
            extent: choose_extent(capabilities, framebuffer_size),
            image_count: choose_image_count(capabilities),
            transform: capabilities.current_transform,
        })
    }

    /// Whether images of this extent may be created
    pub fn has_area(&self) -> bool {
        self.extent.width > 0 && self.extent.height > 0
    }
}

/// Plan for the next build, or `None` while the surface has no area
pub fn next_build(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    formats: &[vk::SurfaceFormatKHR],
    present_modes: &[vk::PresentModeKHR],
    framebuffer_size: (u32, u32),
) -> VulkanResult<Option<SwapchainPlan>> {
    let plan = SwapchainPlan::choose(capabilities, formats, present_modes, framebuffer_size)?;
    Ok(plan.has_area().then_some(plan))
}

/// Where the swapchain is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainState {
    /// Nothing built yet
    Uninitialized,
    /// Chain and dependent resources match the surface
    Ready,
    /// Surface changed; resources must be rebuilt before the next frame
    Stale,
    /// Torn down for shutdown
    Destroyed,
}

/// Transition bookkeeping for [`SwapchainManager`]
#[derive(Debug, Clone)]
pub struct SwapchainLifecycle {
    state: SwapchainState,
    builds: u32,
}

impl Default for SwapchainLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl SwapchainLifecycle {
    /// Start in `Uninitialized`
    pub fn new() -> Self {
        Self {
            state: SwapchainState::Uninitialized,
            builds: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> SwapchainState {
        self.state
    }

    /// Completed builds, the initial one included
    pub fn builds(&self) -> u32 {
        self.builds
    }

    /// `Ready -> Stale`; already-stale chains stay stale
    pub fn mark_stale(&mut self) -> VulkanResult<()> {
        match self.state {
            SwapchainState::Ready | SwapchainState::Stale => {
                self.state = SwapchainState::Stale;
                Ok(())
            }
            other => Err(invalid_transition(other, SwapchainState::Stale)),
        }
    }

    /// `Uninitialized | Stale -> Ready`
    pub fn mark_built(&mut self) -> VulkanResult<()> {
        match self.state {
            SwapchainState::Uninitialized | SwapchainState::Stale => {
                self.state = SwapchainState::Ready;
                self.builds += 1;
                Ok(())
            }
            other => Err(invalid_transition(other, SwapchainState::Ready)),
        }
    }

    /// Any state `-> Destroyed`
    pub fn mark_destroyed(&mut self) {
        self.state = SwapchainState::Destroyed;
    }
}

fn invalid_transition(from: SwapchainState, to: SwapchainState) -> VulkanError {
    VulkanError::InvalidOperation {
        reason: format!("swapchain cannot go from {from:?} to {to:?}"),
    }
}

/// Swapchain handle plus views over its images
struct Swapchain {
    device: Device,
    loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    image_views: Vec<vk::ImageView>,
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

// Field order is teardown order: framebuffers, depth, then the chain
struct SwapchainResources {
    framebuffers: Vec<Framebuffer>,
    depth: GpuImage,
    chain: Swapchain,
    extent: vk::Extent2D,
    format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
}

/// Static inputs needed to (re)build the chain
pub struct SwapchainTarget {
    /// Logical device
    pub device: Device,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
    /// Surface extension loader
    pub surface_loader: Surface,
    /// Surface the chain presents to
    pub surface: vk::SurfaceKHR,
    /// Selected physical device
    pub physical_device: vk::PhysicalDevice,
    /// Memory types for the depth attachment
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Depth format shared with the render pass
    pub depth_format: vk::Format,
    /// Graphics and present queue families
    pub queue_families: [u32; 2],
}

/// Owns the swapchain and every resource sized to it
pub struct SwapchainManager {
    resources: Option<SwapchainResources>,
    lifecycle: SwapchainLifecycle,
    target: SwapchainTarget,
    render_pass: vk::RenderPass,
}

impl SwapchainManager {
    /// Create an empty manager; call [`Self::build`] before use
    pub fn new(target: SwapchainTarget) -> Self {
        Self {
            resources: None,
            lifecycle: SwapchainLifecycle::new(),
            target,
            render_pass: vk::RenderPass::null(),
        }
    }

    /// Surface format the chain will use, queried before the render pass exists
    pub fn query_surface_format(&self) -> VulkanResult<vk::SurfaceFormatKHR> {
        let formats = unsafe {
            self.target
                .surface_loader
                .get_physical_device_surface_formats(self.target.physical_device, self.target.surface)
        }
        .map_err(VulkanError::Api)?;
        choose_surface_format(&formats)
    }

    /// Initial build against `render_pass`
    pub fn build(&mut self, render_pass: vk::RenderPass, framebuffer_size: (u32, u32)) -> VulkanResult<()> {
        self.render_pass = render_pass;
        let plan = self.query_plan(framebuffer_size)?.ok_or_else(|| {
            VulkanError::InitializationFailed("Surface has no drawable area at startup".to_string())
        })?;
        self.resources = Some(self.create_resources(&plan)?);
        self.lifecycle.mark_built()?;
        self.log_build();
        Ok(())
    }

    /// Wait for the device, tear everything down and rebuild for the current surface
    ///
    /// Returns [`RebuildOutcome::Deferred`] without touching the old chain
    /// while the surface has no area; the manager stays `Stale` until a later
    /// call succeeds.
    pub fn recreate(&mut self, framebuffer_size: (u32, u32)) -> VulkanResult<RebuildOutcome> {
        self.lifecycle.mark_stale()?;
        let Some(plan) = self.query_plan(framebuffer_size)? else {
            log::debug!("Surface has no area; swapchain rebuild deferred");
            return Ok(RebuildOutcome::Deferred);
        };

        unsafe { self.target.device.device_wait_idle() }.map_err(VulkanError::Api)?;

        let previous_format = self.resources.as_ref().map(|r| r.format.format);
        self.resources = None;
        self.resources = Some(self.create_resources(&plan)?);
        self.lifecycle.mark_built()?;

        if let (Some(previous), Some(resources)) = (previous_format, self.resources.as_ref()) {
            if previous != resources.format.format {
                log::warn!(
                    "Surface format changed from {:?} to {:?}; render pass was built for the old one",
                    previous,
                    resources.format.format
                );
            }
        }
        self.log_build();
        Ok(RebuildOutcome::Rebuilt)
    }

    /// Release everything; the manager is unusable afterwards
    pub fn destroy(&mut self) {
        self.resources = None;
        self.lifecycle.mark_destroyed();
    }

    fn log_build(&self) {
        if let Some(resources) = &self.resources {
            log::info!(
                "Swapchain build #{}: {}x{}, {} images, {:?}, {:?}",
                self.lifecycle.builds(),
                resources.extent.width,
                resources.extent.height,
                resources.framebuffers.len(),
                resources.format.format,
                resources.present_mode
            );
        }
    }

    fn query_plan(&self, framebuffer_size: (u32, u32)) -> VulkanResult<Option<SwapchainPlan>> {
        let target = &self.target;
        let (capabilities, formats, present_modes) = unsafe {
            let loader = &target.surface_loader;
            (
                loader.get_physical_device_surface_capabilities(target.physical_device, target.surface),
                loader.get_physical_device_surface_formats(target.physical_device, target.surface),
                loader.get_physical_device_surface_present_modes(target.physical_device, target.surface),
            )
        };
        next_build(
            &capabilities.map_err(VulkanError::Api)?,
            &formats.map_err(VulkanError::Api)?,
            &present_modes.map_err(VulkanError::Api)?,
            framebuffer_size,
        )
    }

    fn create_resources(&self, plan: &SwapchainPlan) -> VulkanResult<SwapchainResources> {
        let target = &self.target;
        let device = &target.device;
        let SwapchainPlan {
            format,
            present_mode,
            extent,
            image_count,
            transform,
        } = *plan;

        let (sharing_mode, family_indices): (vk::SharingMode, &[u32]) =
            if target.queue_families[0] == target.queue_families[1] {
                (vk::SharingMode::EXCLUSIVE, &[])
            } else {
                (vk::SharingMode::CONCURRENT, &target.queue_families)
            };

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(target.surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(family_indices)
            .pre_transform(transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let handle = unsafe { target.swapchain_loader.create_swapchain(&create_info, None) }.map_err(VulkanError::Api)?;
        let mut chain = Swapchain {
            device: device.clone(),
            loader: target.swapchain_loader.clone(),
            swapchain: handle,
            image_views: Vec::new(),
        };

        let images = unsafe { target.swapchain_loader.get_swapchain_images(handle) }.map_err(VulkanError::Api)?;
        for &image in &images {
            let view = create_image_view(device, image, format.format, vk::ImageAspectFlags::COLOR)?;
            chain.image_views.push(view);
        }

        let depth = GpuImage::new_depth_attachment(device.clone(), &target.memory_properties, extent, target.depth_format)?;

        let framebuffers = chain
            .image_views
            .iter()
            .map(|&view| Framebuffer::new(device.clone(), self.render_pass, &[view, depth.view()], extent))
            .collect::<VulkanResult<Vec<_>>>()?;

        Ok(SwapchainResources {
            framebuffers,
            depth,
            chain,
            extent,
            format,
            present_mode,
        })
    }

    fn resources(&self) -> VulkanResult<&SwapchainResources> {
        self.resources.as_ref().ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("swapchain is {:?}", self.lifecycle.state()),
        })
    }

    /// Raw swapchain handle
    pub fn handle(&self) -> VulkanResult<vk::SwapchainKHR> {
        Ok(self.resources()?.chain.swapchain)
    }

    /// Extension loader for acquire and present
    pub fn loader(&self) -> &SwapchainLoader {
        &self.target.swapchain_loader
    }

    /// Current extent, zero when nothing is built
    pub fn extent(&self) -> vk::Extent2D {
        self.resources.as_ref().map_or_else(vk::Extent2D::default, |r| r.extent)
    }

    /// Number of presentable images, zero when nothing is built
    pub fn image_count(&self) -> u32 {
        self.resources.as_ref().map_or(0, |r| r.framebuffers.len() as u32)
    }

    /// Framebuffer for presentable image `image_index`
    pub fn framebuffer(&self, image_index: u32) -> VulkanResult<vk::Framebuffer> {
        self.resources()?
            .framebuffers
            .get(image_index as usize)
            .map(Framebuffer::handle)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("no framebuffer for image {image_index}"),
            })
    }

    /// Lifecycle state
    pub fn state(&self) -> SwapchainState {
        self.lifecycle.state()
    }

    /// Number of completed builds
    pub fn builds(&self) -> u32 {
        self.lifecycle.builds()
    }
}

impl Drop for SwapchainManager {
    fn drop(&mut self) {
        self.destroy();
    }
}
