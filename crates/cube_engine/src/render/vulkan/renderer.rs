//! Vulkan backend for the frame loop
//!
//! [`VulkanRenderer`] builds every object the cube needs and implements
//! [`FrameBackend`] so [`crate::render::frame::FrameSynchronizer`] can drive it.
//! Fields are declared in teardown order: per-slot objects and buffers first,
//! then the swapchain, render pass and pool, then the device, the surface and
//! finally the instance.

use ash::vk;
use std::rc::Rc;

use super::commands::{CommandPool, CommandRecorder, DrawTarget};
use super::descriptors::{DescriptorPool, DescriptorSetLayout};
use super::device::{LogicalDevice, PhysicalDeviceInfo};
use super::diagnostics::ValidationCounter;
use super::image::{find_supported_format, DEPTH_FORMAT_CANDIDATES};
use super::instance::{PresentationSurface, VulkanInstance};
use super::render_pass::RenderPass;
use super::shader::{GraphicsPipeline, ShaderModule};
use super::swapchain::{SwapchainManager, SwapchainTarget};
use super::sync::FrameSync;
use super::texture::{effective_anisotropy, DecodedImage, Texture};
use super::upload::{DynamicBuffer, UniformBuffers};
use super::window::Window;
use super::{VulkanError, VulkanResult};
use crate::config::EngineConfig;
use crate::foundation::math::aspect_ratio;
use crate::foundation::time::FrameClock;
use crate::render::frame::{AcquireOutcome, FrameBackend, PresentOutcome, RebuildOutcome, ResizeSignal};
use crate::scene::{UniformPayload, Vertex, CUBE_INDICES, CUBE_VERTICES};

/// Objects owned by one frame slot
struct FrameSlot {
    sync: FrameSync,
    command_buffer: vk::CommandBuffer,
    descriptor_set: vk::DescriptorSet,
}

/// Complete renderer for the textured cube
pub struct VulkanRenderer {
    slots: Vec<FrameSlot>,
    uniforms: UniformBuffers<UniformPayload>,
    vertices: DynamicBuffer<Vertex>,
    indices: DynamicBuffer<u32>,
    texture: Texture,
    descriptor_pool: DescriptorPool,
    pipeline: GraphicsPipeline,
    descriptor_set_layout: DescriptorSetLayout,
    swapchain: SwapchainManager,
    render_pass: RenderPass,
    command_pool: CommandPool,
    device: LogicalDevice,
    surface: PresentationSurface,
    instance: VulkanInstance,
    clock: FrameClock,
    resize: Rc<ResizeSignal>,
}

impl VulkanRenderer {
    /// Initialize Vulkan against `window` and register its resize listener
    pub fn new(window: &mut Window, config: &EngineConfig) -> VulkanResult<Self> {
        log::debug!("Creating VulkanRenderer...");
        let frames_in_flight = config.max_frames_in_flight;

        let instance = VulkanInstance::new(
            window,
            &config.window.title,
            config.validation_enabled(),
            config.validation_error_threshold,
        )?;
        let surface = PresentationSurface::new(&instance, window)?;
        let physical_device = PhysicalDeviceInfo::select(instance.handle(), &surface)?;
        let device = LogicalDevice::new(instance.handle(), &physical_device)?;
        let memory_properties = physical_device.memory_properties;

        let depth_format = find_supported_format(
            instance.handle(),
            physical_device.device,
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;
        log::debug!("Depth format: {:?}", depth_format);

        let mut swapchain = SwapchainManager::new(SwapchainTarget {
            device: device.device.clone(),
            swapchain_loader: device.swapchain_loader.clone(),
            surface_loader: surface.loader().clone(),
            surface: surface.handle(),
            physical_device: physical_device.device,
            memory_properties,
            depth_format,
            queue_families: [device.graphics_family, device.present_family],
        });
        let surface_format = swapchain.query_surface_format()?;
        let render_pass = RenderPass::new_forward_pass(device.device.clone(), surface_format.format, depth_format)?;
        swapchain.build(render_pass.handle(), window.get_framebuffer_size())?;

        let command_pool = CommandPool::new(device.device.clone(), device.graphics_family)?;

        let layout_builder = DescriptorSetLayout::builder_for_cube();
        let pool_sizes = layout_builder.pool_sizes(slot_count(frames_in_flight)?);
        let descriptor_set_layout = layout_builder.build(&device.device)?;

        let pipeline = {
            let vertex_shader = ShaderModule::from_file(device.device.clone(), &config.shaders.resolved_vertex())?;
            let fragment_shader = ShaderModule::from_file(device.device.clone(), &config.shaders.resolved_fragment())?;
            GraphicsPipeline::new(
                device.device.clone(),
                render_pass.handle(),
                descriptor_set_layout.handle(),
                &vertex_shader,
                &fragment_shader,
            )?
        };

        let decoded = DecodedImage::load(&config.resolved_texture())?;
        let texture = Texture::upload(
            device.device.clone(),
            &memory_properties,
            &command_pool,
            device.graphics_queue,
            &decoded,
            effective_anisotropy(physical_device.properties.limits.max_sampler_anisotropy),
        )?;

        let uniforms = UniformBuffers::new(&device.device, &memory_properties, frames_in_flight)?;
        let mut vertices = DynamicBuffer::new(
            &device.device,
            &memory_properties,
            config.max_vertices,
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let mut indices = DynamicBuffer::new(
            &device.device,
            &memory_properties,
            config.max_indices,
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;
        vertices.write(&CUBE_VERTICES)?;
        indices.write(&CUBE_INDICES)?;

        let descriptor_pool = DescriptorPool::new(device.device.clone(), slot_count(frames_in_flight)?, &pool_sizes)?;
        let layouts = vec![descriptor_set_layout.handle(); frames_in_flight];
        let descriptor_sets = descriptor_pool.allocate_descriptor_sets(&layouts)?;
        let command_buffers = command_pool.allocate_command_buffers(slot_count(frames_in_flight)?)?;

        let slots = descriptor_sets
            .into_iter()
            .zip(command_buffers)
            .enumerate()
            .map(|(i, (descriptor_set, command_buffer))| {
                let uniform_buffer = uniforms.handle(i).ok_or_else(|| VulkanError::InvalidOperation {
                    reason: format!("no uniform buffer for slot {i}"),
                })?;
                descriptor_pool.write_uniform_and_sampler(
                    descriptor_set,
                    uniform_buffer,
                    UniformBuffers::<UniformPayload>::range(),
                    texture.image_view(),
                    texture.sampler(),
                );
                Ok(FrameSlot {
                    sync: FrameSync::new(device.device.clone())?,
                    command_buffer,
                    descriptor_set,
                })
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        let resize = Rc::new(ResizeSignal::new(window.get_framebuffer_size()));
        let listener = Rc::clone(&resize);
        window.on_framebuffer_resize(move |width, height| listener.notify(width, height));

        log::info!(
            "VulkanRenderer ready: {} frames in flight, {} swapchain images",
            frames_in_flight,
            swapchain.image_count()
        );

        Ok(Self {
            slots,
            uniforms,
            vertices,
            indices,
            texture,
            descriptor_pool,
            pipeline,
            descriptor_set_layout,
            swapchain,
            render_pass,
            command_pool,
            device,
            surface,
            instance,
            clock: FrameClock::new(),
            resize,
        })
    }

    /// Resize state shared with the window's listener
    pub fn resize_signal(&self) -> Rc<ResizeSignal> {
        Rc::clone(&self.resize)
    }

    /// Validation message counts for the running instance
    pub fn diagnostics(&self) -> &ValidationCounter {
        self.instance.diagnostics()
    }

    /// Current swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Wait for the device to finish all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.device.wait_idle()
    }

    fn slot(&self, slot: usize) -> VulkanResult<&FrameSlot> {
        self.slots.get(slot).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("frame slot {slot} out of range"),
        })
    }
}

fn slot_count(frames_in_flight: usize) -> VulkanResult<u32> {
    u32::try_from(frames_in_flight).map_err(|_| VulkanError::InvalidOperation {
        reason: format!("{frames_in_flight} frames in flight"),
    })
}

impl FrameBackend for VulkanRenderer {
    fn image_count(&self) -> u32 {
        self.swapchain.image_count()
    }

    fn wait_for_slot(&mut self, slot: usize) -> VulkanResult<()> {
        self.slot(slot)?.sync.in_flight.wait()
    }

    fn acquire_image(&mut self, slot: usize) -> VulkanResult<AcquireOutcome> {
        let semaphore = self.slot(slot)?.sync.image_available.handle();
        let result = unsafe {
            self.swapchain
                .loader()
                .acquire_next_image(self.swapchain.handle()?, u64::MAX, semaphore, vk::Fence::null())
        };

        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired { image_index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(VulkanError::Api(e)),
        }
    }

    fn reset_slot_fence(&mut self, slot: usize) -> VulkanResult<()> {
        self.slot(slot)?.sync.in_flight.reset()
    }

    fn record_commands(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
        let frame = self.slot(slot)?;
        let index_count = u32::try_from(self.indices.len()).map_err(|_| VulkanError::CapacityExceeded {
            requested: self.indices.len(),
            capacity: u32::MAX as usize,
        })?;

        let target = DrawTarget {
            render_pass: self.render_pass.handle(),
            framebuffer: self.swapchain.framebuffer(image_index)?,
            extent: self.swapchain.extent(),
            pipeline: self.pipeline.handle(),
            pipeline_layout: self.pipeline.layout(),
            vertex_buffer: self.vertices.working_handle(),
            index_buffer: self.indices.working_handle(),
            index_count,
            descriptor_set: frame.descriptor_set,
        };

        CommandRecorder::new(frame.command_buffer, self.device.device.clone()).record_draw(&target)?;
        Ok(())
    }

    fn publish_frame_data(&mut self, slot: usize) -> VulkanResult<()> {
        let extent = self.swapchain.extent();
        let payload = UniformPayload::at(self.clock.elapsed_secs(), aspect_ratio(extent.width, extent.height));
        self.uniforms.write(slot, &payload)?;

        self.vertices.write(&CUBE_VERTICES)?;
        self.indices.write(&CUBE_INDICES)?;
        self.vertices.publish(&self.command_pool, self.device.graphics_queue)?;
        self.indices.publish(&self.command_pool, self.device.graphics_queue)
    }

    fn submit(&mut self, slot: usize) -> VulkanResult<()> {
        let frame = self.slot(slot)?;
        let wait_semaphores = [frame.sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [frame.command_buffer];
        let signal_semaphores = [frame.sync.render_finished.handle()];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device.device.queue_submit(
                self.device.graphics_queue,
                &[submit_info.build()],
                frame.sync.in_flight.handle(),
            )
        }
        .map_err(VulkanError::Api)
    }

    fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<PresentOutcome> {
        let wait_semaphores = [self.slot(slot)?.sync.render_finished.handle()];
        let swapchains = [self.swapchain.handle()?];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.swapchain.loader().queue_present(self.device.present_queue, &present_info) } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(VulkanError::Api(e)),
        }
    }

    fn recreate_swapchain(&mut self) -> VulkanResult<RebuildOutcome> {
        self.swapchain.recreate(self.resize.framebuffer_size())
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        log::debug!("Cleaning up VulkanRenderer...");
        if let Err(e) = self.wait_idle() {
            log::error!("Device wait failed during teardown: {}", e);
        }
        self.swapchain.destroy();
    }
}
