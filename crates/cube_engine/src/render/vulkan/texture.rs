//! Sampled textures
//!
//! Decoding goes through the `image` crate; the decoded RGBA pixels are
//! staged in a host-visible buffer, copied into an SRGB device image and
//! transitioned for fragment-shader reads.

use ash::{vk, Device};
use std::path::Path;

use super::buffer::Buffer;
use super::commands::CommandPool;
use super::image::{GpuImage, LayoutTransition};
use super::{VulkanError, VulkanResult};

/// Anisotropy requested for texture sampling before the device limit is applied
pub const REQUESTED_ANISOTROPY: f32 = 16.0;

/// Decoded RGBA8 pixels
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Tightly packed RGBA bytes, row-major
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    /// Decode an image file into RGBA8
    pub fn load(path: &Path) -> VulkanResult<Self> {
        let decoded = image::open(path).map_err(|e| VulkanError::TextureLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(VulkanError::TextureLoad {
                path: path.to_path_buf(),
                reason: "image has no pixels".to_string(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }

    /// Size of the pixel payload in bytes
    pub fn byte_len(&self) -> vk::DeviceSize {
        self.pixels.len() as vk::DeviceSize
    }
}

/// Sampler anisotropy clamped to what the device supports
pub fn effective_anisotropy(device_limit: f32) -> f32 {
    REQUESTED_ANISOTROPY.min(device_limit).max(1.0)
}

/// Texture image plus sampler
pub struct Texture {
    device: Device,
    sampler: vk::Sampler,
    image: GpuImage,
}

impl Texture {
    /// Upload `decoded` and create its sampler
    pub fn upload(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        command_pool: &CommandPool,
        queue: vk::Queue,
        decoded: &DecodedImage,
        max_anisotropy: f32,
    ) -> VulkanResult<Self> {
        let extent = vk::Extent2D {
            width: decoded.width,
            height: decoded.height,
        };

        let mut staging = Buffer::new(
            device.clone(),
            memory_properties,
            decoded.byte_len(),
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.map_persistent()?;
        staging.write_bytes(0, &decoded.pixels)?;

        let image = GpuImage::new(
            device.clone(),
            memory_properties,
            extent,
            vk::Format::R8G8B8A8_SRGB,
            vk::ImageTiling::OPTIMAL,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::ImageAspectFlags::COLOR,
        )?;

        let to_transfer = LayoutTransition::between(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL)?;
        let to_sampled = LayoutTransition::between(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;

        command_pool.submit_one_time(queue, |device, command_buffer| {
            to_transfer.record(
                device,
                command_buffer,
                image.handle(),
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            );

            let region = vk::BufferImageCopy::builder()
                .buffer_offset(0)
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                .image_extent(vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                });
            unsafe {
                device.cmd_copy_buffer_to_image(
                    command_buffer,
                    staging.handle(),
                    image.handle(),
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region.build()],
                );
            }

            to_sampled.record(
                device,
                command_buffer,
                image.handle(),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            );
            Ok(())
        })?;

        let sampler_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(true)
            .max_anisotropy(max_anisotropy)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(0.0);

        let sampler = unsafe { device.create_sampler(&sampler_info, None) }.map_err(VulkanError::Api)?;

        log::info!("Uploaded texture {}x{}", decoded.width, decoded.height);

        Ok(Self { device, sampler, image })
    }

    /// Get the image view for descriptor set binding
    pub fn image_view(&self) -> vk::ImageView {
        self.image.view()
    }

    /// Get the sampler for descriptor set binding
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anisotropy_respects_device_limit() {
        assert_eq!(effective_anisotropy(16.0), 16.0);
        assert_eq!(effective_anisotropy(8.0), 8.0);
        assert_eq!(effective_anisotropy(64.0), 16.0);
    }

    #[test]
    fn test_missing_texture_is_a_load_error() {
        let result = DecodedImage::load(Path::new("does/not/exist.png"));
        assert!(matches!(result, Err(VulkanError::TextureLoad { .. })));
    }

    #[test]
    fn test_decoded_png_is_rgba8() {
        let path = std::env::temp_dir().join(format!("cube_engine_texture_{}.png", std::process::id()));
        let pixels = image::RgbImage::from_pixel(3, 2, image::Rgb([255, 0, 0]));
        pixels.save(&path).unwrap();

        let decoded = DecodedImage::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!((decoded.width, decoded.height), (3, 2));
        assert_eq!(decoded.byte_len(), 3 * 2 * 4);
        assert_eq!(&decoded.pixels[..4], &[255, 0, 0, 255]);
    }
}
