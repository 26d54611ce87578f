//! Physical device selection and logical device creation
//!
//! Every enumerated device is reduced to a [`DeviceCandidate`], a plain
//! description of what it supports. Scoring and selection operate on those
//! descriptions only, so they can be exercised without a GPU.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device, Instance};
use std::collections::HashSet;
use std::ffi::CStr;

use super::instance::PresentationSurface;
use super::{VulkanError, VulkanResult};

/// Device extensions every candidate must expose
pub fn required_device_extensions() -> [&'static CStr; 1] {
    [SwapchainLoader::name()]
}

/// What a physical device offers, as far as suitability is concerned
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    /// Human-readable device name
    pub name: String,
    /// Discrete, integrated, virtual, CPU or other
    pub device_type: vk::PhysicalDeviceType,
    /// First queue family with graphics support
    pub graphics_family: Option<u32>,
    /// First queue family able to present to the surface
    pub present_family: Option<u32>,
    /// Required extensions the device lacks
    pub missing_extensions: Vec<String>,
    /// Number of surface formats offered for the target surface
    pub surface_format_count: usize,
    /// Number of present modes offered for the target surface
    pub present_mode_count: usize,
    /// Anisotropic sampling support
    pub sampler_anisotropy: bool,
}

impl DeviceCandidate {
    /// Reason the device cannot be used, if any
    pub fn disqualification(&self) -> Option<String> {
        if self.graphics_family.is_none() {
            return Some("no graphics queue family".to_string());
        }
        if self.present_family.is_none() {
            return Some("no presentation queue family".to_string());
        }
        if !self.missing_extensions.is_empty() {
            return Some(format!("missing extensions {:?}", self.missing_extensions));
        }
        if self.surface_format_count == 0 {
            return Some("no surface formats".to_string());
        }
        if self.present_mode_count == 0 {
            return Some("no present modes".to_string());
        }
        if !self.sampler_anisotropy {
            return Some("no anisotropic sampling".to_string());
        }
        None
    }

    /// Suitability score: 0 disqualifies, higher is better
    pub fn score(&self) -> u32 {
        if self.disqualification().is_some() {
            return 0;
        }
        let mut score = 1;
        if self.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
            score += 1;
        }
        score
    }
}

/// Index of the highest-scoring candidate; earlier candidates win ties
pub fn select_best(candidates: &[DeviceCandidate]) -> VulkanResult<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let score = candidate.score();
        match candidate.disqualification() {
            Some(reason) => log::debug!("Rejected GPU '{}': {}", candidate.name, reason),
            None => log::debug!("GPU '{}' scored {}", candidate.name, score),
        }
        if score > 0 && best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((index, score));
        }
    }

    best.map(|(index, _)| index).ok_or(VulkanError::NoSuitableDevice {
        examined: candidates.len(),
    })
}

/// The selected physical device and the facts later stages need from it
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory heaps and types
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
}

impl PhysicalDeviceInfo {
    /// Enumerate devices, score them against `surface` and keep the best one
    pub fn select(instance: &Instance, surface: &PresentationSurface) -> VulkanResult<Self> {
        let devices = unsafe { instance.enumerate_physical_devices() }.map_err(VulkanError::Api)?;
        if devices.is_empty() {
            return Err(VulkanError::NoSuitableDevice { examined: 0 });
        }

        let candidates = devices
            .iter()
            .map(|&device| describe_device(instance, device, surface))
            .collect::<VulkanResult<Vec<_>>>()?;

        let index = select_best(&candidates)?;
        let device = devices[index];
        let candidate = &candidates[index];
        let (Some(graphics_family), Some(present_family)) = (candidate.graphics_family, candidate.present_family) else {
            return Err(VulkanError::NoSuitableDevice { examined: candidates.len() });
        };

        log::info!(
            "Selected GPU: {} ({:?}, score {})",
            candidate.name,
            candidate.device_type,
            candidate.score()
        );

        Ok(Self {
            device,
            properties: unsafe { instance.get_physical_device_properties(device) },
            memory_properties: unsafe { instance.get_physical_device_memory_properties(device) },
            graphics_family,
            present_family,
        })
    }
}

fn describe_device(
    instance: &Instance,
    device: vk::PhysicalDevice,
    surface: &PresentationSurface,
) -> VulkanResult<DeviceCandidate> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let features = unsafe { instance.get_physical_device_features(device) };
    let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut graphics_family = None;
    let mut present_family = None;
    for (index, family) in queue_families.iter().enumerate() {
        let index = index as u32;
        if graphics_family.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            graphics_family = Some(index);
        }
        let present_support = unsafe {
            surface
                .loader()
                .get_physical_device_surface_support(device, index, surface.handle())
        }
        .map_err(VulkanError::Api)?;
        if present_family.is_none() && present_support {
            present_family = Some(index);
        }
        if graphics_family.is_some() && present_family.is_some() {
            break;
        }
    }

    let available = unsafe { instance.enumerate_device_extension_properties(device) }.map_err(VulkanError::Api)?;
    let missing_extensions = required_device_extensions()
        .iter()
        .filter(|required| {
            !available
                .iter()
                .any(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) } == **required)
        })
        .map(|required| required.to_string_lossy().into_owned())
        .collect::<Vec<_>>();

    // Surface queries are only meaningful once the swapchain extension exists
    let (surface_format_count, present_mode_count) = if missing_extensions.is_empty() {
        let formats = unsafe {
            surface
                .loader()
                .get_physical_device_surface_formats(device, surface.handle())
        }
        .map_err(VulkanError::Api)?;
        let modes = unsafe {
            surface
                .loader()
                .get_physical_device_surface_present_modes(device, surface.handle())
        }
        .map_err(VulkanError::Api)?;
        (formats.len(), modes.len())
    } else {
        (0, 0)
    };

    Ok(DeviceCandidate {
        name: unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned(),
        device_type: properties.device_type,
        graphics_family,
        present_family,
        missing_extensions,
        surface_format_count,
        present_mode_count,
        sampler_anisotropy: features.sampler_anisotropy == vk::TRUE,
    })
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create a new logical device with one queue per unique family
    pub fn new(instance: &Instance, physical_device_info: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let unique_families: HashSet<u32> = [physical_device_info.graphics_family, physical_device_info.present_family]
            .into_iter()
            .collect();

        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let required_extensions = required_device_extensions().map(CStr::as_ptr);

        let device_features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(true)
            .build();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe { instance.create_device(physical_device_info.device, &create_info, None) }
            .map_err(VulkanError::Api)?;

        let graphics_queue = unsafe { device.get_device_queue(physical_device_info.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(physical_device_info.present_family, 0) };
        let swapchain_loader = SwapchainLoader::new(instance, &device);

        log::debug!(
            "Logical device created (graphics family {}, present family {})",
            physical_device_info.graphics_family,
            physical_device_info.present_family
        );

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            graphics_family: physical_device_info.graphics_family,
            present_family: physical_device_info.present_family,
            swapchain_loader,
        })
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle() }.map_err(VulkanError::Api)
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_device(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capable(name: &str, device_type: vk::PhysicalDeviceType) -> DeviceCandidate {
        DeviceCandidate {
            name: name.to_string(),
            device_type,
            graphics_family: Some(0),
            present_family: Some(0),
            missing_extensions: Vec::new(),
            surface_format_count: 2,
            present_mode_count: 1,
            sampler_anisotropy: true,
        }
    }

    #[test]
    fn test_discrete_gpu_scores_higher_than_integrated() {
        let integrated = capable("igpu", vk::PhysicalDeviceType::INTEGRATED_GPU);
        let discrete = capable("dgpu", vk::PhysicalDeviceType::DISCRETE_GPU);
        assert_eq!(integrated.score(), 1);
        assert_eq!(discrete.score(), 2);
        assert_eq!(select_best(&[integrated, discrete]).unwrap(), 1);
    }

    #[test]
    fn test_each_missing_capability_disqualifies() {
        let base = capable("gpu", vk::PhysicalDeviceType::DISCRETE_GPU);
        let variants: Vec<DeviceCandidate> = vec![
            DeviceCandidate { graphics_family: None, ..base.clone() },
            DeviceCandidate { present_family: None, ..base.clone() },
            DeviceCandidate { missing_extensions: vec!["VK_KHR_swapchain".into()], ..base.clone() },
            DeviceCandidate { surface_format_count: 0, ..base.clone() },
            DeviceCandidate { present_mode_count: 0, ..base.clone() },
            DeviceCandidate { sampler_anisotropy: false, ..base.clone() },
        ];
        for candidate in &variants {
            assert_eq!(candidate.score(), 0, "{:?}", candidate.disqualification());
        }
    }

    #[test]
    fn test_separate_graphics_and_present_families_qualify() {
        let candidate = DeviceCandidate {
            graphics_family: Some(0),
            present_family: Some(2),
            ..capable("split", vk::PhysicalDeviceType::INTEGRATED_GPU)
        };
        assert!(candidate.disqualification().is_none());
    }

    #[test]
    fn test_ties_go_to_first_enumerated() {
        let first = capable("a", vk::PhysicalDeviceType::INTEGRATED_GPU);
        let second = capable("b", vk::PhysicalDeviceType::VIRTUAL_GPU);
        assert_eq!(select_best(&[first, second]).unwrap(), 0);
    }

    #[test]
    fn test_disqualified_device_never_selected() {
        let broken = DeviceCandidate {
            sampler_anisotropy: false,
            ..capable("broken", vk::PhysicalDeviceType::DISCRETE_GPU)
        };
        let fallback = capable("cpu", vk::PhysicalDeviceType::CPU);
        assert_eq!(select_best(&[broken, fallback]).unwrap(), 1);
    }

    #[test]
    fn test_no_qualifying_device_is_fatal() {
        assert!(matches!(select_best(&[]), Err(VulkanError::NoSuitableDevice { examined: 0 })));

        let broken = DeviceCandidate {
            present_mode_count: 0,
            ..capable("broken", vk::PhysicalDeviceType::DISCRETE_GPU)
        };
        assert!(matches!(
            select_best(&[broken]),
            Err(VulkanError::NoSuitableDevice { examined: 1 })
        ));
    }
}
