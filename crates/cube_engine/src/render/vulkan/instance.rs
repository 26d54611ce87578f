//! Instance, diagnostics and presentation surface

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::Surface;
use ash::{vk, Entry, Instance};
use std::ffi::{CStr, CString};

use super::diagnostics::{DebugMessenger, ValidationCounter};
use super::window::Window;
use super::{VulkanError, VulkanResult};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    entry: Entry,
    instance: Instance,
    messenger: Option<DebugMessenger>,
    // Boxed so the pointer handed to the messenger stays valid
    diagnostics: Box<ValidationCounter>,
}

impl VulkanInstance {
    /// Create the instance, enabling validation and the debug messenger when requested
    pub fn new(
        window: &Window,
        app_name: &str,
        enable_validation: bool,
        validation_error_threshold: u32,
    ) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e}")))?;

        let app_name_cstr = CString::new(app_name)
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid application name: {e}")))?;
        let engine_name_cstr = c"CubeEngine";
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(engine_name_cstr)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let required_extensions = window
            .get_required_instance_extensions()
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to get required extensions: {e}")))?;

        let cstr_extensions = required_extensions
            .iter()
            .map(|ext| CString::new(ext.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid extension name: {e}")))?;

        let mut extensions: Vec<*const std::ffi::c_char> = cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();

        let validation = enable_validation && Self::validation_layer_available(&entry)?;
        if enable_validation && !validation {
            log::warn!("Validation requested but {:?} is not installed", VALIDATION_LAYER);
        }

        let layer_names: Vec<*const std::ffi::c_char> = if validation {
            extensions.push(DebugUtils::name().as_ptr());
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        let diagnostics = Box::new(ValidationCounter::new(validation_error_threshold));

        // Chained so instance creation and destruction are also reported
        let mut messenger_info = super::diagnostics::messenger_create_info(&diagnostics);
        let mut create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);
        if validation {
            create_info = create_info.push_next(&mut messenger_info);
        }

        let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(VulkanError::Api)?;

        let messenger = if validation {
            match DebugMessenger::new(&entry, &instance, &diagnostics) {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        log::info!(
            "Vulkan instance created (validation {})",
            if validation { "enabled" } else { "disabled" }
        );

        Ok(Self {
            entry,
            instance,
            messenger,
            diagnostics,
        })
    }

    fn validation_layer_available(entry: &Entry) -> VulkanResult<bool> {
        let layers = entry
            .enumerate_instance_layer_properties()
            .map_err(VulkanError::Api)?;
        Ok(layers
            .iter()
            .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == VALIDATION_LAYER))
    }

    /// Loader entry points
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Raw instance
    pub fn handle(&self) -> &Instance {
        &self.instance
    }

    /// Validation message tally
    pub fn diagnostics(&self) -> &ValidationCounter {
        &self.diagnostics
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        // Messenger first; it points into `diagnostics`
        self.messenger.take();
        unsafe {
            self.instance.destroy_instance(None);
        }
    }
}

/// Presentation surface created through the windowing collaborator
pub struct PresentationSurface {
    loader: Surface,
    surface: vk::SurfaceKHR,
}

impl PresentationSurface {
    /// Create a surface for `window`
    pub fn new(instance: &VulkanInstance, window: &Window) -> VulkanResult<Self> {
        let loader = Surface::new(instance.entry(), instance.handle());
        let surface = window
            .create_vulkan_surface(instance.handle().handle())
            .map_err(|e| VulkanError::Window(e.to_string()))?;
        Ok(Self { loader, surface })
    }

    /// Surface extension loader
    pub fn loader(&self) -> &Surface {
        &self.loader
    }

    /// Raw surface handle
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }
}

impl Drop for PresentationSurface {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
    }
}
