//! Validation-layer diagnostics
//!
//! Messages from `VK_EXT_debug_utils` are routed to the `log` facade and
//! tallied in a [`ValidationCounter`]. The counter is handed to the driver
//! through the messenger's user-data pointer instead of living in a static.
//! It is process-wide state created once at startup, mutated only from the
//! callback on the render thread, and read by the frame loop for the
//! threshold check.

use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry, Instance};
use std::cell::Cell;
use std::ffi::{c_void, CStr};

use super::{VulkanError, VulkanResult};

/// Running tally of validation messages with a fatal error threshold
#[derive(Debug)]
pub struct ValidationCounter {
    errors: Cell<u32>,
    warnings: Cell<u32>,
    threshold: u32,
}

impl ValidationCounter {
    /// Create a counter that turns fatal once `threshold` errors were seen
    pub fn new(threshold: u32) -> Self {
        Self {
            errors: Cell::new(0),
            warnings: Cell::new(0),
            threshold,
        }
    }

    /// Count one message of the given severity
    pub fn record(&self, severity: vk::DebugUtilsMessageSeverityFlagsEXT) {
        if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            self.errors.set(self.errors.get().saturating_add(1));
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            self.warnings.set(self.warnings.get().saturating_add(1));
        }
    }

    /// Errors reported so far
    pub fn error_count(&self) -> u32 {
        self.errors.get()
    }

    /// Warnings reported so far
    pub fn warning_count(&self) -> u32 {
        self.warnings.get()
    }

    /// Fails once the error count reaches the threshold
    pub fn check(&self) -> VulkanResult<()> {
        let count = self.errors.get();
        if count >= self.threshold {
            return Err(VulkanError::ValidationThresholdExceeded {
                count,
                threshold: self.threshold,
            });
        }
        Ok(())
    }
}

/// Debug messenger bound to a [`ValidationCounter`]
///
/// The counter must outlive the messenger; [`super::VulkanInstance`] keeps
/// both and drops the messenger first.
pub struct DebugMessenger {
    loader: DebugUtils,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    /// Register the callback with `counter` as its user data
    pub fn new(entry: &Entry, instance: &Instance, counter: &ValidationCounter) -> VulkanResult<Self> {
        let loader = DebugUtils::new(entry, instance);
        let create_info = messenger_create_info(counter);

        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None) }
            .map_err(VulkanError::Api)?;

        log::debug!("Debug messenger registered");
        Ok(Self { loader, messenger })
    }
}

impl Drop for DebugMessenger {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_debug_utils_messenger(self.messenger, None);
        }
    }
}

/// Messenger parameters shared by instance creation and the messenger itself
pub fn messenger_create_info(counter: &ValidationCounter) -> vk::DebugUtilsMessengerCreateInfoEXT {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
        .user_data(std::ptr::from_ref(counter).cast_mut().cast::<c_void>())
        .build()
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    user_data: *mut c_void,
) -> vk::Bool32 {
    let message = if callback_data.is_null() || (*callback_data).p_message.is_null() {
        std::borrow::Cow::Borrowed("<no message>")
    } else {
        CStr::from_ptr((*callback_data).p_message).to_string_lossy()
    };

    if let Some(counter) = user_data.cast::<ValidationCounter>().as_ref() {
        counter.record(message_severity);
    }

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn test_counter_trips_at_threshold() {
        let counter = ValidationCounter::new(3);
        for _ in 0..2 {
            counter.record(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR);
        }
        assert!(counter.check().is_ok());

        counter.record(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR);
        match counter.check() {
            Err(VulkanError::ValidationThresholdExceeded { count, threshold }) => {
                assert_eq!(count, 3);
                assert_eq!(threshold, 3);
            }
            other => panic!("expected threshold error, got {other:?}"),
        }
    }

    #[test]
    fn test_warnings_do_not_count_toward_threshold() {
        let counter = ValidationCounter::new(1);
        counter.record(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING);
        counter.record(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE);
        assert_eq!(counter.warning_count(), 1);
        assert_eq!(counter.error_count(), 0);
        assert!(counter.check().is_ok());
    }

    #[test]
    fn test_callback_increments_counter_through_user_data() {
        let counter = ValidationCounter::new(50);
        let info = messenger_create_info(&counter);
        let message = CString::new("vkQueueSubmit: invalid fence").unwrap();
        let data = vk::DebugUtilsMessengerCallbackDataEXT::builder()
            .message(&message)
            .build();

        let callback = info.pfn_user_callback.expect("callback registered");
        let result = unsafe {
            callback(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
                &data,
                info.p_user_data,
            )
        };

        assert_eq!(result, vk::FALSE);
        assert_eq!(counter.error_count(), 1);
    }
}
