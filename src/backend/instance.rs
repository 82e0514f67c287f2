// Vulkan instance - library loading, extension/layer validation, debug messenger
//
// The instance is the process-wide root handle. Everything else derives from
// it and must be destroyed before it.

use std::ffi::{c_char, c_void, CStr, CString};

use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry};
use raw_window_handle::RawDisplayHandle;

use super::error::{BackendError, Result};

/// Layers enabled when validation is requested.
pub const VALIDATION_LAYERS: [&CStr; 1] = [c"VK_LAYER_KHRONOS_validation"];

/// Root Vulkan handle. Owns the entry point, the raw instance and the
/// optional debug messenger; the messenger is destroyed first on drop.
pub struct Instance {
    entry: Entry,
    raw: ash::Instance,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl Instance {
    /// Create the instance for a window on the given display.
    ///
    /// Validation is an explicit input rather than a build-time switch: it
    /// controls the layer list, the debug utils extension and the messenger.
    pub fn new(
        app_name: &str,
        enable_validation: bool,
        display: RawDisplayHandle,
    ) -> Result<Self> {
        let entry = unsafe { Entry::load() }?;

        if enable_validation {
            let available_layers = layer_names(&entry.enumerate_instance_layer_properties()?);
            if let Some(missing) = first_missing(&VALIDATION_LAYERS, &available_layers) {
                return Err(BackendError::MissingLayer(missing));
            }
        }

        let available =
            extension_names(&entry.enumerate_instance_extension_properties(None)?);

        if enable_validation && !contains(&available, DebugUtils::name()) {
            return Err(BackendError::ValidationUnsupported);
        }

        // The windowing layer dictates the surface extensions; the messenger
        // extension joins only when validation is on.
        let mut required: Vec<&CStr> = ash_window::enumerate_required_extensions(display)?
            .iter()
            .map(|&ptr| unsafe { CStr::from_ptr(ptr) })
            .collect();
        if enable_validation {
            required.push(DebugUtils::name());
        }
        if let Some(missing) = first_missing(&required, &available) {
            return Err(BackendError::MissingExtension(missing));
        }

        // VK_KHR_portability_subset on the device side requires this one at
        // the instance level, and it cannot be retrofitted after device
        // creation.
        if contains(&available, vk::KhrGetPhysicalDeviceProperties2Fn::name()) {
            required.push(vk::KhrGetPhysicalDeviceProperties2Fn::name());
        }
        let mut flags = vk::InstanceCreateFlags::empty();
        if contains(&available, vk::KhrPortabilityEnumerationFn::name()) {
            required.push(vk::KhrPortabilityEnumerationFn::name());
            flags |= vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
        }

        let app_name = CString::new(app_name)?;
        let engine_name = CString::new("No Engine")?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 0, 0, 1))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 0, 0, 1))
            .api_version(vk::API_VERSION_1_0);

        let extension_ptrs: Vec<*const c_char> = required.iter().map(|e| e.as_ptr()).collect();
        let layer_ptrs: Vec<*const c_char> =
            VALIDATION_LAYERS.iter().map(|l| l.as_ptr()).collect();

        // Chaining the messenger info here covers instance creation and
        // destruction themselves with validation output.
        let mut messenger_info = debug_messenger_create_info();
        let mut create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .flags(flags);
        if enable_validation {
            create_info = create_info
                .enabled_layer_names(&layer_ptrs)
                .push_next(&mut messenger_info);
        }

        let raw = unsafe { entry.create_instance(&create_info, None) }
            .map_err(BackendError::InstanceCreationFailed)?;

        let debug_utils = if enable_validation {
            let loader = DebugUtils::new(&entry, &raw);
            let messenger = unsafe {
                loader.create_debug_utils_messenger(&debug_messenger_create_info(), None)
            };
            match messenger {
                Ok(messenger) => Some((loader, messenger)),
                Err(err) => {
                    // The instance is not owned by anything yet.
                    unsafe { raw.destroy_instance(None) };
                    return Err(BackendError::DebugMessengerUnavailable(err));
                }
            }
        } else {
            None
        };

        log::info!("Created Vulkan instance ({} extensions)", extension_ptrs.len());

        Ok(Self {
            entry,
            raw,
            debug_utils,
        })
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn handle(&self) -> &ash::Instance {
        &self.raw
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug_utils.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.raw.destroy_instance(None);
        }
    }
}

fn debug_messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXTBuilder<'static> {
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
}

// Validation layer output routed through the log facade
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}

/// Owned names from an enumerated extension list.
pub(crate) fn extension_names(props: &[vk::ExtensionProperties]) -> Vec<CString> {
    props
        .iter()
        .map(|p| unsafe { CStr::from_ptr(p.extension_name.as_ptr()) }.to_owned())
        .collect()
}

fn layer_names(props: &[vk::LayerProperties]) -> Vec<CString> {
    props
        .iter()
        .map(|p| unsafe { CStr::from_ptr(p.layer_name.as_ptr()) }.to_owned())
        .collect()
}

pub(crate) fn contains(available: &[CString], name: &CStr) -> bool {
    available.iter().any(|a| a.as_c_str() == name)
}

/// First required name absent from the available set, if any.
pub(crate) fn first_missing(required: &[&CStr], available: &[CString]) -> Option<String> {
    required
        .iter()
        .find(|r| !contains(available, r))
        .map(|r| r.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<CString> {
        list.iter().map(|n| CString::new(*n).unwrap()).collect()
    }

    #[test]
    fn reports_first_missing_name() {
        let available = names(&["VK_KHR_surface", "VK_KHR_xcb_surface"]);
        let required = [c"VK_KHR_surface", c"VK_EXT_debug_utils"];
        assert_eq!(
            first_missing(&required, &available),
            Some("VK_EXT_debug_utils".to_string())
        );
    }

    #[test]
    fn passes_when_all_required_present() {
        let available = names(&["VK_EXT_debug_utils", "VK_KHR_surface"]);
        let required = [c"VK_KHR_surface", c"VK_EXT_debug_utils"];
        assert_eq!(first_missing(&required, &available), None);
    }

    #[test]
    fn layer_check_is_pure_over_enumerated_data() {
        let available = names(&["VK_LAYER_KHRONOS_validation"]);
        assert_eq!(
            first_missing(&VALIDATION_LAYERS, &available),
            first_missing(&VALIDATION_LAYERS, &available)
        );
        let empty: Vec<CString> = Vec::new();
        assert_eq!(
            first_missing(&VALIDATION_LAYERS, &empty),
            Some("VK_LAYER_KHRONOS_validation".to_string())
        );
    }
}
