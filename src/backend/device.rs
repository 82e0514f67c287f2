// Vulkan device - physical device selection and logical device creation
//
// Selection policy: first suitable device in enumeration order, no scoring.
// Suitability = complete queue families + required device extensions +
// usable swapchain support.

use std::collections::BTreeSet;
use std::ffi::{c_char, CStr, CString};
use std::sync::Arc;

use ash::prelude::VkResult;
use ash::vk;

use super::error::{BackendError, Result};
use super::instance::{contains, extension_names};
use super::{Instance, Surface};

/// Extensions every selected device must support.
fn required_device_extensions() -> Vec<&'static CStr> {
    vec![ash::extensions::khr::Swapchain::name()]
}

/// Graphics and presentation queue family indices for one physical device.
/// Both must be populated before device creation; the two may name the same
/// family.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// Distinct family indices, sorted. One queue is requested per entry.
    fn unique(&self) -> Vec<u32> {
        let mut set = BTreeSet::new();
        set.extend(self.graphics);
        set.extend(self.present);
        set.into_iter().collect()
    }
}

/// Single pass over the reported families: the first graphics-capable family
/// and the first present-capable family win, independently of each other.
/// A family serving both roles is accepted as-is; the scan stops as soon as
/// both are set.
fn resolve_queue_families<F>(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: F,
) -> VkResult<QueueFamilyIndices>
where
    F: FnMut(u32) -> VkResult<bool>,
{
    let mut indices = QueueFamilyIndices::default();
    for (index, family) in families.iter().enumerate() {
        let index = index as u32;
        if indices.graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            indices.graphics = Some(index);
        }
        if indices.present.is_none() && supports_present(index)? {
            indices.present = Some(index);
        }
        if indices.is_complete() {
            break;
        }
    }
    Ok(indices)
}

/// Device extensions still missing from the available set.
fn missing_device_extensions(required: &[&CStr], available: &[CString]) -> Vec<String> {
    required
        .iter()
        .filter(|r| !contains(available, r))
        .map(|r| r.to_string_lossy().into_owned())
        .collect()
}

/// Swapchain-related capabilities of a device/surface pair. Queried fresh on
/// every use; the results depend on the current display configuration.
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    pub fn query(surface: &Surface, device: vk::PhysicalDevice) -> VkResult<Self> {
        Ok(Self {
            capabilities: surface.capabilities(device)?,
            formats: surface.formats(device)?,
            present_modes: surface.present_modes(device)?,
        })
    }

    /// A device is only presentable when it reports at least one format and
    /// one present mode.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Logical device wrapper. Owns the `ash::Device` and the queue handles;
/// graphics and present queues may be the same object when the families
/// coincide.
pub struct VulkanDevice {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub graphics_family: u32,
    pub present_family: u32,
    instance: Arc<Instance>,
}

impl VulkanDevice {
    pub fn new(instance: Arc<Instance>, surface: &Surface) -> Result<Arc<Self>> {
        let (physical_device, graphics_family, present_family) =
            Self::pick_physical_device(&instance, surface)?;

        let properties = unsafe {
            instance
                .handle()
                .get_physical_device_properties(physical_device)
        };
        log::info!(
            "Selected GPU: {}",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy()
        );
        log::info!(
            "API version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version)
        );

        let device = Self::create_logical_device(
            &instance,
            physical_device,
            graphics_family,
            present_family,
        )?;

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };

        Ok(Arc::new(Self {
            device,
            physical_device,
            graphics_queue,
            present_queue,
            graphics_family,
            present_family,
            instance,
        }))
    }

    pub fn instance(&self) -> &ash::Instance {
        self.instance.handle()
    }

    /// Wait for all queues to drain, e.g. before teardown or rebuild.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }?;
        Ok(())
    }

    /// First suitable device in enumeration order.
    fn pick_physical_device(
        instance: &Instance,
        surface: &Surface,
    ) -> Result<(vk::PhysicalDevice, u32, u32)> {
        let devices = unsafe { instance.handle().enumerate_physical_devices() }?;
        if devices.is_empty() {
            return Err(BackendError::NoDevicesFound);
        }

        for device in devices {
            if let Some((graphics, present)) = Self::check_suitable(instance, surface, device)? {
                return Ok((device, graphics, present));
            }
        }

        Err(BackendError::NoSuitableDevice)
    }

    /// Resolved family indices when the device qualifies, `None` otherwise.
    fn check_suitable(
        instance: &Instance,
        surface: &Surface,
        device: vk::PhysicalDevice,
    ) -> Result<Option<(u32, u32)>> {
        let families = unsafe {
            instance
                .handle()
                .get_physical_device_queue_family_properties(device)
        };
        let indices =
            resolve_queue_families(&families, |index| surface.supports_present(device, index))?;
        let (Some(graphics), Some(present)) = (indices.graphics, indices.present) else {
            return Ok(None);
        };

        let available = device_extension_names(instance, device)?;
        if !missing_device_extensions(&required_device_extensions(), &available).is_empty() {
            return Ok(None);
        }

        // Extension support established, so the swapchain queries are valid.
        if !SwapchainSupport::query(surface, device)?.is_adequate() {
            return Ok(None);
        }

        Ok(Some((graphics, present)))
    }

    fn create_logical_device(
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        graphics_family: u32,
        present_family: u32,
    ) -> Result<ash::Device> {
        let indices = QueueFamilyIndices {
            graphics: Some(graphics_family),
            present: Some(present_family),
        };

        let queue_priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = indices
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
                    .build()
            })
            .collect();

        // Devices advertising the portability subset must have it enabled.
        let available = device_extension_names(instance, physical_device)?;
        let mut extensions: Vec<*const c_char> = required_device_extensions()
            .iter()
            .map(|e| e.as_ptr())
            .collect();
        if contains(&available, vk::KhrPortabilitySubsetFn::name()) {
            extensions.push(vk::KhrPortabilitySubsetFn::name().as_ptr());
        }

        // No optional features requested yet.
        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        unsafe {
            instance
                .handle()
                .create_device(physical_device, &create_info, None)
        }
        .map_err(BackendError::DeviceCreationFailed)
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device");
        let _ = self.wait_idle();
        unsafe {
            self.device.destroy_device(None);
        }
    }
}

fn device_extension_names(instance: &Instance, device: vk::PhysicalDevice) -> Result<Vec<CString>> {
    let props = unsafe {
        instance
            .handle()
            .enumerate_device_extension_properties(device)
    }?;
    Ok(extension_names(&props))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn resolver_picks_first_graphics_family() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];
        let indices = resolve_queue_families(&families, |_| Ok(false)).unwrap();
        assert_eq!(indices.graphics, Some(1));
        assert_eq!(indices.present, None);
        assert!(!indices.is_complete());
    }

    #[test]
    fn resolver_tracks_roles_independently() {
        // Present support only on family 0, graphics only on family 1.
        let families = [family(vk::QueueFlags::COMPUTE), family(vk::QueueFlags::GRAPHICS)];
        let indices = resolve_queue_families(&families, |index| Ok(index == 0)).unwrap();
        assert_eq!(indices.graphics, Some(1));
        assert_eq!(indices.present, Some(0));
        assert!(indices.is_complete());
    }

    #[test]
    fn resolver_incomplete_without_present_support() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let indices = resolve_queue_families(&families, |_| Ok(false)).unwrap();
        assert!(!indices.is_complete());
    }

    #[test]
    fn resolver_incomplete_without_graphics_support() {
        let families = [family(vk::QueueFlags::COMPUTE), family(vk::QueueFlags::TRANSFER)];
        let indices = resolve_queue_families(&families, |_| Ok(true)).unwrap();
        assert_eq!(indices.present, Some(0));
        assert!(!indices.is_complete());
    }

    #[test]
    fn shared_family_requests_a_single_queue() {
        let shared = QueueFamilyIndices {
            graphics: Some(0),
            present: Some(0),
        };
        assert_eq!(shared.unique(), vec![0]);

        let distinct = QueueFamilyIndices {
            graphics: Some(2),
            present: Some(0),
        };
        assert_eq!(distinct.unique(), vec![0, 2]);
    }

    #[test]
    fn missing_extensions_reports_remainder() {
        let available = vec![CString::new("VK_KHR_swapchain").unwrap()];
        assert!(missing_device_extensions(&required_device_extensions(), &available).is_empty());
        assert_eq!(
            missing_device_extensions(&required_device_extensions(), &[]),
            vec!["VK_KHR_swapchain".to_string()]
        );
    }

    #[test]
    fn adequacy_requires_formats_and_present_modes() {
        let support = SwapchainSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(support.is_adequate());

        let no_formats = SwapchainSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: Vec::new(),
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(!no_formats.is_adequate());
    }
}
