// Presentable surface - the window-system connection
//
// Pure query methods only; capability results are tied to the current
// display configuration and are never cached here.

use std::sync::Arc;

use ash::extensions::khr;
use ash::prelude::VkResult;
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::window::Window;

use super::error::{BackendError, Result};
use super::Instance;

/// Drawable surface for one window. Holds the instance so the surface is
/// always destroyed first.
pub struct Surface {
    loader: khr::Surface,
    handle: vk::SurfaceKHR,
    _instance: Arc<Instance>,
}

impl Surface {
    pub fn new(instance: Arc<Instance>, window: &Window) -> Result<Self> {
        let display = window
            .display_handle()
            .map_err(|e| BackendError::SurfaceCreationFailed(e.to_string()))?
            .as_raw();
        let window_handle = window
            .window_handle()
            .map_err(|e| BackendError::SurfaceCreationFailed(e.to_string()))?
            .as_raw();

        let handle = unsafe {
            ash_window::create_surface(
                instance.entry(),
                instance.handle(),
                display,
                window_handle,
                None,
            )
        }
        .map_err(|e| BackendError::SurfaceCreationFailed(e.to_string()))?;

        let loader = khr::Surface::new(instance.entry(), instance.handle());

        Ok(Self {
            loader,
            handle,
            _instance: instance,
        })
    }

    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Whether the given queue family can present to this surface.
    pub fn supports_present(&self, device: vk::PhysicalDevice, family: u32) -> VkResult<bool> {
        unsafe {
            self.loader
                .get_physical_device_surface_support(device, family, self.handle)
        }
    }

    pub fn capabilities(
        &self,
        device: vk::PhysicalDevice,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.loader
                .get_physical_device_surface_capabilities(device, self.handle)
        }
    }

    pub fn formats(&self, device: vk::PhysicalDevice) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.loader
                .get_physical_device_surface_formats(device, self.handle)
        }
    }

    pub fn present_modes(
        &self,
        device: vk::PhysicalDevice,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.loader
                .get_physical_device_surface_present_modes(device, self.handle)
        }
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
    }
}
