// Context lifecycle - the bootstrap sequence and reverse-order teardown
//
// Construction is strictly linear: instance, debug messenger, surface,
// physical device, logical device, swapchain, image views. A failure at any
// step drops everything already built, in reverse, before the error reaches
// the caller.

use std::sync::Arc;

use raw_window_handle::HasDisplayHandle;
use winit::window::Window;

use super::error::{BackendError, Result};
use super::{shader, Instance, Surface, Swapchain, VulkanDevice};
use crate::config::Config;

/// Owns the whole Vulkan bootstrap state for one window.
///
/// Field order mirrors reverse creation order; the `Arc` parent references
/// inside each wrapper keep the chain valid independently of it.
pub struct RenderContext {
    swapchain: Option<Swapchain>,
    device: Arc<VulkanDevice>,
    surface: Arc<Surface>,
    _instance: Arc<Instance>,
}

impl RenderContext {
    pub fn new(window: &Window, config: &Config) -> Result<Self> {
        let display = window
            .display_handle()
            .map_err(|e| BackendError::SurfaceCreationFailed(e.to_string()))?
            .as_raw();

        let instance = Arc::new(Instance::new(
            &config.window.title,
            config.debug.validation_layers,
            display,
        )?);
        let surface = Arc::new(Surface::new(instance.clone(), window)?);
        let device = VulkanDevice::new(instance.clone(), &surface)?;
        log::info!(
            "Queues: graphics family {}, present family {}{}",
            device.graphics_family,
            device.present_family,
            if device.graphics_queue == device.present_queue {
                " (shared queue)"
            } else {
                ""
            }
        );

        let size = window.inner_size();
        let swapchain = Swapchain::new(device.clone(), surface.clone(), size.width, size.height)?;

        // Pipeline construction is not wired up yet; loading the payloads
        // here makes missing shader assets fail at startup.
        let _vert = shader::read_spirv("shaders/vert.spv")?;
        let _frag = shader::read_spirv("shaders/frag.spv")?;

        log::info!("Vulkan context initialized");

        Ok(Self {
            swapchain: Some(swapchain),
            device,
            surface,
            _instance: instance,
        })
    }

    /// Rebuild the swapchain and its image views after a resize. The old
    /// chain is torn down before the new one is built; a surface can only
    /// back one swapchain at a time. GPU work must have drained first.
    pub fn recreate_swapchain(&mut self, width: u32, height: u32) -> Result<()> {
        self.device.wait_idle()?;
        self.swapchain = None;
        let swapchain = Swapchain::new(
            self.device.clone(),
            self.surface.clone(),
            width,
            height,
        )?;
        log::info!(
            "Swapchain rebuilt at {}x{}",
            swapchain.extent.width,
            swapchain.extent.height
        );
        self.swapchain = Some(swapchain);
        Ok(())
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        log::info!("Tearing down Vulkan context");
    }
}
