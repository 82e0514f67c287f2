// Backend module - Vulkan bootstrap layer
//
// Construction order: instance, surface, device, swapchain. Teardown is the
// exact reverse, guaranteed by the wrapper Drop impls.

pub mod context;
pub mod device;
pub mod error;
pub mod instance;
pub mod shader;
pub mod surface;
pub mod swapchain;

pub use context::RenderContext;
pub use device::VulkanDevice;
pub use error::BackendError;
pub use instance::Instance;
pub use surface::Surface;
pub use swapchain::Swapchain;
