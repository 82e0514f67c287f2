// Backend error taxonomy
//
// Every failure is raised at its origin and propagates unhandled to the
// top level. No local recovery or retry anywhere in the bootstrap path.

use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

/// Errors produced by the Vulkan bootstrap layer.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to load the Vulkan library: {0}")]
    LibraryLoad(#[from] ash::LoadingError),

    #[error("validation requested but the debug utils extension is unavailable")]
    ValidationUnsupported,

    #[error("required instance extension missing: {0}")]
    MissingExtension(String),

    #[error("required validation layer missing: {0}")]
    MissingLayer(String),

    #[error("application name contains an interior nul byte")]
    InvalidAppName(#[from] std::ffi::NulError),

    #[error("failed to create Vulkan instance: {0}")]
    InstanceCreationFailed(vk::Result),

    #[error("failed to create debug messenger: {0}")]
    DebugMessengerUnavailable(vk::Result),

    #[error("failed to create window surface: {0}")]
    SurfaceCreationFailed(String),

    #[error("no Vulkan-capable devices found")]
    NoDevicesFound,

    #[error("no suitable physical device found")]
    NoSuitableDevice,

    #[error("failed to create logical device: {0}")]
    DeviceCreationFailed(vk::Result),

    #[error("failed to create swapchain: {0}")]
    SwapchainCreationFailed(vk::Result),

    #[error("failed to create swapchain image view: {0}")]
    ImageViewCreationFailed(vk::Result),

    #[error("shader file not found: {0}")]
    ShaderNotFound(PathBuf),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Capability queries without a dedicated variant.
    #[error("Vulkan call failed: {0}")]
    Vulkan(#[from] vk::Result),
}

pub type Result<T> = std::result::Result<T, BackendError>;
