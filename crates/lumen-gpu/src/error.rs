//! GPU error types.

use ash::vk;
use lumen_core::Severity;
use thiserror::Error;

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// No suitable GPU found.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// Memory allocation failed.
    #[error("Memory allocation failed: {0}")]
    AllocationFailed(String),

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// Shader compilation failed.
    #[error("Shader compilation failed: {0}")]
    ShaderCompilation(String),

    /// Pipeline creation failed.
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    /// No supported format among the requested candidates.
    #[error("No supported format: {0}")]
    UnsupportedFormat(String),

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl GpuError {
    /// Classify this error for the caller.
    ///
    /// A stale or suboptimal surface is the only condition a render loop may
    /// recover from by recreating the swapchain; everything else here is an
    /// environment or driver failure.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Vulkan(vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::SUBOPTIMAL_KHR) => {
                Severity::Recoverable
            }
            _ => Severity::Fatal,
        }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_surface_is_recoverable() {
        let err = GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DATE_KHR);
        assert_eq!(err.severity(), Severity::Recoverable);
        let err = GpuError::Vulkan(vk::Result::SUBOPTIMAL_KHR);
        assert_eq!(err.severity(), Severity::Recoverable);
    }

    #[test]
    fn construction_failures_are_fatal() {
        assert_eq!(
            GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST).severity(),
            Severity::Fatal
        );
        assert_eq!(GpuError::NoSuitableDevice.severity(), Severity::Fatal);
        assert_eq!(
            GpuError::AllocationFailed("oom".into()).severity(),
            Severity::Fatal
        );
    }
}
