//! Render error types.

use lumen_core::Severity;
use lumen_gpu::GpuError;
use thiserror::Error;

/// Errors from the frame loop and render systems.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Underlying GPU error.
    #[error(transparent)]
    Gpu(#[from] GpuError),

    /// The descriptor pool could not hand out another set.
    #[error("descriptor pool exhausted")]
    DescriptorsExhausted,

    /// A scene object references a mesh the registry does not know.
    #[error("mesh {0} is not registered")]
    MeshNotFound(u32),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl RenderError {
    /// Classify this error for the caller.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Gpu(e) => e.severity(),
            // The caller sized the pool; it can drop the allocation and go on
            Self::DescriptorsExhausted => Severity::Recoverable,
            Self::MeshNotFound(_) | Self::Other(_) => Severity::Fatal,
        }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;

    #[test]
    fn severity_passes_through_gpu_errors() {
        let stale = RenderError::Gpu(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DATE_KHR));
        assert_eq!(stale.severity(), Severity::Recoverable);

        let lost = RenderError::Gpu(GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST));
        assert_eq!(lost.severity(), Severity::Fatal);
    }

    #[test]
    fn pool_exhaustion_is_caller_handled() {
        assert_eq!(
            RenderError::DescriptorsExhausted.severity(),
            Severity::Recoverable
        );
    }
}
