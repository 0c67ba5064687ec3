use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid loop bandwidth {0}, must be >= 0")]
    NegativeBandwidth(f32),
    #[error("invalid damping factor {0}, must be >= 0")]
    InvalidDamping(f32),
    #[error("unsupported modulation order {0}, expected 2, 4 or 8")]
    UnsupportedOrder(u32),
    #[error("frequency limits out of order: min {min} > max {max}")]
    FrequencyLimits { min: f32, max: f32 },
    #[error("invalid noise estimate {0}, must be > 0")]
    InvalidNoiseEstimate(f32),
}
