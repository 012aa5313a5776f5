//! Job objects and the resource controls they enforce

pub mod cpu_rate;
#[cfg(windows)]
pub mod object;

pub use cpu_rate::{
    cpu_rate_flags, CpuRateControl, CpuRateMode, CpuRates, ResourceControlPolicy,
    ResourceLimitBuilder, ResourceLimitSpec,
};
#[cfg(windows)]
pub use object::JobObject;
