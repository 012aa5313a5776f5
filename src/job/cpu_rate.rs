//! CPU-rate control flags and resource limit specs for job objects
//!
//! A [`ResourceLimitSpec`] can only be built through
//! [`ResourceControlPolicy`], which rejects conflicting flags and
//! out-of-range rates before anything reaches the OS.

use crate::core::types::{NativeError, NativeResult};
use serde::Serialize;

/// `JOB_OBJECT_CPU_RATE_CONTROL_*` bits
pub mod cpu_rate_flags {
    pub const ENABLE: u32 = 0x1;
    pub const WEIGHT_BASED: u32 = 0x2;
    pub const HARD_CAP: u32 = 0x4;
    pub const NOTIFY: u32 = 0x8;
    pub const MIN_MAX_RATE: u32 = 0x10;
    pub const VALID_MASK: u32 = 0x1F;
}

/// Rates are hundredths of a percent of total CPU time
pub const MAX_CPU_RATE: u32 = 10_000;
pub const MIN_WEIGHT: u32 = 1;
pub const MAX_WEIGHT: u32 = 9;

/// Numeric inputs that go with the flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuRates {
    pub cpu_rate: Option<u32>,
    pub weight: Option<u32>,
    pub min_rate: Option<u32>,
    pub max_rate: Option<u32>,
}

impl CpuRates {
    pub fn rate(cpu_rate: u32) -> Self {
        CpuRates {
            cpu_rate: Some(cpu_rate),
            ..Default::default()
        }
    }

    pub fn weight(weight: u32) -> Self {
        CpuRates {
            weight: Some(weight),
            ..Default::default()
        }
    }

    pub fn min_max(min_rate: u32, max_rate: u32) -> Self {
        CpuRates {
            min_rate: Some(min_rate),
            max_rate: Some(max_rate),
            ..Default::default()
        }
    }
}

/// How CPU time is limited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CpuRateMode {
    /// No CPU-rate control
    Disabled,
    /// A share of CPU time; a cap when `HARD_CAP` is set
    Rate(u32),
    /// Relative weight against sibling jobs
    Weight(u32),
    MinMax { min: u16, max: u16 },
}

/// A validated CPU-rate control setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CpuRateControl {
    flags: u32,
    mode: CpuRateMode,
}

impl CpuRateControl {
    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn mode(&self) -> CpuRateMode {
        self.mode
    }

    pub fn is_hard_cap(&self) -> bool {
        self.flags & cpu_rate_flags::HARD_CAP != 0
    }

    /// The union member as the OS stores it
    pub fn packed_value(&self) -> u32 {
        match self.mode {
            CpuRateMode::Disabled => 0,
            CpuRateMode::Rate(rate) => rate,
            CpuRateMode::Weight(weight) => weight,
            CpuRateMode::MinMax { min, max } => (min as u32) | ((max as u32) << 16),
        }
    }

    /// Rebuild from a flags/value pair read back from the OS
    pub fn from_raw(flags: u32, value: u32) -> NativeResult<Self> {
        use cpu_rate_flags::*;
        let rates = if flags & WEIGHT_BASED != 0 {
            CpuRates::weight(value)
        } else if flags & MIN_MAX_RATE != 0 {
            CpuRates::min_max(value & 0xFFFF, value >> 16)
        } else if flags & ENABLE != 0 {
            CpuRates::rate(value)
        } else {
            CpuRates::default()
        };
        ResourceControlPolicy::cpu_rate(flags, rates)
    }
}

/// Limits applied to a job object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceLimitSpec {
    cpu: Option<CpuRateControl>,
    active_processes: Option<u32>,
    job_memory: Option<usize>,
}

impl ResourceLimitSpec {
    pub fn cpu(&self) -> Option<&CpuRateControl> {
        self.cpu.as_ref()
    }

    pub fn active_processes(&self) -> Option<u32> {
        self.active_processes
    }

    /// Committed-memory ceiling for the whole job, in bytes
    pub fn job_memory(&self) -> Option<usize> {
        self.job_memory
    }

    pub fn has_extended_limits(&self) -> bool {
        self.active_processes.is_some() || self.job_memory.is_some()
    }
}

/// Validating builder for [`ResourceLimitSpec`]
#[derive(Debug, Clone, Default)]
pub struct ResourceLimitBuilder {
    cpu: Option<(u32, CpuRates)>,
    active_processes: Option<u32>,
    job_memory: Option<usize>,
}

impl ResourceLimitBuilder {
    pub fn cpu_rate(mut self, flags: u32, rates: CpuRates) -> Self {
        self.cpu = Some((flags, rates));
        self
    }

    pub fn active_processes(mut self, limit: u32) -> Self {
        self.active_processes = Some(limit);
        self
    }

    pub fn job_memory(mut self, bytes: usize) -> Self {
        self.job_memory = Some(bytes);
        self
    }

    pub fn build(self) -> NativeResult<ResourceLimitSpec> {
        let cpu = match self.cpu {
            Some((flags, rates)) => Some(ResourceControlPolicy::cpu_rate(flags, rates)?),
            None => None,
        };
        if let Some(limit) = self.active_processes {
            check_range("active_processes", limit as u64, 1, u32::MAX as u64)?;
        }
        if let Some(bytes) = self.job_memory {
            check_range("job_memory", bytes as u64, 1, usize::MAX as u64)?;
        }
        Ok(ResourceLimitSpec {
            cpu,
            active_processes: self.active_processes,
            job_memory: self.job_memory,
        })
    }
}

fn check_range(field: &'static str, value: u64, min: u64, max: u64) -> NativeResult<()> {
    if value < min || value > max {
        Err(NativeError::out_of_range(field, value, min, max))
    } else {
        Ok(())
    }
}

fn flag_names(flags: u32) -> String {
    use cpu_rate_flags::*;
    [
        (ENABLE, "ENABLE"),
        (WEIGHT_BASED, "WEIGHT_BASED"),
        (HARD_CAP, "HARD_CAP"),
        (NOTIFY, "NOTIFY"),
        (MIN_MAX_RATE, "MIN_MAX_RATE"),
    ]
    .iter()
    .filter(|(bit, _)| flags & bit != 0)
    .map(|(_, name)| *name)
    .collect::<Vec<_>>()
    .join(" | ")
}

/// Validation rules for job resource controls
pub struct ResourceControlPolicy;

impl ResourceControlPolicy {
    /// Limits holding only a CPU-rate control
    pub fn build(flags: u32, rates: CpuRates) -> NativeResult<ResourceLimitSpec> {
        Self::builder().cpu_rate(flags, rates).build()
    }

    pub fn builder() -> ResourceLimitBuilder {
        ResourceLimitBuilder::default()
    }

    /// Validate a CPU-rate flag set together with its rates
    pub fn cpu_rate(flags: u32, rates: CpuRates) -> NativeResult<CpuRateControl> {
        use cpu_rate_flags::*;

        if flags == 0 {
            if rates != CpuRates::default() {
                return Err(NativeError::ConflictingFlags(
                    "rates given while CPU rate control is disabled".to_string(),
                ));
            }
            return Ok(CpuRateControl {
                flags,
                mode: CpuRateMode::Disabled,
            });
        }
        Self::check_flags(flags)?;

        let mode = if flags & WEIGHT_BASED != 0 {
            Self::reject_extra(
                rates.cpu_rate.or(rates.min_rate).or(rates.max_rate),
                "WEIGHT_BASED",
            )?;
            let weight = rates.weight.ok_or_else(|| {
                NativeError::ConflictingFlags("WEIGHT_BASED requires a weight".to_string())
            })?;
            check_range("weight", weight as u64, MIN_WEIGHT as u64, MAX_WEIGHT as u64)?;
            CpuRateMode::Weight(weight)
        } else if flags & MIN_MAX_RATE != 0 {
            Self::reject_extra(rates.cpu_rate.or(rates.weight), "MIN_MAX_RATE")?;
            let (min, max) = match (rates.min_rate, rates.max_rate) {
                (Some(min), Some(max)) => (min, max),
                _ => {
                    return Err(NativeError::ConflictingFlags(
                        "MIN_MAX_RATE requires both a minimum and a maximum rate".to_string(),
                    ))
                }
            };
            check_range("max_rate", max as u64, 1, MAX_CPU_RATE as u64)?;
            check_range("min_rate", min as u64, 0, max as u64)?;
            CpuRateMode::MinMax {
                min: min as u16,
                max: max as u16,
            }
        } else {
            Self::reject_extra(
                rates.weight.or(rates.min_rate).or(rates.max_rate),
                "a CPU rate",
            )?;
            let rate = rates.cpu_rate.ok_or_else(|| {
                NativeError::ConflictingFlags(format!("{} requires a CPU rate", flag_names(flags)))
            })?;
            check_range("cpu_rate", rate as u64, 1, MAX_CPU_RATE as u64)?;
            CpuRateMode::Rate(rate)
        };

        Ok(CpuRateControl { flags, mode })
    }

    /// Check a CPU-rate flag set without its rates: no unknown bits, at
    /// most one rate mode, and ENABLE set whenever any mode is.
    pub fn check_flags(flags: u32) -> NativeResult<()> {
        use cpu_rate_flags::*;

        let unknown = flags & !VALID_MASK;
        if unknown != 0 {
            return Err(NativeError::ConflictingFlags(format!(
                "unknown CPU rate control bits 0x{:X}",
                unknown
            )));
        }

        if flags == 0 {
            return Ok(());
        }
        let modes = flags & (WEIGHT_BASED | HARD_CAP | MIN_MAX_RATE);
        if modes.count_ones() > 1 {
            return Err(NativeError::ConflictingFlags(format!(
                "{} are mutually exclusive",
                flag_names(modes)
            )));
        }

        if flags & ENABLE == 0 {
            return Err(NativeError::ConflictingFlags(format!(
                "{} requires ENABLE",
                flag_names(flags)
            )));
        }
        if flags & NOTIFY != 0 && flags & (WEIGHT_BASED | MIN_MAX_RATE) != 0 {
            return Err(NativeError::ConflictingFlags(format!(
                "NOTIFY cannot be combined with {}",
                flag_names(flags & (WEIGHT_BASED | MIN_MAX_RATE))
            )));
        }

        Ok(())
    }

    fn reject_extra(extra: Option<u32>, mode: &str) -> NativeResult<()> {
        match extra {
            Some(_) => Err(NativeError::ConflictingFlags(format!(
                "rates for another control mode given with {}",
                mode
            ))),
            None => Ok(()),
        }
    }

    /// Hard caps across sibling jobs must fit in one CPU's worth of time.
    ///
    /// Returns the summed cap.
    pub fn check_total(specs: &[ResourceLimitSpec]) -> NativeResult<u32> {
        let total: u64 = specs
            .iter()
            .filter_map(|spec| spec.cpu())
            .filter(|cpu| cpu.is_hard_cap())
            .map(|cpu| cpu.packed_value() as u64)
            .sum();
        check_range("total hard-cap cpu rate", total, 0, MAX_CPU_RATE as u64)?;
        Ok(total as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::cpu_rate_flags::*;
    use super::*;
    use crate::core::types::ErrorKind;

    #[test]
    fn test_hard_cap() {
        let spec = ResourceControlPolicy::build(ENABLE | HARD_CAP, CpuRates::rate(2_500)).unwrap();
        let cpu = spec.cpu().unwrap();
        assert!(cpu.is_hard_cap());
        assert_eq!(cpu.mode(), CpuRateMode::Rate(2_500));
        assert_eq!(cpu.packed_value(), 2_500);
    }

    #[test]
    fn test_weight_and_hard_cap_conflict() {
        let err =
            ResourceControlPolicy::build(ENABLE | WEIGHT_BASED | HARD_CAP, CpuRates::weight(5))
                .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConflictingFlags);
        assert!(err.to_string().contains("WEIGHT_BASED | HARD_CAP"));
    }

    #[test]
    fn test_weight_and_min_max_conflict() {
        let err = ResourceControlPolicy::build(
            ENABLE | WEIGHT_BASED | MIN_MAX_RATE,
            CpuRates::weight(5),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConflictingFlags);
    }

    #[test]
    fn test_enable_required() {
        let err = ResourceControlPolicy::build(HARD_CAP, CpuRates::rate(100)).unwrap_err();
        assert!(err.to_string().contains("requires ENABLE"));
    }

    #[test]
    fn test_notify_rules() {
        let rate = CpuRates::rate(100);
        assert!(ResourceControlPolicy::build(ENABLE | HARD_CAP | NOTIFY, rate).is_ok());
        assert!(ResourceControlPolicy::build(ENABLE | NOTIFY, CpuRates::rate(100)).is_ok());
        let weight = CpuRates::weight(2);
        assert!(ResourceControlPolicy::build(ENABLE | WEIGHT_BASED | NOTIFY, weight).is_err());
    }

    #[test]
    fn test_rate_ranges() {
        assert!(ResourceControlPolicy::build(ENABLE, CpuRates::rate(MAX_CPU_RATE)).is_ok());
        let err =
            ResourceControlPolicy::build(ENABLE, CpuRates::rate(MAX_CPU_RATE + 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConflictingFlags);
        assert!(matches!(err, NativeError::OutOfRange { field: "cpu_rate", .. }));
        assert!(ResourceControlPolicy::build(ENABLE, CpuRates::rate(0)).is_err());
        assert!(ResourceControlPolicy::build(ENABLE, CpuRates::default()).is_err());
    }

    #[test]
    fn test_weight_range() {
        let heaviest = CpuRates::weight(MAX_WEIGHT);
        assert!(ResourceControlPolicy::build(ENABLE | WEIGHT_BASED, heaviest).is_ok());
        assert!(ResourceControlPolicy::build(ENABLE | WEIGHT_BASED, CpuRates::weight(0)).is_err());
        assert!(ResourceControlPolicy::build(ENABLE | WEIGHT_BASED, CpuRates::weight(10)).is_err());
    }

    #[test]
    fn test_min_max() {
        let rates = CpuRates::min_max(1_000, 4_000);
        let spec = ResourceControlPolicy::build(ENABLE | MIN_MAX_RATE, rates).unwrap();
        let cpu = spec.cpu().unwrap();
        assert_eq!(cpu.mode(), CpuRateMode::MinMax { min: 1_000, max: 4_000 });
        assert_eq!(cpu.packed_value(), 1_000 | (4_000 << 16));
        assert_eq!(CpuRateControl::from_raw(cpu.flags(), cpu.packed_value()).unwrap(), *cpu);

        let min_max = |min, max| {
            ResourceControlPolicy::build(ENABLE | MIN_MAX_RATE, CpuRates::min_max(min, max))
        };
        assert!(min_max(5_000, 4_000).is_err());
        assert!(min_max(0, 10_001).is_err());
        assert!(ResourceControlPolicy::build(ENABLE | MIN_MAX_RATE, CpuRates::rate(100)).is_err());
    }

    #[test]
    fn test_rates_for_wrong_mode() {
        let rates = CpuRates {
            cpu_rate: Some(100),
            weight: Some(3),
            ..Default::default()
        };
        assert!(ResourceControlPolicy::build(ENABLE | WEIGHT_BASED, rates).is_err());
        assert!(ResourceControlPolicy::build(ENABLE, rates).is_err());
    }

    #[test]
    fn test_unknown_bits() {
        assert!(ResourceControlPolicy::build(ENABLE | 0x20, CpuRates::rate(1)).is_err());
    }

    #[test]
    fn test_disabled() {
        let spec = ResourceControlPolicy::build(0, CpuRates::default()).unwrap();
        assert_eq!(spec.cpu().unwrap().mode(), CpuRateMode::Disabled);
        assert!(ResourceControlPolicy::build(0, CpuRates::rate(5)).is_err());
    }

    #[test]
    fn test_extended_limits() {
        let spec = ResourceControlPolicy::builder()
            .active_processes(4)
            .job_memory(64 << 20)
            .build()
            .unwrap();
        assert!(spec.cpu().is_none());
        assert!(spec.has_extended_limits());
        assert_eq!(spec.active_processes(), Some(4));

        assert!(ResourceControlPolicy::builder().active_processes(0).build().is_err());
        assert!(ResourceControlPolicy::builder().job_memory(0).build().is_err());
    }

    #[test]
    fn test_check_total() {
        let cap =
            |rate| ResourceControlPolicy::build(ENABLE | HARD_CAP, CpuRates::rate(rate)).unwrap();
        let soft = ResourceControlPolicy::build(ENABLE, CpuRates::rate(9_000)).unwrap();

        assert_eq!(
            ResourceControlPolicy::check_total(&[cap(4_000), cap(6_000), soft.clone()]).unwrap(),
            10_000
        );
        let err = ResourceControlPolicy::check_total(&[cap(4_000), cap(6_001)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConflictingFlags);
        assert_eq!(ResourceControlPolicy::check_total(&[]).unwrap(), 0);
    }
}
