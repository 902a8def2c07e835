//! Concurrency planning module
//!
//! Decides how many files are processed at once. The engine already
//! multithreads each encode, so the default is one file at a time.

use crate::config::Config;

/// Upper bound for the auto-derived file count.
const MAX_AUTO_FILES: u32 = 4;

/// Logical cores assumed to be used by one engine invocation.
const CORES_PER_FILE: u32 = 4;

/// Concurrency plan derived from configuration and system resources
#[derive(Debug, Clone, PartialEq)]
pub struct ConcurrencyPlan {
    /// Total logical CPU cores available
    pub total_cores: u32,
    /// Maximum number of files in flight
    pub max_concurrent_files: u32,
}

impl ConcurrencyPlan {
    /// Derive a concurrency plan from configuration
    ///
    /// Uses the following rules:
    /// - Detects CPU cores via num_cpus
    /// - An explicit non-zero `max_concurrent_files` is used as is
    /// - Zero derives `cores / 4`, clamped to [1, 4]
    pub fn derive(cfg: &Config) -> Self {
        Self::derive_with_cores(cfg.batch.max_concurrent_files, num_cpus::get() as u32)
    }

    /// Same as [`ConcurrencyPlan::derive`] with a known core count
    pub fn derive_with_cores(requested: u32, total_cores: u32) -> Self {
        let max_concurrent_files = if requested > 0 {
            requested
        } else {
            derive_files(total_cores)
        };

        Self {
            total_cores,
            max_concurrent_files,
        }
    }
}

fn derive_files(cores: u32) -> u32 {
    (cores / CORES_PER_FILE).clamp(1, MAX_AUTO_FILES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_config_is_sequential() {
        let plan = ConcurrencyPlan::derive(&Config::default());
        assert_eq!(plan.max_concurrent_files, 1);
        assert!(plan.total_cores >= 1);
    }

    #[test]
    fn test_auto_derivation_examples() {
        assert_eq!(ConcurrencyPlan::derive_with_cores(0, 2).max_concurrent_files, 1);
        assert_eq!(ConcurrencyPlan::derive_with_cores(0, 8).max_concurrent_files, 2);
        assert_eq!(ConcurrencyPlan::derive_with_cores(0, 64).max_concurrent_files, 4);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_concurrency_derivation(
            cores in 1u32..256,
            requested in 0u32..16,
        ) {
            let plan = ConcurrencyPlan::derive_with_cores(requested, cores);

            prop_assert_eq!(plan.total_cores, cores);
            if requested > 0 {
                prop_assert_eq!(plan.max_concurrent_files, requested);
            } else {
                prop_assert!(plan.max_concurrent_files >= 1);
                prop_assert!(plan.max_concurrent_files <= MAX_AUTO_FILES);
            }
        }
    }
}
