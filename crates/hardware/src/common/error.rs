//! Fatal construction-time errors.
//!
//! Every malformed input is rejected while the simulator is being built: unknown
//! standards, missing timing keys, geometry/mapping mismatches, and per-standard
//! feature rejections. Once construction succeeds the core never retries and never
//! reports a recoverable error; internal impossibilities are debug assertions.

use thiserror::Error;

/// A fatal configuration or construction error.
///
/// The CLI prints these as `fatal (<subsystem>): <reason>` and exits non-zero.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A timing or architecture key required by the selected standard is absent.
    #[error("fatal (MemSpec): {standard} requires timing key \"{key}\"")]
    MissingTimingKey {
        /// Standard being constructed (e.g. `"DDR4"`).
        standard: &'static str,
        /// Name of the missing key (e.g. `"RCD"`).
        key: &'static str,
    },

    /// The selected standard does not support a configured feature
    /// (e.g. per-bank refresh on DDR3, masked writes on a standard without MWR).
    #[error("fatal ({subsystem}): {reason}")]
    Unsupported {
        /// Subsystem that rejected the configuration.
        subsystem: &'static str,
        /// One-line reason.
        reason: String,
    },

    /// The address-mapping bit budget does not match the memspec geometry.
    #[error(
        "fatal (AddressDecoder): mapping covers 2^{mapping_bits} bytes but memspec advertises 2^{memspec_bits}"
    )]
    MappingMismatch {
        /// Total number of bits in the configured mapping vectors.
        mapping_bits: u32,
        /// `log2` of the memspec capacity in bytes.
        memspec_bits: u32,
    },

    /// A configuration value is malformed or out of its valid domain.
    #[error("fatal ({subsystem}): {reason}")]
    Invalid {
        /// Subsystem that rejected the value.
        subsystem: &'static str,
        /// One-line reason.
        reason: String,
    },

    /// The configuration bundle or trace file could not be parsed.
    #[error("fatal (Config): {0}")]
    Parse(String),
}

impl ConfigError {
    /// Shorthand for an [`ConfigError::Unsupported`] rejection.
    ///
    /// # Arguments
    ///
    /// * `subsystem` - Name printed in the fatal diagnostic.
    /// * `reason` - One-line reason.
    ///
    /// # Returns
    ///
    /// The assembled error value.
    pub fn unsupported(subsystem: &'static str, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            subsystem,
            reason: reason.into(),
        }
    }

    /// Shorthand for an [`ConfigError::Invalid`] value error.
    ///
    /// # Arguments
    ///
    /// * `subsystem` - Name printed in the fatal diagnostic.
    /// * `reason` - One-line reason.
    ///
    /// # Returns
    ///
    /// The assembled error value.
    pub fn invalid(subsystem: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            subsystem,
            reason: reason.into(),
        }
    }
}
