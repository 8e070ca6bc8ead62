//! Scan requests and their validation rules.

use crate::error::ValidationError;
use crate::render::OutputFormat;
use crate::scanner::{ScanOptions, ScanType};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_WORKERS: usize = 100;
pub const DEFAULT_VERSION_INTENSITY: i32 = 7;
pub const MAX_VERSION_INTENSITY: i32 = 9;

/// What to scan and how to report it.
///
/// Every field may be omitted on the wire; [`ScanRequest::validate`] fills
/// in defaults and rejects requests without a target or ports. The
/// timeout travels as integer milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub ports: String,
    #[serde(default)]
    pub scan_type: ScanType,
    #[serde(default, with = "duration_ms")]
    pub timeout: Duration,
    #[serde(default)]
    pub workers: usize,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default)]
    pub pretty_output: bool,
    #[serde(default)]
    pub enable_os: bool,
    #[serde(default)]
    pub enable_service: bool,
    #[serde(default = "unset_intensity")]
    pub version_intensity: i32,
    #[serde(default)]
    pub guess_os: bool,
    #[serde(default)]
    pub limit_os_scan: bool,
}

fn unset_intensity() -> i32 {
    -1
}

impl ScanRequest {
    /// A request for `target` and `ports` with every other field unset.
    pub fn new(target: impl Into<String>, ports: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ports: ports.into(),
            scan_type: ScanType::default(),
            timeout: Duration::ZERO,
            workers: 0,
            output_format: OutputFormat::default(),
            pretty_output: false,
            enable_os: false,
            enable_service: false,
            version_intensity: unset_intensity(),
            guess_os: false,
            limit_os_scan: false,
        }
    }

    /// Reject requests without a target or ports and default the rest.
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        if self.target.trim().is_empty() {
            return Err(ValidationError::TargetRequired);
        }
        if self.ports.trim().is_empty() {
            return Err(ValidationError::PortsRequired);
        }

        self.target = self.target.trim().to_string();
        self.ports = self.ports.trim().to_string();
        if self.timeout.is_zero() {
            self.timeout = DEFAULT_TIMEOUT;
        }
        if self.workers == 0 {
            self.workers = DEFAULT_WORKERS;
        }
        if !(0..=MAX_VERSION_INTENSITY).contains(&self.version_intensity) {
            self.version_intensity = DEFAULT_VERSION_INTENSITY;
        }
        Ok(self)
    }

    /// Engine options for this request.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            target: self.target.clone(),
            ports: self.ports.clone(),
            scan_type: self.scan_type,
            timeout: self.timeout,
            workers: self.workers,
            enable_service: self.enable_service,
            enable_os: self.enable_os,
            version_intensity: self.version_intensity.clamp(0, MAX_VERSION_INTENSITY) as u8,
            guess_os: self.guess_os,
            limit_os_scan: self.limit_os_scan,
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
