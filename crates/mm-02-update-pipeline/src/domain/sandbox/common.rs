//! Category-independent sandbox tests.

use super::{SandboxSubject, SandboxTest};
use crate::domain::value_objects::Version;

pub struct MinimumLength {
    min: u64,
}

impl MinimumLength {
    pub fn new(min: u64) -> Self {
        Self { min }
    }
}

impl SandboxTest for MinimumLength {
    fn name(&self) -> &'static str {
        "minimum_length"
    }

    fn run(&self, subject: &SandboxSubject) -> Result<(), String> {
        let len = subject.payload.len() as u64;
        if len < self.min {
            return Err(format!("{} bytes, need at least {}", len, self.min));
        }
        Ok(())
    }
}

pub struct MaximumSize {
    max: u64,
}

impl MaximumSize {
    pub fn new(max: u64) -> Self {
        Self { max }
    }
}

impl SandboxTest for MaximumSize {
    fn name(&self) -> &'static str {
        "maximum_size"
    }

    fn run(&self, subject: &SandboxSubject) -> Result<(), String> {
        let len = subject.payload.len() as u64;
        if len > self.max {
            return Err(format!("{} bytes exceeds cap of {}", len, self.max));
        }
        Ok(())
    }
}

/// Fails on any denylisted substring, ignoring ASCII case.
pub struct MaliciousPatternScan {
    patterns: Vec<Vec<u8>>,
}

impl MaliciousPatternScan {
    pub fn new(patterns: Vec<String>) -> Self {
        Self {
            patterns: patterns
                .into_iter()
                .filter(|p| !p.is_empty())
                .map(|p| p.to_ascii_lowercase().into_bytes())
                .collect(),
        }
    }

    fn find(&self, haystack: &[u8]) -> Option<&[u8]> {
        self.patterns
            .iter()
            .find(|needle| {
                haystack
                    .windows(needle.len())
                    .any(|window| window.eq_ignore_ascii_case(needle.as_slice()))
            })
            .map(|p| p.as_slice())
    }
}

impl SandboxTest for MaliciousPatternScan {
    fn name(&self) -> &'static str {
        "malicious_pattern_scan"
    }

    fn run(&self, subject: &SandboxSubject) -> Result<(), String> {
        match self.find(&subject.payload) {
            Some(hit) => Err(format!("matched {:?}", String::from_utf8_lossy(hit))),
            None => Ok(()),
        }
    }
}

/// The version must parse and must not be older than what is installed.
pub struct CompatibilityCheck;

impl SandboxTest for CompatibilityCheck {
    fn name(&self) -> &'static str {
        "compatibility"
    }

    fn run(&self, subject: &SandboxSubject) -> Result<(), String> {
        let incoming = Version::parse(&subject.envelope.version)
            .ok_or_else(|| format!("unparseable version {:?}", subject.envelope.version))?;
        let Some(installed) = subject.applied_version.as_deref() else {
            return Ok(());
        };
        // An unparseable installed version cannot be compared; allow the upgrade.
        match Version::parse(installed) {
            Some(current) if incoming < current => {
                Err(format!("downgrade from {} to {}", current, incoming))
            }
            _ => Ok(()),
        }
    }
}

pub struct RollbackCapability;

impl SandboxTest for RollbackCapability {
    fn name(&self) -> &'static str {
        "rollback_capability"
    }

    fn run(&self, subject: &SandboxSubject) -> Result<(), String> {
        if subject.rollback_available {
            Ok(())
        } else {
            Err("applier cannot snapshot current state".into())
        }
    }
}
