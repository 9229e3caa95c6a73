//! Binary body carried by protection-status responses.

use crate::error::{ModelError, Result};

/// Decoded protection-status body.
///
/// The body is a single signed byte. Values other than the two known ones are
/// kept so callers can log them, but they never count as enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProtectionStatus {
    Disabled,
    Enabled,
    Other(i8),
}

impl ProtectionStatus {
    pub const DISABLED: i8 = 0;
    pub const ENABLED: i8 = 1;
    pub const ENCODED_LEN: usize = 1;

    pub fn decode(body: &[u8]) -> Result<Self> {
        let [byte] = body else {
            return Err(ModelError::BodyLength {
                payload: "protection status",
                expected: Self::ENCODED_LEN,
                actual: body.len(),
            });
        };

        Ok(match *byte as i8 {
            Self::DISABLED => ProtectionStatus::Disabled,
            Self::ENABLED => ProtectionStatus::Enabled,
            other => ProtectionStatus::Other(other),
        })
    }

    pub fn encode(self) -> Vec<u8> {
        let raw = match self {
            ProtectionStatus::Disabled => Self::DISABLED,
            ProtectionStatus::Enabled => Self::ENABLED,
            ProtectionStatus::Other(raw) => raw,
        };
        vec![raw as u8]
    }

    pub fn is_enabled(self) -> bool {
        matches!(self, ProtectionStatus::Enabled)
    }
}

impl From<bool> for ProtectionStatus {
    fn from(enabled: bool) -> Self {
        if enabled {
            ProtectionStatus::Enabled
        } else {
            ProtectionStatus::Disabled
        }
    }
}
