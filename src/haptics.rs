use anyhow::Result;
use std::fmt;
use tracing::debug;

/// Named tactile acknowledgments emitted after store mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Selection,
    LightImpact,
    MediumImpact,
    Success,
    Warning,
}

impl fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeedbackKind::Selection => "selection",
            FeedbackKind::LightImpact => "impact-light",
            FeedbackKind::MediumImpact => "impact-medium",
            FeedbackKind::Success => "notification-success",
            FeedbackKind::Warning => "notification-warning",
        };
        f.write_str(name)
    }
}

pub trait Haptics {
    fn emit(&self, kind: FeedbackKind) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoHaptics;

impl Haptics for NoHaptics {
    fn emit(&self, _kind: FeedbackKind) -> Result<()> {
        Ok(())
    }
}

/// Terminal stand-in for a vibration motor: records each kind at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogHaptics;

impl Haptics for LogHaptics {
    fn emit(&self, kind: FeedbackKind) -> Result<()> {
        debug!(%kind, "haptic feedback");
        Ok(())
    }
}
