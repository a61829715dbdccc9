use serde::Serialize;

/// Overall market fit for the target role, 0 to 100. Recomputed by the
/// engine on refresh, never adjusted locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(transparent)]
pub struct ReadinessScore(u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessBand {
    JustStarted,
    GettingThere,
    GoodProgress,
    Excellent,
}

impl ReadinessBand {
    pub fn label(self) -> &'static str {
        match self {
            ReadinessBand::JustStarted => "Just Started",
            ReadinessBand::GettingThere => "Getting There",
            ReadinessBand::GoodProgress => "Good Progress",
            ReadinessBand::Excellent => "Excellent",
        }
    }
}

impl ReadinessScore {
    pub const MAX: u8 = 100;

    /// Clamps whatever the engine sent into `[0, 100]`.
    pub fn clamped(raw: f64) -> Self {
        if !raw.is_finite() {
            return Self(0);
        }
        Self(raw.round().clamp(0.0, f64::from(Self::MAX)) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn band(self) -> ReadinessBand {
        match self.0 {
            80..=u8::MAX => ReadinessBand::Excellent,
            60..=79 => ReadinessBand::GoodProgress,
            40..=59 => ReadinessBand::GettingThere,
            _ => ReadinessBand::JustStarted,
        }
    }
}
