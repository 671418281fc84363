//! Newton-cooling decay model.
//!
//! A record's heat (`valid_access_count`) cools exponentially with the time
//! since it was last touched:
//!
//! ```text
//! α     = -ln(final_ratio) / horizon_seconds
//! value = initial · e^(-α · elapsed_seconds)
//! ```
//!
//! A profile's `final_ratio` doubles as its tier's forgetting threshold: after
//! exactly one horizon a record touched once sits on the eviction boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::RecordMetadata;
use crate::utils::parse_datetime;

/// Named cooling presets as `(final_ratio, horizon_seconds)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoolingProfile {
    Minutes20,
    Hours1,
    Hours9,
    Days1,
    Days2,
    Days6,
    Days31,
}

impl CoolingProfile {
    pub const ALL: [CoolingProfile; 7] = [
        CoolingProfile::Minutes20,
        CoolingProfile::Hours1,
        CoolingProfile::Hours9,
        CoolingProfile::Days1,
        CoolingProfile::Days2,
        CoolingProfile::Days6,
        CoolingProfile::Days31,
    ];

    /// Terminal ratio reached after one horizon.
    pub fn final_ratio(&self) -> f64 {
        match self {
            CoolingProfile::Minutes20 => 0.582,
            CoolingProfile::Hours1 => 0.442,
            CoolingProfile::Hours9 => 0.358,
            CoolingProfile::Days1 => 0.337,
            CoolingProfile::Days2 => 0.278,
            CoolingProfile::Days6 => 0.254,
            CoolingProfile::Days31 => 0.211,
        }
    }

    pub fn horizon_seconds(&self) -> f64 {
        const HOUR: f64 = 60.0 * 60.0;
        const DAY: f64 = 24.0 * HOUR;
        match self {
            CoolingProfile::Minutes20 => 20.0 * 60.0,
            CoolingProfile::Hours1 => HOUR,
            CoolingProfile::Hours9 => 9.0 * HOUR,
            CoolingProfile::Days1 => DAY,
            CoolingProfile::Days2 => 2.0 * DAY,
            CoolingProfile::Days6 => 6.0 * DAY,
            CoolingProfile::Days31 => 31.0 * DAY,
        }
    }

    /// Decay constant α for this profile.
    pub fn decay_constant(&self) -> f64 {
        -self.final_ratio().ln() / self.horizon_seconds()
    }

    /// Forgetting threshold for a tier cooled by this profile.
    pub fn threshold(&self) -> f64 {
        self.final_ratio()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CoolingProfile::Minutes20 => "minutes_20",
            CoolingProfile::Hours1 => "hours_1",
            CoolingProfile::Hours9 => "hours_9",
            CoolingProfile::Days1 => "days_1",
            CoolingProfile::Days2 => "days_2",
            CoolingProfile::Days6 => "days_6",
            CoolingProfile::Days31 => "days_31",
        }
    }
}

impl std::fmt::Display for CoolingProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CoolingProfile {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        CoolingProfile::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| Error::configuration(format!("unknown cooling profile: {}", s)))
    }
}

/// Derive α for an optional profile; a missing profile is a configuration error.
pub fn derive_decay_constant(profile: Option<CoolingProfile>) -> Result<f64> {
    profile
        .map(|p| p.decay_constant())
        .ok_or_else(|| Error::configuration("cooling profile is required"))
}

/// Apply exponential decay. Negative elapsed time is treated as zero.
pub fn decay(initial: f64, elapsed_seconds: f64, alpha: f64) -> f64 {
    initial * (-alpha * elapsed_seconds.max(0.0)).exp()
}

/// A point in time given either as a parsed timestamp or an ISO 8601 string.
pub trait Timestamp {
    fn to_utc(&self) -> Result<DateTime<Utc>>;
}

impl Timestamp for DateTime<Utc> {
    fn to_utc(&self) -> Result<DateTime<Utc>> {
        Ok(*self)
    }
}

impl Timestamp for &DateTime<Utc> {
    fn to_utc(&self) -> Result<DateTime<Utc>> {
        Ok(**self)
    }
}

impl Timestamp for &str {
    fn to_utc(&self) -> Result<DateTime<Utc>> {
        parse_datetime(self).ok_or_else(|| Error::InvalidTimestamp((*self).to_string()))
    }
}

impl Timestamp for String {
    fn to_utc(&self) -> Result<DateTime<Utc>> {
        self.as_str().to_utc()
    }
}

/// Wall-clock seconds from `t0` to `t1`.
pub fn elapsed_seconds(t0: impl Timestamp, t1: impl Timestamp) -> Result<f64> {
    let delta = t1.to_utc()? - t0.to_utc()?;
    Ok(delta.num_milliseconds() as f64 / 1000.0)
}

/// Decay model bound to one tier's cooling profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayModel {
    profile: CoolingProfile,
    alpha: f64,
}

impl DecayModel {
    pub fn new(profile: CoolingProfile) -> Self {
        Self {
            profile,
            alpha: profile.decay_constant(),
        }
    }

    /// Build from a configured profile name.
    pub fn from_name(name: Option<&str>) -> Result<Self> {
        let name = name.ok_or_else(|| Error::configuration("cooling profile is required"))?;
        Ok(Self::new(name.parse()?))
    }

    pub fn profile(&self) -> CoolingProfile {
        self.profile
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn threshold(&self) -> f64 {
        self.profile.threshold()
    }

    pub fn decay(&self, initial: f64, elapsed_seconds: f64) -> f64 {
        decay(initial, elapsed_seconds, self.alpha)
    }

    /// Current heat of a record, decayed from its own `last_updated`.
    pub fn decayed_count(&self, metadata: &RecordMetadata, now: DateTime<Utc>) -> f64 {
        let elapsed = (now - metadata.last_updated).num_milliseconds() as f64 / 1000.0;
        self.decay(metadata.valid_access_count, elapsed)
    }

    /// Whether a decayed heat value is at or below the forgetting threshold.
    pub fn is_forgettable(&self, value: f64) -> bool {
        value <= self.threshold()
    }
}
