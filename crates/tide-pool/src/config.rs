//! Pool configuration — validation, presets and `[pool]` TOML loading.
//!
//! ```toml
//! [pool]
//! preset = "fixed"        # optional: cached | fixed | single
//! size = 4                # worker count for the fixed preset
//! idle_timeout = "30s"    # explicit fields override the preset
//! dispatch_timeout = "5ms"
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PoolError, PoolResult};

/// Ceiling used by the cached preset. Effectively unbounded.
pub const UNBOUNDED_MAX_SIZE: usize = 2_147_483_647;

/// Sizing and timing for an [`ElasticPool`](crate::ElasticPool).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Workers kept alive for the pool's whole life, spawned up front.
    pub core_size: usize,
    /// Hard ceiling on concurrently alive workers.
    pub max_size: usize,
    /// How long a worker above the core floor may sit idle before retiring.
    pub idle_timeout: Duration,
    /// How long the dispatcher waits for an idle worker before growing.
    pub dispatch_timeout: Duration,
}

impl PoolConfig {
    /// Build a configuration. Argument order follows the pool constructor:
    /// timeouts first, then ceiling, then floor.
    pub fn new(
        idle_timeout: Duration,
        dispatch_timeout: Duration,
        max_size: usize,
        core_size: usize,
    ) -> Self {
        Self {
            core_size,
            max_size,
            idle_timeout,
            dispatch_timeout,
        }
    }

    /// No floor, unbounded ceiling, idle workers retire after a minute.
    pub fn cached() -> Self {
        Self::new(Duration::from_secs(60), Duration::ZERO, UNBOUNDED_MAX_SIZE, 0)
    }

    /// Exactly `size` workers, never shrinking.
    pub fn fixed(size: usize) -> Self {
        Self::new(Duration::from_secs(3600), Duration::ZERO, size, size)
    }

    /// One worker, never shrinking.
    pub fn single() -> Self {
        Self::fixed(1)
    }

    /// Reject configurations the pool cannot run with. Nothing is clamped.
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_size == 0 {
            return Err(PoolError::InvalidConfig(
                "max_size must be at least 1".to_string(),
            ));
        }
        if self.core_size > self.max_size {
            return Err(PoolError::InvalidConfig(format!(
                "core_size ({}) must not exceed max_size ({})",
                self.core_size, self.max_size
            )));
        }
        Ok(())
    }

    /// Parse and validate a `[pool]` TOML document.
    pub fn from_toml_str(content: &str) -> PoolResult<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        let config = file.pool.resolve()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> PoolResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Render as a `[pool]` TOML document with explicit fields.
    pub fn to_toml_string(&self) -> PoolResult<String> {
        let file = ConfigFile {
            pool: PoolSection {
                core_size: Some(self.core_size),
                max_size: Some(self.max_size),
                idle_timeout: Some(format_duration(self.idle_timeout)),
                dispatch_timeout: Some(format_duration(self.dispatch_timeout)),
                ..PoolSection::default()
            },
        };
        Ok(toml::to_string_pretty(&file)?)
    }
}

/// Named configuration shorthands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Cached,
    Fixed,
    Single,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::Cached, Preset::Fixed, Preset::Single];

    /// Expand the preset. `fixed` needs a size.
    pub fn config(self, size: Option<usize>) -> PoolResult<PoolConfig> {
        match self {
            Preset::Cached => Ok(PoolConfig::cached()),
            Preset::Single => Ok(PoolConfig::single()),
            Preset::Fixed => size.map(PoolConfig::fixed).ok_or_else(|| {
                PoolError::InvalidConfig("the fixed preset requires a size".to_string())
            }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Preset::Cached => "cached",
            Preset::Fixed => "fixed",
            Preset::Single => "single",
        }
    }
}

impl FromStr for Preset {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cached" => Ok(Preset::Cached),
            "fixed" => Ok(Preset::Fixed),
            "single" => Ok(Preset::Single),
            other => Err(PoolError::InvalidConfig(format!("unknown preset: {other}"))),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    pool: PoolSection,
}

/// The `[pool]` table as written on disk.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PoolSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    preset: Option<Preset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    core_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    idle_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dispatch_timeout: Option<String>,
}

impl PoolSection {
    fn resolve(self) -> PoolResult<PoolConfig> {
        let mut config = match self.preset {
            Some(preset) => preset.config(self.size)?,
            None => {
                let max_size = self.max_size.ok_or_else(|| {
                    PoolError::InvalidConfig(
                        "max_size is required when no preset is given".to_string(),
                    )
                })?;
                PoolConfig::new(Duration::from_secs(60), Duration::ZERO, max_size, 0)
            }
        };

        if let Some(core_size) = self.core_size {
            config.core_size = core_size;
        }
        if let Some(max_size) = self.max_size {
            config.max_size = max_size;
        }
        if let Some(idle) = self.idle_timeout.as_deref() {
            config.idle_timeout = parse_duration(idle)?;
        }
        if let Some(dispatch) = self.dispatch_timeout.as_deref() {
            config.dispatch_timeout = parse_duration(dispatch)?;
        }
        Ok(config)
    }
}

/// Parse a duration string like "250ms", "30s", "5m", "1h".
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> PoolResult<Duration> {
    let s = s.trim();
    let invalid = || PoolError::InvalidConfig(format!("invalid duration: {s:?}"));

    let (digits, millis_per_unit) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, 1)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1_000)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60_000)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 3_600_000)
    } else {
        (s, 1_000)
    };

    let value = digits.trim().parse::<u64>().map_err(|_| invalid())?;
    let millis = value.checked_mul(millis_per_unit).ok_or_else(invalid)?;
    Ok(Duration::from_millis(millis))
}

/// Inverse of [`parse_duration`], choosing the largest exact unit.
pub fn format_duration(d: Duration) -> String {
    if d.subsec_nanos() != 0 {
        return format!("{}ms", d.as_millis());
    }
    let secs = d.as_secs();
    if secs == 0 {
        "0s".to_string()
    } else if secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}
