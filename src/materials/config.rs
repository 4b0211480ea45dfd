//! Engine configuration.
//!
//! `EngineConfig::default()` is what most callers want. `from_env()` lets a
//! run toggle verification and the incremental path without recompiling:
//!
//! | variable                     | field           | values                         |
//! |------------------------------|-----------------|--------------------------------|
//! | `MESH_MATERIALS_CHECK`       | `check_mode`    | `1/0/true/false/yes/no/on/off` |
//! | `MESH_MATERIALS_INCREMENTAL` | `incremental`   | same                           |
//! | `MESH_MATERIALS_DEBUG_LEVEL` | `verbose_level` | integer                        |

/// Environment variable enabling check mode.
pub const ENV_CHECK: &str = "MESH_MATERIALS_CHECK";
/// Environment variable selecting the incremental update path.
pub const ENV_INCREMENTAL: &str = "MESH_MATERIALS_INCREMENTAL";
/// Environment variable setting the verbosity.
pub const ENV_DEBUG_LEVEL: &str = "MESH_MATERIALS_DEBUG_LEVEL";

/// Tunables of the composition engine.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EngineConfig {
    /// Verify preconditions of modification operations and run the coherency
    /// checker after every recompute and update.
    pub check_mode: bool,
    /// Apply batched modifications incrementally instead of editing groups
    /// and running a full recompute.
    pub incremental: bool,
    /// `>= 1` dumps every cell's composition tree at `debug!` after a full
    /// recompute.
    pub verbose_level: u32,
    /// Maximum number of coherency violations kept in an error report.
    pub max_reported_errors: usize,
    /// Extra partial slots reserved per indexer, relative to its partial count.
    pub partial_headroom_ratio: f64,
    /// Lower bound on the extra partial slots reserved per indexer.
    pub min_partial_headroom: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_mode: cfg!(any(debug_assertions, feature = "check-invariants")),
            incremental: true,
            verbose_level: 0,
            max_reported_errors: 10,
            partial_headroom_ratio: 0.25,
            min_partial_headroom: 16,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with the `MESH_MATERIALS_*` environment variables.
    ///
    /// Malformed values are reported with `log::warn!` and ignored.
    pub fn from_env() -> Self {
        Self::default().overlay_env()
    }

    /// Overlay the `MESH_MATERIALS_*` environment variables on `self`.
    pub fn overlay_env(mut self) -> Self {
        if let Some(v) = read_var(ENV_CHECK, parse_bool) {
            self.check_mode = v;
        }
        if let Some(v) = read_var(ENV_INCREMENTAL, parse_bool) {
            self.incremental = v;
        }
        if let Some(v) = read_var(ENV_DEBUG_LEVEL, |s| s.parse::<u32>().ok()) {
            self.verbose_level = v;
        }
        self
    }

    pub fn with_check_mode(mut self, on: bool) -> Self {
        self.check_mode = on;
        self
    }

    pub fn with_incremental(mut self, on: bool) -> Self {
        self.incremental = on;
        self
    }

    pub fn with_verbose_level(mut self, level: u32) -> Self {
        self.verbose_level = level;
        self
    }

    pub fn with_max_reported_errors(mut self, n: usize) -> Self {
        self.max_reported_errors = n;
        self
    }

    /// Headroom reserved on top of the exact partial count.
    pub fn with_partial_headroom(mut self, ratio: f64, minimum: u32) -> Self {
        self.partial_headroom_ratio = ratio;
        self.min_partial_headroom = minimum;
        self
    }

    /// Partial capacity reserved for an indexer holding `nb_partial` partial
    /// cells: `nb_partial + max(min, ceil(nb_partial * ratio))`.
    pub fn partial_capacity_for(&self, nb_partial: usize) -> u32 {
        let ratio = self.partial_headroom_ratio.max(0.0);
        let proportional = (nb_partial as f64 * ratio).ceil() as u64;
        let headroom = proportional.max(u64::from(self.min_partial_headroom));
        (nb_partial as u64)
            .saturating_add(headroom)
            .min(u64::from(u32::MAX)) as u32
    }
}

fn read_var<T>(name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        log::warn!("ignoring malformed value `{raw}` for {name}");
    }
    parsed
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_includes_headroom() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.partial_capacity_for(0), 16);
        assert_eq!(cfg.partial_capacity_for(10), 26);
        assert_eq!(cfg.partial_capacity_for(1000), 1250);
        let tight = cfg.with_partial_headroom(0.0, 0);
        assert_eq!(tight.partial_capacity_for(7), 7);
    }

    #[test]
    fn bool_parsing() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
