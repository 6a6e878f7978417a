//! Swap reporting options
//!
//! Options arrive as key/string-value pairs, either from a config file or
//! from `SWAP_*` environment variables. Recognized keys:
//!
//! | Key                | Default | Notes                                   |
//! |--------------------|---------|-----------------------------------------|
//! | `ReportBytes`      | false   | only where I/O counters are byte-scalable |
//! | `ReportByDevice`   | false   | only where the backend enumerates areas |
//! | `ValuesAbsolute`   | true    |                                         |
//! | `ValuesPercentage` | false   |                                         |
//! | `ReportIO`         | true    |                                         |
//!
//! Keys match case-insensitively and ignore `_`/`-`, so `REPORT_BY_DEVICE`
//! and `ReportByDevice` are the same option.

use config::Source;
use std::path::Path;
use tracing::warn;

/// What the compiled-in backend can report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Enumerates individual swap areas
    pub by_device: bool,
    /// Supplies paging in/out counters
    pub io_counters: bool,
    /// Paging counters can be scaled to bytes by the page size
    pub report_bytes: bool,
}

impl Capabilities {
    pub const ALL: Capabilities = Capabilities {
        by_device: true,
        io_counters: true,
        report_bytes: true,
    };
}

/// Immutable reporting policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapConfig {
    pub report_bytes: bool,
    pub report_by_device: bool,
    pub values_absolute: bool,
    pub values_percentage: bool,
    pub report_io: bool,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            report_bytes: false,
            report_by_device: false,
            values_absolute: true,
            values_percentage: false,
            report_io: true,
        }
    }
}

/// Option keys, normalized
const REPORT_BYTES: &str = "reportbytes";
const REPORT_BY_DEVICE: &str = "reportbydevice";
const VALUES_ABSOLUTE: &str = "valuesabsolute";
const VALUES_PERCENTAGE: &str = "valuespercentage";
const REPORT_IO: &str = "reportio";

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Parse a boolean option value
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => Some(true),
        "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl SwapConfig {
    /// Build the policy from key/value pairs.
    ///
    /// Unknown keys, invalid values and options the backend cannot honor are
    /// logged and ignored; the default stays in place.
    pub fn from_pairs<I, K, V>(pairs: I, caps: Capabilities) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = SwapConfig::default();

        for (key, value) in pairs {
            let key = key.as_ref();
            let value = value.as_ref();

            let slot = match normalize_key(key).as_str() {
                REPORT_BYTES if caps.report_bytes => &mut config.report_bytes,
                REPORT_BYTES => {
                    warn!(
                        event = "config_option_ignored",
                        option = key,
                        "The ReportBytes option is not supported on this platform, ignoring it"
                    );
                    continue;
                }
                REPORT_BY_DEVICE if caps.by_device => &mut config.report_by_device,
                REPORT_BY_DEVICE => {
                    warn!(
                        event = "config_option_ignored",
                        option = key,
                        "The ReportByDevice option is not supported on this platform, ignoring it"
                    );
                    continue;
                }
                VALUES_ABSOLUTE => &mut config.values_absolute,
                VALUES_PERCENTAGE => &mut config.values_percentage,
                REPORT_IO => &mut config.report_io,
                _ => {
                    warn!(
                        event = "config_option_ignored",
                        option = key,
                        "Unknown swap config option, ignoring it"
                    );
                    continue;
                }
            };

            match parse_bool(value) {
                Some(flag) => *slot = flag,
                None => warn!(
                    event = "config_option_ignored",
                    option = key,
                    value = value,
                    "Option requires a boolean argument, keeping the default"
                ),
            }
        }

        config
    }

    /// Load options from an optional file plus `SWAP_*` environment variables
    pub fn load(path: Option<&Path>, caps: Capabilities) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("SWAP"))
            .build()?;

        let mut pairs = Vec::new();
        for (key, value) in settings.collect()? {
            match value.into_string() {
                Ok(value) => pairs.push((key, value)),
                Err(e) => warn!(
                    event = "config_option_ignored",
                    option = %key,
                    error = %e,
                    "Ignoring non-scalar swap option"
                ),
            }
        }

        Ok(Self::from_pairs(pairs, caps))
    }
}
