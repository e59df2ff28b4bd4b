//! All of the user config for driftfield.

use color_eyre::eyre::{Result, WrapErr as _};

/// A copy of the default config file, mostly useful as living documentation of the defaults.
static DEFAULT_CONFIG: &str = include_str!("../default_config.toml");

/// The valid log levels. Based on our `tracing` crate.
#[derive(serde::Serialize, serde::Deserialize, clap::ValueEnum, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Error
    Error,
    /// Warnings
    Warn,
    /// Info
    Info,
    /// Debug
    Debug,
    /// Trace
    Trace,
    /// No logging
    Off,
}

/// Managing user config.
#[derive(serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// The maximum log level
    pub log_level: LogLevel,
    /// The location of the log file.
    pub log_path: std::path::PathBuf,
    /// Whether the user prefers animations to be suppressed. The same preference can also be set
    /// with the `DRIFTFIELD_REDUCED_MOTION` environment variable.
    pub reduced_motion: bool,
    /// A hint about how much memory the device has, in gigabytes. Low-memory devices get a less
    /// dense particle field. When absent a middle-of-the-road default is assumed.
    pub device_memory: Option<f32>,
    /// All the knobs of the particle field itself.
    pub field: FieldConfig,
}

impl Default for Config {
    fn default() -> Self {
        let log_directory = match dirs::state_dir() {
            Some(directory) => directory,
            None => std::path::PathBuf::new().join("./"),
        };
        let log_path = log_directory.join("driftfield").join("driftfield.log");

        Self {
            log_level: LogLevel::Off,
            log_path,
            reduced_motion: false,
            device_memory: None,
            field: FieldConfig::default(),
        }
    }
}

impl Config {
    /// Load config from the given TOML file. No file just means the defaults.
    pub fn load(maybe_path: Option<&std::path::Path>) -> Result<Self> {
        let Some(path) = maybe_path else {
            return Ok(Self::default());
        };

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Couldn't read config file: {}", path.display()))?;
        let config = toml::from_str(&contents)
            .with_context(|| format!("Bad config file: {}", path.display()))?;

        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// CLI arguments always win over the config file.
    pub fn apply_cli_overrides(&mut self, cli_args: &crate::cli_args::CliArgs) {
        if let Some(log_level) = cli_args.log_level.clone() {
            self.log_level = log_level;
        }
        if let Some(log_path) = cli_args.log_path.clone() {
            self.log_path = log_path;
        }
        if let Some(frame_rate) = cli_args.frame_rate {
            self.field.frame_rate = frame_rate;
        }
        if cli_args.reduced_motion {
            self.reduced_motion = true;
        }
    }
}

/// All the tunables of the particle field. Fixed once the field is constructed.
#[derive(serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FieldConfig {
    /// The colour of the particles and their connecting lines.
    pub base_colour: (f32, f32, f32),
    /// The translucent full-surface wash painted at the start of every frame.
    pub wash_colour: crate::surface::Colour,
    /// The fewest particles the field will ever hold.
    pub min_particles: usize,
    /// The most particles the field will ever hold, however big the surface gets.
    pub max_particles: usize,
    /// Particles per square pixel of surface area.
    pub density: f32,
    /// Particles closer than this get a connecting line.
    pub max_connection_distance: f32,
    /// Scales the opacity of all connecting lines.
    pub connection_dimming: f32,
    /// The smallest particle radius.
    pub min_size: f32,
    /// The largest particle radius.
    pub max_size: f32,
    /// The lowest particle opacity.
    pub min_alpha: f32,
    /// The highest particle opacity.
    pub max_alpha: f32,
    /// Scales the random velocity particles are born with.
    pub speed_factor: f32,
    /// Pointer proximity within this distance pushes particles away.
    pub repel_radius: f32,
    /// Scales how hard the pointer pushes.
    pub repel_strength: f32,
    /// Velocity decay applied every tick.
    pub damping: f32,
    /// Target frame rate.
    pub frame_rate: u32,
    /// How long a resize sequence has to be quiet before the field reinitialises.
    pub resize_debounce_ms: u64,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            // rgb(59, 130, 246)
            base_colour: (0.231, 0.51, 0.965),
            wash_colour: (0.04, 0.06, 0.11, 0.25),
            min_particles: 60,
            max_particles: 220,
            density: 0.000_12,
            max_connection_distance: 120.0,
            connection_dimming: 0.14,
            min_size: 0.9,
            max_size: 3.2,
            min_alpha: 0.35,
            max_alpha: 0.9,
            speed_factor: 0.35,
            repel_radius: 80.0,
            repel_strength: 0.6,
            damping: 0.995,
            frame_rate: 60,
            resize_debounce_ms: 120,
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests aren't so strict")]
mod test {
    use super::*;

    #[test]
    fn bundled_default_config_parses_to_defaults() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_config_file_keeps_defaults_for_the_rest() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            "
            log_level = \"debug\"

            [field]
            frame_rate = 30
            ",
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.field.frame_rate, 30);
        assert_eq!(config.field.max_particles, 220);
        assert!((config.field.density - 0.000_12).abs() < f32::EPSILON);
    }

    #[test]
    fn bad_config_file_is_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "field = \"not a table\"").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }
}
