use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use log::info;
use thiserror::Error;

use crate::{
    fusion::JointLink,
    io::line_reader::DEFAULT_MAX_LINE_LEN,
    nav::TrackerConfig,
    parameters::{self, ParameterMap, ParameterTree, parse_string},
};

pub const DEFAULT_READ_TIMEOUT_MS: i64 = 100;
pub const DEFAULT_RETRY_INTERVAL_MS: i64 = 1000;
pub const DEFAULT_FPS: f64 = 60.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read configuration file '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Parameters(#[from] parameters::Error),

    #[error("Invalid value for '{path}': {reason}")]
    Invalid { path: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    Serial { port: String, baud_rate: u32 },
    Tcp { address: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    pub name: String,
    pub transport: TransportConfig,
    pub read_timeout: Duration,
    pub retry_interval: Duration,
    pub max_line_len: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RigConfig {
    pub fps: f64,
    pub joints: Vec<JointLink>,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            joints: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppConfig {
    pub links: Vec<LinkConfig>,
    pub rig: RigConfig,
    pub tracker: TrackerConfig,
}

/// Reads a parameter file without interpreting any section.
pub fn load_params(path: &Path) -> Result<ParameterMap, ConfigError> {
    info!("Reading parameters from '{}'", path.display());

    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(parse_string(&text)?)
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_params(&load_params(path)?)
    }

    pub fn from_params(params: &ParameterMap) -> Result<Self, ConfigError> {
        Ok(Self {
            links: links_from_params(params)?,
            rig: RigConfig::from_params(params)?,
            tracker: TrackerConfig::from_params(params)?,
        })
    }
}

fn links_from_params(params: &ParameterMap) -> Result<Vec<LinkConfig>, ConfigError> {
    if !params.contains_key("links") {
        return Ok(vec![]);
    }

    params
        .get_map("links")?
        .iter()
        .map(|(name, tree)| LinkConfig::from_params(name, tree.as_map()?))
        .collect()
}

impl LinkConfig {
    fn from_params(name: &str, link: &ParameterMap) -> Result<Self, ConfigError> {
        let kind: String = link.value("transport")?;

        let transport = match kind.as_str() {
            "serial" => {
                let baud_rate: i64 = link.value("baud_rate")?;

                TransportConfig::Serial {
                    port: link.value("port")?,
                    baud_rate: u32::try_from(baud_rate)
                        .ok()
                        .filter(|b| *b > 0)
                        .ok_or_else(|| {
                            ConfigError::invalid(
                                format!("{}.baud_rate", link.path()),
                                "must be a positive 32 bit integer",
                            )
                        })?,
                }
            }
            "tcp" => TransportConfig::Tcp {
                address: link.value("address")?,
            },
            other => {
                return Err(ConfigError::invalid(
                    format!("{}.transport", link.path()),
                    format!("unknown transport '{other}', expected \"serial\" or \"tcp\""),
                ));
            }
        };

        Ok(Self {
            name: name.to_string(),
            transport,
            read_timeout: millis(link, "read_timeout_ms", DEFAULT_READ_TIMEOUT_MS)?,
            retry_interval: millis(link, "retry_interval_ms", DEFAULT_RETRY_INTERVAL_MS)?,
            max_line_len: max_line_len(link)?,
        })
    }
}

fn millis(map: &ParameterMap, key: &str, default: i64) -> Result<Duration, ConfigError> {
    let ms: i64 = map.value_or(key, default)?;

    u64::try_from(ms)
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .ok_or_else(|| ConfigError::invalid(format!("{}.{key}", map.path()), "must be positive"))
}

fn max_line_len(link: &ParameterMap) -> Result<usize, ConfigError> {
    let len: i64 = link.value_or("max_line_len", DEFAULT_MAX_LINE_LEN as i64)?;

    usize::try_from(len)
        .ok()
        .filter(|len| *len > 0)
        .ok_or_else(|| {
            ConfigError::invalid(format!("{}.max_line_len", link.path()), "must be positive")
        })
}

impl RigConfig {
    pub fn from_params(params: &ParameterMap) -> Result<Self, ConfigError> {
        let fps = params.value_or("rig.fps", DEFAULT_FPS)?;
        if !(fps > 0.0 && fps.is_finite()) {
            return Err(ConfigError::invalid("rig.fps", "must be positive"));
        }

        let joints = match params.get("rig.joints") {
            Ok(ParameterTree::Node(joints)) => joints
                .iter()
                .map(|(bone, tree)| -> Result<JointLink, ConfigError> {
                    let joint = tree.as_map()?;

                    Ok(JointLink {
                        bone: bone.clone(),
                        key: joint.value("key")?,
                        parent: optional(joint, "parent")?,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Ok(ParameterTree::Leaf(p)) => {
                return Err(parameters::Error::NotAMap {
                    path: p.path().to_string(),
                }
                .into());
            }
            Err(parameters::Error::NotFound { .. }) => vec![],
            Err(e) => return Err(e.into()),
        };

        Ok(Self { fps, joints })
    }
}

fn optional(map: &ParameterMap, key: &str) -> Result<Option<String>, parameters::Error> {
    match map.value(key) {
        Ok(v) => Ok(Some(v)),
        Err(parameters::Error::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const FULL: &str = r#"
        [links.right_arm]
        transport = { val = "serial", type = "str" }
        port = { val = "/dev/ttyUSB0", type = "str" }
        baud_rate = { val = 115200, type = "int" }

        [links.left_arm]
        transport = { val = "tcp", type = "str" }
        address = { val = "192.168.4.1:3333", type = "str" }
        read_timeout_ms = { val = 250, type = "int" }
        retry_interval_ms = { val = 500, type = "int" }
        max_line_len = { val = 512, type = "int" }

        [rig]
        fps = { val = 30, type = "float" }

        [rig.joints.upper_arm_R]
        key = { val = "/joint/0", type = "str" }

        [rig.joints.lower_arm_R]
        key = { val = "/joint/1", type = "str" }
        parent = { val = "/joint/0", type = "str" }

        [tracker]
        still_threshold = { val = 0.1, type = "float" }
        dt = { val = 0.02, type = "float" }
    "#;

    fn config(text: &str) -> Result<AppConfig, ConfigError> {
        AppConfig::from_params(&parse_string(text)?)
    }

    #[test]
    fn test_full_config() {
        let config = config(FULL).unwrap();

        // Parameter maps iterate in key order
        assert_eq!(
            config.links,
            vec![
                LinkConfig {
                    name: "left_arm".to_string(),
                    transport: TransportConfig::Tcp {
                        address: "192.168.4.1:3333".to_string()
                    },
                    read_timeout: Duration::from_millis(250),
                    retry_interval: Duration::from_millis(500),
                    max_line_len: 512,
                },
                LinkConfig {
                    name: "right_arm".to_string(),
                    transport: TransportConfig::Serial {
                        port: "/dev/ttyUSB0".to_string(),
                        baud_rate: 115200
                    },
                    read_timeout: Duration::from_millis(100),
                    retry_interval: Duration::from_secs(1),
                    max_line_len: DEFAULT_MAX_LINE_LEN,
                },
            ]
        );

        assert_eq!(config.rig.fps, 30.0);
        assert_eq!(
            config.rig.joints,
            vec![
                JointLink::child("lower_arm_R", "/joint/1", "/joint/0"),
                JointLink::root("upper_arm_R", "/joint/0"),
            ]
        );

        assert_eq!(config.tracker.still_threshold, 0.1);
        assert_eq!(config.tracker.dt, 0.02);
        assert_eq!(config.tracker.decay_factor, 0.95);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        assert_eq!(config("").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_unknown_transport() {
        let err = config(
            r#"
            [links.usb]
            transport = { val = "bluetooth", type = "str" }
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { path, .. } if path == "links.usb.transport"));
    }

    #[test]
    fn test_missing_port() {
        let err = config(
            r#"
            [links.usb]
            transport = { val = "serial", type = "str" }
            baud_rate = { val = 115200, type = "int" }
            "#,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            ConfigError::Parameters(parameters::Error::NotFound { path }) if path == "links.usb.port"
        ));
    }

    #[test]
    fn test_out_of_range() {
        let err = config("rig.fps = { val = 0.0, type = \"float\" }").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { path, .. } if path == "rig.fps"));

        let err = config(
            r#"
            [links.net]
            transport = { val = "tcp", type = "str" }
            address = { val = "localhost:1", type = "str" }
            read_timeout_ms = { val = -5, type = "int" }
            "#,
        )
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::Invalid { path, .. } if path == "links.net.read_timeout_ms")
        );
    }

    #[test]
    fn test_wrong_type() {
        let err = config("rig.fps = { val = \"fast\", type = \"str\" }").unwrap_err();

        assert!(matches!(
            err,
            ConfigError::Parameters(parameters::Error::BadCast { .. })
        ));
    }

    #[test]
    fn test_shipped_config() {
        let config = AppConfig::load(Path::new("config/params.toml")).unwrap();

        assert_eq!(config.links.len(), 2);
        assert_eq!(config.rig.joints.len(), 4);
        assert_eq!(config.tracker, TrackerConfig::default());

        let roots = config.rig.joints.iter().filter(|j| j.parent.is_none()).count();
        assert_eq!(roots, 2);
    }

    #[test]
    fn test_tracker_section_alone() {
        let params = parse_string(
            r#"
            [links.usb]
            transport = { val = "bluetooth", type = "str" }

            [tracker]
            dt = { val = 0.01, type = "float" }
            "#,
        )
        .unwrap();

        assert!(AppConfig::from_params(&params).is_err());

        let tracker = TrackerConfig::from_params(&params).unwrap();
        assert_eq!(tracker.dt, 0.01);
    }

    #[test]
    fn test_load_params_only_parses() {
        let params = load_params(Path::new("config/params.toml")).unwrap();

        assert!(params.contains_key("links"));
        assert_eq!(
            TrackerConfig::from_params(&params).unwrap(),
            TrackerConfig::default()
        );
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::load(Path::new("does/not/exist.toml")).unwrap_err();

        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
