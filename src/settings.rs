use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct BackendSettings {
    /// Base URL of the proxy in front of the vendor cloud, e.g.
    /// `http://localhost:3000`
    pub base_url: String,
    pub space_id: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// PEM encoded CA certificate to trust instead of the system roots
    pub ca_cert: Option<String>,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_page_size() -> u32 {
    18
}

fn default_request_timeout_seconds() -> u64 {
    10
}

#[derive(Clone, Deserialize, Debug)]
pub struct PollingSettings {
    #[serde(default = "default_poll_interval_seconds")]
    pub interval_seconds: u64,
}

fn default_poll_interval_seconds() -> u64 {
    5
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_seconds: default_poll_interval_seconds(),
        }
    }
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct GradientSettings {
    /// Number of hue stops across the surface
    pub stops: usize,
    /// Phase advance per frame, as a fraction of the surface width
    pub speed: f32,
    /// 0.0 disables blurring, 1.0 blurs across a whole stop
    pub smoothness: f32,
    pub fps: u32,
}

impl Default for GradientSettings {
    fn default() -> Self {
        Self {
            stops: 6,
            speed: 0.002,
            smoothness: 0.5,
            fps: 30,
        }
    }
}

#[derive(Clone, Deserialize, Debug)]
#[serde(default)]
pub struct SamplerSettings {
    pub width: usize,
    pub height: usize,
    /// Groups that should follow the colour under their sample target
    pub listen_groups: Vec<String>,
    /// Where sample target positions are persisted between sessions
    pub target_store: Option<String>,
    pub debounce_ms: u64,
    pub sample_interval_ms: u64,
    pub tolerance: f32,
    /// Solid RGB fill used when no gradient is configured
    pub fill: [u8; 3],
    pub gradient: Option<GradientSettings>,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            width: 600,
            height: 400,
            listen_groups: vec![],
            target_store: None,
            debounce_ms: 100,
            sample_interval_ms: 1000,
            tolerance: 1.0,
            fill: [255, 0, 0],
            gradient: None,
        }
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct Settings {
    pub backend: BackendSettings,
    #[serde(default)]
    pub polling: PollingSettings,
    #[serde(default)]
    pub sampler: SamplerSettings,
}

pub fn read_settings() -> Result<Settings, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::with_name("Settings"))
        .add_source(config::Environment::with_prefix("TUYA_LIGHTS").separator("__"))
        .build()?
        .try_deserialize::<Settings>()
}

#[cfg(test)]
pub(crate) fn test_settings(base_url: &str) -> Settings {
    Settings {
        backend: BackendSettings {
            base_url: base_url.to_string(),
            space_id: "227120177".to_string(),
            page_size: default_page_size(),
            ca_cert: None,
            request_timeout_seconds: 2,
        },
        polling: PollingSettings::default(),
        sampler: SamplerSettings::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_fills_defaults() {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [backend]
                base_url = "http://localhost:3000"
                space_id = "42"

                [sampler]
                listen_groups = ["g1"]

                [sampler.gradient]
                stops = 8
                speed = 0.01
                smoothness = 0.0
                fps = 60
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize::<Settings>()
            .unwrap();

        assert_eq!(settings.backend.page_size, 18);
        assert_eq!(settings.backend.request_timeout_seconds, 10);
        assert_eq!(settings.polling.interval_seconds, 5);
        assert_eq!(settings.sampler.debounce_ms, 100);
        assert_eq!(settings.sampler.width, 600);
        assert_eq!(settings.sampler.listen_groups, vec!["g1".to_string()]);
        assert_eq!(settings.sampler.gradient.unwrap().stops, 8);
    }
}
