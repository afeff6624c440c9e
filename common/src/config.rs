use config::{Config, ConfigError};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub paths: PathsConfig,
    pub s3: Option<S3Config>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// Root of the raw corpora. Either a filesystem path or an s3:// URL.
    pub source: String,
    /// Root under which the five output tables are written. Prior contents
    /// of `<destination>/<table>` are replaced on every run.
    pub destination: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct S3Config {
    pub access_key: String,
    pub secret_key: String,
    #[serde(default = "default_s3_region")]
    pub region: String,
    pub endpoint: Option<String>,
    #[serde(default)]
    pub allow_http: bool,
}

fn default_s3_region() -> String {
    "us-east-1".to_string()
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let config = builder.build()?;
        let settings: Settings = config.try_deserialize()?;

        debug!(
            source = %settings.paths.source,
            destination = %settings.paths.destination,
            "Loaded pipeline configuration"
        );

        settings.validate()?;
        Ok(settings)
    }

    /// Credentials are required as soon as either root lives on object
    /// storage. Checked before any work starts so a bad config never
    /// produces a partial run.
    fn validate(&self) -> Result<(), ConfigError> {
        let needs_s3 = self.uses_object_storage();
        if needs_s3 && self.s3.is_none() {
            return Err(ConfigError::Message(
                "an s3:// path is configured but the [s3] section with \
                 access_key and secret_key is missing"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn uses_object_storage(&self) -> bool {
        self.paths.source.starts_with("s3://") || self.paths.destination.starts_with("s3://")
    }
}
