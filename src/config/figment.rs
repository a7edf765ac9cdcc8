use std::path::Path;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use crate::config::app_config::AppConfig;
use crate::config::app_config::data::AppConfigData;
use crate::lib_constants::APP_CONFIG_ENV_PREFIX;

pub trait FigmentExt {
    fn setup_app_config(
        self,
        config_file: impl AsRef<Path>,
    ) -> Figment;
}

impl FigmentExt for Figment {
    fn setup_app_config(self, config_file: impl AsRef<Path>) -> Figment {
        self.merge(Serialized::defaults(AppConfigData::default()))
            .merge(Toml::file_exact(config_file))
            .merge(Env::prefixed(APP_CONFIG_ENV_PREFIX).global())
    }
}

pub fn load_app_config(
    config_file: impl AsRef<Path>,
) -> Result<AppConfig, figment::Error> {
    Figment::new()
        .setup_app_config(config_file)
        .extract::<AppConfigData>()
        .map(AppConfig::from)
}
