use std::path::PathBuf;
use std::time::Duration;
use crate::config::app_config::data::AppConfigData;
use crate::config::hasher_config::HasherConfigData;

pub mod data;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub data_directory: PathBuf,
    pub app_folder_name: String,
    pub api_base_url: String,
    pub api_upload_url: String,
    pub request_timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub session_safety_margin_secs: i64,
    pub pbkdf2_iterations: u32,
    pub hasher_config: HasherConfigData,
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn session_safety_margin(&self) -> time::Duration {
        time::Duration::seconds(self.session_safety_margin_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfigData::default().into()
    }
}

impl From<AppConfigData> for AppConfig {
    fn from(value: AppConfigData) -> Self {
        AppConfig {
            data_directory: value.data_directory,
            app_folder_name: value.app_folder_name,
            api_base_url: value.api_base_url,
            api_upload_url: value.api_upload_url,
            request_timeout_secs: value.request_timeout_secs,
            retry_attempts: value.retry_attempts,
            retry_base_delay_ms: value.retry_base_delay_ms,
            session_safety_margin_secs: value.session_safety_margin_secs,
            pbkdf2_iterations: value.pbkdf2_iterations,
            hasher_config: value.hasher_config,
        }
    }
}
