use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use crate::config::hasher_config::HasherConfigData;
use crate::lib_constants::{
    DEFAULT_API_BASE_URL,
    DEFAULT_API_UPLOAD_URL,
    DEFAULT_APP_FOLDER_NAME,
    DEFAULT_DATA_DIR,
    DEFAULT_PBKDF2_ITERATIONS,
    DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_RETRY_ATTEMPTS,
    DEFAULT_RETRY_BASE_DELAY_MS,
    DEFAULT_SESSION_SAFETY_MARGIN_SECS,
};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct AppConfigData {
    #[serde(default = "app_config_default_data_directory")]
    pub data_directory: PathBuf,

    #[serde(default = "app_config_default_app_folder_name")]
    pub app_folder_name: String,

    #[serde(default = "app_config_default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "app_config_default_api_upload_url")]
    pub api_upload_url: String,

    #[serde(default = "app_config_default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "app_config_default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "app_config_default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "app_config_default_session_safety_margin_secs")]
    pub session_safety_margin_secs: i64,

    #[serde(default = "app_config_default_pbkdf2_iterations")]
    pub pbkdf2_iterations: u32,

    #[serde(default)]
    pub hasher_config: HasherConfigData,
}

pub fn app_config_default_data_directory() -> PathBuf {
    DEFAULT_DATA_DIR.into()
}

pub fn app_config_default_app_folder_name() -> String {
    DEFAULT_APP_FOLDER_NAME.into()
}

pub fn app_config_default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.into()
}

pub fn app_config_default_api_upload_url() -> String {
    DEFAULT_API_UPLOAD_URL.into()
}

pub fn app_config_default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

pub fn app_config_default_retry_attempts() -> u32 {
    DEFAULT_RETRY_ATTEMPTS
}

pub fn app_config_default_retry_base_delay_ms() -> u64 {
    DEFAULT_RETRY_BASE_DELAY_MS
}

pub fn app_config_default_session_safety_margin_secs() -> i64 {
    DEFAULT_SESSION_SAFETY_MARGIN_SECS
}

pub fn app_config_default_pbkdf2_iterations() -> u32 {
    DEFAULT_PBKDF2_ITERATIONS
}

impl Default for AppConfigData {
    fn default() -> Self {
        AppConfigData {
            data_directory: app_config_default_data_directory(),
            app_folder_name: app_config_default_app_folder_name(),
            api_base_url: app_config_default_api_base_url(),
            api_upload_url: app_config_default_api_upload_url(),
            request_timeout_secs: app_config_default_request_timeout_secs(),
            retry_attempts: app_config_default_retry_attempts(),
            retry_base_delay_ms: app_config_default_retry_base_delay_ms(),
            session_safety_margin_secs:
                app_config_default_session_safety_margin_secs(),
            pbkdf2_iterations: app_config_default_pbkdf2_iterations(),
            hasher_config: HasherConfigData::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_config_defaults_match() {
        assert_eq!(
            AppConfigData::default(),
            serde_json::de::from_str("{}").unwrap(),
        )
    }
}
