pub const DEFAULT_DATA_DIR: &str = "drivenotes-data";
pub const DEFAULT_APP_FOLDER_NAME: &str = "drivenotes";
pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_API_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

// a restored token must outlive the safety margin, so a sync pass
// started right after restoration cannot see it expire mid-operation
pub const DEFAULT_SESSION_SAFETY_MARGIN_SECS: i64 = 60;

// the defaults are taken from the argon2 crate itself
pub const DEFAULT_ARGON2_M_COST: u32 = 19 * 1024;
pub const DEFAULT_ARGON2_T_COST: u32 = 2;
pub const DEFAULT_ARGON2_P_COST: u32 = 1;
pub const DEFAULT_ARGON2_OUTPUT_LEN: Option<usize> = Some(32);

pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 600_000;

pub const DEFAULT_CONFIG_FILE: &str = "drivenotes.toml";
pub const APP_CONFIG_ENV_PREFIX: &str = "DRIVENOTES_";
