use serde::{Deserialize, Serialize};
use crate::lib_constants::{
    DEFAULT_ARGON2_M_COST,
    DEFAULT_ARGON2_OUTPUT_LEN,
    DEFAULT_ARGON2_P_COST,
    DEFAULT_ARGON2_T_COST,
};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct HasherConfigData {
    #[serde(default = "hasher_config_default_argon2_m_cost")]
    pub argon2_m_cost: u32,

    #[serde(default = "hasher_config_default_argon2_t_cost")]
    pub argon2_t_cost: u32,

    #[serde(default = "hasher_config_default_argon2_p_cost")]
    pub argon2_p_cost: u32,

    #[serde(default = "hasher_config_default_argon2_output_len")]
    pub argon2_output_len: Option<usize>,
}

pub fn hasher_config_default_argon2_m_cost() -> u32 {
    DEFAULT_ARGON2_M_COST
}

pub fn hasher_config_default_argon2_t_cost() -> u32 {
    DEFAULT_ARGON2_T_COST
}

pub fn hasher_config_default_argon2_p_cost() -> u32 {
    DEFAULT_ARGON2_P_COST
}

pub fn hasher_config_default_argon2_output_len() -> Option<usize> {
    DEFAULT_ARGON2_OUTPUT_LEN
}

impl TryFrom<HasherConfigData> for argon2::Params {
    type Error = argon2::Error;
    fn try_from(value: HasherConfigData) -> Result<Self, Self::Error> {
        argon2::Params::new(
            value.argon2_m_cost,
            value.argon2_t_cost,
            value.argon2_p_cost,
            value.argon2_output_len,
        )
    }
}

impl Default for HasherConfigData {
    fn default() -> Self {
        HasherConfigData {
            argon2_m_cost: hasher_config_default_argon2_m_cost(),
            argon2_t_cost: hasher_config_default_argon2_t_cost(),
            argon2_p_cost: hasher_config_default_argon2_p_cost(),
            argon2_output_len: hasher_config_default_argon2_output_len(),
        }
    }
}
