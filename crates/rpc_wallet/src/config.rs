use std::{collections::HashMap, fs};

use shared::domain::{Address, MintPolicy, U256};

/// Runtime configuration: where the node is, which contract to mint
/// against, and the mint terms. File values come from `mint.toml`, env
/// values override the file.
#[derive(Debug, Clone)]
pub struct Settings {
    pub rpc_url: String,
    pub contract_address: Option<Address>,
    pub from_address: Option<Address>,
    pub policy: MintPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".into(),
            contract_address: None,
            from_address: None,
            policy: MintPolicy::default(),
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("mint.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            apply_file_values(&mut settings, &file_cfg);
        }
    }

    apply_env_values(&mut settings);
    settings
}

fn apply_file_values(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("rpc_url") {
        settings.rpc_url = v.clone();
    }
    if let Some(v) = file_cfg.get("contract_address") {
        if let Ok(parsed) = v.parse::<Address>() {
            settings.contract_address = Some(parsed);
        }
    }
    if let Some(v) = file_cfg.get("from_address") {
        if let Ok(parsed) = v.parse::<Address>() {
            settings.from_address = Some(parsed);
        }
    }
    if let Some(v) = file_cfg.get("unit_price_wei") {
        if let Ok(parsed) = v.parse::<U256>() {
            settings.policy.unit_price = parsed;
        }
    }
    if let Some(v) = file_cfg.get("min_quantity") {
        if let Ok(parsed) = v.parse::<u8>() {
            settings.policy.min_quantity = parsed;
        }
    }
    if let Some(v) = file_cfg.get("max_quantity") {
        if let Ok(parsed) = v.parse::<u8>() {
            settings.policy.max_quantity = parsed;
        }
    }
}

fn apply_env_values(settings: &mut Settings) {
    if let Ok(v) = std::env::var("MINT_RPC_URL") {
        settings.rpc_url = v;
    }
    if let Ok(v) = std::env::var("MINT_CONTRACT_ADDRESS") {
        if let Ok(parsed) = v.parse::<Address>() {
            settings.contract_address = Some(parsed);
        }
    }
    if let Ok(v) = std::env::var("MINT_FROM_ADDRESS") {
        if let Ok(parsed) = v.parse::<Address>() {
            settings.from_address = Some(parsed);
        }
    }
    if let Ok(v) = std::env::var("MINT_UNIT_PRICE_WEI") {
        if let Ok(parsed) = v.parse::<U256>() {
            settings.policy.unit_price = parsed;
        }
    }
}
