use serde::Deserialize;

use crate::infrastructure::security::{DEFAULT_COST, HashingConfig};

const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
        let database_max_connections = match std::env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid DATABASE_MAX_CONNECTIONS: {}", e))?,
            Err(_) => default_max_connections(),
        };
        let bcrypt_cost = match std::env::var("BCRYPT_COST") {
            Ok(raw) => parse_cost(&raw)?,
            Err(_) => default_bcrypt_cost(),
        };

        Ok(Self {
            database_url,
            database_max_connections,
            bcrypt_cost,
        })
    }

    pub fn hashing(&self) -> HashingConfig {
        HashingConfig::new(self.bcrypt_cost)
    }
}

fn parse_cost(raw: &str) -> anyhow::Result<u32> {
    let cost: u32 = raw
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid BCRYPT_COST: {}", e))?;
    if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
        anyhow::bail!(
            "BCRYPT_COST must be between {} and {}, got {}",
            MIN_BCRYPT_COST,
            MAX_BCRYPT_COST,
            cost
        );
    }
    Ok(cost)
}

fn default_max_connections() -> u32 {
    20
}

fn default_bcrypt_cost() -> u32 {
    DEFAULT_COST
}
