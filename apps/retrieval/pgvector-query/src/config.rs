//! Configuration for the pgvector query tool

use core_config::FromEnv;
use database::postgres::ConnectionConfig;
use domain_retrieval::SearchConfig;
use eyre::Result;

#[derive(Debug, Clone)]
pub struct Config {
    pub database: ConnectionConfig,
    pub search: SearchConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database: ConnectionConfig::from_env()?,
            search: SearchConfig::from_env()?,
        })
    }
}
