use std::sync::Arc;

use crate::config::CloudJobConfig;
use crate::error::Result;
use crate::registry::RegistryCenter;

const CONFIG_ROOT: &str = "/config";

fn config_path(job_name: &str) -> String {
    format!("{CONFIG_ROOT}/{job_name}")
}

/// Load/store of job definitions, keyed by job name.
pub struct ConfigService {
    registry: Arc<dyn RegistryCenter>,
}

impl ConfigService {
    pub fn new(registry: Arc<dyn RegistryCenter>) -> Self {
        Self { registry }
    }

    pub async fn add(&self, config: &CloudJobConfig) -> Result<()> {
        let value = serde_json::to_string(config)?;
        self.registry
            .persist(&config_path(&config.job_name), &value)
            .await?;
        Ok(())
    }

    pub async fn update(&self, config: &CloudJobConfig) -> Result<()> {
        self.add(config).await
    }

    pub async fn load(&self, job_name: &str) -> Result<Option<CloudJobConfig>> {
        match self.registry.get(&config_path(job_name)).await? {
            Some(value) => match serde_json::from_str(&value) {
                Ok(config) => Ok(Some(config)),
                Err(e) => {
                    tracing::warn!(job_name, error = %e, "Dropping unreadable job config");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub async fn load_all(&self) -> Result<Vec<CloudJobConfig>> {
        let mut configs = Vec::new();
        for job_name in self.registry.get_children(CONFIG_ROOT).await? {
            if let Some(config) = self.load(&job_name).await? {
                configs.push(config);
            }
        }
        Ok(configs)
    }

    pub async fn remove(&self, job_name: &str) -> Result<()> {
        self.registry.remove(&config_path(job_name)).await?;
        Ok(())
    }
}
