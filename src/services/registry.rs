//! Service registry.
//!
//! Central registry for all service records, built once at startup and shared
//! by reference.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::config::ServiceOverride;
use crate::error::{DaemonError, ServiceErrorKind};

use super::profile::{ConfigCheck, ServiceProfile};
use super::{nfs, nginx, samba, vsftpd};

/// Registry of all managed service records.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    services: BTreeMap<&'static str, Arc<ServiceProfile>>,
}

impl ServiceRegistry {
    /// Create a registry with all built-in services.
    pub fn new() -> Self {
        Self::with_profiles(vec![
            samba::profile(),
            nfs::profile(),
            vsftpd::profile(),
            nginx::profile(),
        ])
    }

    /// Create a registry from explicit records.
    pub fn with_profiles(profiles: Vec<ServiceProfile>) -> Self {
        let mut registry = Self {
            services: BTreeMap::new(),
        };
        for profile in profiles {
            registry.register(profile);
        }
        registry
    }

    /// Create the built-in registry with configuration overrides applied.
    ///
    /// Overrides naming an unknown service are a configuration error.
    pub fn from_overrides(
        overrides: &BTreeMap<String, ServiceOverride>,
    ) -> Result<Self, DaemonError> {
        let mut registry = Self::new();

        for (id, service) in overrides {
            let current = registry.services.get(id.as_str()).ok_or_else(|| {
                DaemonError::Config {
                    message: format!("services.{}: unknown service", id),
                }
            })?;

            if service.enabled == Some(false) {
                registry.services.remove(id.as_str());
                continue;
            }

            let mut profile = ServiceProfile::clone(current);
            if let Some(live_path) = &service.live_path {
                profile.live_path = live_path.clone();
            }
            if let Some(unit) = &service.unit {
                profile.unit = unit.clone();
            }
            if let Some(check) = &service.check_command {
                profile.check = ConfigCheck::Command(check.clone());
            }
            if let Some(reload) = &service.reload_command {
                profile.reload_command = reload.clone();
            }
            if let Some(strategy) = service.reload_strategy {
                profile.reload_strategy = strategy;
            }
            registry.register(profile);
        }

        info!(
            count = registry.services.len(),
            services = ?registry.list(),
            "Service registry initialized"
        );

        Ok(registry)
    }

    /// Register (or replace) a service record.
    pub fn register(&mut self, profile: ServiceProfile) {
        self.services.insert(profile.id, Arc::new(profile));
    }

    /// Get a service record by id.
    pub fn get(&self, id: &str) -> Result<Arc<ServiceProfile>, DaemonError> {
        self.services
            .get(id)
            .cloned()
            .ok_or_else(|| {
                DaemonError::service(ServiceErrorKind::UnknownService {
                    service: id.to_string(),
                })
            })
    }

    /// List all registered service ids, sorted.
    pub fn list(&self) -> Vec<&'static str> {
        self.services.keys().copied().collect()
    }

    /// Get the count of registered services.
    pub fn count(&self) -> usize {
        self.services.len()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
