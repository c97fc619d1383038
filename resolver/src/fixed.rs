use crate::{BackendEndpoint, Resolve, ResolveError};
use async_trait::async_trait;
use indexmap::IndexMap;
use shared::correlation::RequestContext;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use url::Url;

struct Instance {
    url: Url,
    healthy: AtomicBool,
}

struct ServiceEntry {
    instances: Vec<Instance>,
    cursor: AtomicUsize,
}

/// Immutable mapping from logical service name to its instances, built once
/// from configuration. Selection is round-robin over instances currently
/// marked healthy; the health flags are the only mutable state and can flip
/// between calls.
pub struct FixedResolver {
    services: IndexMap<String, ServiceEntry>,
}

impl FixedResolver {
    pub fn new(services: IndexMap<String, Vec<Url>>) -> Self {
        let services = services
            .into_iter()
            .map(|(name, urls)| {
                let instances = urls
                    .into_iter()
                    .map(|url| Instance {
                        url,
                        healthy: AtomicBool::new(true),
                    })
                    .collect();
                (
                    name,
                    ServiceEntry {
                        instances,
                        cursor: AtomicUsize::new(0),
                    },
                )
            })
            .collect();

        Self { services }
    }

    /// Flips the health flag of one instance. Returns false when the
    /// service/instance pair is unknown.
    pub fn set_health(&self, service: &str, url: &Url, healthy: bool) -> bool {
        let Some(entry) = self.services.get(service) else {
            return false;
        };
        let Some(instance) = entry.instances.iter().find(|i| &i.url == url) else {
            return false;
        };
        instance.healthy.store(healthy, Ordering::Relaxed);
        true
    }
}

#[async_trait]
impl Resolve for FixedResolver {
    async fn resolve(
        &self,
        service: &str,
        ctx: &RequestContext,
    ) -> Result<BackendEndpoint, ResolveError> {
        let entry = self
            .services
            .get(service)
            .ok_or_else(|| ResolveError::UnknownService(service.to_owned()))?;

        let count = entry.instances.len();
        if count == 0 {
            return Err(ResolveError::NoHealthyInstance(service.to_owned()));
        }

        let start = entry.cursor.fetch_add(1, Ordering::Relaxed);
        for offset in 0..count {
            let instance = &entry.instances[(start + offset) % count];
            if instance.healthy.load(Ordering::Relaxed) {
                tracing::trace!(
                    correlation_id = %ctx.correlation_id(),
                    service,
                    url = %instance.url,
                    "resolved backend"
                );
                return Ok(BackendEndpoint {
                    service: service.to_owned(),
                    url: instance.url.clone(),
                });
            }
        }

        Err(ResolveError::NoHealthyInstance(service.to_owned()))
    }
}
