use crate::models::{Insight, SiteTwinIds, TwinSummary};
use crate::store::TwinApi;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Read cache for twin lookups, keyed by `(twin_id, site_id)`. Injected so
/// the resolver stays testable without a real cache backend.
pub trait TwinCache: Send + Sync {
    fn get(&self, twin_id: &str, site_id: Uuid) -> Option<TwinSummary>;
    fn put(&self, twin: TwinSummary);
}

/// TTL-bounded in-memory cache. Entries expire lazily on read.
pub struct InMemoryTwinCache {
    ttl: Duration,
    entries: Mutex<HashMap<(String, Uuid), (TwinSummary, Instant)>>,
}

impl InMemoryTwinCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl TwinCache for InMemoryTwinCache {
    fn get(&self, twin_id: &str, site_id: Uuid) -> Option<TwinSummary> {
        let mut entries = self.entries.lock().expect("twin cache poisoned");
        let key = (twin_id.to_string(), site_id);
        match entries.get(&key) {
            Some((twin, inserted_at)) if inserted_at.elapsed() < self.ttl => Some(twin.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    fn put(&self, twin: TwinSummary) {
        let mut entries = self.entries.lock().expect("twin cache poisoned");
        entries.insert((twin.id.clone(), twin.site_id), (twin, Instant::now()));
    }
}

/// Batched twin-name resolution in front of the `TwinApi` collaborator.
/// Lookups are best-effort: failures are logged and resolution degrades to
/// whatever the cache already holds.
pub struct TwinNameResolver<T: TwinApi, C: TwinCache> {
    api: T,
    cache: C,
}

impl<T: TwinApi, C: TwinCache> TwinNameResolver<T, C> {
    pub fn new(api: T, cache: C) -> Self {
        Self { api, cache }
    }

    /// Resolve the distinct twins referenced by `insights`. Never fails;
    /// twins that cannot be resolved are simply absent from the result.
    pub async fn resolve(&self, insights: &[Insight]) -> Vec<TwinSummary> {
        let mut keys: Vec<(String, Uuid)> = insights
            .iter()
            .filter_map(|insight| {
                insight
                    .twin_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|twin_id| !twin_id.is_empty())
                    .map(|twin_id| (twin_id.to_string(), insight.site_id))
            })
            .collect();
        keys.sort();
        keys.dedup();
        if keys.is_empty() {
            return Vec::new();
        }

        let mut resolved: Vec<TwinSummary> = Vec::new();
        let mut misses: Vec<(String, Uuid)> = Vec::new();
        for (twin_id, site_id) in keys {
            match self.cache.get(&twin_id, site_id) {
                Some(twin) => resolved.push(twin),
                None => misses.push((twin_id, site_id)),
            }
        }
        if misses.is_empty() {
            return resolved;
        }

        let mut by_site: HashMap<Uuid, Vec<String>> = HashMap::new();
        for (twin_id, site_id) in misses {
            by_site.entry(site_id).or_default().push(twin_id);
        }
        let requests: Vec<SiteTwinIds> = by_site
            .into_iter()
            .map(|(site_id, twin_ids)| SiteTwinIds { site_id, twin_ids })
            .collect();

        match self.api.twins_by_ids(requests).await {
            Ok(fetched) => {
                for twin in fetched {
                    self.cache.put(twin.clone());
                    resolved.push(twin);
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "twin lookup failed; continuing without twin names");
            }
        }

        resolved
    }

    /// Enrich a single insight with its twin's name, floor, and model id.
    /// Missing twins leave the fields untouched.
    pub async fn enrich(&self, insight: &mut Insight) {
        let Some(twin_id) = insight.twin_id.clone() else {
            return;
        };

        let twins = self.resolve(std::slice::from_ref(insight)).await;
        let Some(twin) = twins
            .into_iter()
            .find(|twin| twin.id == twin_id && twin.site_id == insight.site_id)
        else {
            return;
        };

        insight.twin_name = twin.name;
        insight.floor_id = twin.floor_id;
        if insight
            .primary_model_id
            .as_deref()
            .map_or(true, |model_id| model_id.trim().is_empty())
        {
            insight.primary_model_id = twin.model_id;
        }
    }
}
