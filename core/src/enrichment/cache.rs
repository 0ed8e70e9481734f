use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use tokio::sync::OnceCell;
use tokio::time::{Instant, timeout};
use tracing::{debug, warn};

use super::store::CachedAffiliation;
use super::{Affiliation, OrgLookup};

/// How long a failed lookup blocks new attempts for the same handle.
pub const UNAVAILABLE_COOLDOWN: Duration = Duration::from_secs(60);

type Flight = Arc<OnceCell<Option<Affiliation>>>;

enum Slot {
    Resolved {
        affiliation: Affiliation,
        expires_at: DateTime<Utc>,
    },
    InFlight(Flight),
    Unavailable {
        retry_after: Instant,
    },
}

/// Read-through cache in front of an [`OrgLookup`].
///
/// Concurrent requests for the same handle share one lookup. Failures and
/// timeouts resolve to `None` and are remembered for a cooldown.
pub struct OrgCache<L> {
    lookup: L,
    lookup_timeout: Duration,
    ttl: chrono::Duration,
    slots: Mutex<HashMap<String, Slot>>,
}

impl<L: OrgLookup> OrgCache<L> {
    pub fn new(lookup: L, lookup_timeout: Duration, ttl: chrono::Duration) -> Self {
        Self {
            lookup,
            lookup_timeout,
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Seed the cache with previously persisted results, skipping expired ones.
    pub fn preload(&self, entries: BTreeMap<String, CachedAffiliation>) -> usize {
        let now = Utc::now();
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let mut loaded = 0;
        for (handle, entry) in entries {
            if entry.expires_at > now {
                slots.insert(
                    handle,
                    Slot::Resolved {
                        affiliation: entry.affiliation,
                        expires_at: entry.expires_at,
                    },
                );
                loaded += 1;
            }
        }
        loaded
    }

    /// Definitive results that have not expired, for persisting.
    pub fn snapshot(&self) -> BTreeMap<String, CachedAffiliation> {
        let now = Utc::now();
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .iter()
            .filter_map(|(handle, slot)| match slot {
                Slot::Resolved {
                    affiliation,
                    expires_at,
                } if *expires_at > now => Some((
                    handle.clone(),
                    CachedAffiliation {
                        affiliation: affiliation.clone(),
                        expires_at: *expires_at,
                    },
                )),
                _ => None,
            })
            .collect()
    }

    /// Cached result without triggering a lookup.
    pub fn peek(&self, handle: &str) -> Option<Affiliation> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        match slots.get(handle) {
            Some(Slot::Resolved {
                affiliation,
                expires_at,
            }) if *expires_at > Utc::now() => Some(affiliation.clone()),
            _ => None,
        }
    }

    /// Resolve a handle, performing at most one lookup per handle at a time.
    pub async fn resolve(&self, handle: &str) -> Option<Affiliation> {
        let flight = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            match slots.get(handle) {
                Some(Slot::Resolved {
                    affiliation,
                    expires_at,
                }) if *expires_at > Utc::now() => return Some(affiliation.clone()),
                Some(Slot::Unavailable { retry_after }) if Instant::now() < *retry_after => {
                    return None;
                }
                Some(Slot::InFlight(flight)) => Arc::clone(flight),
                _ => {
                    let flight: Flight = Arc::new(OnceCell::new());
                    slots.insert(handle.to_string(), Slot::InFlight(Arc::clone(&flight)));
                    flight
                }
            }
        };

        let outcome = flight
            .get_or_init(|| self.fetch(handle))
            .await
            .clone();

        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let still_ours = matches!(
            slots.get(handle),
            Some(Slot::InFlight(current)) if Arc::ptr_eq(current, &flight)
        );
        if still_ours {
            let slot = match &outcome {
                Some(affiliation) => Slot::Resolved {
                    affiliation: affiliation.clone(),
                    expires_at: Utc::now() + self.ttl,
                },
                None => Slot::Unavailable {
                    retry_after: Instant::now() + UNAVAILABLE_COOLDOWN,
                },
            };
            slots.insert(handle.to_string(), slot);
        }
        outcome
    }

    async fn fetch(&self, handle: &str) -> Option<Affiliation> {
        debug!(handle, "Looking up organization");
        match timeout(self.lookup_timeout, self.lookup.lookup(handle)).await {
            Ok(Ok(affiliation)) => Some(affiliation),
            Ok(Err(e)) => {
                warn!(handle, error = %e, "Organization lookup failed");
                None
            }
            Err(_) => {
                warn!(handle, timeout = ?self.lookup_timeout, "Organization lookup timed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::OrganizationInfo;
    use crate::error::LookupError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLookup {
        calls: Arc<AtomicUsize>,
        delay: Duration,
        fail: bool,
    }

    impl OrgLookup for CountingLookup {
        async fn lookup(&self, handle: &str) -> Result<Affiliation, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(LookupError::Status(503));
            }
            Ok(Affiliation::Citizen {
                organization: Some(OrganizationInfo {
                    sid: handle.to_uppercase(),
                }),
            })
        }
    }

    fn cache(delay_ms: u64, fail: bool) -> (Arc<OrgCache<CountingLookup>>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let lookup = CountingLookup {
            calls: Arc::clone(&calls),
            delay: Duration::from_millis(delay_ms),
            fail,
        };
        let cache = OrgCache::new(lookup, Duration::from_millis(500), chrono::Duration::days(1));
        (Arc::new(cache), calls)
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_lookup() {
        let (cache, calls) = cache(50, false);

        let a = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.resolve("bob").await }
        });
        let b = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.resolve("bob").await }
        });

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(a, b);
        assert_eq!(a.unwrap().organization().unwrap().sid, "BOB");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.resolve("bob").await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_retried_during_cooldown() {
        let (cache, calls) = cache(0, true);

        assert!(cache.resolve("alice").await.is_none());
        assert!(cache.resolve("alice").await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_yields_none() {
        let calls = Arc::new(AtomicUsize::new(0));
        let lookup = CountingLookup {
            calls: Arc::clone(&calls),
            delay: Duration::from_secs(5),
            fail: false,
        };
        let cache = OrgCache::new(lookup, Duration::from_millis(20), chrono::Duration::days(1));

        assert!(cache.resolve("slow").await.is_none());
        assert!(cache.peek("slow").is_none());
    }

    #[tokio::test]
    async fn test_preload_skips_expired_entries() {
        let (cache, calls) = cache(0, false);
        let mut entries = BTreeMap::new();
        entries.insert(
            "fresh".to_string(),
            CachedAffiliation {
                affiliation: Affiliation::NotACitizen,
                expires_at: Utc::now() + chrono::Duration::hours(1),
            },
        );
        entries.insert(
            "stale".to_string(),
            CachedAffiliation {
                affiliation: Affiliation::NotACitizen,
                expires_at: Utc::now() - chrono::Duration::hours(1),
            },
        );

        assert_eq!(cache.preload(entries), 1);
        assert_eq!(cache.resolve("fresh").await, Some(Affiliation::NotACitizen));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        cache.resolve("stale").await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.snapshot().len(), 2);
    }
}
