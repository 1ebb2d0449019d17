use std::time::Duration;

use moka::sync::Cache;

use crate::model::IdentityKey;

/// In-memory hint for the impression-dedup check. Entries expire with the
/// dedup window, so a hit means "this identity definitely saw this creative
/// recently" and the database round trip can be skipped. A miss proves
/// nothing: other instances may have recorded the impression, so the storage
/// query stays authoritative.
#[derive(Debug)]
pub struct ImpressionCache {
    seen: Cache<String, ()>,
}

impl ImpressionCache {
    pub const DEFAULT_CAPACITY: u64 = 100_000;

    pub fn new(window: Duration) -> Self {
        Self::with_capacity(window, Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(window: Duration, capacity: u64) -> Self {
        let capacity = capacity.max(1);
        Self {
            seen: Cache::builder()
                .time_to_live(window)
                .max_capacity(capacity)
                .build(),
        }
    }

    pub fn known_seen(&self, campaign_id: &str, creative_id: &str, identity: &IdentityKey) -> bool {
        self.seen
            .contains_key(&cache_key(campaign_id, creative_id, identity))
    }

    pub fn mark_seen(&self, campaign_id: &str, creative_id: &str, identity: &IdentityKey) {
        self.seen
            .insert(cache_key(campaign_id, creative_id, identity), ());
    }
}

fn cache_key(campaign_id: &str, creative_id: &str, identity: &IdentityKey) -> String {
    // The prefix keeps a user id from colliding with an equal-looking hash.
    let tag = match identity {
        IdentityKey::User(_) => "u",
        IdentityKey::IpHash(_) => "i",
    };
    format!("{campaign_id}\u{1f}{creative_id}\u{1f}{tag}\u{1f}{}", identity.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_and_reports_seen_impressions() {
        let cache = ImpressionCache::new(Duration::from_secs(60));
        let identity = IdentityKey::User("u1".into());
        assert!(!cache.known_seen("c1", "cr1", &identity));
        cache.mark_seen("c1", "cr1", &identity);
        assert!(cache.known_seen("c1", "cr1", &identity));
    }

    #[test]
    fn campaigns_do_not_share_entries() {
        let cache = ImpressionCache::new(Duration::from_secs(60));
        let identity = IdentityKey::User("u1".into());
        cache.mark_seen("c1", "cr1", &identity);
        assert!(!cache.known_seen("c2", "cr1", &identity));
        assert!(!cache.known_seen("c1", "cr2", &identity));
    }

    #[test]
    fn user_and_hash_identities_do_not_collide() {
        let cache = ImpressionCache::new(Duration::from_secs(60));
        cache.mark_seen("c1", "cr1", &IdentityKey::User("abc".into()));
        assert!(!cache.known_seen("c1", "cr1", &IdentityKey::IpHash("abc".into())));
    }
}
