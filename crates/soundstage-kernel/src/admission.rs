//! Admission policy: cooldowns, instance limits and priority eviction.

use ahash::AHashMap;
use soundstage_common::{SoundEntry, SoundHandle, SoundPriority};
use tracing::debug;

use crate::config::SoundConfig;
use crate::registry::SoundRegistry;

/// Result of the priority gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Play without evicting anything.
    Admit,
    /// Stop this sound first, then play.
    Evict(SoundHandle),
    /// Do not play.
    Reject,
}

/// Bookkeeping behind the cooldown gate.
#[derive(Debug, Default)]
pub struct AdmissionPolicy {
    last_play_time: AHashMap<String, f64>,
    active_count: AHashMap<String, usize>,
}

impl AdmissionPolicy {
    /// Create empty bookkeeping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check cooldown and per-ID instance limit.
    #[must_use]
    pub fn cooldown_allows(&self, entry: &SoundEntry, now: f64, config: &SoundConfig) -> bool {
        if !config.enforce_cooldowns {
            return true;
        }

        let cooldown = f64::from(entry.cooldown.unwrap_or(config.default_cooldown));
        if let Some(&last) = self.last_play_time.get(&entry.id) {
            if now - last < cooldown {
                debug!("'{}' on cooldown ({:.3}s left)", entry.id, cooldown - (now - last));
                return false;
            }
        }

        let active = self.active_count(&entry.id);
        if active >= config.max_same_sound_simultaneous {
            debug!("'{}' at instance limit ({})", entry.id, active);
            return false;
        }

        true
    }

    /// Decide whether a sound of `priority` may take a voice.
    #[must_use]
    pub fn priority_gate<V>(
        priority: SoundPriority,
        registry: &SoundRegistry<V>,
        capacity: usize,
        config: &SoundConfig,
    ) -> Admission {
        if !config.enforce_priority || registry.len() < capacity {
            return Admission::Admit;
        }

        let candidates = registry
            .iter()
            .filter(|sound| priority == SoundPriority::Critical || sound.priority() < priority);

        // Lowest priority first, oldest first on ties.
        let victim = candidates.min_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then(a.start_time.total_cmp(&b.start_time))
        });

        match victim {
            Some(sound) => {
                debug!(
                    "Evicting '{}' ({:?}) for {:?} sound",
                    sound.id(),
                    sound.priority(),
                    priority
                );
                Admission::Evict(sound.handle)
            },
            None => {
                debug!("No sound below {:?} to evict", priority);
                Admission::Reject
            },
        }
    }

    /// Record an admitted play.
    pub fn record_play(&mut self, id: &str, now: f64) {
        self.last_play_time.insert(id.to_string(), now);
    }

    /// Count a newly registered instance.
    pub fn on_register(&mut self, id: &str) {
        *self.active_count.entry(id.to_string()).or_insert(0) += 1;
    }

    /// Uncount a removed instance.
    pub fn on_remove(&mut self, id: &str) {
        if let Some(count) = self.active_count.get_mut(id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.active_count.remove(id);
            }
        }
    }

    /// Active instances of a sound ID.
    #[must_use]
    pub fn active_count(&self, id: &str) -> usize {
        self.active_count.get(id).copied().unwrap_or(0)
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.last_play_time.clear();
        self.active_count.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use soundstage_common::SoundCategory;

    use super::*;
    use crate::registry::ActiveSound;

    fn entry(id: &str, priority: SoundPriority) -> Arc<SoundEntry> {
        Arc::new(SoundEntry::new(id, SoundCategory::Sfx).with_priority(priority))
    }

    fn full_registry() -> (SoundRegistry<u32>, SoundHandle, SoundHandle) {
        let mut registry = SoundRegistry::new();
        let old_low = registry.register(ActiveSound::new(entry("a", SoundPriority::Low), 0, 0.0));
        let new_low = registry.register(ActiveSound::new(entry("b", SoundPriority::Low), 0, 1.0));
        registry.register(ActiveSound::new(entry("c", SoundPriority::High), 0, 2.0));
        (registry, old_low, new_low)
    }

    #[test]
    fn test_cooldown_gate() {
        let config = SoundConfig::default().with_default_cooldown(1.0);
        let mut policy = AdmissionPolicy::new();
        let e = SoundEntry::new("x", SoundCategory::Sfx);

        assert!(policy.cooldown_allows(&e, 0.0, &config));
        policy.record_play("x", 0.0);
        assert!(!policy.cooldown_allows(&e, 0.5, &config));
        assert!(policy.cooldown_allows(&e, 1.0, &config));
    }

    #[test]
    fn test_entry_cooldown_overrides_default() {
        let config = SoundConfig::default().with_default_cooldown(10.0);
        let mut policy = AdmissionPolicy::new();
        let e = SoundEntry::new("x", SoundCategory::Sfx).with_cooldown(0.1);
        policy.record_play("x", 0.0);
        assert!(policy.cooldown_allows(&e, 0.2, &config));
    }

    #[test]
    fn test_instance_limit() {
        let config = SoundConfig::default()
            .with_default_cooldown(0.0)
            .with_max_same_sound(2);
        let mut policy = AdmissionPolicy::new();
        let e = SoundEntry::new("x", SoundCategory::Sfx);

        policy.on_register("x");
        policy.on_register("x");
        assert!(!policy.cooldown_allows(&e, 0.0, &config));
        policy.on_remove("x");
        assert!(policy.cooldown_allows(&e, 0.0, &config));
        assert_eq!(policy.active_count("x"), 1);
    }

    #[test]
    fn test_cooldowns_disabled() {
        let config = SoundConfig::default().with_cooldowns(false).with_max_same_sound(1);
        let mut policy = AdmissionPolicy::new();
        let e = SoundEntry::new("x", SoundCategory::Sfx);
        policy.record_play("x", 0.0);
        policy.on_register("x");
        assert!(policy.cooldown_allows(&e, 0.0, &config));
    }

    #[test]
    fn test_admit_with_free_capacity() {
        let (registry, _, _) = full_registry();
        let config = SoundConfig::default();
        assert_eq!(
            AdmissionPolicy::priority_gate(SoundPriority::Low, &registry, 4, &config),
            Admission::Admit
        );
    }

    #[test]
    fn test_evicts_oldest_lower_priority() {
        let (registry, old_low, _) = full_registry();
        let config = SoundConfig::default();
        assert_eq!(
            AdmissionPolicy::priority_gate(SoundPriority::Normal, &registry, 3, &config),
            Admission::Evict(old_low)
        );
    }

    #[test]
    fn test_rejects_without_lower_priority() {
        let (registry, _, _) = full_registry();
        let config = SoundConfig::default();
        assert_eq!(
            AdmissionPolicy::priority_gate(SoundPriority::Low, &registry, 3, &config),
            Admission::Reject
        );
    }

    #[test]
    fn test_critical_always_evicts() {
        let mut registry = SoundRegistry::new();
        let first = registry.register(ActiveSound::new(entry("a", SoundPriority::Critical), 0, 0.0));
        registry.register(ActiveSound::new(entry("b", SoundPriority::Critical), 0, 1.0));
        let config = SoundConfig::default();
        assert_eq!(
            AdmissionPolicy::priority_gate(SoundPriority::Critical, &registry, 2, &config),
            Admission::Evict(first)
        );
    }

    #[test]
    fn test_priority_disabled_admits() {
        let (registry, _, _) = full_registry();
        let config = SoundConfig::default().with_priority(false);
        assert_eq!(
            AdmissionPolicy::priority_gate(SoundPriority::Low, &registry, 3, &config),
            Admission::Admit
        );
    }
}
