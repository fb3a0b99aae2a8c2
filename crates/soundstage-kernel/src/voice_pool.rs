//! Pool of reusable voices.
//!
//! The pool owns every idle voice. `acquire` moves a voice out to its single
//! user and `release` moves it back, so a voice can never be handed out
//! twice before it is returned.

use std::collections::VecDeque;

use soundstage_common::SoundResult;
use tracing::{debug, warn};

use crate::backend::{AudioBackend, VoiceChannel};

/// Growable pool of voices with a hard upper bound.
#[derive(Debug)]
pub struct VoicePool<V> {
    idle: VecDeque<V>,
    created: usize,
    max_size: usize,
}

impl<V: VoiceChannel> VoicePool<V> {
    /// Create a pool pre-populated with `initial_size` voices.
    ///
    /// Fails if the backend cannot create even one voice; a partial pool is
    /// accepted with a warning.
    pub fn new<B>(backend: &mut B, initial_size: usize, max_size: usize) -> SoundResult<Self>
    where
        B: AudioBackend<Voice = V>,
    {
        let max_size = max_size.max(1);
        let initial_size = initial_size.min(max_size);
        let mut idle = VecDeque::with_capacity(max_size);

        for i in 0..initial_size {
            match backend.create_voice() {
                Ok(voice) => idle.push_back(voice),
                Err(e) => {
                    if i == 0 {
                        return Err(e);
                    }
                    warn!("Could only create {} voices", i);
                    break;
                },
            }
        }

        debug!(
            "Created voice pool with {} voices (max {})",
            idle.len(),
            max_size
        );

        Ok(Self {
            created: idle.len(),
            idle,
            max_size,
        })
    }

    /// Take an idle voice, growing the pool by one if allowed.
    pub fn acquire<B>(&mut self, backend: &mut B) -> Option<V>
    where
        B: AudioBackend<Voice = V>,
    {
        if let Some(voice) = self.idle.pop_front() {
            return Some(voice);
        }

        if self.created >= self.max_size {
            return None;
        }

        match backend.create_voice() {
            Ok(voice) => {
                self.created += 1;
                debug!("Voice pool grew to {}", self.created);
                Some(voice)
            },
            Err(e) => {
                warn!("Voice pool could not grow: {e}");
                None
            },
        }
    }

    /// Return a voice to the pool, clearing its transient state.
    pub fn release(&mut self, mut voice: V) {
        voice.reset();
        self.idle.push_back(voice);
    }

    /// Number of voices created so far.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.created
    }

    /// Upper bound on voices.
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Number of idle voices.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    /// Number of voices currently checked out.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.created - self.idle.len()
    }

    /// Drop every idle voice.
    pub fn clear(&mut self) {
        self.created -= self.idle.len();
        self.idle.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use soundstage_common::AudioClip;

    use super::*;
    use crate::sim_backend::SimulatedBackend;

    #[test]
    fn test_pool_prepopulates() {
        let mut backend = SimulatedBackend::new();
        let pool = VoicePool::new(&mut backend, 4, 8).expect("pool");
        assert_eq!(pool.capacity(), 4);
        assert_eq!(pool.idle_count(), 4);
        assert_eq!(pool.max_size(), 8);
    }

    #[test]
    fn test_pool_grows_to_max() {
        let mut backend = SimulatedBackend::new();
        let mut pool = VoicePool::new(&mut backend, 1, 3).expect("pool");

        let a = pool.acquire(&mut backend).expect("a");
        let b = pool.acquire(&mut backend).expect("b");
        let c = pool.acquire(&mut backend).expect("c");
        assert!(pool.acquire(&mut backend).is_none());
        assert_eq!(pool.capacity(), 3);
        assert_eq!(pool.in_use(), 3);

        assert_ne!(a.id(), b.id());
        assert_ne!(b.id(), c.id());

        pool.release(b);
        assert_eq!(pool.in_use(), 2);
        assert!(pool.acquire(&mut backend).is_some());
    }

    #[test]
    fn test_release_resets_voice() {
        let mut backend = SimulatedBackend::new();
        let mut pool = VoicePool::new(&mut backend, 1, 1).expect("pool");

        let mut voice = pool.acquire(&mut backend).expect("voice");
        voice.start(&AudioClip::silent("x", Duration::from_secs(5)), true);
        voice.set_volume(0.3);
        pool.release(voice);

        let voice = pool.acquire(&mut backend).expect("voice");
        assert!(voice.is_finished());
        assert!((voice.volume() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_initial_size_capped_by_max() {
        let mut backend = SimulatedBackend::new();
        let pool = VoicePool::new(&mut backend, 10, 2).expect("pool");
        assert_eq!(pool.capacity(), 2);
    }
}
