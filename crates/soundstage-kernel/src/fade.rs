//! Timed fades.
//!
//! A [`Fade`] is a small value advanced by the per-frame update. All fade
//! math is a pure function of elapsed time, so replacing a fade is enough to
//! cancel it.

use serde::{Deserialize, Serialize};

/// Easing curve applied to fade progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// Constant rate.
    #[default]
    Linear,
    /// Slow start, fast finish.
    EaseIn,
    /// Fast start, slow finish.
    EaseOut,
    /// Slow start and finish.
    EaseInOut,
    /// Hermite smoothstep.
    SmoothStep,
}

impl FadeCurve {
    /// Map linear progress `t` (0.0-1.0) through the curve.
    #[must_use]
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::EaseIn => t * t,
            Self::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            Self::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - 2.0 * (1.0 - t) * (1.0 - t)
                }
            },
            Self::SmoothStep => t * t * (3.0 - 2.0 * t),
        }
    }
}

/// A level ramp from `from` to `to` over `duration` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fade {
    from: f32,
    to: f32,
    elapsed: f32,
    duration: f32,
    curve: FadeCurve,
    stop_on_complete: bool,
}

impl Fade {
    /// Create a fade. A non-positive duration completes on the first advance.
    #[must_use]
    pub fn new(from: f32, to: f32, duration: f32, curve: FadeCurve) -> Self {
        Self {
            from,
            to,
            elapsed: 0.0,
            duration: duration.max(0.0),
            curve,
            stop_on_complete: false,
        }
    }

    /// Create a fade that stops its target when it completes.
    #[must_use]
    pub fn stopping(mut self) -> Self {
        self.stop_on_complete = true;
        self
    }

    /// Advance by `delta` seconds and return the new level.
    pub fn advance(&mut self, delta: f32) -> f32 {
        self.elapsed = (self.elapsed + delta.max(0.0)).min(self.duration);
        self.level()
    }

    /// Current level.
    #[must_use]
    pub fn level(&self) -> f32 {
        self.from + (self.to - self.from) * self.curve.apply(self.progress())
    }

    /// Linear progress (0.0-1.0).
    #[must_use]
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            self.elapsed / self.duration
        }
    }

    /// Check if the fade has reached its target.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.elapsed >= self.duration
    }

    /// Whether the owner should stop once the fade completes.
    #[must_use]
    pub const fn stops_on_complete(&self) -> bool {
        self.stop_on_complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curves_hit_endpoints() {
        for curve in [
            FadeCurve::Linear,
            FadeCurve::EaseIn,
            FadeCurve::EaseOut,
            FadeCurve::EaseInOut,
            FadeCurve::SmoothStep,
        ] {
            assert!(curve.apply(0.0).abs() < 1e-6, "{curve:?} start");
            assert!((curve.apply(1.0) - 1.0).abs() < 1e-6, "{curve:?} end");
            assert!(curve.apply(0.25) <= curve.apply(0.75), "{curve:?} monotonic");
        }
    }

    #[test]
    fn test_fade_progress() {
        let mut fade = Fade::new(0.0, 1.0, 2.0, FadeCurve::Linear);
        assert!((fade.advance(0.5) - 0.25).abs() < 1e-6);
        assert!(!fade.is_complete());
        assert!((fade.advance(10.0) - 1.0).abs() < 1e-6);
        assert!(fade.is_complete());
    }

    #[test]
    fn test_zero_duration_completes_immediately() {
        let mut fade = Fade::new(0.8, 0.0, 0.0, FadeCurve::EaseIn).stopping();
        assert!(fade.advance(0.0).abs() < 1e-6);
        assert!(fade.is_complete());
        assert!(fade.stops_on_complete());
    }
}
