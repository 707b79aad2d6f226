//! Smoothed hover colours

use crate::foundation::math::{utils, Color};

/// Ease `current` toward the hover target for one tick
///
/// The target is `base + offset` (saturated) while hovered and `base`
/// otherwise. Each call closes `min(rate * delta_time, 1)` of the remaining
/// gap, so the colour approaches the target monotonically and never
/// overshoots it.
pub fn smooth_hover_color(current: Color, base: Color, hovered: bool, offset: f32, rate: f32, delta_time: f32) -> Color {
    let target = hover_target(base, hovered, offset);
    let factor = (rate * delta_time).clamp(0.0, 1.0);
    current + (target - current) * factor
}

/// Colour a hovered or idle entity converges to
pub fn hover_target(base: Color, hovered: bool, offset: f32) -> Color {
    if hovered {
        utils::saturate(base.add_scalar(offset))
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_converges_without_overshoot() {
        let base = Color::new(0.9, 0.2, 0.5);
        let target = hover_target(base, true, 0.3);
        assert_relative_eq!(target, Color::new(1.0, 0.5, 0.8), epsilon = 1e-6);

        let mut color = base;
        let mut previous_gap = (target - color).norm();
        for _ in 0..60 {
            color = smooth_hover_color(color, base, true, 0.3, 5.0, 1.0 / 60.0);
            let gap = (target - color).norm();
            assert!(gap <= previous_gap);
            assert!(color.iter().all(|c| *c <= 1.0));
            previous_gap = gap;
        }
        assert!(previous_gap < 0.01);
    }

    #[test]
    fn test_large_step_lands_on_target() {
        let base = Color::new(0.1, 0.1, 0.1);
        let color = smooth_hover_color(base, base, true, 0.3, 5.0, 1.0);
        assert_relative_eq!(color, Color::new(0.4, 0.4, 0.4), epsilon = 1e-6);
    }

    #[test]
    fn test_unhovered_returns_to_base() {
        let base = Color::new(0.2, 0.2, 0.2);
        let color = smooth_hover_color(Color::new(0.5, 0.5, 0.5), base, false, 0.3, 5.0, 1.0);
        assert_relative_eq!(color, base);
    }
}
