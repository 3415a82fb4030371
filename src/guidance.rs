//! Breathing guidance
//!
//! Fixed lookup from meditation state to breathing cadence and coaching message.

use crate::types::{BreathingGuidance, MeditationState};

const DEEP_MEDITATION: BreathingGuidance = BreathingGuidance {
    inhale_seconds: 4,
    hold_seconds: 7,
    exhale_seconds: 8,
    message: "Perfect! Maintain this deep state",
};

const RELAXED: BreathingGuidance = BreathingGuidance {
    inhale_seconds: 4,
    hold_seconds: 4,
    exhale_seconds: 6,
    message: "You're relaxing nicely. Let each exhale soften you",
};

const FOCUSED: BreathingGuidance = BreathingGuidance {
    inhale_seconds: 4,
    hold_seconds: 4,
    exhale_seconds: 4,
    message: "Steady focus. Keep an even, box-shaped breath",
};

const ACTIVE: BreathingGuidance = BreathingGuidance {
    inhale_seconds: 4,
    hold_seconds: 2,
    exhale_seconds: 6,
    message: "Let's slow down. Lengthen your exhale",
};

const WARMING_UP: BreathingGuidance = BreathingGuidance {
    inhale_seconds: 4,
    hold_seconds: 0,
    exhale_seconds: 4,
    message: "Settle in and breathe naturally",
};

/// Breathing guidance for a state
pub fn guidance_for(state: MeditationState) -> BreathingGuidance {
    match state {
        MeditationState::DeepMeditation => DEEP_MEDITATION,
        MeditationState::Relaxed => RELAXED,
        MeditationState::Focused => FOCUSED,
        MeditationState::Active => ACTIVE,
        MeditationState::WarmingUp => WARMING_UP,
    }
}

/// Guidance for a state label. Unknown or missing labels get the warming-up entry.
pub fn guidance_for_label(label: Option<&str>) -> BreathingGuidance {
    let state = label
        .and_then(|l| l.parse::<MeditationState>().ok())
        .unwrap_or_default();
    guidance_for(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deep_meditation_cadence() {
        let guidance = guidance_for(MeditationState::DeepMeditation);
        assert_eq!(
            (guidance.inhale_seconds, guidance.hold_seconds, guidance.exhale_seconds),
            (4, 7, 8)
        );
        assert_eq!(guidance.message, "Perfect! Maintain this deep state");
        assert_eq!(guidance.cycle_seconds(), 19);
    }

    #[test]
    fn test_every_state_has_guidance() {
        for state in MeditationState::ALL {
            let guidance = guidance_for(state);
            assert!(guidance.inhale_seconds > 0);
            assert!(guidance.exhale_seconds > 0);
            assert!(!guidance.message.is_empty());
        }
    }

    #[test]
    fn test_unknown_label_falls_back_to_warming_up() {
        let warming_up = guidance_for(MeditationState::WarmingUp);
        assert_eq!(guidance_for_label(Some("levitating")), warming_up);
        assert_eq!(guidance_for_label(Some("")), warming_up);
        assert_eq!(guidance_for_label(None), warming_up);
        assert_eq!(
            guidance_for_label(Some("deep-meditation")),
            guidance_for(MeditationState::DeepMeditation)
        );
    }
}
