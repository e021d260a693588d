// The percussion map and the keherwa theka.
//
// Tabla bols (stroke syllables) map to General MIDI percussion keys. Combo
// bols strike two sounds at once and become chord events; single bols become
// plain events. The keherwa cycle is one literal 4-beat measure with a swung
// subdivision: each beat splits 2/3 + 1/3 under a 3:2 grouping, so a
// long/short pair always sums to exactly one quarter note.

use crate::timeline::{Event, Fragment, Pitch, Tuplet};
use serde::{Deserialize, Serialize};

/// Tabla stroke syllables used by the keherwa theka.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bol {
    Dha,
    Dhin,
    Ge,
    Na,
    Tin,
    Ka,
    Ke,
}

impl Bol {
    /// General MIDI percussion keys for this stroke. Dha and Dhin are combo
    /// strokes sounding two keys at once.
    pub fn keys(self) -> &'static [u8] {
        match self {
            Bol::Ge => &[36],       // resonant bass (kick)
            Bol::Na => &[37],       // sharp rim (side stick)
            Bol::Tin => &[45],      // soft resonant (low tom)
            Bol::Dha => &[36, 37],  // bass + rim
            Bol::Dhin => &[36, 45], // bass + soft
            Bol::Ka => &[44],       // flat slap (pedal hi-hat)
            Bol::Ke => &[44],
        }
    }
}

/// Long and short halves of one swung beat: 2/3 and 1/3 of a quarter note.
const LONG: u64 = 8;
const SHORT: u64 = 4;

/// One cycle of keherwa with a swung feel:
/// Dha-Ge | Na-Tin | Na-Ka | Dhin-Na.
pub const KEHERWA_PATTERN: [(Bol, u64); 8] = [
    (Bol::Dha, LONG),
    (Bol::Ge, SHORT),
    (Bol::Na, LONG),
    (Bol::Tin, SHORT),
    (Bol::Na, LONG),
    (Bol::Ka, SHORT),
    (Bol::Dhin, LONG),
    (Bol::Na, SHORT),
];

const STROKE_VELOCITY: u16 = 96;

/// Build one keherwa cycle as a fragment. Every stroke carries the 3:2
/// grouping marker so the notation side renders the swing correctly. The
/// conductor repeats the cycle by duplication to fill the rock section.
pub fn keherwa_cycle() -> Fragment {
    let mut cycle = Fragment::new();
    for (bol, duration) in KEHERWA_PATTERN {
        let pitches: Vec<Pitch> = bol.keys().iter().map(|&k| Pitch::new(k)).collect();
        let event = if pitches.len() > 1 {
            Event::chord(pitches, duration, STROKE_VELOCITY)
        } else {
            Event::note(pitches[0], duration, STROKE_VELOCITY)
        };
        cycle.append(event.with_tuplet(Tuplet::triplet()));
    }
    cycle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::PULSES_PER_BAR;

    #[test]
    fn test_cycle_sums_to_one_bar() {
        let cycle = keherwa_cycle();
        let total: u64 = cycle.events().iter().map(|(_, e)| e.duration).sum();
        assert_eq!(total, PULSES_PER_BAR);
        assert_eq!(cycle.total_duration(), PULSES_PER_BAR);
    }

    #[test]
    fn test_every_stroke_is_grouped() {
        let cycle = keherwa_cycle();
        assert_eq!(cycle.len(), 8);
        for (_, event) in cycle.events() {
            assert_eq!(event.tuplet, Some(Tuplet::triplet()));
        }
    }

    #[test]
    fn test_combo_strokes_are_chords() {
        let cycle = keherwa_cycle();
        let first = &cycle.events()[0].1;
        assert!(first.is_chord()); // Dha = bass + rim
        assert_eq!(first.pitches.iter().map(|p| p.midi).collect::<Vec<_>>(), vec![36, 37]);
        let second = &cycle.events()[1].1;
        assert!(!second.is_chord()); // Ge = bass alone
    }

    #[test]
    fn test_swung_pairs_sum_to_one_beat() {
        let cycle = keherwa_cycle();
        for pair in cycle.events().chunks(2) {
            let beat: u64 = pair.iter().map(|(_, e)| e.duration).sum();
            assert_eq!(beat, PULSES_PER_BAR / 4);
        }
    }
}
