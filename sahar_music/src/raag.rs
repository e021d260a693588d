// Raag Yaman pitch material and the harmonic tables for the rock movements.
//
// Yaman is built from the tonic (Sa) plus major 2nd, major 3rd, augmented
// 4th, perfect 5th, major 6th, and major 7th: the Lydian interval set. The
// augmented 4th (tivra Ma) is played slightly sharp by performance
// convention, modeled here as a fixed +10 cent detuning on that one degree.
//
// The rock movements pull against this material with chords containing G
// natural and Bb, both alien to D Yaman. Those voicings live here as
// immutable tables alongside the scale.

use crate::timeline::Pitch;
use serde::{Deserialize, Serialize};

/// Semitone offsets of the seven Yaman degrees from the tonic:
/// Sa, Re, Ga, Ma#, Pa, Dha, Ni.
const YAMAN_OFFSETS: [u8; 7] = [0, 2, 4, 6, 7, 9, 11];

/// Index of the augmented 4th (tivra Ma) within the scale.
pub const TIVRA_MA_DEGREE: usize = 3;

/// How far sharp the tivra Ma is played, in cents.
pub const TIVRA_MA_CENTS: f64 = 10.0;

/// The seven pitches of Yaman on the given root, in ascending degree order.
/// Deterministic; assumes the root itself is a valid pitch.
pub fn yaman_scale(root: Pitch) -> [Pitch; 7] {
    std::array::from_fn(|degree| {
        let mut pitch = root.transpose(YAMAN_OFFSETS[degree] as i8);
        if degree == TIVRA_MA_DEGREE {
            pitch.cents = TIVRA_MA_CENTS;
        }
        pitch
    })
}

/// A power voicing: root plus perfect 5th, no 3rd.
pub fn power_chord(root: Pitch) -> Vec<Pitch> {
    vec![root, root.transpose(7)]
}

/// The four functions of the rock progression. The minor subdominant is the
/// emotional pivot of the piece: its Bb is the one note Yaman cannot absorb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Harmony {
    /// I: D major.
    Tonic,
    /// V: A major.
    Dominant,
    /// IV: G major.
    Subdominant,
    /// iv: G minor.
    SubdominantMinor,
}

impl Harmony {
    /// Close-position triad voicing in the guitar register.
    pub fn voicing(self) -> Vec<Pitch> {
        let midi: [u8; 3] = match self {
            Harmony::Tonic => [50, 54, 57],            // D3 F#3 A3
            Harmony::Dominant => [45, 49, 52],         // A2 C#3 E3
            Harmony::Subdominant => [43, 47, 50],      // G2 B2 D3
            Harmony::SubdominantMinor => [43, 46, 50], // G2 Bb2 D3
        };
        midi.iter().map(|&m| Pitch::new(m)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaman_scale_intervals() {
        let root = Pitch::parse("D4").unwrap();
        let scale = yaman_scale(root);
        assert_eq!(scale.len(), 7);
        let offsets: Vec<u8> = scale.iter().map(|p| p.midi - root.midi).collect();
        assert_eq!(offsets, vec![0, 2, 4, 6, 7, 9, 11]);
    }

    #[test]
    fn test_only_tivra_ma_is_detuned() {
        let scale = yaman_scale(Pitch::parse("D4").unwrap());
        for (degree, pitch) in scale.iter().enumerate() {
            if degree == TIVRA_MA_DEGREE {
                assert_eq!(pitch.cents, TIVRA_MA_CENTS);
                assert_eq!(pitch.midi, 68); // G#4
            } else {
                assert_eq!(pitch.cents, 0.0, "degree {} should be undetuned", degree);
            }
        }
    }

    #[test]
    fn test_scale_follows_root() {
        let scale = yaman_scale(Pitch::parse("G3").unwrap());
        assert_eq!(scale[0].midi, 55);
        assert_eq!(scale[4].midi, 62); // perfect 5th = D4
    }

    #[test]
    fn test_power_chord_is_root_and_fifth() {
        let chord = power_chord(Pitch::parse("D3").unwrap());
        assert_eq!(chord.len(), 2);
        assert_eq!(chord[1].midi - chord[0].midi, 7);
    }

    #[test]
    fn test_minor_subdominant_carries_b_flat() {
        let voicing = Harmony::SubdominantMinor.voicing();
        assert!(voicing.iter().any(|p| p.midi == 46)); // Bb2
        // The major subdominant differs in exactly that one note.
        let major = Harmony::Subdominant.voicing();
        assert!(major.iter().any(|p| p.midi == 47)); // B2
    }
}
