// Fragment generators for the four movements.
//
// Each generator is a pure function of its explicit inputs. The two
// stochastic generators (alaap, synthesis melody) take the RNG as an
// explicit parameter rather than reaching for ambient global state, so a
// run is reproducible from its seed. Everything else is deterministic.
//
// Movement plan:
//   I   alaap:     free-time weighted melody over the drone
//   II  fracture:  the tritone clash, cello, crescendo
//   III rock riff: power-chord progression (drums join here)
//   IV  synthesis: sitar locked to straight eighths on the rock grid

use crate::raag::{self, Harmony};
use crate::timeline::{Event, Fragment, PULSES_PER_BAR, PULSES_PER_QUARTER, Pitch, quarters};
use rand::Rng;

/// Per-degree draw weights for the alaap, favoring the vaadi (Ga, the 3rd)
/// and samvaadi (Ni, the 7th).
const ALAAP_WEIGHTS: [f64; 7] = [0.1, 0.1, 0.3, 0.1, 0.1, 0.1, 0.2];

/// Rubato duration palette in pulses: eighth, quarter, dotted quarter, half.
const ALAAP_DURATIONS: [u64; 4] = [6, 12, 18, 24];

/// Largest duration the alaap can draw; bounds the overshoot past the
/// nominal section length.
pub const ALAAP_MAX_EVENT: u64 = 24;

const ALAAP_VELOCITY: u16 = 90;
const SYNTHESIS_VELOCITY: u16 = 90;
const RIFF_VELOCITY: u16 = 100;

const DRONE_VELOCITY: u16 = 30; // pianissimo
const DRONE_QUARTERS: u64 = 100;

const FRACTURE_FLOOR_VELOCITY: u16 = 60;
const FRACTURE_VELOCITY_STEP: u16 = 3;
const FRACTURE_CHORD_QUARTERS: u64 = 2;

/// The drone: tonic and fifth held underneath the whole piece, simulating
/// the sympathetic tarab strings.
pub fn sitar_drone() -> Fragment {
    let root = Pitch::new(50); // D3
    let fifth = root.transpose(7);
    let duration = quarters(DRONE_QUARTERS);
    let mut drone = Fragment::new();
    drone.insert(0, Event::note(root, duration, DRONE_VELOCITY));
    drone.insert(0, Event::note(fifth, duration, DRONE_VELOCITY));
    drone
}

/// Movement I: free-form alaap in Yaman.
///
/// A running cursor draws a weighted scale degree and a uniform rubato
/// duration, places the note, and advances. Generation stops once the
/// cursor reaches the target; the last note may overshoot by up to
/// `ALAAP_MAX_EVENT` pulses and is never truncated.
pub fn alaap(scale: &[Pitch; 7], target_pulses: u64, rng: &mut impl Rng) -> Fragment {
    let mut melody = Fragment::new();
    let mut cursor = 0u64;
    while cursor < target_pulses {
        let degree = weighted_degree(&ALAAP_WEIGHTS, rng);
        let duration = ALAAP_DURATIONS[rng.random_range(0..ALAAP_DURATIONS.len())];
        melody.insert(cursor, Event::note(scale[degree], duration, ALAAP_VELOCITY));
        cursor += duration;
    }
    melody
}

/// Cumulative-weight draw over the seven scale degrees.
fn weighted_degree(weights: &[f64; 7], rng: &mut impl Rng) -> usize {
    let total: f64 = weights.iter().sum();
    let target: f64 = rng.random::<f64>() * total;
    let mut cumulative = 0.0;
    for (degree, &weight) in weights.iter().enumerate() {
        cumulative += weight;
        if cumulative > target {
            return degree;
        }
    }
    weights.len() - 1
}

/// Movement II: the fracture texture.
///
/// Shuddha Ma (G natural) ground against tivra Ma (G#) in two-pitch chords,
/// accented, with a crescendo rising from the floor velocity by a fixed step
/// per chord. The ramp is not clamped; the MIDI boundary is where any
/// ceiling applies.
pub fn fracture_texture(steps: usize) -> Fragment {
    let shuddha_ma = Pitch::new(55); // G3
    let tivra_ma = Pitch::new(56); // G#3
    let mut texture = Fragment::new();
    for step in 0..steps {
        let velocity = FRACTURE_FLOOR_VELOCITY + FRACTURE_VELOCITY_STEP * step as u16;
        let clash = Event::chord(
            vec![shuddha_ma, tivra_ma],
            quarters(FRACTURE_CHORD_QUARTERS),
            velocity,
        );
        texture.append(clash.with_accent());
    }
    texture
}

/// Movement III: the rhythm guitar riff.
///
/// Each repetition is four whole-note bars: D power, A power, G power, then
/// the full G minor triad, the minor iv that signals the turn.
pub fn rock_riff(repetitions: usize) -> Fragment {
    let mut riff = Fragment::new();
    for _ in 0..repetitions {
        for root in [50u8, 45, 43] {
            // D3, A2, G2
            riff.append(Event::chord(
                raag::power_chord(Pitch::new(root)),
                PULSES_PER_BAR,
                RIFF_VELOCITY,
            ));
        }
        riff.append(Event::chord(
            Harmony::SubdominantMinor.voicing(),
            PULSES_PER_BAR,
            RIFF_VELOCITY,
        ));
    }
    riff
}

/// Movement IV: the synthesis melody.
///
/// Sitar locked to the rock grid: straight eighth notes, pitch drawn
/// uniformly from the scale. No rubato.
pub fn synthesis_melody(scale: &[Pitch; 7], eighth_count: usize, rng: &mut impl Rng) -> Fragment {
    let mut melody = Fragment::new();
    for _ in 0..eighth_count {
        let pitch = scale[rng.random_range(0..scale.len())];
        melody.append(Event::note(pitch, PULSES_PER_QUARTER / 2, SYNTHESIS_VELOCITY));
    }
    melody
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn test_scale() -> [Pitch; 7] {
        raag::yaman_scale(Pitch::parse("D4").unwrap())
    }

    #[test]
    fn test_drone_holds_root_and_fifth() {
        let drone = sitar_drone();
        assert_eq!(drone.len(), 2);
        for (offset, event) in drone.events() {
            assert_eq!(*offset, 0);
            assert_eq!(event.duration, quarters(100));
            assert_eq!(event.velocity, 30);
        }
        assert_eq!(drone.events()[1].1.pitches[0].midi - drone.events()[0].1.pitches[0].midi, 7);
    }

    #[test]
    fn test_alaap_duration_bounds() {
        let scale = test_scale();
        let target = quarters(32);
        let mut rng = StdRng::seed_from_u64(7);
        let melody = alaap(&scale, target, &mut rng);
        let total: u64 = melody.events().iter().map(|(_, e)| e.duration).sum();
        assert!(total >= target);
        assert!(total < target + ALAAP_MAX_EVENT);
        // Contiguous: each event starts where the previous ended.
        let mut cursor = 0;
        for (offset, event) in melody.events() {
            assert_eq!(*offset, cursor);
            cursor += event.duration;
        }
    }

    #[test]
    fn test_alaap_stays_in_scale() {
        let scale = test_scale();
        let mut rng = StdRng::seed_from_u64(11);
        let melody = alaap(&scale, quarters(64), &mut rng);
        for (_, event) in melody.events() {
            assert!(scale.contains(&event.pitches[0]));
        }
    }

    #[test]
    fn test_alaap_seeds_diverge() {
        let scale = test_scale();
        let mut rng_a = StdRng::seed_from_u64(1);
        let mut rng_b = StdRng::seed_from_u64(2);
        let a = alaap(&scale, quarters(32), &mut rng_a);
        let b = alaap(&scale, quarters(32), &mut rng_b);
        let pitches_a: Vec<u8> = a.events().iter().map(|(_, e)| e.pitches[0].midi).collect();
        let pitches_b: Vec<u8> = b.events().iter().map(|(_, e)| e.pitches[0].midi).collect();
        assert_ne!(pitches_a, pitches_b);
    }

    #[test]
    fn test_alaap_same_seed_reproduces() {
        let scale = test_scale();
        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);
        assert_eq!(
            alaap(&scale, quarters(32), &mut rng_a).events(),
            alaap(&scale, quarters(32), &mut rng_b).events()
        );
    }

    #[test]
    fn test_weighted_degree_covers_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let degree = weighted_degree(&ALAAP_WEIGHTS, &mut rng);
            assert!(degree < 7);
        }
    }

    #[test]
    fn test_fracture_crescendo() {
        let texture = fracture_texture(16);
        assert_eq!(texture.len(), 16);
        let velocities: Vec<u16> = texture.events().iter().map(|(_, e)| e.velocity).collect();
        assert!(velocities.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(velocities[0], 60);
        assert_eq!(velocities[15], 105);
        for (_, event) in texture.events() {
            assert!(event.accent);
            assert_eq!(event.duration, quarters(2));
            assert_eq!(event.pitches[1].midi - event.pitches[0].midi, 1);
        }
    }

    #[test]
    fn test_riff_shape() {
        let riff = rock_riff(4);
        assert_eq!(riff.len(), 16); // 4 bars x 4 repetitions
        for (_, event) in riff.events() {
            assert_eq!(event.duration, PULSES_PER_BAR);
        }
        // Bar 4 of each repetition is the full minor triad.
        let fourth = &riff.events()[3].1;
        assert_eq!(fourth.pitches.len(), 3);
        assert!(fourth.pitches.iter().any(|p| p.midi == 46)); // Bb2
    }

    #[test]
    fn test_synthesis_is_straight_eighths() {
        let scale = test_scale();
        let mut rng = StdRng::seed_from_u64(5);
        let melody = synthesis_melody(&scale, 64, &mut rng);
        assert_eq!(melody.len(), 64);
        for (_, event) in melody.events() {
            assert_eq!(event.duration, PULSES_PER_QUARTER / 2);
            assert!(scale.contains(&event.pitches[0]));
        }
        assert_eq!(melody.total_duration(), quarters(32));
    }
}
