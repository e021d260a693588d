// Score assembly: the movement plan, placement offsets, and tempo map.
//
// Placement offsets are additive constants computed from the *nominal*
// length of the preceding sections, never measured from what the generators
// actually produced. The alaap in particular may run up to one half note
// past its nominal 32 quarters, or stop a draw short of it; the seam at the
// fracture boundary is part of the piece and is not corrected here.
//
// The pipeline mirrors the movement order: generate every fragment, place
// each on its voice's timeline at the planned offset, attach the two tempo
// markers (the metric modulation into the rock section), and wrap the
// result with metadata. Nothing downstream mutates the Score.

use crate::movements;
use crate::raag;
use crate::tabla;
use crate::timeline::{
    Instrument, Metadata, PULSES_PER_BAR, Pitch, Score, TempoMarker, VoiceTimeline, quarters,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Knobs for one generation run. Loadable from JSON; every field falls back
/// to the canonical movement plan when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfig {
    pub title: String,
    pub composer: String,
    /// Root of the raag as note name + octave ("D4").
    pub root: String,
    /// Nominal alaap length in quarter notes.
    pub alaap_quarters: u64,
    /// Number of clash chords in the fracture texture.
    pub fracture_steps: usize,
    /// Repetitions of the 4-bar riff progression.
    pub riff_repetitions: usize,
    /// Keherwa cycles under the rock section.
    pub drum_cycles: usize,
    /// Bars of straight-eighths synthesis melody.
    pub synthesis_bars: u64,
    /// Opening tempo (the ghazal feel), in BPM.
    pub base_tempo: u16,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        CompositionConfig {
            title: "Sahar-e-Nau: Symphony of the Awakening".to_string(),
            composer: "Faiz Fusion Project".to_string(),
            root: "D4".to_string(),
            alaap_quarters: 32,
            fracture_steps: 16,
            riff_repetitions: 4,
            drum_cycles: 16,
            synthesis_bars: 8,
            base_tempo: 72,
        }
    }
}

impl CompositionConfig {
    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        let config: CompositionConfig = serde_json::from_str(&data)?;
        Ok(config)
    }

    /// Nominal start of the fracture movement: right after the alaap.
    pub fn fracture_start(&self) -> u64 {
        quarters(self.alaap_quarters)
    }

    /// Nominal start of the rock movement: fracture start plus the planned
    /// fracture length (2 quarters per clash chord).
    pub fn riff_start(&self) -> u64 {
        self.fracture_start() + quarters(2 * self.fracture_steps as u64)
    }

    /// Nominal start of the synthesis movement: riff start plus the planned
    /// riff length (4 bars per repetition).
    pub fn synthesis_start(&self) -> u64 {
        self.riff_start() + self.riff_repetitions as u64 * 4 * PULSES_PER_BAR
    }

    /// Tempo of the rock section: metric modulation by 3:2.
    pub fn rock_tempo(&self) -> u16 {
        self.base_tempo + self.base_tempo / 2
    }
}

/// Generate every movement and assemble the full score.
///
/// The `root` has already been resolved from the config's note name by the
/// caller; an invalid name never reaches this far.
pub fn build_score(config: &CompositionConfig, root: Pitch, rng: &mut impl Rng) -> Score {
    let scale = raag::yaman_scale(root);

    let alaap = movements::alaap(&scale, quarters(config.alaap_quarters), rng);
    let drone = movements::sitar_drone();
    let fracture = movements::fracture_texture(config.fracture_steps);
    let riff = movements::rock_riff(config.riff_repetitions);
    let cycle = tabla::keherwa_cycle();
    let synthesis = movements::synthesis_melody(&scale, (config.synthesis_bars * 8) as usize, rng);

    let mut sitar = VoiceTimeline::new("Sitar", Instrument::Sitar);
    sitar.place(&alaap, 0);
    sitar.place(&synthesis, config.synthesis_start());

    let mut tanpura = VoiceTimeline::new("Tanpura", Instrument::Tanpura);
    tanpura.place(&drone, 0);

    let mut cello = VoiceTimeline::new("Cello", Instrument::Cello);
    cello.place(&fracture, config.fracture_start());

    let mut guitar = VoiceTimeline::new("Guitar", Instrument::ElectricGuitar);
    guitar.place(&riff, config.riff_start());

    // The cycle repeats by duplication, one bar apart, at its nominal
    // length, not at whatever length a cycle happens to have.
    let mut drums = VoiceTimeline::new("Tabla", Instrument::Tabla);
    for i in 0..config.drum_cycles as u64 {
        drums.place(&cycle, config.riff_start() + i * PULSES_PER_BAR);
    }

    Score {
        metadata: Metadata {
            title: config.title.clone(),
            composer: config.composer.clone(),
        },
        voices: vec![sitar, tanpura, cello, guitar, drums],
        tempo_markers: vec![
            TempoMarker {
                offset: 0,
                bpm: config.base_tempo,
            },
            TempoMarker {
                offset: config.riff_start(),
                bpm: config.rock_tempo(),
            },
        ],
    }
}
