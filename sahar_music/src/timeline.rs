// The event timeline: the central representation for score assembly.
//
// Time is measured in integer pulses at 12 pulses per quarter note. Twelve
// divides evenly by 2, 3, 4, and 6, so straight eighths (6 pulses), swung
// triplet pairs (8 + 4), and dotted values are all exact integers, and
// section-boundary arithmetic never accumulates floating-point error.
//
// A Fragment is one generated musical idea with offsets relative to its own
// start. A VoiceTimeline is a per-instrument map from global pulse offset to
// the events sounding there, built by placing fragments at precomputed
// offsets. The Score aggregates voice timelines, tempo markers, and metadata.
//
// The Score is the "source of truth" for the exporters: MIDI and MusicXML
// are derived from it, never the other way around.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pulses per quarter note.
pub const PULSES_PER_QUARTER: u64 = 12;

/// Pulses per bar of 4/4, the only meter in the piece.
pub const PULSES_PER_BAR: u64 = 4 * PULSES_PER_QUARTER;

/// Convert a whole number of quarter notes to pulses.
pub fn quarters(n: u64) -> u64 {
    n * PULSES_PER_QUARTER
}

/// Pitch class names using the spellings conventional for D-rooted material
/// (indexed by pitch class 0-11). Pitch class 8 is spelled G#, the raised
/// 4th of D, not Ab.
const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "Eb", "E", "F", "F#", "G", "G#", "A", "Bb", "B",
];

/// A pitch: MIDI note number plus a fractional detuning offset in cents.
///
/// The detuning is a bounded real-valued offset (normally within ±50 cents),
/// not a discrete pitch class. Almost every pitch in the piece has zero
/// cents; the exception is the tivra Ma, sharpened by convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pitch {
    /// MIDI note number (middle C = 60, D4 = 62).
    pub midi: u8,
    /// Detuning in cents relative to the equal-tempered note.
    pub cents: f64,
}

impl Pitch {
    pub fn new(midi: u8) -> Self {
        Pitch { midi, cents: 0.0 }
    }

    pub fn detuned(midi: u8, cents: f64) -> Self {
        Pitch { midi, cents }
    }

    /// Transpose by a signed number of semitones. The detuning is carried
    /// along unchanged.
    pub fn transpose(self, semitones: i8) -> Self {
        Pitch {
            midi: (self.midi as i16 + semitones as i16).clamp(0, 127) as u8,
            cents: self.cents,
        }
    }

    /// Note name with octave in scientific pitch notation ("D4", "F#3").
    pub fn name(self) -> String {
        let pc = (self.midi % 12) as usize;
        let octave = self.midi as i16 / 12 - 1;
        format!("{}{}", PITCH_CLASS_NAMES[pc], octave)
    }

    /// Parse a note name with octave ("D4", "F#3", "Bb2"). Returns None for
    /// anything that isn't a letter, an optional single accidental, and an
    /// octave number.
    pub fn parse(name: &str) -> Option<Pitch> {
        let mut chars = name.chars();
        let letter = chars.next()?;
        let mut pc: i16 = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return None,
        };
        let rest: String = chars.collect();
        let octave_str = if let Some(stripped) = rest.strip_prefix('#') {
            pc += 1;
            stripped
        } else if let Some(stripped) = rest.strip_prefix('b') {
            pc -= 1;
            stripped
        } else {
            rest.as_str()
        };
        let octave: i16 = octave_str.parse().ok()?;
        let midi = (octave + 1) * 12 + pc;
        if (0..=127).contains(&midi) {
            Some(Pitch::new(midi as u8))
        } else {
            None
        }
    }
}

/// Irregular rhythmic grouping marker: `actual` notes in the time of
/// `normal`. The keherwa theka uses 3:2 throughout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tuplet {
    pub actual: u8,
    pub normal: u8,
}

impl Tuplet {
    /// The 3-against-2 grouping used for swung beat subdivision.
    pub fn triplet() -> Self {
        Tuplet {
            actual: 3,
            normal: 2,
        }
    }
}

/// One timed sound: a single pitch or a chord, with duration and loudness.
/// Events are immutable once created; the builder methods consume and
/// return by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// One pitch for a plain note, several for a chord.
    pub pitches: Vec<Pitch>,
    /// Duration in pulses.
    pub duration: u64,
    /// Loudness as a MIDI-style velocity. Deliberately wider than the 0-127
    /// wire range: generators may ramp past it, and only the MIDI exporter
    /// clamps.
    pub velocity: u16,
    /// Irregular grouping this event belongs to, if any.
    pub tuplet: Option<Tuplet>,
    /// Strong-accent articulation.
    pub accent: bool,
}

impl Event {
    pub fn note(pitch: Pitch, duration: u64, velocity: u16) -> Self {
        Event {
            pitches: vec![pitch],
            duration,
            velocity,
            tuplet: None,
            accent: false,
        }
    }

    pub fn chord(pitches: Vec<Pitch>, duration: u64, velocity: u16) -> Self {
        Event {
            pitches,
            duration,
            velocity,
            tuplet: None,
            accent: false,
        }
    }

    pub fn with_tuplet(mut self, tuplet: Tuplet) -> Self {
        self.tuplet = Some(tuplet);
        self
    }

    pub fn with_accent(mut self) -> Self {
        self.accent = true;
        self
    }

    pub fn is_chord(&self) -> bool {
        self.pitches.len() > 1
    }
}

/// An ordered sequence of (offset, Event) pairs relative to the fragment's
/// own start at offset 0. Produced once by a generator and never mutated
/// after it is returned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fragment {
    events: Vec<(u64, Event)>,
}

impl Fragment {
    pub fn new() -> Self {
        Fragment::default()
    }

    /// Insert an event at an explicit local offset.
    pub fn insert(&mut self, offset: u64, event: Event) {
        self.events.push((offset, event));
    }

    /// Append an event at the current end of the fragment.
    pub fn append(&mut self, event: Event) {
        let at = self.total_duration();
        self.events.push((at, event));
    }

    pub fn events(&self) -> &[(u64, Event)] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Actual extent: the largest offset-plus-duration of any event. May
    /// differ from the nominal section length the conductor plans with.
    pub fn total_duration(&self) -> u64 {
        self.events
            .iter()
            .map(|(offset, event)| offset + event.duration)
            .max()
            .unwrap_or(0)
    }
}

/// The instruments of the piece, with their General MIDI assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instrument {
    Sitar,
    /// The drone strings. Rendered with the sitar program an octave of
    /// sympathetic resonance below the melody.
    Tanpura,
    Cello,
    ElectricGuitar,
    Tabla,
}

impl Instrument {
    /// General MIDI program number (zero-based).
    pub fn gm_program(self) -> u8 {
        match self {
            Instrument::Sitar | Instrument::Tanpura => 104,
            Instrument::Cello => 42,
            Instrument::ElectricGuitar => 29, // overdriven guitar
            Instrument::Tabla => 0,           // standard kit on the percussion channel
        }
    }

    /// Percussion instruments play on MIDI channel 10 with key-mapped sounds.
    pub fn is_percussion(self) -> bool {
        matches!(self, Instrument::Tabla)
    }
}

/// A per-instrument timeline: global pulse offset to the events starting
/// there. Multiple events may share an offset (the two drone strings both
/// enter at 0), so each key holds a list in insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceTimeline {
    pub name: String,
    pub instrument: Instrument,
    pub events: BTreeMap<u64, Vec<Event>>,
}

impl VoiceTimeline {
    pub fn new(name: &str, instrument: Instrument) -> Self {
        VoiceTimeline {
            name: name.to_string(),
            instrument,
            events: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, offset: u64, event: Event) {
        self.events.entry(offset).or_default().push(event);
    }

    /// Place a fragment: shift every (local offset, event) pair by `at` and
    /// merge into this timeline. The fragment's internal ordering is
    /// preserved; nothing about the placement is adjusted to what the
    /// fragment actually contains.
    pub fn place(&mut self, fragment: &Fragment, at: u64) {
        for (offset, event) in fragment.events() {
            self.insert(at + offset, event.clone());
        }
    }

    /// Iterate all events in offset order (insertion order within an offset).
    pub fn iter(&self) -> impl Iterator<Item = (u64, &Event)> {
        self.events
            .iter()
            .flat_map(|(&offset, events)| events.iter().map(move |e| (offset, e)))
    }

    pub fn event_count(&self) -> usize {
        self.events.values().map(Vec::len).sum()
    }

    /// The last sounding pulse (end of the latest-ending event).
    pub fn end(&self) -> u64 {
        self.iter()
            .map(|(offset, event)| offset + event.duration)
            .max()
            .unwrap_or(0)
    }
}

/// A global tempo instruction: beats per minute from a given offset on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoMarker {
    pub offset: u64,
    pub bpm: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: String,
    pub composer: String,
}

/// The finished composition: built in one pass by the conductor, then handed
/// to the exporters. Never mutated after assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    pub metadata: Metadata,
    pub voices: Vec<VoiceTimeline>,
    pub tempo_markers: Vec<TempoMarker>,
}

impl Score {
    pub fn voice(&self, name: &str) -> Option<&VoiceTimeline> {
        self.voices.iter().find(|v| v.name == name)
    }

    /// Total extent in pulses across all voices.
    pub fn end(&self) -> u64 {
        self.voices.iter().map(VoiceTimeline::end).max().unwrap_or(0)
    }

    /// Compact text summary for console narration.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for voice in &self.voices {
            out.push_str(&format!(
                "{:>8}: {:3} events, pulses 0..{} ({:.1} bars)\n",
                voice.name,
                voice.event_count(),
                voice.end(),
                voice.end() as f64 / PULSES_PER_BAR as f64,
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_name_roundtrip() {
        for name in ["D4", "F#3", "Bb2", "G#3", "C0", "G9"] {
            let pitch = Pitch::parse(name).unwrap();
            assert_eq!(pitch.name(), name, "for {}", name);
        }
        // The canonical cases used throughout the piece.
        assert_eq!(Pitch::parse("D4").unwrap().midi, 62);
        assert_eq!(Pitch::parse("D3").unwrap().midi, 50);
        assert_eq!(Pitch::parse("A2").unwrap().midi, 45);
        assert!(Pitch::parse("H4").is_none());
        assert!(Pitch::parse("D").is_none());
    }

    #[test]
    fn test_transpose_carries_cents() {
        let detuned = Pitch::detuned(62, 10.0);
        let up = detuned.transpose(7);
        assert_eq!(up.midi, 69);
        assert_eq!(up.cents, 10.0);
    }

    #[test]
    fn test_fragment_append_advances() {
        let mut fragment = Fragment::new();
        fragment.append(Event::note(Pitch::new(62), 12, 90));
        fragment.append(Event::note(Pitch::new(64), 6, 90));
        assert_eq!(fragment.events()[0].0, 0);
        assert_eq!(fragment.events()[1].0, 12);
        assert_eq!(fragment.total_duration(), 18);
    }

    #[test]
    fn test_fragment_insert_overlap_keeps_extent() {
        let mut fragment = Fragment::new();
        fragment.insert(0, Event::note(Pitch::new(50), 1200, 30));
        fragment.insert(0, Event::note(Pitch::new(57), 1200, 30));
        assert_eq!(fragment.len(), 2);
        assert_eq!(fragment.total_duration(), 1200);
    }

    #[test]
    fn test_place_preserves_fragment_order() {
        let mut first = Fragment::new();
        first.append(Event::note(Pitch::new(62), 12, 90));
        first.append(Event::note(Pitch::new(64), 12, 90));
        let mut second = Fragment::new();
        second.append(Event::note(Pitch::new(66), 6, 90));
        second.append(Event::note(Pitch::new(67), 6, 90));

        let mut voice = VoiceTimeline::new("Sitar", Instrument::Sitar);
        voice.place(&first, 0);
        voice.place(&second, 48);

        let offsets: Vec<u64> = voice.iter().map(|(offset, _)| offset).collect();
        assert_eq!(offsets, vec![0, 12, 48, 54]);
        let pitches: Vec<u8> = voice.iter().map(|(_, e)| e.pitches[0].midi).collect();
        assert_eq!(pitches, vec![62, 64, 66, 67]);
    }

    #[test]
    fn test_shared_offset_keeps_insertion_order() {
        let mut voice = VoiceTimeline::new("Tanpura", Instrument::Tanpura);
        voice.insert(0, Event::note(Pitch::new(50), 48, 30));
        voice.insert(0, Event::note(Pitch::new(57), 48, 30));
        let pitches: Vec<u8> = voice.iter().map(|(_, e)| e.pitches[0].midi).collect();
        assert_eq!(pitches, vec![50, 57]);
        assert_eq!(voice.event_count(), 2);
    }
}
