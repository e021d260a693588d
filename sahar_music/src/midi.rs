// MIDI output from assembled scores.
//
// Converts a Score into a Standard MIDI File (SMF) for playback. Track 0
// carries the tempo map; each voice maps to its own track and channel, with
// the tabla on channel 10 (index 9) where General MIDI keys select drum
// sounds. Score pulses scale to 480-tick MIDI resolution.
//
// Detunings are realized as pitch-bend messages assuming the GM default
// bend range of ±200 cents. A bend is sent before a note only when the
// channel's current bend value actually changes, so undetuned passages
// carry no bend traffic.
//
// Velocities are clamped to the 0-127 wire range here and nowhere else.
//
// Uses the `midly` crate. Output is SMF Format 1 (multi-track).

use crate::timeline::{PULSES_PER_QUARTER, Score, VoiceTimeline};
use midly::{
    Format, Header, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u14, u15, u24, u28},
};
use std::path::Path;

/// Ticks per quarter note in MIDI output.
const TICKS_PER_QUARTER: u16 = 480;

/// Ticks per timeline pulse.
const TICKS_PER_PULSE: u64 = TICKS_PER_QUARTER as u64 / PULSES_PER_QUARTER;

/// Center (no detuning) pitch-bend value.
const BEND_CENTER: u16 = 8192;

/// Assumed pitch-bend range in cents (GM default: ±2 semitones).
const BEND_RANGE_CENTS: f64 = 200.0;

/// Convert a Score to MIDI and write to a file.
pub fn write_midi(score: &Score, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let smf = score_to_smf(score);
    let mut buf = Vec::new();
    smf.write(&mut buf)?;
    std::fs::write(path, &buf)?;
    Ok(())
}

/// Convert a Score to an in-memory SMF. Public so tests can inspect the
/// event stream without touching the filesystem.
pub fn score_to_smf(score: &Score) -> Smf<'_> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    // Track 0: the tempo map.
    let mut tempo_track: Track<'_> = Vec::new();
    let mut last_tick: u64 = 0;
    for marker in &score.tempo_markers {
        let tick = marker.offset * TICKS_PER_PULSE;
        let microseconds = 60_000_000 / marker.bpm as u32;
        tempo_track.push(TrackEvent {
            delta: u28::new((tick - last_tick) as u32),
            kind: TrackEventKind::Meta(midly::MetaMessage::Tempo(u24::new(microseconds))),
        });
        last_tick = tick;
    }
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::EndOfTrack),
    });
    smf.tracks.push(tempo_track);

    // One track per voice. Melodic voices take channels 0.. in order,
    // skipping the percussion channel.
    let mut next_channel: u8 = 0;
    for voice in &score.voices {
        let channel = if voice.instrument.is_percussion() {
            u4::new(9)
        } else {
            let ch = next_channel;
            next_channel += if next_channel == 8 { 2 } else { 1 };
            u4::new(ch)
        };
        smf.tracks.push(voice_track(voice, channel));
    }

    smf
}

/// The on/off/bend edges of a voice, before delta encoding.
enum EdgeKind {
    Off { key: u8 },
    Bend { value: u16 },
    On { key: u8, vel: u8 },
}

fn voice_track(voice: &VoiceTimeline, channel: u4) -> Track<'_> {
    let mut track: Track<'_> = Vec::new();

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::TrackName(voice.name.as_bytes())),
    });
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange {
                program: u7::new(voice.instrument.gm_program()),
            },
        },
    });

    // Collect edges, then sort. Order within a tick: offs, then the bend
    // for the incoming note, then ons, so a repeated pitch retriggers and
    // the bend is in place before the attack.
    let mut edges: Vec<(u64, u8, EdgeKind)> = Vec::new();
    for (offset, event) in voice.iter() {
        let on_tick = offset * TICKS_PER_PULSE;
        let off_tick = (offset + event.duration) * TICKS_PER_PULSE;
        let vel = event.velocity.min(127) as u8;

        if !voice.instrument.is_percussion() {
            let value = bend_value(event.pitches.first().map_or(0.0, |p| p.cents));
            edges.push((on_tick, 1, EdgeKind::Bend { value }));
        }
        for pitch in &event.pitches {
            edges.push((on_tick, 2, EdgeKind::On { key: pitch.midi, vel }));
            edges.push((off_tick, 0, EdgeKind::Off { key: pitch.midi }));
        }
    }
    edges.sort_by_key(|edge| (edge.0, edge.1));

    let mut last_tick: u64 = 0;
    let mut last_bend = BEND_CENTER;
    for (tick, _, kind) in edges {
        let message = match kind {
            EdgeKind::Off { key } => MidiMessage::NoteOff {
                key: u7::new(key),
                vel: u7::new(0),
            },
            EdgeKind::Bend { value } => {
                if value == last_bend {
                    continue;
                }
                last_bend = value;
                MidiMessage::PitchBend {
                    bend: midly::PitchBend(u14::new(value)),
                }
            }
            EdgeKind::On { key, vel } => MidiMessage::NoteOn {
                key: u7::new(key),
                vel: u7::new(vel),
            },
        };
        track.push(TrackEvent {
            delta: u28::new((tick - last_tick) as u32),
            kind: TrackEventKind::Midi { channel, message },
        });
        last_tick = tick;
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::EndOfTrack),
    });
    track
}

/// Map a cent detuning to a 14-bit pitch-bend value.
fn bend_value(cents: f64) -> u16 {
    let offset = cents / BEND_RANGE_CENTS * 8192.0;
    (BEND_CENTER as f64 + offset).round().clamp(0.0, 16383.0) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conductor::{CompositionConfig, build_score};
    use crate::timeline::{Event, Instrument, Metadata, Pitch, TempoMarker, VoiceTimeline};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn single_voice_score(voice: VoiceTimeline) -> Score {
        Score {
            metadata: Metadata {
                title: "t".to_string(),
                composer: "c".to_string(),
            },
            voices: vec![voice],
            tempo_markers: vec![TempoMarker { offset: 0, bpm: 72 }],
        }
    }

    #[test]
    fn test_full_score_track_count() {
        let config = CompositionConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let score = build_score(&config, Pitch::new(62), &mut rng);
        let smf = score_to_smf(&score);
        // 1 tempo track + 5 voices.
        assert_eq!(smf.tracks.len(), 6);

        let tempo_events = smf.tracks[0]
            .iter()
            .filter(|e| matches!(e.kind, TrackEventKind::Meta(midly::MetaMessage::Tempo(_))))
            .count();
        assert_eq!(tempo_events, 2);
    }

    #[test]
    fn test_velocity_clamps_at_the_wire() {
        let mut voice = VoiceTimeline::new("Loud", Instrument::Cello);
        voice.insert(0, Event::note(Pitch::new(60), 12, 300));
        let score = single_voice_score(voice);
        let smf = score_to_smf(&score);
        let clamped = smf.tracks[1].iter().any(|e| {
            matches!(
                e.kind,
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOn { vel, .. },
                    ..
                } if vel == u7::new(127)
            )
        });
        assert!(clamped);
    }

    #[test]
    fn test_detuned_note_emits_bend() {
        let mut voice = VoiceTimeline::new("Sitar", Instrument::Sitar);
        voice.insert(0, Event::note(Pitch::new(62), 12, 90));
        voice.insert(12, Event::note(Pitch::detuned(68, 10.0), 12, 90));
        voice.insert(24, Event::note(Pitch::new(69), 12, 90));
        let score = single_voice_score(voice);
        let smf = score_to_smf(&score);

        let bends: Vec<u16> = smf.tracks[1]
            .iter()
            .filter_map(|e| match e.kind {
                TrackEventKind::Midi {
                    message: MidiMessage::PitchBend { bend },
                    ..
                } => Some(bend.0.as_int()),
                _ => None,
            })
            .collect();
        // Sharp bend before the tivra Ma, reset before the next plain note,
        // nothing before the opening undetuned note.
        assert_eq!(bends.len(), 2);
        assert!(bends[0] > BEND_CENTER);
        assert_eq!(bends[1], BEND_CENTER);
    }

    #[test]
    fn test_percussion_goes_to_channel_ten() {
        let mut voice = VoiceTimeline::new("Tabla", Instrument::Tabla);
        voice.place(&crate::tabla::keherwa_cycle(), 0);
        let score = single_voice_score(voice);
        let smf = score_to_smf(&score);

        let mut note_ons = 0;
        for event in smf.tracks[1].iter() {
            if let TrackEventKind::Midi { channel, message } = event.kind {
                assert_eq!(channel, u4::new(9));
                if matches!(message, MidiMessage::NoteOn { .. }) {
                    note_ons += 1;
                }
            }
        }
        // 8 strokes, two of them double (Dha, Dhin).
        assert_eq!(note_ons, 10);
    }

    #[test]
    fn test_bend_value_mapping() {
        assert_eq!(bend_value(0.0), BEND_CENTER);
        assert_eq!(bend_value(10.0), 8602); // +10 cents over a 200-cent range
        assert_eq!(bend_value(-200.0), 0);
    }
}
