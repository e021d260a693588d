// MusicXML output from assembled scores.
//
// Converts a Score into a score-partwise MusicXML document, one part per
// voice. The approach mirrors midi.rs: walk each voice's timeline, collect
// note/rest items with durations, then serialize. The extra complexity here
// is measure layout. Durations must be expressed as power-of-two note
// values (with optional dots), notes crossing barlines are split into tied
// segments, and swung strokes carry a 3:2 time-modification instead of
// being decomposed.
//
// Detunings are written as fractional `alter` values (10 cents = 0.1), the
// standard MusicXML encoding for microtones. Percussion strokes are written
// at their raw MIDI keys as ordinary pitches on a bass staff.

use crate::timeline::{
    Event, Instrument, PULSES_PER_BAR, PULSES_PER_QUARTER, Pitch, Score, TempoMarker, Tuplet,
    VoiceTimeline,
};
use std::fmt::Write;
use std::path::Path;

/// MusicXML divisions per quarter note: the timeline's own pulse grid.
const DIVISIONS: u64 = PULSES_PER_QUARTER;

/// Step letter and alteration for each pitch class, matching the spellings
/// in timeline.rs. Pitch class 8 is spelled G# (the raised 4th of D), not
/// Ab, so the tivra Ma reads as an inflection of Ma.
const STEP_ALTER: [(&str, i8); 12] = [
    ("C", 0),
    ("C", 1),
    ("D", 0),
    ("E", -1),
    ("E", 0),
    ("F", 0),
    ("F", 1),
    ("G", 0),
    ("G", 1),
    ("A", 0),
    ("B", -1),
    ("B", 0),
];

/// Straight note values in pulses, largest first: (pulses, type, dotted).
const DURATION_TABLE: [(u64, &str, bool); 8] = [
    (48, "whole", false),
    (36, "half", true),
    (24, "half", false),
    (18, "quarter", true),
    (12, "quarter", false),
    (9, "eighth", true),
    (6, "eighth", false),
    (3, "16th", false),
];

/// Note type for the two swung values under a 3:2 grouping.
fn tuplet_type(pulses: u64) -> Option<&'static str> {
    match pulses {
        8 => Some("quarter"), // 2/3 of a beat
        4 => Some("eighth"),  // 1/3 of a beat
        _ => None,
    }
}

/// Decompose a straight duration into table values, largest first.
/// Remainders below a 16th are dropped.
fn decompose_duration(mut pulses: u64) -> Vec<(u64, &'static str, bool)> {
    let mut parts = Vec::new();
    for &(value, name, dotted) in &DURATION_TABLE {
        while pulses >= value {
            parts.push((value, name, dotted));
            pulses -= value;
        }
    }
    parts
}

/// Split a duration at barlines. A note starting at `start` that crosses a
/// barline is split into fragments that each fit within a single bar.
fn split_at_barlines(start: u64, duration: u64) -> Vec<u64> {
    let mut fragments = Vec::new();
    let mut remaining = duration;
    let mut pos = start;
    while remaining > 0 {
        let bar_end = (pos / PULSES_PER_BAR + 1) * PULSES_PER_BAR;
        let fragment = remaining.min(bar_end - pos);
        fragments.push(fragment);
        remaining -= fragment;
        pos += fragment;
    }
    fragments
}

/// One serializable note or rest, fully contained in a single measure.
struct Piece {
    start: u64,
    duration: u64,
    kind: PieceKind,
}

enum PieceKind {
    Rest {
        value: &'static str,
        dotted: bool,
    },
    Note {
        pitches: Vec<Pitch>,
        velocity: u16,
        value: &'static str,
        dotted: bool,
        tuplet: Option<Tuplet>,
        accent: bool,
        tie_start: bool,
        tie_stop: bool,
    },
}

/// Flatten a voice timeline into measure-sized pieces covering
/// `total_pulses`, with rests filling every gap.
fn layout_pieces(voice: &VoiceTimeline, total_pulses: u64) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut cursor = 0u64;

    let mut merged: Vec<(u64, Vec<Pitch>, Event)> = Vec::new();

    // First pass: merge simultaneous equal-length events (the two drone
    // strings) into single chords.
    for (offset, event) in voice.iter() {
        match merged.last_mut() {
            Some((prev_offset, pitches, prev_event))
                if *prev_offset == offset && prev_event.duration == event.duration =>
            {
                pitches.extend(event.pitches.iter().copied());
            }
            _ => merged.push((offset, event.pitches.clone(), event.clone())),
        }
    }

    // Second pass: explode into rest-filled, bar-split pieces.
    for (offset, pitches, event) in merged {
        if offset > cursor {
            push_rests(&mut pieces, cursor, offset - cursor);
        }
        // If a previous event overruns this one's offset, the new event is
        // pushed late to the running cursor; the seam is audible in the
        // MIDI but notation stays sequential.
        let start = cursor.max(offset);

        if let Some(tuplet) = event.tuplet {
            if let Some(value) = tuplet_type(event.duration) {
                pieces.push(Piece {
                    start,
                    duration: event.duration,
                    kind: PieceKind::Note {
                        pitches: pitches.clone(),
                        velocity: event.velocity,
                        value,
                        dotted: false,
                        tuplet: Some(tuplet),
                        accent: event.accent,
                        tie_start: false,
                        tie_stop: false,
                    },
                });
                cursor = start + event.duration;
                continue;
            }
        }

        let fragments = split_at_barlines(start, event.duration);
        let mut piece_specs = Vec::new();
        for fragment in fragments {
            piece_specs.extend(decompose_duration(fragment));
        }
        let last_index = piece_specs.len().saturating_sub(1);
        let mut piece_start = start;
        for (i, (duration, value, dotted)) in piece_specs.into_iter().enumerate() {
            pieces.push(Piece {
                start: piece_start,
                duration,
                kind: PieceKind::Note {
                    pitches: pitches.clone(),
                    velocity: event.velocity,
                    value,
                    dotted,
                    tuplet: None,
                    accent: event.accent && i == 0,
                    tie_start: i < last_index,
                    tie_stop: i > 0,
                },
            });
            piece_start += duration;
        }
        cursor = start + event.duration;
    }

    if cursor < total_pulses {
        push_rests(&mut pieces, cursor, total_pulses - cursor);
    }
    pieces
}

fn push_rests(pieces: &mut Vec<Piece>, start: u64, duration: u64) {
    let mut rest_start = start;
    for fragment in split_at_barlines(start, duration) {
        for (dur, value, dotted) in decompose_duration(fragment) {
            pieces.push(Piece {
                start: rest_start,
                duration: dur,
                kind: PieceKind::Rest { value, dotted },
            });
            rest_start += dur;
        }
    }
}

/// Render a Score as a complete MusicXML document.
pub fn render_score(score: &Score) -> String {
    // Pad every part to the same whole-measure length.
    let total_pulses = score.end().div_ceil(PULSES_PER_BAR) * PULSES_PER_BAR;

    let mut out = String::new();
    let _ = writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = writeln!(
        out,
        r#"<!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 4.0 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd">"#
    );
    let _ = writeln!(out, r#"<score-partwise version="4.0">"#);
    let _ = writeln!(
        out,
        "  <work><work-title>{}</work-title></work>",
        escape(&score.metadata.title)
    );
    let _ = writeln!(out, "  <identification>");
    let _ = writeln!(
        out,
        r#"    <creator type="composer">{}</creator>"#,
        escape(&score.metadata.composer)
    );
    let _ = writeln!(out, "  </identification>");

    let _ = writeln!(out, "  <part-list>");
    for (i, voice) in score.voices.iter().enumerate() {
        let _ = writeln!(
            out,
            r#"    <score-part id="P{}"><part-name>{}</part-name></score-part>"#,
            i + 1,
            escape(&voice.name)
        );
    }
    let _ = writeln!(out, "  </part-list>");

    for (i, voice) in score.voices.iter().enumerate() {
        // Tempo directions live in the first part only.
        let markers = if i == 0 {
            Some(score.tempo_markers.as_slice())
        } else {
            None
        };
        render_part(&mut out, voice, i + 1, total_pulses, markers);
    }

    let _ = writeln!(out, "</score-partwise>");
    out
}

/// Render a Score to MusicXML and write to a file.
pub fn write_musicxml(score: &Score, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::write(path, render_score(score))?;
    Ok(())
}

fn render_part(
    out: &mut String,
    voice: &VoiceTimeline,
    part_number: usize,
    total_pulses: u64,
    tempo_markers: Option<&[TempoMarker]>,
) {
    let pieces = layout_pieces(voice, total_pulses);
    let num_measures = total_pulses / PULSES_PER_BAR;

    let _ = writeln!(out, r#"  <part id="P{}">"#, part_number);
    let mut index = 0;
    for measure in 0..num_measures {
        let measure_start = measure * PULSES_PER_BAR;
        let measure_end = measure_start + PULSES_PER_BAR;
        let _ = writeln!(out, r#"    <measure number="{}">"#, measure + 1);

        if measure == 0 {
            let (clef_sign, clef_line) = clef_for(voice.instrument);
            let _ = writeln!(out, "      <attributes>");
            let _ = writeln!(out, "        <divisions>{}</divisions>", DIVISIONS);
            let _ = writeln!(out, "        <key><fifths>2</fifths></key>");
            let _ = writeln!(out, "        <time><beats>4</beats><beat-type>4</beat-type></time>");
            let _ = writeln!(
                out,
                "        <clef><sign>{}</sign><line>{}</line></clef>",
                clef_sign, clef_line
            );
            let _ = writeln!(out, "      </attributes>");
        }

        if let Some(markers) = tempo_markers {
            for marker in markers {
                if marker.offset >= measure_start && marker.offset < measure_end {
                    write_tempo_direction(out, marker);
                }
            }
        }

        while index < pieces.len() && pieces[index].start < measure_end {
            write_piece(out, &pieces[index]);
            index += 1;
        }

        let _ = writeln!(out, "    </measure>");
    }
    let _ = writeln!(out, "  </part>");
}

fn clef_for(instrument: Instrument) -> (&'static str, u8) {
    match instrument {
        Instrument::Sitar | Instrument::ElectricGuitar => ("G", 2),
        Instrument::Tanpura | Instrument::Cello | Instrument::Tabla => ("F", 4),
    }
}

fn write_tempo_direction(out: &mut String, marker: &TempoMarker) {
    let _ = writeln!(out, r#"      <direction placement="above">"#);
    let _ = writeln!(out, "        <direction-type>");
    let _ = writeln!(
        out,
        "          <metronome><beat-unit>quarter</beat-unit><per-minute>{}</per-minute></metronome>",
        marker.bpm
    );
    let _ = writeln!(out, "        </direction-type>");
    let _ = writeln!(out, r#"        <sound tempo="{}"/>"#, marker.bpm);
    let _ = writeln!(out, "      </direction>");
}

fn write_piece(out: &mut String, piece: &Piece) {
    match &piece.kind {
        PieceKind::Rest { value, dotted } => {
            let _ = writeln!(out, "      <note>");
            let _ = writeln!(out, "        <rest/>");
            let _ = writeln!(out, "        <duration>{}</duration>", piece.duration);
            let _ = writeln!(out, "        <type>{}</type>", value);
            if *dotted {
                let _ = writeln!(out, "        <dot/>");
            }
            let _ = writeln!(out, "      </note>");
        }
        PieceKind::Note {
            pitches,
            velocity,
            value,
            dotted,
            tuplet,
            accent,
            tie_start,
            tie_stop,
        } => {
            let dynamics = *velocity as f64 / 90.0 * 100.0;
            for (n, pitch) in pitches.iter().enumerate() {
                let _ = writeln!(out, r#"      <note dynamics="{:.0}">"#, dynamics);
                if n > 0 {
                    let _ = writeln!(out, "        <chord/>");
                }
                write_pitch(out, *pitch);
                let _ = writeln!(out, "        <duration>{}</duration>", piece.duration);
                if *tie_stop {
                    let _ = writeln!(out, r#"        <tie type="stop"/>"#);
                }
                if *tie_start {
                    let _ = writeln!(out, r#"        <tie type="start"/>"#);
                }
                let _ = writeln!(out, "        <type>{}</type>", value);
                if *dotted {
                    let _ = writeln!(out, "        <dot/>");
                }
                if let Some(t) = tuplet {
                    let _ = writeln!(
                        out,
                        "        <time-modification><actual-notes>{}</actual-notes><normal-notes>{}</normal-notes></time-modification>",
                        t.actual, t.normal
                    );
                }
                write_notations(out, *accent, *tie_start, *tie_stop);
                let _ = writeln!(out, "      </note>");
            }
        }
    }
}

fn write_pitch(out: &mut String, pitch: Pitch) {
    let (step, alter) = STEP_ALTER[(pitch.midi % 12) as usize];
    let octave = pitch.midi as i16 / 12 - 1;
    let _ = writeln!(out, "        <pitch>");
    let _ = writeln!(out, "          <step>{}</step>", step);
    if pitch.cents != 0.0 {
        // Fractional alteration: 10 cents = 0.1 of a semitone.
        let _ = writeln!(out, "          <alter>{}</alter>", alter as f64 + pitch.cents / 100.0);
    } else if alter != 0 {
        let _ = writeln!(out, "          <alter>{}</alter>", alter);
    }
    let _ = writeln!(out, "          <octave>{}</octave>", octave);
    let _ = writeln!(out, "        </pitch>");
}

fn write_notations(out: &mut String, accent: bool, tie_start: bool, tie_stop: bool) {
    if !accent && !tie_start && !tie_stop {
        return;
    }
    let _ = writeln!(out, "        <notations>");
    if tie_stop {
        let _ = writeln!(out, r#"          <tied type="stop"/>"#);
    }
    if tie_start {
        let _ = writeln!(out, r#"          <tied type="start"/>"#);
    }
    if accent {
        let _ = writeln!(out, "          <articulations><strong-accent/></articulations>");
    }
    let _ = writeln!(out, "        </notations>");
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
