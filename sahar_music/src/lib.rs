// Sahar-e-Nau Score Generator
//
// Generates the fixed four-movement fusion composition "Sahar-e-Nau":
// a free-time alaap in Raag Yaman over a tanpura drone, a dissonant
// fracture texture grinding shuddha Ma against tivra Ma, a power-chord
// rock movement with a swung keherwa cycle underneath, and a synthesis
// movement locking the sitar to the rock grid. Output is Standard MIDI
// and MusicXML.
//
// Architecture:
// - timeline.rs: core representation (pulse grid, events, fragments,
//   voice timelines, the Score)
// - raag.rs: Raag Yaman scale with the detuned tivra Ma, harmonic tables
// - tabla.rs: percussion stroke map and the keherwa theka
// - movements.rs: fragment generators for the four movements
// - conductor.rs: movement plan, placement offsets, tempo map, assembly
// - midi.rs: Standard MIDI File output from completed scores
// - musicxml.rs: MusicXML output for notation software
//
// The generator is deterministic given a seed, supporting reproducible
// output.

pub mod conductor;
pub mod midi;
pub mod movements;
pub mod musicxml;
pub mod raag;
pub mod tabla;
pub mod timeline;
