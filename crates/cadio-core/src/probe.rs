//! Content-based format probing
//!
//! A probe is a pure function inspecting a bounded byte window from the start
//! of a file plus a full-size hint, and answering a [`Format`] or
//! [`Format::Unknown`]. Probes never perform I/O themselves, tolerate windows
//! shorter than they would like, and never panic on malformed input.
//!
//! The predefined probes cover STEP, IGES, OpenCascade B-rep, STL (binary and
//! ASCII) and Wavefront OBJ. Registries run probes in registration order and
//! the first non-`Unknown` answer wins, so order is semantically significant.

use crate::format::Format;
use once_cell::sync::Lazy;
use std::path::Path;

/// Size in bytes of the authoritative probing window
///
/// Dispatchers hand probes at most this many bytes (zero-filled for shorter
/// files); probes must not require more.
pub const PROBE_WINDOW_SIZE: usize = 2048;

/// Input of a single probe call, immutable for its duration
#[derive(Debug, Clone, Copy)]
pub struct FormatProbeInput<'a> {
    /// Path of the probed file (for suffix-aware probes)
    pub filepath: &'a Path,
    /// Leading bytes of the file, at most [`PROBE_WINDOW_SIZE`]
    pub contents_prefix: &'a [u8],
    /// Exact size of the whole file in bytes
    pub hint_full_size: u64,
}

/// A registered format probe
///
/// Pure `FormatProbeInput -> Format` function; returns [`Format::Unknown`]
/// when undecided.
pub type FormatProbe = Box<dyn Fn(&FormatProbeInput<'_>) -> Format + Send + Sync>;

/// Strip leading ASCII whitespace from a byte slice
fn skip_ascii_space(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

/// Probe for STEP (ISO 10303-21) exchange files
///
/// Accepts a prefix matching `^\s*ISO-10303-21\s*;\s*HEADER`.
#[must_use = "probes return the detected format"]
pub fn probe_step(input: &FormatProbeInput<'_>) -> Format {
    const ISO_ID: &[u8] = b"ISO-10303-21";
    const HEADER_TOKEN: &[u8] = b"HEADER";

    let rest = skip_ascii_space(input.contents_prefix);
    let Some(rest) = rest.strip_prefix(ISO_ID) else {
        return Format::Unknown;
    };
    let rest = skip_ascii_space(rest);
    let Some(rest) = rest.strip_prefix(b";".as_slice()) else {
        return Format::Unknown;
    };
    if skip_ascii_space(rest).starts_with(HEADER_TOKEN) {
        Format::Step
    } else {
        Format::Unknown
    }
}

/// Probe for IGES exchange files
///
/// An IGES file starts with a "start section" line: column 73 (byte offset 72)
/// carries the section letter `S`, columns 74..80 a right-aligned sequence
/// number. Accepts when that sequence number parses to 1 and the line
/// terminates at offset 80. Byte offset 80 is inspected, so the effective
/// minimum sample is 81 bytes.
#[must_use = "probes return the detected format"]
pub fn probe_iges(input: &FormatProbeInput<'_>) -> Format {
    let sample = input.contents_prefix;
    if sample.len() <= 80 || sample[72] != b'S' {
        return Format::Unknown;
    }
    if !sample[73..80]
        .iter()
        .all(|&b| b == b' ' || b.is_ascii_digit())
    {
        return Format::Unknown;
    }
    if !matches!(sample[80], b'\n' | b'\r' | b'\x0c') {
        return Format::Unknown;
    }

    // atoi semantics: skip leading spaces, then digits up to the first
    // non-digit
    let field = &sample[73..80];
    let digits = skip_ascii_space(field);
    let end = digits
        .iter()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    let mut value: u32 = 0;
    for &b in &digits[..end] {
        value = value.saturating_mul(10).saturating_add(u32::from(b - b'0'));
    }
    if end > 0 && value == 1 {
        Format::Iges
    } else {
        Format::Unknown
    }
}

/// Probe for OpenCascade B-rep shape dumps
///
/// Accepts a prefix matching `^\s*DBRep_DrawableShape`.
#[must_use = "probes return the detected format"]
pub fn probe_occbrep(input: &FormatProbeInput<'_>) -> Format {
    const OCC_BREP_TOKEN: &[u8] = b"DBRep_DrawableShape";
    if skip_ascii_space(input.contents_prefix).starts_with(OCC_BREP_TOKEN) {
        Format::OccBrep
    } else {
        Format::Unknown
    }
}

/// Probe for STL meshes, binary branch first then ASCII fallback
///
/// Binary STL is an 80-byte header, a little-endian `u32` facet count and 50
/// bytes per facet (12 `f32` plus a `u16` attribute). The binary branch
/// accepts only when `84 + 50 * facet_count` equals the full-size hint
/// exactly. The ASCII branch accepts a prefix matching `^\s*solid`.
#[must_use = "probes return the detected format"]
pub fn probe_stl(input: &FormatProbeInput<'_>) -> Format {
    const BINARY_HEADER_SIZE: usize = 80 + std::mem::size_of::<u32>();
    const FACET_SIZE: u64 = (std::mem::size_of::<f32>() as u64) * 12 + 2;

    let sample = input.contents_prefix;
    if sample.len() >= BINARY_HEADER_SIZE {
        let facet_count = u32::from_le_bytes([sample[80], sample[81], sample[82], sample[83]]);
        let expected_size = FACET_SIZE * u64::from(facet_count) + BINARY_HEADER_SIZE as u64;
        if expected_size == input.hint_full_size {
            return Format::Stl;
        }
    }

    const ASCII_TOKEN: &[u8] = b"solid";
    if skip_ascii_space(sample).starts_with(ASCII_TOKEN) {
        return Format::Stl;
    }

    Format::Unknown
}

/// Probe for Wavefront OBJ meshes
///
/// Accepts when some line begins (after leading whitespace) with one of the
/// vertex directives `v`, `vt`, `vn`, `vp` or `surf`, followed by whitespace
/// and a signed decimal number.
#[must_use = "probes return the detected format"]
pub fn probe_obj(input: &FormatProbeInput<'_>) -> Format {
    // Bytes regex: probe windows routinely hold non-UTF-8 data. Longer
    // directives listed before the bare `v`.
    static OBJ_DIRECTIVE: Lazy<regex::bytes::Regex> = Lazy::new(|| {
        regex::bytes::Regex::new(r"(?m)(?-u)^\s*(?:vt|vn|vp|surf|v)\s+[-+]?[0-9.]+")
            .expect("valid OBJ directive regex")
    });

    if OBJ_DIRECTIVE.is_match(input.contents_prefix) {
        Format::Obj
    } else {
        Format::Unknown
    }
}
