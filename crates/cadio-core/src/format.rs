//! Format identity for CAD file exchange
//!
//! This module defines the [`Format`] enum which tags the CAD file formats the
//! engine can route to readers and writers, plus the canonical file-suffix
//! lists used by suffix-based detection fallback.

use serde::{Deserialize, Serialize};

/// CAD file format tag
///
/// `Unknown` is the sentinel for "no rule matched"; a successful content probe
/// never answers `Unknown`. Formats without a shipped prober still take part
/// in suffix fallback once a factory advertising them is registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Format {
    /// Format could not be determined
    #[default]
    Unknown,
    /// STEP (ISO 10303-21) exchange file
    Step,
    /// IGES exchange file
    Iges,
    /// OpenCascade native B-rep dump
    #[serde(rename = "OCCBREP")]
    OccBrep,
    /// STL triangle mesh (ASCII or binary)
    Stl,
    /// Wavefront OBJ mesh
    Obj,
    /// Polygon File Format mesh
    Ply,
    /// AutoCAD Drawing Exchange Format
    Dxf,
    /// GL Transmission Format (JSON or binary)
    Gltf,
    /// VRML scene
    Vrml,
    /// Additive Manufacturing Format
    Amf,
    /// Object File Format mesh
    Off,
}

impl Format {
    /// Canonical file suffixes for this format, without the leading dot
    ///
    /// The first entry is the preferred suffix. `Unknown` has none.
    #[inline]
    #[must_use = "returns the canonical file suffixes for this format"]
    pub const fn file_suffixes(&self) -> &'static [&'static str] {
        match self {
            Self::Unknown => &[],
            Self::Step => &["step", "stp"],
            Self::Iges => &["iges", "igs"],
            Self::OccBrep => &["brep", "rle"],
            Self::Stl => &["stl"],
            Self::Obj => &["obj"],
            Self::Ply => &["ply"],
            Self::Dxf => &["dxf"],
            Self::Gltf => &["gltf", "glb"],
            Self::Vrml => &["wrl", "vrml"],
            Self::Amf => &["amf"],
            Self::Off => &["off"],
        }
    }

    /// Detect a format from a bare file suffix (ASCII case-insensitive)
    #[must_use = "detects a format from a file suffix"]
    pub fn from_file_suffix(suffix: &str) -> Option<Self> {
        const ALL: &[Format] = &[
            Format::Step,
            Format::Iges,
            Format::OccBrep,
            Format::Stl,
            Format::Obj,
            Format::Ply,
            Format::Dxf,
            Format::Gltf,
            Format::Vrml,
            Format::Amf,
            Format::Off,
        ];
        ALL.iter()
            .copied()
            .find(|format| format.matches_file_suffix(suffix))
    }

    /// Check whether `suffix` is one of this format's canonical suffixes
    /// (ASCII case-insensitive, classic-locale semantics)
    #[inline]
    #[must_use = "returns whether the suffix belongs to this format"]
    pub fn matches_file_suffix(&self, suffix: &str) -> bool {
        self.file_suffixes()
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(suffix))
    }

    /// Check if this is a boundary-representation exchange format
    #[inline]
    #[must_use = "returns whether this is a B-rep format"]
    pub const fn is_brep(&self) -> bool {
        matches!(self, Self::Step | Self::Iges | Self::OccBrep)
    }

    /// Check if this is a polygon-mesh format
    #[inline]
    #[must_use = "returns whether this is a mesh format"]
    pub const fn is_mesh(&self) -> bool {
        matches!(
            self,
            Self::Stl | Self::Obj | Self::Ply | Self::Gltf | Self::Amf | Self::Off
        )
    }
}

impl std::fmt::Display for Format {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unknown => "UNKNOWN",
            Self::Step => "STEP",
            Self::Iges => "IGES",
            Self::OccBrep => "OCCBREP",
            Self::Stl => "STL",
            Self::Obj => "OBJ",
            Self::Ply => "PLY",
            Self::Dxf => "DXF",
            Self::Gltf => "GLTF",
            Self::Vrml => "VRML",
            Self::Amf => "AMF",
            Self::Off => "OFF",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "STEP" | "STP" => Ok(Self::Step),
            "IGES" | "IGS" => Ok(Self::Iges),
            "OCCBREP" | "BREP" => Ok(Self::OccBrep),
            "STL" => Ok(Self::Stl),
            "OBJ" => Ok(Self::Obj),
            "PLY" => Ok(Self::Ply),
            "DXF" => Ok(Self::Dxf),
            "GLTF" | "GLB" => Ok(Self::Gltf),
            "VRML" | "WRL" => Ok(Self::Vrml),
            "AMF" => Ok(Self::Amf),
            "OFF" => Ok(Self::Off),
            _ => Err(format!("unknown format: '{s}'")),
        }
    }
}
