//! Socket data type registry.
//!
//! The registry is a closed set of socket data types plus a single
//! compatibility predicate consulted by wire insertion and validation.
//! Adding a new type only requires extending the enum and the predicate;
//! nothing else in the kernel interprets the variants.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Data type carried by a socket.
pub enum SocketTypeId {
    /// Scalar floating-point value.
    #[default]
    Float,
    /// Scalar integer value.
    Int,
    /// Boolean value.
    Bool,
    /// 2-component vector.
    Vec2,
    /// 3-component vector.
    Vec3,
    /// 4-component vector.
    Vec4,
    /// 3x3 matrix.
    Mat3,
    /// 4x4 matrix.
    Mat4,
    /// 2D texture sampler.
    #[serde(rename = "sampler2D")]
    Sampler2D,
    /// RGBA color.
    Color,
    /// Texture handle.
    Texture,
}

/// Every registered socket type, in declaration order.
pub const ALL_SOCKET_TYPES: [SocketTypeId; 11] = [
    SocketTypeId::Float,
    SocketTypeId::Int,
    SocketTypeId::Bool,
    SocketTypeId::Vec2,
    SocketTypeId::Vec3,
    SocketTypeId::Vec4,
    SocketTypeId::Mat3,
    SocketTypeId::Mat4,
    SocketTypeId::Sampler2D,
    SocketTypeId::Color,
    SocketTypeId::Texture,
];

impl SocketTypeId {
    /// Registry name of the type, as used in documents.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::Mat3 => "mat3",
            Self::Mat4 => "mat4",
            Self::Sampler2D => "sampler2D",
            Self::Color => "color",
            Self::Texture => "texture",
        }
    }
}

impl fmt::Display for SocketTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SocketTypeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_SOCKET_TYPES
            .into_iter()
            .find(|r#type| r#type.name() == s)
            .ok_or_else(|| format!("Unrecognized socket type `{s}`."))
    }
}

/// Whether a wire may carry a value from a `from` output into a `to` input.
///
/// The relation is reflexive but deliberately not symmetric: a scalar may be
/// broadcast into a vector while the reverse would silently discard data.
/// Callers must consult the predicate with the wire's (from, to) orientation
/// rather than assume symmetry.
pub fn is_compatible(from: SocketTypeId, to: SocketTypeId) -> bool {
    use SocketTypeId::*;

    if from == to {
        return true;
    }

    matches!(
        (from, to),
        // Integer promotion.
        (Int, Float)
        // Scalar broadcast.
        | (Float, Vec2) | (Float, Vec3) | (Float, Vec4) | (Float, Color)
        // Channel reinterpretation. `Vec3 -> Color` is excluded: it would
        // have to invent an alpha channel.
        | (Color, Vec3) | (Color, Vec4) | (Vec4, Color)
        // A texture can be bound where a sampler is expected.
        | (Texture, Sampler2D)
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compatibility_is_reflexive() {
        for r#type in ALL_SOCKET_TYPES {
            assert!(
                is_compatible(r#type, r#type),
                "`{type}` should accept itself"
            );
        }
    }

    #[test]
    fn broadcast_is_one_way() {
        assert!(is_compatible(SocketTypeId::Float, SocketTypeId::Vec3));
        assert!(!is_compatible(SocketTypeId::Vec3, SocketTypeId::Float));

        assert!(is_compatible(SocketTypeId::Color, SocketTypeId::Vec3));
        assert!(!is_compatible(SocketTypeId::Vec3, SocketTypeId::Color));

        assert!(is_compatible(SocketTypeId::Texture, SocketTypeId::Sampler2D));
        assert!(!is_compatible(SocketTypeId::Sampler2D, SocketTypeId::Texture));
    }

    #[test]
    fn name_round_trip() {
        for r#type in ALL_SOCKET_TYPES {
            assert_eq!(SocketTypeId::from_str(r#type.name()), Ok(r#type));
        }

        assert!(SocketTypeId::from_str("quaternion").is_err());
    }
}
