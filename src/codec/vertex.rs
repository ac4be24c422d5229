//! Packed vertex attribute decoding.
//!
//! World geometry stores positions, normals, and tangent frames in quantized
//! forms that differ per generation. Everything here is a pure function of the
//! packed word; no decoder clamps silently, and degenerate input is surfaced
//! rather than patched up.

/// Decoded orthonormal basis from a packed tangent frame.
#[derive(Debug, Clone, Copy)]
pub struct TangentFrame {
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
    pub normal: [f32; 3],
}

/// Unpack a 4-byte packed normal into a unit `[f32; 3]`.
///
/// Bytes are `[x, y, z, unused]`, each offset-binary: flipping the top bit
/// yields a two's-complement value in `[-128, 127]`, mapped onto roughly
/// `[-1, 1]` and then normalized. The all-`0x80` pattern (a zeroed record)
/// decodes to a zero-length vector and returns `None` instead of being
/// normalized into NaN.
pub fn unpack_normal(packed: u32) -> Option<[f32; 3]> {
    let bytes = packed.to_le_bytes();
    let x = ((bytes[0] ^ 0x80) as i8) as f32 / 127.0;
    let y = ((bytes[1] ^ 0x80) as i8) as f32 / 127.0;
    let z = ((bytes[2] ^ 0x80) as i8) as f32 / 127.0;
    let len = (x * x + y * y + z * z).sqrt();
    if len <= f32::EPSILON {
        return None;
    }
    Some([x / len, y / len, z / len])
}

/// Unpack a smallest-three quaternion tangent frame.
///
/// Bit layout: `[0..10)` and `[10..20)` are the 10-bit fields a and b,
/// `[20..29)` the 9-bit field c, bit 29 the bitangent sign, `[30..32)` the
/// index of the dropped (largest) component. Stored fields span
/// `[-1/sqrt(2), 1/sqrt(2)]`; the dropped component is reconstructed from the
/// unit-length constraint. Tangent, bitangent, and normal are the rotated
/// basis vectors of the decoded quaternion.
pub fn unpack_tangent_frame(packed: u32) -> TangentFrame {
    fn expand(field: u32, half_range: f32) -> f32 {
        (field as f32 / half_range - 1.0) * std::f32::consts::FRAC_1_SQRT_2
    }

    let a = expand(packed & 0x3FF, 511.5);
    let b = expand((packed >> 10) & 0x3FF, 511.5);
    let c = expand((packed >> 20) & 0x1FF, 255.5);
    let d = (1.0 - (a * a + b * b + c * c)).max(0.0).sqrt();

    let [x, y, z, w] = match packed >> 30 {
        0 => [d, a, b, c],
        1 => [a, d, b, c],
        2 => [a, b, d, c],
        _ => [a, b, c, d],
    };

    let tangent = [
        1.0 - 2.0 * (y * y + z * z),
        2.0 * (x * y + z * w),
        2.0 * (x * z - y * w),
    ];
    let mut bitangent = [
        2.0 * (x * y - z * w),
        1.0 - 2.0 * (x * x + z * z),
        2.0 * (y * z + x * w),
    ];
    let normal = [
        2.0 * (x * z + y * w),
        2.0 * (y * z - x * w),
        1.0 - 2.0 * (x * x + y * y),
    ];

    if packed & (1 << 29) != 0 {
        for c in &mut bitangent {
            *c = -*c;
        }
    }

    TangentFrame {
        tangent,
        bitangent,
        normal,
    }
}

/// Decode a quantized position word: axis fields x, y, z in bits `[0..21)`,
/// `[21..42)`, `[42..63)`, each mapped through `field * scale + offset`.
pub fn unpack_position(packed: u64, scale: f32, offset: f32) -> [f32; 3] {
    [
        (packed & 0x1F_FFFF) as f32 * scale + offset,
        ((packed >> 21) & 0x1F_FFFF) as f32 * scale + offset,
        ((packed >> 42) & 0x1F_FFFF) as f32 * scale + offset,
    ]
}

/// Flip a UV's V component into the output convention.
pub fn flip_v(uv: [f32; 2]) -> [f32; 2] {
    [uv[0], 1.0 - uv[1]]
}
