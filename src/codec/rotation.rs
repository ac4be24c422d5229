//! Rotation decoding for placed objects.
//!
//! Both placement forms (legacy rotation matrices, next-gen packed
//! quaternions) funnel through the same quaternion decomposition so the two
//! generations emit identical angle conventions: Tait-Bryan angles about
//! x, y, z applied z-then-y-then-x, right-handed, in degrees.

/// The no-rotation quaternion, `[x, y, z, w]`.
pub const IDENTITY: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Decompose a quaternion `[x, y, z, w]` into Euler angles in degrees.
///
/// The input is normalized first; a zero-length quaternion decomposes to no
/// rotation. The pitch term is clamped into `[-1, 1]` before `asin`, so the
/// gimbal-lock poles come out deterministic instead of NaN.
pub fn quat_to_euler_degrees(q: [f32; 4]) -> [f32; 3] {
    let [x, y, z, w] = normalized(q);

    let t0 = 2.0 * (w * x + y * z);
    let t1 = 1.0 - 2.0 * (x * x + y * y);
    let rx = t0.atan2(t1);

    let t2 = (2.0 * (w * y - z * x)).clamp(-1.0, 1.0);
    let ry = t2.asin();

    let t3 = 2.0 * (w * z + x * y);
    let t4 = 1.0 - 2.0 * (y * y + z * z);
    let rz = t3.atan2(t4);

    [rx.to_degrees(), ry.to_degrees(), rz.to_degrees()]
}

/// Decompose a row-major 3x3 rotation matrix through the shared quaternion
/// path, yielding the same angle convention as [`quat_to_euler_degrees`].
pub fn matrix_to_euler_degrees(m: &[f32; 9]) -> [f32; 3] {
    quat_to_euler_degrees(quat_from_matrix(m))
}

/// Decode four packed u16 components. The words are not stored in x, y, z, w
/// order: quaternion x comes from slot 2, y from slot 0, z from slot 1, w
/// from slot 3.
///
/// Each word maps through `v * (1/65536) * 2 - 1`. The all-zero record is a
/// zero-initialized placement carrying no rotation and decodes to identity
/// (the linear mapping alone would yield a meaningless all-negative-one
/// quaternion).
pub fn unpack_quat(words: [u16; 4]) -> [f32; 4] {
    if words == [0; 4] {
        return IDENTITY;
    }
    let expand = |v: u16| v as f32 / 32768.0 - 1.0;
    [
        expand(words[2]),
        expand(words[0]),
        expand(words[1]),
        expand(words[3]),
    ]
}

fn normalized(q: [f32; 4]) -> [f32; 4] {
    let len = q.iter().map(|c| c * c).sum::<f32>().sqrt();
    if len <= f32::EPSILON {
        return IDENTITY;
    }
    q.map(|c| c / len)
}

/// Largest-component (Shepperd) extraction, stable for every branch of an
/// orthonormal input.
fn quat_from_matrix(m: &[f32; 9]) -> [f32; 4] {
    let trace = m[0] + m[4] + m[8];
    if trace > 0.0 {
        let s = (trace + 1.0).sqrt() * 2.0;
        [
            (m[7] - m[5]) / s,
            (m[2] - m[6]) / s,
            (m[3] - m[1]) / s,
            s / 4.0,
        ]
    } else if m[0] > m[4] && m[0] > m[8] {
        let s = (1.0 + m[0] - m[4] - m[8]).sqrt() * 2.0;
        [
            s / 4.0,
            (m[1] + m[3]) / s,
            (m[2] + m[6]) / s,
            (m[7] - m[5]) / s,
        ]
    } else if m[4] > m[8] {
        let s = (1.0 + m[4] - m[0] - m[8]).sqrt() * 2.0;
        [
            (m[1] + m[3]) / s,
            s / 4.0,
            (m[5] + m[7]) / s,
            (m[2] - m[6]) / s,
        ]
    } else {
        let s = (1.0 + m[8] - m[0] - m[4]).sqrt() * 2.0;
        [
            (m[2] + m[6]) / s,
            (m[5] + m[7]) / s,
            s / 4.0,
            (m[3] - m[1]) / s,
        ]
    }
}
