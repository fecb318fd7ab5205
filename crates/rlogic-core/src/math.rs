//! Minimal column-major 4x4 matrix helpers for skinning and anchor points.

/// Column-major 4x4 matrix.
pub type Mat4 = [f32; 16];

pub const IDENTITY: Mat4 = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

pub fn translation(x: f32, y: f32, z: f32) -> Mat4 {
    let mut m = IDENTITY;
    m[12] = x;
    m[13] = y;
    m[14] = z;
    m
}

/// `a * b`.
pub fn mul(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [0.0; 16];
    for col in 0..4 {
        for row in 0..4 {
            out[col * 4 + row] = (0..4).map(|k| a[k * 4 + row] * b[col * 4 + k]).sum();
        }
    }
    out
}

/// Transforms a point (w = 1), returning homogeneous coordinates.
pub fn transform_point(m: &Mat4, p: [f32; 3]) -> [f32; 4] {
    let mut out = [0.0; 4];
    for (row, slot) in out.iter_mut().enumerate() {
        *slot = m[row] * p[0] + m[4 + row] * p[1] + m[8 + row] * p[2] + m[12 + row];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_neutral() {
        let t = translation(1.0, 2.0, 3.0);
        assert_eq!(mul(&IDENTITY, &t), t);
        assert_eq!(mul(&t, &IDENTITY), t);
    }

    #[test]
    fn translations_compose() {
        let m = mul(&translation(1.0, 0.0, 0.0), &translation(0.0, 2.0, 0.0));
        assert_eq!(transform_point(&m, [0.0, 0.0, 0.0]), [1.0, 2.0, 0.0, 1.0]);
    }
}
