/// contains some very simple helpers for 2d vectors and headings

pub type Vector = [f64; 2];

/// calculates the length of a vector
pub fn len(inp: Vector) -> f64 {
    len2(inp).sqrt()
}

/// squared length, skips the sqrt
pub fn len2(inp: Vector) -> f64 {
    (inp[0] * inp[0]) + (inp[1] * inp[1])
}

/// componet-wise addition
pub fn add(mut a: Vector, b: Vector) -> Vector {
    a[0] += b[0];
    a[1] += b[1];
    a
}

/// componet-wise subtraction, a - b
pub fn sub(mut a: Vector, b: Vector) -> Vector {
    a[0] -= b[0];
    a[1] -= b[1];
    a
}

/// scales a vector by a scalar
pub fn scale(mut a: Vector, scalar: f64) -> Vector {
    a[0] *= scalar;
    a[1] *= scalar;
    a
}

pub fn dist2(a: Vector, b: Vector) -> f64 {
    len2(sub(a, b))
}

/// heading of a vector in radians, [-pi, pi]
pub fn heading(v: Vector) -> f64 {
    v[1].atan2(v[0])
}

/// unit vector pointing in the direction of the heading
pub fn from_heading(heading: f64) -> Vector {
    let (s, c) = heading.sin_cos();
    [c, s]
}

/// normalizes an angle to [-pi, pi)
pub fn rad_norm(angle: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    if !angle.is_finite() {
        return 0.;
    }
    (angle + PI).rem_euclid(TAU) - PI
}

/// the shortest signed rotation that turns from into to
pub fn angle_delta(from: f64, to: f64) -> f64 {
    rad_norm(to - from)
}

#[test]
fn shortest_turn_wraps() {
    use std::f64::consts::PI;
    let d = angle_delta(0.9 * PI, -0.9 * PI);
    assert!((d - 0.2 * PI).abs() < 1e-9);
    let d = angle_delta(-0.9 * PI, 0.9 * PI);
    assert!((d + 0.2 * PI).abs() < 1e-9);
    assert_eq!(rad_norm(f64::NAN), 0.);
}
