use std::f32::consts::{PI, TAU};

/// Normalize to the range (-PI, PI].
#[inline]
pub fn wrap_pm_pi(x: f32) -> f32 {
    -((-x + PI).rem_euclid(TAU) - PI)
}

#[inline]
pub fn wrap_0_tau(x: f32) -> f32 {
    x.rem_euclid(TAU)
}

/// Signed angular distance a - b, wrapped into (-PI, PI].
#[inline]
pub fn angle_diff_pm_pi(a: f32, b: f32) -> f32 {
    wrap_pm_pi(a - b)
}
