#[inline]
pub fn lennard_jones_12_6(dist: f64, r_min: f64, well_depth: f64) -> f64 {
    let rho = r_min / dist;
    let rho6 = rho.powi(6);
    let rho12 = rho6 * rho6;
    well_depth * (rho12 - 2.0 * rho6)
}

/// dE/dr of [`lennard_jones_12_6`].
#[inline]
pub fn lennard_jones_12_6_derivative(dist: f64, r_min: f64, well_depth: f64) -> f64 {
    let rho = r_min / dist;
    let rho6 = rho.powi(6);
    let rho12 = rho6 * rho6;
    12.0 * well_depth * (rho6 - rho12) / dist
}

#[inline]
pub fn harmonic(displacement_sq: f64, force_constant: f64) -> f64 {
    0.5 * force_constant * displacement_sq
}

#[inline]
pub fn combine_radius(r1: f64, r2: f64) -> f64 {
    0.5 * (r1 + r2)
}

#[inline]
pub fn combine_well_depth(d1: f64, d2: f64) -> f64 {
    (d1 * d2).sqrt()
}
