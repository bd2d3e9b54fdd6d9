use nalgebra::{Point3, Vector3};

const DEGENERATE_LENGTH: f64 = 1e-10;
const DEGENERATE_SINE: f64 = 1e-8;

/// Distance between `a` and `b` together with its gradient with respect to `a`.
///
/// The gradient with respect to `b` is the negation. Returns `None` for coincident points.
pub fn distance_with_gradient(a: &Point3<f64>, b: &Point3<f64>) -> Option<(f64, Vector3<f64>)> {
    let r = a - b;
    let d = r.norm();
    if d < DEGENERATE_LENGTH {
        return None;
    }
    Some((d, r / d))
}

/// Angle `a-b-c` in radians (vertex `b`) together with its gradients for `a`, `b` and `c`.
///
/// Returns `None` when an arm has zero length. For (near) linear arrangements the angle is
/// returned with zero gradients, since the derivative is undefined there.
pub fn angle_with_gradient(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> Option<(f64, [Vector3<f64>; 3])> {
    let u = a - b;
    let v = c - b;
    let (lu, lv) = (u.norm(), v.norm());
    if lu < DEGENERATE_LENGTH || lv < DEGENERATE_LENGTH {
        return None;
    }
    let (uh, vh) = (u / lu, v / lv);
    let cos = uh.dot(&vh).clamp(-1.0, 1.0);
    let theta = cos.acos();
    let sin = theta.sin();
    if sin < DEGENERATE_SINE {
        return Some((theta, [Vector3::zeros(); 3]));
    }

    let grad_a = -(vh - uh * cos) / (lu * sin);
    let grad_c = -(uh - vh * cos) / (lv * sin);
    let grad_b = -(grad_a + grad_c);
    Some((theta, [grad_a, grad_b, grad_c]))
}

/// Root-mean-square over every Cartesian component of `vectors`.
pub fn rms(vectors: &[Vector3<f64>]) -> f64 {
    if vectors.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = vectors.iter().map(|v| v.norm_squared()).sum();
    (sum_sq / (3 * vectors.len()) as f64).sqrt()
}

/// Largest Euclidean norm among `vectors`.
pub fn max_norm(vectors: &[Vector3<f64>]) -> f64 {
    vectors.iter().map(|v| v.norm()).fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const TOL: f64 = 1e-9;

    #[test]
    fn distance_gradient_is_unit_vector_along_separation() {
        let (d, g) =
            distance_with_gradient(&Point3::new(3.0, 4.0, 0.0), &Point3::origin()).unwrap();
        assert!((d - 5.0).abs() < TOL);
        assert!((g - Vector3::new(0.6, 0.8, 0.0)).norm() < TOL);
    }

    #[test]
    fn distance_of_coincident_points_is_degenerate() {
        assert!(distance_with_gradient(&Point3::origin(), &Point3::origin()).is_none());
    }

    #[test]
    fn right_angle_is_measured_correctly() {
        let (theta, _) = angle_with_gradient(
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::origin(),
            &Point3::new(0.0, 2.0, 0.0),
        )
        .unwrap();
        assert!((theta - FRAC_PI_2).abs() < TOL);
    }

    #[test]
    fn angle_gradient_matches_finite_differences() {
        let a = Point3::new(1.1, 0.2, -0.3);
        let b = Point3::new(0.0, 0.1, 0.0);
        let c = Point3::new(-0.4, 1.3, 0.5);
        let (_, grads) = angle_with_gradient(&a, &b, &c).unwrap();

        let h = 1e-6;
        for axis in 0..3 {
            let mut ap = a;
            let mut am = a;
            ap[axis] += h;
            am[axis] -= h;
            let (tp, _) = angle_with_gradient(&ap, &b, &c).unwrap();
            let (tm, _) = angle_with_gradient(&am, &b, &c).unwrap();
            let numeric = (tp - tm) / (2.0 * h);
            assert!((numeric - grads[0][axis]).abs() < 1e-6);
        }
        assert!((grads[0] + grads[1] + grads[2]).norm() < TOL);
    }

    #[test]
    fn linear_angle_has_zero_gradient() {
        let (theta, grads) = angle_with_gradient(
            &Point3::new(-1.0, 0.0, 0.0),
            &Point3::origin(),
            &Point3::new(1.0, 0.0, 0.0),
        )
        .unwrap();
        assert!((theta - std::f64::consts::PI).abs() < 1e-6);
        assert!(grads.iter().all(|g| g.norm() == 0.0));
    }

    #[test]
    fn rms_averages_over_components() {
        let vectors = [Vector3::new(1.0, 1.0, 1.0), Vector3::new(1.0, 1.0, 1.0)];
        assert!((rms(&vectors) - 1.0).abs() < TOL);
        assert_eq!(rms(&[]), 0.0);
        assert!((max_norm(&vectors) - 3f64.sqrt()).abs() < TOL);
    }
}
