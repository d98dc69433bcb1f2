use nalgebra::{Point3, Rotation3, Unit, Vector3};
use std::f64::consts::PI;

pub fn rotation_from_axis_angle(axis: &Vector3<f64>, angle_radians: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle_radians)
}

/// Rotates `point` by `angle_radians` about the line through `origin` along `axis`.
pub fn rotate_about_axis(
    point: &Point3<f64>,
    origin: &Point3<f64>,
    axis: &Unit<Vector3<f64>>,
    angle_radians: f64,
) -> Point3<f64> {
    let rotation = Rotation3::from_axis_angle(axis, angle_radians);
    origin + rotation * (point - origin)
}

/// Returns some unit vector perpendicular to `v`.
pub fn any_perpendicular(v: &Vector3<f64>) -> Unit<Vector3<f64>> {
    let helper = if v.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    Unit::new_normalize(v.cross(&helper))
}

/// Angle a-center-c in radians.
pub fn bond_angle(a: &Point3<f64>, center: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let u = a - center;
    let v = c - center;
    let denom = u.norm() * v.norm();
    if denom < 1e-12 {
        return 0.0;
    }
    (u.dot(&v) / denom).clamp(-1.0, 1.0).acos()
}

/// Signed dihedral angle p0-p1-p2-p3 in radians, in `(-PI, PI]`.
pub fn dihedral_angle(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>, p3: &Point3<f64>) -> f64 {
    let b0 = p0 - p1;
    let b1 = p2 - p1;
    let b2 = p3 - p2;
    let b1_norm = b1.norm();
    if b1_norm < 1e-12 {
        return 0.0;
    }
    let b1n = b1 / b1_norm;
    let v = b0 - b1n * b0.dot(&b1n);
    let w = b2 - b1n * b2.dot(&b1n);
    let x = v.dot(&w);
    let y = b1n.cross(&v).dot(&w);
    y.atan2(x)
}

/// Smallest absolute difference between two angles when angles are identified
/// modulo `period` (e.g. `2*PI`, or `2*PI/3` for a three-fold rotor).
pub fn angular_difference(a: f64, b: f64, period: f64) -> f64 {
    let d = (a - b).rem_euclid(period);
    d.min(period - d)
}

/// Wraps an angle into `(-PI, PI]`.
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI { wrapped + 2.0 * PI } else { wrapped }
}

pub fn centroid(points: &[Point3<f64>]) -> Option<Point3<f64>> {
    if points.is_empty() {
        return None;
    }
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Some(Point3::from(sum / points.len() as f64))
}

/// Axis-aligned bounding box as `(min, max)` corners.
pub fn bounding_box(points: &[Point3<f64>]) -> Option<(Point3<f64>, Point3<f64>)> {
    let first = points.first()?;
    let mut min = *first;
    let mut max = *first;
    for p in &points[1..] {
        for k in 0..3 {
            min[k] = min[k].min(p[k]);
            max[k] = max[k].max(p[k]);
        }
    }
    Some((min, max))
}

pub fn calculate_rmsd(coords1: &[Point3<f64>], coords2: &[Point3<f64>]) -> Option<f64> {
    if coords1.len() != coords2.len() || coords1.is_empty() {
        return None;
    }
    let n = coords1.len() as f64;
    let squared_dist_sum: f64 = coords1
        .iter()
        .zip(coords2.iter())
        .map(|(p1, p2)| (p1 - p2).norm_squared())
        .sum();
    Some((squared_dist_sum / n).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    #[test]
    fn rotate_about_axis_quarter_turn_around_z() {
        let p = rotate_about_axis(
            &Point3::new(2.0, 0.0, 1.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Vector3::z_axis(),
            PI / 2.0,
        );
        assert!(f64_approx_equal(p.x, 1.0));
        assert!(f64_approx_equal(p.y, 1.0));
        assert!(f64_approx_equal(p.z, 1.0));
    }

    #[test]
    fn any_perpendicular_is_orthogonal_unit_vector() {
        for v in [Vector3::x(), Vector3::new(0.3, -2.0, 0.5), Vector3::z()] {
            let p = any_perpendicular(&v);
            assert!(f64_approx_equal(p.dot(&v), 0.0));
            assert!(f64_approx_equal(p.norm(), 1.0));
        }
    }

    #[test]
    fn bond_angle_of_right_angle() {
        let angle = bond_angle(
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::origin(),
            &Point3::new(0.0, 3.0, 0.0),
        );
        assert!(f64_approx_equal(angle, PI / 2.0));
    }

    #[test]
    fn dihedral_angle_matches_known_configurations() {
        let p1 = Point3::new(0.0, 0.0, 0.0);
        let p2 = Point3::new(0.0, 0.0, 1.0);
        let p0 = Point3::new(1.0, 0.0, 0.0);

        let cis = dihedral_angle(&p0, &p1, &p2, &Point3::new(1.0, 0.0, 1.0));
        let trans = dihedral_angle(&p0, &p1, &p2, &Point3::new(-1.0, 0.0, 1.0));
        let gauche = dihedral_angle(&p0, &p1, &p2, &Point3::new(0.0, 1.0, 1.0));

        assert!(f64_approx_equal(cis, 0.0));
        assert!(f64_approx_equal(trans.abs(), PI));
        assert!(f64_approx_equal(gauche.abs(), PI / 2.0));
    }

    #[test]
    fn dihedral_angle_tracks_rotation_about_the_axis() {
        let p0 = Point3::new(1.0, 0.0, 0.0);
        let p1 = Point3::origin();
        let p2 = Point3::new(0.0, 0.0, 1.0);
        let p3 = Point3::new(1.0, 0.0, 1.0);
        let before = dihedral_angle(&p0, &p1, &p2, &p3);
        let rotated = rotate_about_axis(&p3, &p1, &Vector3::z_axis(), 0.7);
        let after = dihedral_angle(&p0, &p1, &p2, &rotated);
        assert!(f64_approx_equal(after - before, 0.7));
    }

    #[test]
    fn angular_difference_respects_period() {
        assert!(f64_approx_equal(angular_difference(0.1, 2.0 * PI - 0.1, 2.0 * PI), 0.2));
        let third = 2.0 * PI / 3.0;
        assert!(f64_approx_equal(angular_difference(0.0, third, third), 0.0));
        assert!(f64_approx_equal(angular_difference(PI, 0.0, 2.0 * PI), PI));
    }

    #[test]
    fn wrap_angle_maps_into_half_open_interval() {
        assert!(f64_approx_equal(wrap_angle(3.0 * PI), PI));
        assert!(f64_approx_equal(wrap_angle(-PI), PI));
        assert!(f64_approx_equal(wrap_angle(0.5), 0.5));
        assert!(f64_approx_equal(wrap_angle(-0.5 - 2.0 * PI), -0.5));
    }

    #[test]
    fn centroid_and_bounding_box_of_points() {
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, -1.0, 4.0),
            Point3::new(1.0, 1.0, -2.0),
        ];
        let c = centroid(&points).unwrap();
        assert!(f64_approx_equal(c.x, 1.0));
        assert!(f64_approx_equal(c.z, 2.0 / 3.0));
        let (min, max) = bounding_box(&points).unwrap();
        assert_eq!(min, Point3::new(0.0, -1.0, -2.0));
        assert_eq!(max, Point3::new(2.0, 1.0, 4.0));
        assert!(centroid(&[]).is_none());
    }

    #[test]
    fn rmsd_of_identical_sets_is_zero_and_mismatch_is_none() {
        let a = [Point3::new(1.0, 2.0, 3.0), Point3::new(0.0, 0.0, 0.0)];
        assert!(f64_approx_equal(calculate_rmsd(&a, &a).unwrap(), 0.0));
        assert!(calculate_rmsd(&a, &a[..1]).is_none());
    }
}
