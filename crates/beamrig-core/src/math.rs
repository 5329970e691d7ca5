use nalgebra::Point2;

pub type Real = f64;

pub type Pt2 = Point2<Real>;

/// Relative-or-absolute float comparison used by tests and validation.
pub fn approx_eq(a: Real, b: Real, tol: Real) -> bool {
    (a - b).abs() <= tol * (1.0 + a.abs().max(b.abs()))
}
