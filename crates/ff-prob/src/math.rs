//! Small numeric helpers shared across this crate.

/// Natural log of `sqrt(2π)`.
///
/// `ln(sqrt(2π)) = 0.5*ln(2π)` (precomputed to keep this crate const-friendly).
pub const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_7;

/// Natural log of `2π`.
pub const LN_2PI: f64 = 1.837_877_066_409_345_4;

/// True if `a` and `b` agree to a tight relative tolerance.
///
/// Used to check that two distributions being convolved share a central
/// value; exact float equality would be too brittle after arithmetic.
pub fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * 1.0_f64.max(a.abs()).max(b.abs())
}
