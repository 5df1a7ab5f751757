//! Affine domain → window mapping used to condition polynomial fits.
//!
//! Glucose values sit far from zero (roughly 40–400 mg/dL), so the design
//! matrix `[1, g]` is poorly conditioned. Fitting on `x = offset + scale * g`,
//! with `[min, max]` mapped onto `[-1, 1]`, keeps both columns of similar
//! magnitude. Coefficients are mapped back to the original variable afterwards.

/// Window every fit domain is mapped onto.
pub const WINDOW: (f64, f64) = (-1.0, 1.0);

/// Linear map from an observed domain `[lo, hi]` onto `WINDOW`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomainMap {
    pub offset: f64,
    pub scale: f64,
}

impl DomainMap {
    /// Build the map for `values`. Returns `None` when the domain has zero
    /// width or contains non-finite values.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let (lo, hi) = values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
        if !(lo.is_finite() && hi.is_finite()) || values.iter().any(|v| !v.is_finite()) {
            return None;
        }
        Self::from_domain(lo, hi)
    }

    pub fn from_domain(lo: f64, hi: f64) -> Option<Self> {
        let width = hi - lo;
        if !(width.is_finite() && width > 0.0) {
            return None;
        }
        let (w0, w1) = WINDOW;
        let scale = (w1 - w0) / width;
        let offset = w0 - lo * scale;
        Some(Self { offset, scale })
    }

    pub fn apply(&self, v: f64) -> f64 {
        self.offset + self.scale * v
    }

    /// Convert `y = c0 + c1 * x` (fit in window space) to `y = slope * v + intercept`.
    pub fn unmap_line(&self, c0: f64, c1: f64) -> (f64, f64) {
        (c1 * self.scale, c0 + c1 * self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_endpoints_land_on_window_endpoints() {
        let map = DomainMap::from_values(&[55.0, 240.0, 100.0]).unwrap();
        assert!((map.apply(55.0) + 1.0).abs() < 1e-12);
        assert!((map.apply(240.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn zero_width_domain_has_no_map() {
        assert!(DomainMap::from_values(&[120.0, 120.0]).is_none());
        assert!(DomainMap::from_values(&[]).is_none());
        assert!(DomainMap::from_values(&[1.0, f64::NAN]).is_none());
    }

    #[test]
    fn unmap_line_recovers_original_coefficients() {
        let map = DomainMap::from_domain(50.0, 250.0).unwrap();
        // y = 3v + 7 expressed in window space: v = (x - offset) / scale.
        let c1 = 3.0 / map.scale;
        let c0 = 7.0 - c1 * map.offset;
        let (slope, intercept) = map.unmap_line(c0, c1);
        assert!((slope - 3.0).abs() < 1e-9);
        assert!((intercept - 7.0).abs() < 1e-9);
    }
}
