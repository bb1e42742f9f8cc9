use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Square bitmap that is `true` inside the circle inscribed in the square
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircularMask {
    size: u32,
    bits: Vec<bool>,
}

impl CircularMask {
    /// Build the mask for an overlay of `size × size` pixels.
    ///
    /// The circle is centred on `(size / 2, size / 2)` with radius `size / 2`.
    pub fn new(size: u32) -> Self {
        let center = (size / 2) as i64;
        let radius_sq = center * center;
        let side = size as usize;

        let mut bits = Vec::with_capacity(side * side);
        for y in 0..size as i64 {
            let dy = y - center;
            for x in 0..size as i64 {
                let dx = x - center;
                bits.push(dx * dx + dy * dy <= radius_sq);
            }
        }

        Self { size, bits }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Whether pixel `(x, y)` is inside the circle; out-of-range is `false`
    pub fn contains(&self, x: u32, y: u32) -> bool {
        if x >= self.size || y >= self.size {
            return false;
        }
        self.bits[(y as usize) * (self.size as usize) + x as usize]
    }

    /// Number of pixels inside the circle
    pub fn area(&self) -> usize {
        self.bits.iter().filter(|&&inside| inside).count()
    }

    /// Iterate `(x, y)` of every pixel inside the circle, row-major
    pub fn iter_inside(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let side = self.size as usize;
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, &inside)| inside)
            .map(move |(idx, _)| ((idx % side) as u32, (idx / side) as u32))
    }
}

/// Hands out one shared mask per overlay size.
///
/// Masks are computed on first request and reused for every later frame and
/// session with the same size.
#[derive(Debug, Default)]
pub struct CircularMaskCache {
    masks: Mutex<HashMap<u32, Arc<CircularMask>>>,
}

impl CircularMaskCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mask_for(&self, size: u32) -> Arc<CircularMask> {
        let mut masks = self.masks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(masks.entry(size).or_insert_with(|| {
            debug!("Building circular mask for {}px overlay", size);
            Arc::new(CircularMask::new(size))
        }))
    }

    /// Number of distinct sizes computed so far
    pub fn len(&self) -> usize {
        self.masks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_center_and_corners() {
        let mask = CircularMask::new(200);

        assert!(mask.contains(100, 100));
        assert!(mask.contains(100, 0));
        assert!(mask.contains(0, 100));
        assert!(!mask.contains(0, 0));
        assert!(!mask.contains(199, 199));
        assert!(!mask.contains(0, 199));
        assert!(!mask.contains(200, 100), "out of range is outside");
    }

    #[test]
    fn test_mask_is_symmetric() {
        let mask = CircularMask::new(51);
        for y in 0..51 {
            for x in 0..51 {
                assert_eq!(mask.contains(x, y), mask.contains(50 - x, y));
                assert_eq!(mask.contains(x, y), mask.contains(x, 50 - y));
            }
        }
    }

    #[test]
    fn test_mask_area_close_to_circle() {
        let mask = CircularMask::new(200);
        let expected = std::f64::consts::PI * 100.0 * 100.0;
        let area = mask.area() as f64;
        assert!(
            (area - expected).abs() / expected < 0.02,
            "area {} too far from {}",
            area,
            expected
        );
        assert_eq!(mask.iter_inside().count(), mask.area());
    }

    #[test]
    fn test_cache_reuses_masks() {
        let cache = CircularMaskCache::new();
        assert!(cache.is_empty());

        let a = cache.mask_for(120);
        let b = cache.mask_for(120);
        assert!(Arc::ptr_eq(&a, &b), "same size must return the same mask");
        assert_eq!(cache.len(), 1);

        let c = cache.mask_for(80);
        assert_eq!(c.size(), 80);
        assert_eq!(cache.len(), 2);
    }
}
