use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Voxel grid dimensions (nx, ny, nz)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct VoxelDims {
    pub nx: u32,
    pub ny: u32,
    pub nz: u32,
}

impl VoxelDims {
    /// Creates new dimensions
    pub fn new(nx: u32, ny: u32, nz: u32) -> Self {
        Self { nx, ny, nz }
    }

    /// Total number of voxels
    pub fn voxel_count(&self) -> u64 {
        self.nx as u64 * self.ny as u64 * self.nz as u64
    }
}

impl fmt::Display for VoxelDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.nx, self.ny, self.nz)
    }
}

/// Voxel spacing in millimeters (x, y in-plane; z through-plane)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct VoxelSpacing {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl VoxelSpacing {
    /// Creates a new VoxelSpacing
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Isotropic spacing
    pub fn uniform(mm: f64) -> Self {
        Self::new(mm, mm, mm)
    }

    /// Builds spacing from a DICOM PixelSpacing string and SliceThickness
    ///
    /// Accepts formats like:
    /// - "0.9\\0.9"
    /// - "0.9 0.9"
    /// - "[0.9, 0.9]"
    /// - Exponential notation: "9e-1\\9e-1"
    ///
    /// # Errors
    ///
    /// Returns an error if two numbers cannot be parsed
    pub fn from_pixel_spacing(s: &str, slice_thickness: f64) -> Result<Self, String> {
        static REGEX: OnceLock<Regex> = OnceLock::new();
        let re = REGEX.get_or_init(|| {
            Regex::new(r"[-+]?\d*\.?\d+(?:[eE][-+]?\d+)?").expect("Failed to compile regex")
        });

        let mut numbers = re.find_iter(s).map(|m| m.as_str());
        let mut next_value = |axis: &str| -> Result<f64, String> {
            numbers
                .next()
                .ok_or_else(|| format!("Failed to parse PixelSpacing from '{}'", s))?
                .parse::<f64>()
                .map_err(|e| format!("Failed to parse {} value: {}", axis, e))
        };

        let row = next_value("row")?;
        let col = next_value("col")?;
        Ok(Self::new(row, col, slice_thickness))
    }

    /// Smallest edge
    pub fn min(&self) -> f64 {
        self.x.min(self.y).min(self.z)
    }

    /// Largest (coarsest) edge
    pub fn max(&self) -> f64 {
        self.x.max(self.y).max(self.z)
    }

    /// Mean in-plane spacing
    pub fn inplane(&self) -> f64 {
        (self.x + self.y) / 2.0
    }

    /// Through-plane spacing
    pub fn through_plane(&self) -> f64 {
        self.z
    }

    /// Returns true when every component is finite and positive
    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.z]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0)
    }

    /// Pairwise differences all within `tolerance` x the largest edge
    pub fn is_isotropic(&self, tolerance: f64) -> bool {
        let limit = tolerance * self.max();
        (self.x - self.y).abs() <= limit
            && (self.x - self.z).abs() <= limit
            && (self.y - self.z).abs() <= limit
    }

    /// Spacing divided by its own smallest component
    pub fn normalized(&self) -> [f64; 3] {
        let min = self.min();
        [self.x / min, self.y / min, self.z / min]
    }
}

impl fmt::Display for VoxelSpacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}x{:.2}x{:.2} mm", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backslash_separator() {
        let vs = VoxelSpacing::from_pixel_spacing("0.9\\0.9", 5.0).unwrap();
        assert_eq!(vs, VoxelSpacing::new(0.9, 0.9, 5.0));
    }

    #[test]
    fn test_parse_array_format() {
        let vs = VoxelSpacing::from_pixel_spacing("[0.5, 0.6]", 1.0).unwrap();
        assert_eq!(vs.x, 0.5);
        assert_eq!(vs.y, 0.6);
    }

    #[test]
    fn test_parse_exponential_notation() {
        let vs = VoxelSpacing::from_pixel_spacing("1.5e-1\\1.5e-1", 1.0).unwrap();
        assert_eq!(vs.x, 0.15);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(VoxelSpacing::from_pixel_spacing("invalid", 1.0).is_err());
        assert!(VoxelSpacing::from_pixel_spacing("0.9", 1.0).is_err());
    }

    #[test]
    fn test_isotropy_tolerance() {
        assert!(VoxelSpacing::uniform(1.0).is_isotropic(0.15));
        // 1.0 vs 1.15: diff 0.15 <= 0.15 * 1.15
        assert!(VoxelSpacing::new(1.0, 1.0, 1.15).is_isotropic(0.15));
        assert!(!VoxelSpacing::new(0.9, 0.9, 5.0).is_isotropic(0.15));
    }

    #[test]
    fn test_normalized_by_min() {
        let n = VoxelSpacing::new(0.5, 0.5, 2.0).normalized();
        assert_eq!(n, [1.0, 1.0, 4.0]);
    }

    #[test]
    fn test_voxel_count() {
        assert_eq!(VoxelDims::new(256, 256, 176).voxel_count(), 11_534_336);
        assert_eq!(VoxelDims::new(512, 512, 512).to_string(), "512x512x512");
    }

    #[test]
    fn test_validity() {
        assert!(VoxelSpacing::uniform(0.7).is_valid());
        assert!(!VoxelSpacing::new(0.0, 1.0, 1.0).is_valid());
        assert!(!VoxelSpacing::new(f64::NAN, 1.0, 1.0).is_valid());
    }
}
