use std::sync::{Arc, Mutex};

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("surface is sized {current_width}x{current_height}, refusing resize to {requested_width}x{requested_height}")]
    AlreadySized {
        current_width: u32,
        current_height: u32,
        requested_width: u32,
        requested_height: u32,
    },
    #[error("surface dimensions must be non-zero, got {0}x{1}")]
    ZeroDimensions(u32, u32),
    #[error("surface has not been sized yet")]
    NotSized,
    #[error("pixel data length {actual} does not match surface ({expected} bytes)")]
    BadLength { expected: usize, actual: usize },
}

/// A mutable 2-D pixel buffer: contiguous RGB bytes in row-major order.
///
/// A surface starts unsized and is sized exactly once; a later resize to
/// different dimensions is a state violation, not a recoverable condition.
/// Every pixel write bumps a generation counter so readers can tell a fresh
/// frame from a stale one without comparing pixel data.
#[derive(Debug)]
pub struct FrameSurface {
    data: Vec<u8>,
    width: u32,
    height: u32,
    generation: u64,
}

impl FrameSurface {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            width: 0,
            height: 0,
            generation: 0,
        }
    }

    /// Fix the surface dimensions. Idempotent for identical dimensions;
    /// any differing resize fails.
    pub fn size_once(&mut self, width: u32, height: u32) -> Result<(), SurfaceError> {
        if width == 0 || height == 0 {
            return Err(SurfaceError::ZeroDimensions(width, height));
        }
        if self.is_sized() {
            if self.width == width && self.height == height {
                return Ok(());
            }
            return Err(SurfaceError::AlreadySized {
                current_width: self.width,
                current_height: self.height,
                requested_width: width,
                requested_height: height,
            });
        }
        self.width = width;
        self.height = height;
        self.data = vec![0; (width as usize) * (height as usize) * 3];
        Ok(())
    }

    pub fn is_sized(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Replace the surface contents and advance the generation counter.
    pub fn write_pixels(&mut self, pixels: &[u8]) -> Result<(), SurfaceError> {
        if !self.is_sized() {
            return Err(SurfaceError::NotSized);
        }
        if pixels.len() != self.data.len() {
            return Err(SurfaceError::BadLength {
                expected: self.data.len(),
                actual: pixels.len(),
            });
        }
        self.data.copy_from_slice(pixels);
        self.generation += 1;
        Ok(())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Default for FrameSurface {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle to a surface. The writer/reader discipline (upscaler
/// writes the destination, mixer only reads it) is enforced by the driver
/// loop, not the type.
pub type SurfaceHandle = Arc<Mutex<FrameSurface>>;

pub fn surface_handle() -> SurfaceHandle {
    Arc::new(Mutex::new(FrameSurface::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_surface_is_unsized() {
        let s = FrameSurface::new();
        assert!(!s.is_sized());
        assert_eq!(s.width(), 0);
        assert_eq!(s.generation(), 0);
        assert!(s.data().is_empty());
    }

    #[test]
    fn test_size_once_allocates() {
        let mut s = FrameSurface::new();
        s.size_once(4, 2).unwrap();
        assert!(s.is_sized());
        assert_eq!(s.data().len(), 4 * 2 * 3);
    }

    #[test]
    fn test_size_once_same_dimensions_is_idempotent() {
        let mut s = FrameSurface::new();
        s.size_once(4, 2).unwrap();
        s.size_once(4, 2).unwrap();
        assert_eq!(s.width(), 4);
        assert_eq!(s.height(), 2);
    }

    #[test]
    fn test_resize_to_different_dimensions_fails() {
        let mut s = FrameSurface::new();
        s.size_once(4, 2).unwrap();
        let err = s.size_once(8, 4).unwrap_err();
        assert_eq!(
            err,
            SurfaceError::AlreadySized {
                current_width: 4,
                current_height: 2,
                requested_width: 8,
                requested_height: 4,
            }
        );
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let mut s = FrameSurface::new();
        assert!(matches!(
            s.size_once(0, 2),
            Err(SurfaceError::ZeroDimensions(0, 2))
        ));
    }

    #[test]
    fn test_write_pixels_bumps_generation() {
        let mut s = FrameSurface::new();
        s.size_once(2, 2).unwrap();
        assert_eq!(s.generation(), 0);
        s.write_pixels(&[7; 12]).unwrap();
        assert_eq!(s.generation(), 1);
        s.write_pixels(&[8; 12]).unwrap();
        assert_eq!(s.generation(), 2);
        assert_eq!(s.data()[0], 8);
    }

    #[test]
    fn test_write_before_sizing_fails() {
        let mut s = FrameSurface::new();
        assert_eq!(s.write_pixels(&[0; 12]), Err(SurfaceError::NotSized));
    }

    #[test]
    fn test_write_wrong_length_fails() {
        let mut s = FrameSurface::new();
        s.size_once(2, 2).unwrap();
        assert_eq!(
            s.write_pixels(&[0; 10]),
            Err(SurfaceError::BadLength {
                expected: 12,
                actual: 10
            })
        );
        // A failed write must not advance the generation
        assert_eq!(s.generation(), 0);
    }

    #[test]
    fn test_handle_is_shareable() {
        let handle = surface_handle();
        let clone = handle.clone();
        handle.lock().unwrap().size_once(2, 1).unwrap();
        assert!(clone.lock().unwrap().is_sized());
    }
}
