//! Source rasters: decoding and conversion to masks or class layers.

use std::path::Path;

use image::{DynamicImage, GrayImage};

use crate::bitgrid::BitGrid;
use crate::error::OutlineError;

/// A single 8-bit band.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    width: usize,
    height: usize,
    values: Vec<u8>,
}

impl Raster {
    /// Decode any format the `image` crate reads, reduced to luma.
    pub fn open(path: &Path) -> Result<Raster, OutlineError> {
        Ok(Raster::from_luma(decode(path)?.to_luma8()))
    }

    /// Decode a raster whose single 8-bit band holds class values.
    ///
    /// Anything else is rejected: palette images come out of the decoder
    /// expanded to RGB, and luma of a colour would merge distinct classes.
    pub fn open_indexed(path: &Path) -> Result<Raster, OutlineError> {
        match decode(path)? {
            DynamicImage::ImageLuma8(img) => Ok(Raster::from_luma(img)),
            other => Err(OutlineError::ImageLoad(format!(
                "{}: class values need a single 8-bit band, found {:?}",
                path.display(),
                other.color()
            ))),
        }
    }

    pub fn from_luma(img: GrayImage) -> Raster {
        let (w, h) = img.dimensions();
        Raster {
            width: w as usize,
            height: h as usize,
            values: img.into_raw(),
        }
    }

    pub fn new(width: usize, height: usize, values: Vec<u8>) -> Result<Raster, OutlineError> {
        if values.len() != width * height {
            return Err(OutlineError::config(format!(
                "raster is {}x{} but holds {} values",
                width,
                height,
                values.len()
            )));
        }
        Ok(Raster {
            width,
            height,
            values,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Pixels holding data. With no nodata values given, 0 is nodata.
    pub fn data_mask(&self, nodata: &[u8]) -> BitGrid {
        let nodata: &[u8] = if nodata.is_empty() { &[0] } else { nodata };
        BitGrid::from_fn(self.width, self.height, |x, y| {
            !nodata.contains(&self.values[y * self.width + x])
        })
    }

    /// Treat every pixel value as a class id.
    pub fn into_classes(self, nodata: &[u8], colors: Option<Vec<[u8; 4]>>) -> ClassRaster {
        let mut used = [false; 256];
        for &v in &self.values {
            used[v as usize] = true;
        }
        for &v in nodata {
            used[v as usize] = false;
        }
        ClassRaster {
            width: self.width,
            height: self.height,
            values: self.values,
            used,
            colors,
        }
    }
}

fn decode(path: &Path) -> Result<DynamicImage, OutlineError> {
    image::open(path).map_err(|e| OutlineError::ImageLoad(format!("{}: {}", path.display(), e)))
}

/// Classified raster: one feature per pixel value that occurs.
#[derive(Debug, Clone)]
pub struct ClassRaster {
    width: usize,
    height: usize,
    values: Vec<u8>,
    used: [bool; 256],
    colors: Option<Vec<[u8; 4]>>,
}

impl ClassRaster {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Values present in the raster, ascending, nodata excluded.
    pub fn classes(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=u8::MAX).filter(move |&v| self.used[v as usize])
    }

    pub fn mask(&self, value: u8) -> BitGrid {
        BitGrid::for_class(&self.values, self.width, self.height, value)
    }

    /// Palette entry for `value`, if a colour table was supplied.
    pub fn color(&self, value: u8) -> Option<[u8; 4]> {
        self.colors
            .as_ref()
            .and_then(|c| c.get(value as usize).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    fn sample() -> Raster {
        Raster::new(4, 2, vec![0, 3, 3, 9, 0, 9, 255, 3]).unwrap()
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Raster::new(3, 3, vec![0; 8]).is_err());
    }

    #[test]
    fn zero_is_nodata_by_default() {
        let mask = sample().data_mask(&[]);
        assert_eq!(mask.count(), 6);
        assert!(!mask.get(0, 0));
        assert!(mask.get(1, 0));

        let mask = sample().data_mask(&[255, 9]);
        assert_eq!(mask.count(), 5);
        assert!(mask.get(0, 0));
        assert!(!mask.get(3, 0));
    }

    #[test]
    fn classes_are_ascending_without_nodata() {
        let classes = sample().into_classes(&[0], Some(vec![[1, 2, 3, 4]; 4]));
        assert_eq!(classes.classes().collect::<Vec<_>>(), vec![3, 9, 255]);
        assert_eq!(classes.mask(3).count(), 3);
        assert_eq!(classes.color(3), Some([1, 2, 3, 4]));
        assert_eq!(classes.color(9), None);
    }

    #[test]
    fn opens_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.png");
        let img = GrayImage::from_fn(5, 3, |x, y| Luma([if x > y { 200 } else { 0 }]));
        img.save(&path).unwrap();

        let raster = Raster::open(&path).unwrap();
        assert_eq!((raster.width(), raster.height()), (5, 3));
        assert_eq!(raster.data_mask(&[]).count(), 4 + 3 + 2);
    }

    #[test]
    fn unreadable_file_is_an_image_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.png");
        assert!(matches!(
            Raster::open(&path),
            Err(OutlineError::ImageLoad(_))
        ));
    }

    #[test]
    fn indexed_open_keeps_raw_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classes.png");
        let img = GrayImage::from_fn(4, 1, |x, _| Luma([[0, 3, 3, 200][x as usize]]));
        img.save(&path).unwrap();

        let classes = Raster::open_indexed(&path).unwrap().into_classes(&[0], None);
        assert_eq!(classes.classes().collect::<Vec<_>>(), vec![3, 200]);
        assert_eq!(classes.mask(3).count(), 2);
    }

    #[test]
    fn indexed_open_rejects_colour_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.png");
        let img = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) });
        img.save(&path).unwrap();

        assert!(matches!(
            Raster::open_indexed(&path),
            Err(OutlineError::ImageLoad(_))
        ));
        assert!(Raster::open(&path).is_ok());
    }
}
