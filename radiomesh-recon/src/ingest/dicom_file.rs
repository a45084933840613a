//! Single-slice DICOM input.
//!
//! Only the first frame is read. Sample values are stretched linearly from
//! their own minimum and maximum onto 0-255, and grayscale slices are
//! replicated into all three channels. No VOI window or photometric
//! inversion is applied.

use crate::ingest::{DecodeError, PixelBuffer};
use crate::ingest::source::ImageSource;
use dicom::object::open_file;
use dicom_pixeldata::PixelDecoder;
use ordered_float::OrderedFloat;
use std::path::{Path, PathBuf};
use tracing::debug;

const DICOM_EXTENSIONS: [&str; 2] = ["dcm", "dicom"];

/// Whether `path` carries a DICOM file extension (case-insensitive).
pub fn is_dicom_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| DICOM_EXTENSIONS.iter().any(|d| ext.eq_ignore_ascii_case(d)))
}

/// A DICOM file on disk.
#[derive(Debug, Clone)]
pub struct DicomSource {
    path: PathBuf,
}

impl DicomSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ImageSource for DicomSource {
    #[tracing::instrument(skip_all, fields(path = %self.path.display()))]
    fn decode(&self) -> Result<PixelBuffer, DecodeError> {
        let object = open_file(&self.path)?;
        let decoded = object.decode_pixel_data()?;
        let (width, height) = (decoded.columns(), decoded.rows());
        let samples = decoded.samples_per_pixel();
        if width == 0 || height == 0 {
            return Err(DecodeError::EmptyImage);
        }
        if samples != 1 && samples != 3 {
            return Err(DecodeError::UnsupportedSamples(samples));
        }

        let values: Vec<f32> = decoded.to_vec_frame(0)?;
        debug!(
            "Decoded DICOM slice {}x{} ({} samples/pixel, {} frames)",
            width,
            height,
            samples,
            decoded.number_of_frames()
        );
        let stretched = stretch_to_u8(&values);
        let rgb = if samples == 1 {
            stretched.iter().flat_map(|&v| [v; 3]).collect()
        } else {
            stretched
        };
        PixelBuffer::from_raw(width, height, rgb)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Linear min-max stretch onto 0-255. A constant input maps to zero.
pub fn stretch_to_u8(values: &[f32]) -> Vec<u8> {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let min = finite.clone().map(OrderedFloat).min().map_or(0.0, |v| v.0);
    let max = finite.map(OrderedFloat).max().map_or(0.0, |v| v.0);
    let range = max - min;
    values
        .iter()
        .map(|&v| {
            if range <= 0.0 || !v.is_finite() {
                0
            } else {
                ((v - min) / range * 255.0).round().clamp(0.0, 255.0) as u8
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom::core::{DataElement, PrimitiveValue, VR};
    use dicom::dictionary_std::{tags, uids};
    use dicom::object::{FileMetaTableBuilder, InMemDicomObject};

    fn write_gray_slice(path: &Path, width: u16, height: u16, bytes: Vec<u8>) {
        let object = InMemDicomObject::from_element_iter([
            DataElement::new(
                tags::SOP_CLASS_UID,
                VR::UI,
                PrimitiveValue::from(uids::SECONDARY_CAPTURE_IMAGE_STORAGE),
            ),
            DataElement::new(
                tags::SOP_INSTANCE_UID,
                VR::UI,
                PrimitiveValue::from("1.2.826.0.1.1"),
            ),
            DataElement::new(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1_u16)),
            DataElement::new(
                tags::PHOTOMETRIC_INTERPRETATION,
                VR::CS,
                PrimitiveValue::from("MONOCHROME2"),
            ),
            DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(height)),
            DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(width)),
            DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(8_u16)),
            DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(8_u16)),
            DataElement::new(tags::HIGH_BIT, VR::US, PrimitiveValue::from(7_u16)),
            DataElement::new(tags::PIXEL_REPRESENTATION, VR::US, PrimitiveValue::from(0_u16)),
            DataElement::new(tags::PIXEL_DATA, VR::OB, PrimitiveValue::from(bytes)),
        ]);
        let file = object
            .with_meta(
                FileMetaTableBuilder::new()
                    .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                    .media_storage_sop_class_uid(uids::SECONDARY_CAPTURE_IMAGE_STORAGE)
                    .media_storage_sop_instance_uid("1.2.826.0.1.1"),
            )
            .unwrap();
        file.write_to_file(path).unwrap();
    }

    #[test]
    fn test_extension_detection() {
        assert!(is_dicom_path(Path::new("scan.dcm")));
        assert!(is_dicom_path(Path::new("/data/CT.DICOM")));
        assert!(!is_dicom_path(Path::new("scan.png")));
        assert!(!is_dicom_path(Path::new("dcm")));
    }

    #[test]
    fn test_stretch_to_u8() {
        assert_eq!(stretch_to_u8(&[100.0, 150.0, 200.0]), vec![0, 128, 255]);
        assert_eq!(stretch_to_u8(&[-1000.0, 3000.0]), vec![0, 255]);
        assert_eq!(stretch_to_u8(&[42.0; 4]), vec![0; 4]);
        assert_eq!(stretch_to_u8(&[f32::NAN, 0.0, 10.0]), vec![0, 0, 255]);
        assert!(stretch_to_u8(&[]).is_empty());
    }

    #[test]
    fn test_gray_slice_decodes_to_rgb() {
        let path = std::env::temp_dir()
            .join(format!("radiomesh-dicom-{}-gray.dcm", std::process::id()));
        // 4 x 2 ramp from 10 to 80
        let bytes: Vec<u8> = (0..8).map(|i| 10 + 10 * i as u8).collect();
        write_gray_slice(&path, 4, 2, bytes);

        let source = DicomSource::new(&path);
        let decoded = source.decode();
        std::fs::remove_file(&path).ok();
        let pixels = decoded.unwrap();

        assert_eq!(pixels.dimensions(), (4, 2));
        assert_eq!(pixels.rgb(0, 0), [0; 3]);
        assert_eq!(pixels.rgb(3, 1), [255; 3]);
        let [r, g, b] = pixels.rgb(1, 0);
        assert_eq!((r, r), (g, b));
        assert!(r > 0 && r < 255);
    }

    #[test]
    fn test_missing_dicom_file() {
        let source = DicomSource::new("/nonexistent/radiomesh/slice.dcm");
        assert!(matches!(source.decode(), Err(DecodeError::DicomRead(_))));
        assert_eq!(source.describe(), "/nonexistent/radiomesh/slice.dcm");
    }
}
