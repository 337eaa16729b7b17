use dicom_core::Tag;
use dicom_object::InMemDicomObject;

// Image identification
pub const IMAGE_TYPE: Tag = Tag(0x0008, 0x0008);
pub const MODALITY: Tag = Tag(0x0008, 0x0060);
pub const SERIES_DESCRIPTION: Tag = Tag(0x0008, 0x103E);
pub const PROTOCOL_NAME: Tag = Tag(0x0018, 0x1030);
pub const SEQUENCE_NAME: Tag = Tag(0x0018, 0x0024);

// Image geometry
pub const ROWS: Tag = Tag(0x0028, 0x0010);
pub const COLUMNS: Tag = Tag(0x0028, 0x0011);
pub const NUMBER_OF_FRAMES: Tag = Tag(0x0028, 0x0008);
pub const PIXEL_SPACING: Tag = Tag(0x0028, 0x0030);
pub const SLICE_THICKNESS: Tag = Tag(0x0018, 0x0050);
pub const SPACING_BETWEEN_SLICES: Tag = Tag(0x0018, 0x0088);

// Scanner
pub const MANUFACTURER: Tag = Tag(0x0008, 0x0070);
pub const MANUFACTURER_MODEL_NAME: Tag = Tag(0x0008, 0x1090);
pub const MAGNETIC_FIELD_STRENGTH: Tag = Tag(0x0018, 0x0087);

/// Helper to get string value from DICOM tag
///
/// Returns `None` if the tag is not present, cannot be converted to string,
/// or is blank
pub fn get_string_value(dcm: &InMemDicomObject, tag: Tag) -> Option<String> {
    dcm.element(tag)
        .ok()
        .and_then(|elem| elem.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Helper to get integer value from DICOM tag
pub fn get_int_value(dcm: &InMemDicomObject, tag: Tag) -> Option<i32> {
    dcm.element(tag)
        .ok()
        .and_then(|elem| elem.to_int::<i32>().ok())
}

/// Helper to get a floating point value from DICOM tag
pub fn get_f64_value(dcm: &InMemDicomObject, tag: Tag) -> Option<f64> {
    dcm.element(tag)
        .ok()
        .and_then(|elem| elem.to_float64().ok())
}

/// Helper to get multi-string value from DICOM tag
///
/// Falls back to splitting a single string on backslashes
pub fn get_multi_string_value(dcm: &InMemDicomObject, tag: Tag) -> Option<Vec<String>> {
    dcm.element(tag).ok().and_then(|elem| {
        if let Ok(strs) = elem.to_multi_str() {
            Some(strs.iter().map(|s| s.trim().to_string()).collect())
        } else {
            elem.to_str()
                .ok()
                .map(|s| s.split('\\').map(|part| part.trim().to_string()).collect())
        }
    })
}
