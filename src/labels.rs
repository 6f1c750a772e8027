//! Classifier label parsing
//!
//! The visual classifier packs crop and disease into one label,
//! e.g. `Tomato___Late_blight` or `Cherry_(including_sour)___Powdery_mildew`.

use crate::types::UNKNOWN_CROP;

/// Token between the crop half and the disease half of a label
pub const LABEL_SEPARATOR: &str = "___";

/// Qualifier dropped from crop names
const CROP_QUALIFIER: &str = "(including sour)";

/// Split a raw label into human-readable `(crop, disease)`.
///
/// Labels without the separator come back as `("Unknown Crop", label)`.
pub fn parse_crop_and_disease(label: &str) -> (String, String) {
    let Some((crop, disease)) = label.split_once(LABEL_SEPARATOR) else {
        return (UNKNOWN_CROP.to_string(), label.to_string());
    };

    let crop = crop.replace('_', " ").replace(CROP_QUALIFIER, "");
    let disease = disease.replace('_', " ");

    (title_case(crop.trim()), title_case(&disease))
}

/// Uppercase every letter that follows a non-letter, lowercase the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_letter = false;

    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_letter = true;
        } else {
            out.push(c);
            prev_letter = false;
        }
    }

    out
}
