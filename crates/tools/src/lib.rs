pub mod import;
pub mod summary;

use foundation::BoundingBox;

/// Parses `minLng,minLat,maxLng,maxLat`.
pub fn parse_bbox(raw: &str) -> Result<BoundingBox, String> {
    let parts: Vec<_> = raw.split(',').collect();
    if parts.len() != 4 {
        return Err("bbox must be minLng,minLat,maxLng,maxLat".to_string());
    }
    let mut v = [0.0f64; 4];
    for (slot, part) in v.iter_mut().zip(&parts) {
        *slot = part
            .trim()
            .parse()
            .map_err(|e| format!("bbox value {part:?}: {e}"))?;
    }
    Ok(BoundingBox::new(v[0], v[1], v[2], v[3]))
}
