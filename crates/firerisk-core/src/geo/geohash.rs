//! Minimal geohash encoder used to derive coarse cache keys.

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";
const BITS_PER_CHAR: u8 = 5;

/// Encodes a coordinate pair as a geohash of `precision` characters.
///
/// Inputs are expected to be validated already; values outside the valid
/// ranges saturate to the nearest edge cell.
pub fn encode(lat: f64, lon: f64, precision: usize) -> String {
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut hash = String::with_capacity(precision);
    let mut bits = 0_u8;
    let mut bit_count = 0_u8;
    let mut even = true;

    while hash.len() < precision {
        let (range, value) = if even {
            (&mut lon_range, lon)
        } else {
            (&mut lat_range, lat)
        };

        let mid = (range.0 + range.1) / 2.0;
        if value >= mid {
            bits = (bits << 1) | 1;
            range.0 = mid;
        } else {
            bits <<= 1;
            range.1 = mid;
        }

        even = !even;
        bit_count += 1;
        if bit_count == BITS_PER_CHAR {
            hash.push(char::from(BASE32[usize::from(bits)]));
            bits = 0;
            bit_count = 0;
        }
    }

    hash
}
