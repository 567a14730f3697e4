//! The plasma colormap used to shade sites by rank

/// Samples returned when the client does not ask for a size
pub const DEFAULT_SAMPLES: usize = 256;
pub const MAX_SAMPLES: usize = 1024;

/// Plasma at t = 0.0, 0.1, ..., 1.0
const PLASMA_STOPS: [[u8; 3]; 11] = [
    [0x0d, 0x08, 0x87],
    [0x41, 0x04, 0x9d],
    [0x6a, 0x00, 0xa8],
    [0x8f, 0x0d, 0xa4],
    [0xb1, 0x2a, 0x90],
    [0xcc, 0x47, 0x78],
    [0xe1, 0x64, 0x62],
    [0xf2, 0x84, 0x4b],
    [0xfc, 0xa6, 0x36],
    [0xfc, 0xce, 0x25],
    [0xf0, 0xf9, 0x21],
];

/// Colour at `t` in `[0, 1]` as RGB fractions
pub fn plasma_at(t: f64) -> [f64; 3] {
    let t = t.clamp(0.0, 1.0);
    let segments = (PLASMA_STOPS.len() - 1) as f64;
    let scaled = t * segments;
    let lower = (scaled.floor() as usize).min(PLASMA_STOPS.len() - 2);
    let frac = scaled - lower as f64;

    let (a, b) = (PLASMA_STOPS[lower], PLASMA_STOPS[lower + 1]);
    std::array::from_fn(|i| {
        let channel = a[i] as f64 + (b[i] as f64 - a[i] as f64) * frac;
        channel / 255.0
    })
}

/// `n` colours sampled evenly from the start to the end of the map
///
/// `n` is clamped to `2..=MAX_SAMPLES` so both ends are always present.
pub fn plasma(n: usize) -> Vec<[f64; 3]> {
    let n = n.clamp(2, MAX_SAMPLES);
    (0..n)
        .map(|i| plasma_at(i as f64 / (n - 1) as f64))
        .collect()
}
