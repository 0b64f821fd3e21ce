use image::Rgb;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> Rgb<u8> {
    let rgb: Srgb = Hsl::new(hue, saturation, lightness).into_color();
    Rgb([
        (rgb.red * 255.0) as u8,
        (rgb.green * 255.0) as u8,
        (rgb.blue * 255.0) as u8,
    ])
}

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Rgb<u8>> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| hsl_to_rgb((i as f32 / n as f32) * 360.0, 0.75, 0.55))
        .collect()
}

// ---------------------------------------------------------------------------
// Diverging scale for correlations
// ---------------------------------------------------------------------------

/// Missing correlations are drawn in this colour.
pub const UNDEFINED: Rgb<u8> = Rgb([220, 220, 220]);

/// Map a correlation in `[-1, 1]` to blue (negative) through white to red
/// (positive). `NaN` maps to [`UNDEFINED`].
pub fn correlation_color(r: f64) -> Rgb<u8> {
    if r.is_nan() {
        return UNDEFINED;
    }
    let r = r.clamp(-1.0, 1.0) as f32;
    let hue = if r >= 0.0 { 0.0 } else { 220.0 };
    // Full strength at |r| = 1 sits at lightness 0.45, zero is white.
    let lightness = 1.0 - 0.55 * r.abs();
    hsl_to_rgb(hue, 0.8, lightness)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_has_requested_size_and_distinct_colors() {
        let colors = generate_palette(4);
        assert_eq!(colors.len(), 4);
        for i in 0..colors.len() {
            for j in (i + 1)..colors.len() {
                assert_ne!(colors[i], colors[j]);
            }
        }
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn correlation_scale_is_diverging() {
        let zero = correlation_color(0.0);
        assert!(zero.0.iter().all(|&c| c >= 250));

        let pos = correlation_color(1.0);
        assert!(pos.0[0] > pos.0[2]);
        let neg = correlation_color(-1.0);
        assert!(neg.0[2] > neg.0[0]);

        assert_eq!(correlation_color(f64::NAN), UNDEFINED);
    }
}
