//! Sparkline rendering for history trends

const BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Render scores (0..=100) as a block sparkline.
pub fn render(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| {
            let clamped = v.clamp(0.0, 100.0);
            let bucket = ((clamped / 100.0) * (BLOCKS.len() - 1) as f64).round() as usize;
            BLOCKS[bucket]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extremes() {
        assert_eq!(render(&[0.0, 100.0]), "▁█");
    }

    #[test]
    fn test_monotone_series() {
        let line = render(&[0.0, 25.0, 50.0, 75.0, 100.0]);
        let chars: Vec<char> = line.chars().collect();
        for pair in chars.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn test_out_of_range_clamped() {
        assert_eq!(render(&[-5.0, 150.0]), "▁█");
    }

    #[test]
    fn test_empty() {
        assert_eq!(render(&[]), "");
    }
}
