//! ASCII trend charts.

/// Renders a sequence of readings as a multi-level text chart.
///
/// ```text
/// Hotend (204.900 to 205.400, range: 0.500°C):
/// 205.40 |    *
/// 205.30 |  * **
/// 205.20 |  *****
/// 205.10 |* *****
/// 205.00 |*******
/// 204.90 |*******
///        +-------
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TextGraphRenderer {
    mark: char,
}

impl TextGraphRenderer {
    /// Number of horizontal levels in a chart.
    pub const LEVELS: usize = 6;

    /// Slack on each level's normalized position so values sitting exactly
    /// on a boundary are not dropped by rounding.
    pub const TOLERANCE: f64 = 0.1;

    /// Narrowest level label column.
    const MIN_LABEL_WIDTH: usize = 6;

    /// Create a renderer using `mark` for plotted cells.
    pub fn new(mark: char) -> Self {
        Self { mark }
    }

    /// Render the last `width` values of `values` under `label`.
    ///
    /// The value range is taken over the whole sequence. Fewer than two
    /// values, or a flat sequence, produce a single descriptive line.
    pub fn render(&self, values: &[f64], width: usize, label: &str) -> String {
        let Some(&first) = values.first() else {
            return format!("{label}: no data");
        };

        let (min, max) = values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let range = max - min;

        if values.len() < 2 || range == 0.0 {
            return format!("{label}: all values equal to {min:.3}");
        }

        let plotted = &values[values.len().saturating_sub(width)..];
        let top = (Self::LEVELS - 1) as f64;
        let label_width = format!("{min:.2}")
            .len()
            .max(format!("{max:.2}").len())
            .max(Self::MIN_LABEL_WIDTH);

        let mut graph = format!("{label} ({min:.3} to {max:.3}, range: {range:.3}°C):\n");

        for i in (0..Self::LEVELS).rev() {
            let position = i as f64 / top;
            let level = min + range * position;

            graph.push_str(&format!("{level:>label_width$.2} |"));
            for &value in plotted {
                let normalized = (value - min) / range;
                if normalized >= position - Self::TOLERANCE {
                    graph.push(self.mark);
                } else {
                    graph.push(' ');
                }
            }
            graph.push('\n');
        }

        graph.push_str(&" ".repeat(label_width + 1));
        graph.push('+');
        graph.push_str(&"-".repeat(plotted.len()));
        graph.push('\n');

        graph
    }
}

impl Default for TextGraphRenderer {
    fn default() -> Self {
        Self::new('*')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_flat_sequence_single_line() {
        let out = TextGraphRenderer::default().render(&[5.0, 5.0, 5.0], 40, "Bed");
        assert_eq!(out, "Bed: all values equal to 5.000");
        assert!(!out.contains('\n'));
    }

    #[test]
    fn test_single_value_single_line() {
        let out = TextGraphRenderer::default().render(&[210.0], 40, "Hotend");
        assert_eq!(out, "Hotend: all values equal to 210.000");
    }

    #[test]
    fn test_empty_sequence() {
        let out = TextGraphRenderer::default().render(&[], 40, "Hotend");
        assert_eq!(out, "Hotend: no data");
    }

    #[test]
    fn test_rising_ramp() {
        let out = TextGraphRenderer::default().render(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0], 10, "Ramp");
        let expected = "\
Ramp (0.000 to 5.000, range: 5.000°C):
  5.00 |     *
  4.00 |    **
  3.00 |   ***
  2.00 |  ****
  1.00 | *****
  0.00 |******
       +------
";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_only_last_width_values_plotted() {
        let values: Vec<f64> = (0..50).map(|v| v as f64).collect();
        let out = TextGraphRenderer::default().render(&values, 8, "Wide");

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 1 + TextGraphRenderer::LEVELS + 1);
        assert_eq!(lines.last().copied(), Some("       +--------"));
        for row in &lines[1..=TextGraphRenderer::LEVELS] {
            assert_eq!(row.chars().count(), "  0.00 |".len() + 8);
        }
        // Range still spans the whole sequence.
        assert!(lines[0].contains("0.000 to 49.000"));
    }

    #[test]
    fn test_axis_matches_short_sequence() {
        let out = TextGraphRenderer::default().render(&[1.0, 2.0, 1.5], 60, "Short");
        assert!(out.ends_with("       +---\n"));
    }

    #[test]
    fn test_wide_levels_keep_axis_aligned() {
        let out = TextGraphRenderer::default().render(&[998.0, 1002.0, 1000.0], 10, "Hot");
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[1], "1002.00 | * ");
        assert_eq!(lines[TextGraphRenderer::LEVELS], " 998.00 |***");
        assert_eq!(lines[TextGraphRenderer::LEVELS + 1], "        +---");
        for row in &lines[1..] {
            assert_eq!(row.find(['|', '+']), Some(8));
        }
    }

    #[test]
    fn test_custom_mark() {
        let out = TextGraphRenderer::new('#').render(&[1.0, 2.0], 10, "X");
        assert!(out.contains('#'));
        assert!(!out.contains('*'));
    }
}
