use crate::config::GridSettings;
use crate::models::PixelRect;
use crate::render::CardInfo;

pub const MAX_COLUMNS: usize = 512;

pub trait Measurable {
    fn natural_height(&self) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeManager {
    card_width: f64,
    min_height: f64,
    gap: f64,
    default_columns: usize,
    anomalous_threshold: f64,
    fallback_height: f64,
}

impl Default for SizeManager {
    fn default() -> Self {
        Self::new(&GridSettings::default())
    }
}

impl SizeManager {
    pub fn new(settings: &GridSettings) -> Self {
        Self {
            card_width: settings.card_width,
            min_height: settings.min_card_height,
            gap: settings.gap,
            default_columns: settings.default_columns.max(1),
            anomalous_threshold: settings.anomalous_height_threshold,
            fallback_height: settings.fallback_height,
        }
    }

    pub fn card_width(&self) -> f64 {
        self.card_width
    }

    pub fn default_columns(&self) -> usize {
        self.default_columns
    }

    pub fn calculate_column_count(&self, available_width: f64) -> usize {
        if !available_width.is_finite() || available_width <= 0.0 {
            return self.default_columns;
        }
        let columns = ((available_width + self.gap) / (self.card_width + self.gap)).floor();
        (columns.min(MAX_COLUMNS as f64) as usize).max(1)
    }

    pub fn calculate_pixel_position(&self, column: usize, y_offset: f64) -> (f64, f64) {
        (column as f64 * (self.card_width + self.gap), y_offset)
    }

    pub fn calculate_actual_pixel_size(&self, node: &impl Measurable) -> (f64, f64) {
        (self.card_width, self.clamp_height(node.natural_height()))
    }

    /// Heights above the anomalous threshold are replaced by the fallback
    /// height; everything is floored at the minimum.
    pub fn clamp_height(&self, raw: f64) -> f64 {
        if !raw.is_finite() || raw > self.anomalous_threshold {
            return self.fallback_height.max(self.min_height);
        }
        raw.max(self.min_height)
    }

    pub fn card_rect(&self, column: usize, y_offset: f64, height: f64) -> PixelRect {
        let (x, y) = self.calculate_pixel_position(column, y_offset);
        PixelRect {
            x,
            y,
            width: self.card_width,
            height,
        }
    }

    pub fn calculate_max_dimensions(&self, cards: &[CardInfo]) -> (f64, f64) {
        cards
            .iter()
            .filter_map(|card| {
                card.bounds.or_else(|| {
                    card.position
                        .map(|position| self.card_rect(position.column, position.y_offset, card.actual_height))
                })
            })
            .fold((0.0_f64, 0.0_f64), |(max_x, max_y), rect| {
                (max_x.max(rect.right()), max_y.max(rect.bottom()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{Measurable, SizeManager, MAX_COLUMNS};
    use crate::config::GridSettings;

    struct Reported(f64);

    impl Measurable for Reported {
        fn natural_height(&self) -> f64 {
            self.0
        }
    }

    #[test]
    fn column_count_follows_width() {
        let sizes = SizeManager::default();
        // (1000 + 12) / (240 + 12) = 4.01
        assert_eq!(sizes.calculate_column_count(1000.0), 4);
        assert_eq!(sizes.calculate_column_count(240.0), 1);
        assert_eq!(sizes.calculate_column_count(100.0), 1);
        assert_eq!(sizes.calculate_column_count(0.0), 3);
        assert_eq!(sizes.calculate_column_count(-50.0), 3);
        assert_eq!(sizes.calculate_column_count(f64::NAN), 3);
    }

    #[test]
    fn column_count_is_capped_for_huge_widths() {
        let sizes = SizeManager::default();
        assert_eq!(sizes.calculate_column_count(1e20), MAX_COLUMNS);
        assert_eq!(sizes.calculate_column_count(f64::MAX), MAX_COLUMNS);
    }

    #[test]
    fn pixel_position_scales_columns_only() {
        let sizes = SizeManager::default();
        assert_eq!(sizes.calculate_pixel_position(0, 40.0), (0.0, 40.0));
        assert_eq!(sizes.calculate_pixel_position(2, 75.5), (504.0, 75.5));
    }

    #[test]
    fn anomalous_and_small_heights_are_clamped() {
        let sizes = SizeManager::default();
        assert_eq!(sizes.calculate_actual_pixel_size(&Reported(10_000.0)), (240.0, 320.0));
        assert_eq!(sizes.calculate_actual_pixel_size(&Reported(50.0)), (240.0, 100.0));
        assert_eq!(sizes.calculate_actual_pixel_size(&Reported(640.0)), (240.0, 640.0));
        assert_eq!(sizes.clamp_height(f64::INFINITY), 320.0);
    }

    #[test]
    fn clamp_constants_are_configurable() {
        let sizes = SizeManager::new(&GridSettings {
            anomalous_height_threshold: 500.0,
            fallback_height: 200.0,
            ..GridSettings::default()
        });
        assert_eq!(sizes.clamp_height(600.0), 200.0);
        assert_eq!(sizes.clamp_height(450.0), 450.0);
    }

    #[test]
    fn low_fallback_is_floored_at_the_minimum() {
        let sizes = SizeManager::new(&GridSettings {
            fallback_height: 50.0,
            ..GridSettings::default()
        });
        assert_eq!(sizes.clamp_height(9000.0), 100.0);
        assert_eq!(sizes.clamp_height(f64::NAN), 100.0);
    }
}
