use crate::config::GridSettings;
use crate::models::CellPosition;
use crate::render::CardInfo;

/// Greedy shortest-column packer. Ties go to the leftmost column.
#[derive(Debug, Clone)]
pub struct LayoutEngine {
    column_heights: Vec<f64>,
    default_columns: usize,
    default_height: f64,
    gap: f64,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(&GridSettings::default())
    }
}

impl LayoutEngine {
    pub fn new(settings: &GridSettings) -> Self {
        Self {
            column_heights: Vec::new(),
            default_columns: settings.default_columns.max(1),
            default_height: settings.min_card_height,
            gap: settings.gap,
        }
    }

    /// Cards without a measured height are backfilled with the default height
    /// so later passes see a concrete value.
    pub fn calculate_positions(&mut self, cards: &mut [CardInfo], available_columns: usize) -> Vec<CellPosition> {
        let columns = if available_columns == 0 {
            self.default_columns
        } else {
            available_columns
        };
        // Columns past the card count can never receive a card.
        let tracked = columns.min(cards.len().max(1));
        self.column_heights.clear();
        self.column_heights.resize(tracked, 0.0);

        let mut positions = Vec::with_capacity(cards.len());
        for card in cards.iter_mut() {
            let column = self.shortest_column();
            let y = self.column_heights[column];

            let height = if card.actual_height > 0.0 && card.actual_height.is_finite() {
                card.actual_height
            } else {
                card.actual_height = self.default_height;
                self.default_height
            };
            self.column_heights[column] += height + self.gap;
            positions.push(CellPosition { x: column, y });
        }
        positions
    }

    pub fn column_heights(&self) -> &[f64] {
        &self.column_heights
    }

    fn shortest_column(&self) -> usize {
        let mut best = 0;
        for (index, height) in self.column_heights.iter().enumerate().skip(1) {
            if *height < self.column_heights[best] {
                best = index;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::LayoutEngine;
    use crate::config::GridSettings;
    use crate::models::{CellPosition, Item, ItemKind};
    use crate::render::{CardOptions, RenderFactory};
    use crate::render::CardInfo;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashMap;

    const GAP: f64 = 12.0;

    fn card(id: i64, height: f64) -> CardInfo {
        let item = Item {
            id,
            parent_id: None,
            kind: ItemKind::Composite,
            title: format!("card {id}"),
            content: None,
            created_at: Utc::now(),
            modified_at: Utc::now(),
        };
        let factory = RenderFactory::new(GridSettings::default(), CardOptions::default());
        let mut info = factory.create_card_info(&item);
        info.actual_height = height;
        info
    }

    fn cards(heights: &[f64]) -> Vec<CardInfo> {
        heights
            .iter()
            .enumerate()
            .map(|(index, height)| card(index as i64 + 1, *height))
            .collect()
    }

    #[test]
    fn seven_card_scenario_packs_into_shortest_columns() {
        let mut engine = LayoutEngine::default();
        let mut list = cards(&[100.0, 50.0, 200.0, 50.0, 50.0, 300.0, 50.0]);
        let positions = engine.calculate_positions(&mut list, 3);

        let columns = positions.iter().map(|position| position.x).collect::<Vec<_>>();
        assert_eq!(columns, vec![0, 1, 2, 1, 0, 1, 0]);
        assert_eq!(positions[0], CellPosition { x: 0, y: 0.0 });
        assert_eq!(positions[3], CellPosition { x: 1, y: 50.0 + GAP });
        assert_eq!(positions[4], CellPosition { x: 0, y: 100.0 + GAP });
        assert_eq!(positions[6], CellPosition { x: 0, y: 150.0 + 2.0 * GAP });

        assert_eq!(
            engine.column_heights(),
            &[200.0 + 3.0 * GAP, 400.0 + 3.0 * GAP, 200.0 + GAP]
        );
    }

    #[test]
    fn ties_go_to_the_leftmost_column() {
        let mut engine = LayoutEngine::default();
        let mut list = cards(&[120.0, 120.0, 120.0, 120.0]);
        let positions = engine.calculate_positions(&mut list, 3);
        let columns = positions.iter().map(|position| position.x).collect::<Vec<_>>();
        assert_eq!(columns, vec![0, 1, 2, 0]);
    }

    #[test]
    fn zero_columns_fall_back_to_default() {
        let mut engine = LayoutEngine::default();
        let mut list = cards(&[100.0, 100.0, 100.0, 100.0]);
        let positions = engine.calculate_positions(&mut list, 0);
        assert_eq!(engine.column_heights().len(), 3);
        assert!(positions.iter().all(|position| position.x < 3));

        let mut empty: Vec<CardInfo> = Vec::new();
        assert!(engine.calculate_positions(&mut empty, 0).is_empty());
    }

    #[test]
    fn huge_column_counts_only_track_used_columns() {
        let mut engine = LayoutEngine::default();
        let mut list = cards(&[100.0, 200.0, 300.0]);
        let positions = engine.calculate_positions(&mut list, usize::MAX);
        let columns = positions.iter().map(|position| position.x).collect::<Vec<_>>();
        assert_eq!(columns, vec![0, 1, 2]);
        assert!(positions.iter().all(|position| position.y == 0.0));
        assert_eq!(engine.column_heights().len(), 3);
    }

    #[test]
    fn unmeasured_cards_are_backfilled() {
        let mut engine = LayoutEngine::default();
        let mut list = cards(&[0.0, -4.0, 180.0]);
        engine.calculate_positions(&mut list, 1);
        assert_eq!(list[0].actual_height, 100.0);
        assert_eq!(list[1].actual_height, 100.0);
        assert_eq!(list[2].actual_height, 180.0);
        assert_eq!(engine.column_heights(), &[380.0 + 3.0 * GAP]);
    }

    #[test]
    fn random_layouts_hold_placement_invariants() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut engine = LayoutEngine::default();

        for _ in 0..50 {
            let count = rng.random_range(0..40);
            let columns = rng.random_range(1..7);
            let heights = (0..count)
                .map(|_| rng.random_range(100.0..900.0))
                .collect::<Vec<f64>>();
            let mut list = cards(&heights);
            let positions = engine.calculate_positions(&mut list, columns);
            assert_eq!(positions.len(), list.len());

            let mut slots: HashMap<(usize, u64), i64> = HashMap::new();
            let mut last_offset = vec![-1.0_f64; columns];
            for (position, card) in positions.iter().zip(list.iter()) {
                assert!(position.x < columns);
                if let Some(previous) = slots.insert((position.x, position.y.to_bits()), card.item.id) {
                    assert_eq!(previous, card.item.id, "two cards share a slot");
                }
                assert!(position.y > last_offset[position.x], "column shrank");
                last_offset[position.x] = position.y;
            }

            let mut again = list.clone();
            assert_eq!(engine.calculate_positions(&mut again, columns), positions);
        }
    }
}
