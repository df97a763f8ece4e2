//! Where cell content goes when the grid changes shape.

use super::GridLayout;

/// Maps a cell of the old layout onto a cell of the new one.
///
/// Returning `None` drops the cell's content.
pub trait RemapPolicy: Send + Sync {
    fn name(&self) -> &'static str;
    fn target(&self, old: &GridLayout, new: &GridLayout, row: u32, col: u32) -> Option<(u32, u32)>;
}

/// Flat row-major index `i` of the old grid goes to index `i` of the new one.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemapByIndex;

impl RemapPolicy for RemapByIndex {
    fn name(&self) -> &'static str {
        "index"
    }

    fn target(&self, old: &GridLayout, new: &GridLayout, row: u32, col: u32) -> Option<(u32, u32)> {
        new.position_of(old.index_of(row, col)?)
    }
}

/// `(row, col)` keeps its coordinates; cells outside the new grid are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemapByCoordinate;

impl RemapPolicy for RemapByCoordinate {
    fn name(&self) -> &'static str {
        "coordinate"
    }

    fn target(&self, _old: &GridLayout, new: &GridLayout, row: u32, col: u32) -> Option<(u32, u32)> {
        new.index_of(row, col).map(|_| (row, col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_index() {
        let (old, new) = (GridLayout::new(2, 2), GridLayout::new(1, 2));
        assert_eq!(RemapByIndex.target(&old, &new, 0, 0), Some((0, 0)));
        assert_eq!(RemapByIndex.target(&old, &new, 0, 1), Some((1, 0)));
        assert_eq!(RemapByIndex.target(&old, &new, 1, 0), None);
    }

    #[test]
    fn test_by_coordinate() {
        let (old, new) = (GridLayout::new(2, 2), GridLayout::new(1, 2));
        assert_eq!(RemapByCoordinate.target(&old, &new, 0, 0), Some((0, 0)));
        assert_eq!(RemapByCoordinate.target(&old, &new, 0, 1), None);
        assert_eq!(RemapByCoordinate.target(&old, &new, 1, 0), Some((1, 0)));
    }

    #[test]
    fn test_growing_keeps_everything() {
        let (old, new) = (GridLayout::new(2, 2), GridLayout::new(3, 3));
        for (row, col) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
            assert_eq!(RemapByCoordinate.target(&old, &new, row, col), Some((row, col)));
            assert!(RemapByIndex.target(&old, &new, row, col).is_some());
        }
    }
}
