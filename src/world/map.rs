use crate::world::position::Position;
use crate::world::tile::Tile;
use std::collections::HashMap;

/// Sparse tile storage; sectors/loading belong to the excluded map
/// pipeline, the engine only needs positional access.
#[derive(Debug, Default)]
pub struct WorldMap {
    tiles: HashMap<Position, Tile>,
}

impl WorldMap {
    pub fn tile(&self, position: Position) -> Option<&Tile> {
        self.tiles.get(&position)
    }

    pub fn tile_mut(&mut self, position: Position) -> Option<&mut Tile> {
        self.tiles.get_mut(&position)
    }

    pub fn ensure_tile(&mut self, position: Position) -> &mut Tile {
        self.tiles.entry(position).or_default()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}
