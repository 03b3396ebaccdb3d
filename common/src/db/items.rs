use super::indices::ItemId;
use crate::geom::layer::LayerRange;
use crate::geom::point::Point;
use crate::geom::shape::CollisionShape;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemKind {
    Pad,
    Track,
    Arc,
    Via,
    Zone,
    Graphic,
}

/// Geometry as the loader hands it over. The connectivity engine reads this
/// data and never writes it back.
#[derive(Clone, Debug)]
pub enum ItemGeometry {
    Pad {
        center: Point<f64>,
        size: Point<f64>,
        round: bool,
    },
    Track {
        start: Point<f64>,
        end: Point<f64>,
        width: f64,
    },
    Arc {
        center: Point<f64>,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        width: f64,
    },
    Via {
        center: Point<f64>,
        diameter: f64,
    },
    Zone {
        outline: Vec<Point<f64>>,
    },
    Graphic(CollisionShape),
}

#[derive(Clone, Debug)]
pub struct BoardItem {
    pub geometry: ItemGeometry,
    /// The copper span is declared by the item (through-hole vs. SMD is a
    /// property of the source data, never inferred from geometry).
    pub layers: LayerRange,
    pub net_name: Option<String>,
}

impl BoardItem {
    pub fn kind(&self) -> ItemKind {
        match self.geometry {
            ItemGeometry::Pad { .. } => ItemKind::Pad,
            ItemGeometry::Track { .. } => ItemKind::Track,
            ItemGeometry::Arc { .. } => ItemKind::Arc,
            ItemGeometry::Via { .. } => ItemKind::Via,
            ItemGeometry::Zone { .. } => ItemKind::Zone,
            ItemGeometry::Graphic(_) => ItemKind::Graphic,
        }
    }

    /// Ratsnest anchor: pads and vias are the connection points a net's
    /// unrouted links are drawn between.
    pub fn anchor(&self) -> Option<Point<f64>> {
        match self.geometry {
            ItemGeometry::Pad { center, .. } | ItemGeometry::Via { center, .. } => Some(center),
            _ => None,
        }
    }
}

/// The board's item collection. Slots are stable, so an `ItemId` stays valid
/// until the item is removed; removed slots are never reused within a
/// session, which keeps handles unambiguous across incremental updates.
#[derive(Clone, Default)]
pub struct Board {
    slots: Vec<Option<BoardItem>>,
}

impl Board {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn add(&mut self, item: BoardItem) -> ItemId {
        let id = ItemId::new(self.slots.len());
        self.slots.push(Some(item));
        id
    }

    pub fn get(&self, id: ItemId) -> Option<&BoardItem> {
        self.slots.get(id.index()).and_then(|slot| slot.as_ref())
    }

    /// Replaces an item in place (a move or an edit). Returns false if the
    /// slot is empty.
    pub fn replace(&mut self, id: ItemId, item: BoardItem) -> bool {
        match self.slots.get_mut(id.index()) {
            Some(slot @ Some(_)) => {
                *slot = Some(item);
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, id: ItemId) -> Option<BoardItem> {
        self.slots.get_mut(id.index()).and_then(|slot| slot.take())
    }

    pub fn items(&self) -> impl Iterator<Item = (ItemId, &BoardItem)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|item| (ItemId::new(i), item)))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
