use std::fmt;

/// A copper layer index. Front copper is 0, inner layers count up from 1,
/// and the bottom copper sits at the fixed sentinel index regardless of how
/// many inner layers the board actually uses. Keeping the bottom at the
/// maximum index means "spans to the bottom" and "unbounded layer query"
/// are the same value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Layer(pub u8);

pub const F_CU: Layer = Layer(0);
pub const B_CU: Layer = Layer(31);
pub const MAX_COPPER_LAYERS: usize = 32;

impl Layer {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_bottom(self) -> bool {
        self == B_CU
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            F_CU => write!(f, "F.Cu"),
            B_CU => write!(f, "B.Cu"),
            Layer(n) => write!(f, "In{}.Cu", n),
        }
    }
}

/// The copper stack of a board with `count` enabled layers: front, the
/// inner layers in order, then bottom.
pub fn copper_stack(count: usize) -> Vec<Layer> {
    assert!((2..=MAX_COPPER_LAYERS).contains(&count));
    let mut stack = vec![F_CU];
    for i in 1..count - 1 {
        stack.push(Layer(i as u8));
    }
    stack.push(B_CU);
    stack
}

/// Inclusive span of copper layers an item occupies electrically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayerRange {
    pub start: Layer,
    pub end: Layer,
}

impl LayerRange {
    pub fn new(a: Layer, b: Layer) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    pub fn single(layer: Layer) -> Self {
        Self {
            start: layer,
            end: layer,
        }
    }

    /// Every copper layer, the range of a through-hole pad or via.
    pub const ALL_COPPER: LayerRange = LayerRange {
        start: F_CU,
        end: B_CU,
    };

    pub fn is_single(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, layer: Layer) -> bool {
        self.start <= layer && layer <= self.end
    }

    pub fn overlaps(&self, other: &LayerRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_normalizes_order() {
        let r = LayerRange::new(B_CU, F_CU);
        assert_eq!(r.start, F_CU);
        assert_eq!(r.end, B_CU);
    }

    #[test]
    fn overlap_is_inclusive() {
        let top = LayerRange::single(F_CU);
        let bottom = LayerRange::single(B_CU);
        let through = LayerRange::ALL_COPPER;
        assert!(!top.overlaps(&bottom));
        assert!(through.overlaps(&top));
        assert!(through.overlaps(&bottom));

        let a = LayerRange::new(Layer(1), Layer(3));
        let b = LayerRange::new(Layer(3), Layer(5));
        assert!(a.overlaps(&b));
        let c = LayerRange::new(Layer(4), Layer(5));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn copper_stack_shape() {
        let stack = copper_stack(4);
        assert_eq!(stack, vec![F_CU, Layer(1), Layer(2), B_CU]);
        assert_eq!(copper_stack(2), vec![F_CU, B_CU]);
    }
}
