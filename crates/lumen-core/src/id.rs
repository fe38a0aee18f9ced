//! Object identity allocation.

/// Identifier for an object in a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32);

impl ObjectId {
    /// Get the raw numeric value.
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Hands out unique object IDs.
///
/// An instance of this allocator is owned by the scene container; IDs are
/// unique per allocator, not process-wide.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    /// Create a new allocator starting at ID 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next ID.
    pub fn next(&mut self) -> ObjectId {
        let id = ObjectId(self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_unique() {
        let mut alloc = IdAllocator::new();
        let a = alloc.next();
        let b = alloc.next();
        let c = alloc.next();
        assert_eq!(a.raw(), 0);
        assert_eq!(b.raw(), 1);
        assert_eq!(c.raw(), 2);
        assert_ne!(a, b);
    }

    #[test]
    fn allocators_are_independent() {
        let mut a = IdAllocator::new();
        let mut b = IdAllocator::new();
        assert_eq!(a.next().raw(), 0);
        assert_eq!(b.next().raw(), 0);
    }
}
