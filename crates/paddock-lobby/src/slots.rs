//! Fixed-capacity grid slots.

/// Returned by [`SlotAllocator::acquire`] when every slot is occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("all {capacity} slots are occupied")]
pub struct Full {
    pub capacity: usize,
}

/// Assigns slots lowest-free-index first.
///
/// Only the session directory holds one, and only inside its single
/// mutation path, so occupancy needs no locking of its own.
#[derive(Debug, Clone)]
pub struct SlotAllocator {
    occupied: Vec<bool>,
}

impl SlotAllocator {
    pub fn new(capacity: usize) -> Self {
        Self {
            occupied: vec![false; capacity],
        }
    }

    /// Claims the lowest free slot.
    pub fn acquire(&mut self) -> Result<usize, Full> {
        let index = self
            .occupied
            .iter()
            .position(|taken| !taken)
            .ok_or(Full {
                capacity: self.occupied.len(),
            })?;
        self.occupied[index] = true;
        Ok(index)
    }

    /// Frees `index`. Returns `false` if it was already free or out of range.
    pub fn release(&mut self, index: usize) -> bool {
        match self.occupied.get_mut(index) {
            Some(taken) if *taken => {
                *taken = false;
                true
            }
            _ => false,
        }
    }

    pub fn is_occupied(&self, index: usize) -> bool {
        self.occupied.get(index).copied().unwrap_or(false)
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied.iter().filter(|taken| **taken).count()
    }

    pub fn capacity(&self) -> usize {
        self.occupied.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_lowest_free_first() {
        let mut slots = SlotAllocator::new(3);
        assert_eq!(slots.acquire(), Ok(0));
        assert_eq!(slots.acquire(), Ok(1));
        assert!(slots.release(0));
        assert_eq!(slots.acquire(), Ok(0));
        assert_eq!(slots.acquire(), Ok(2));
    }

    #[test]
    fn test_acquire_when_full() {
        let mut slots = SlotAllocator::new(1);
        slots.acquire().unwrap();
        assert_eq!(slots.acquire(), Err(Full { capacity: 1 }));
        assert_eq!(slots.occupied_count(), 1);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut slots = SlotAllocator::new(2);
        let index = slots.acquire().unwrap();
        assert!(slots.release(index));
        assert!(!slots.release(index));
        assert!(!slots.release(99));
        assert_eq!(slots.occupied_count(), 0);
    }

    #[test]
    fn test_zero_capacity_is_always_full() {
        let mut slots = SlotAllocator::new(0);
        assert!(slots.acquire().is_err());
        assert!(!slots.is_occupied(0));
    }
}
