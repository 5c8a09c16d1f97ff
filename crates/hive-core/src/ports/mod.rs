//! Port pool shared by the register and carved into per-device ranges.
//!
//! A [`PortAllocator`] remembers every port it was created with (`owned`) and which of
//! those are currently free (`available`). Only owned ports can ever be released back,
//! so releasing a foreign or already-free port is a no-op.

use std::collections::BTreeSet;

use thiserror::Error;

pub type Port = u16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PortError {
    #[error("no ports available: requested {requested}, {available} free")]
    NoPortsAvailable { requested: usize, available: usize },
    #[error("invalid port range: {minimum}..={maximum}")]
    InvalidRange { minimum: Port, maximum: Port },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortAllocator {
    owned: BTreeSet<Port>,
    available: BTreeSet<Port>,
}

impl PortAllocator {
    /// Pool made of an explicit list of ports.
    pub fn from_ports(ports: impl IntoIterator<Item = Port>) -> Self {
        let owned: BTreeSet<Port> = ports.into_iter().collect();
        Self {
            available: owned.clone(),
            owned,
        }
    }

    /// Pool covering `minimum..=maximum`.
    pub fn from_range(minimum: Port, maximum: Port) -> Result<Self, PortError> {
        if minimum > maximum {
            return Err(PortError::InvalidRange { minimum, maximum });
        }
        Ok(Self::from_ports(minimum..=maximum))
    }

    /// An allocator with nothing to hand out.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every port belonging to this allocator, free or not.
    pub fn ports(&self) -> Vec<Port> {
        self.owned.iter().copied().collect()
    }

    pub fn available(&self) -> Vec<Port> {
        self.available.iter().copied().collect()
    }

    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owned.is_empty()
    }

    /// Take the lowest free port.
    pub fn allocate_port(&mut self) -> Result<Port, PortError> {
        self.available
            .pop_first()
            .ok_or(PortError::NoPortsAvailable {
                requested: 1,
                available: 0,
            })
    }

    /// Take `n` ports and hand them out as a new allocator owned by the caller.
    ///
    /// The lowest contiguous run of `n` free ports is preferred; when the pool is too
    /// fragmented for that, the `n` lowest free ports are used instead.
    pub fn allocate_port_range(&mut self, n: usize) -> Result<PortAllocator, PortError> {
        if self.available.len() < n {
            return Err(PortError::NoPortsAvailable {
                requested: n,
                available: self.available.len(),
            });
        }
        let picked = self
            .contiguous_run(n)
            .unwrap_or_else(|| self.available.iter().copied().take(n).collect());
        for port in &picked {
            self.available.remove(port);
        }
        Ok(PortAllocator::from_ports(picked))
    }

    /// Return a single port. Ports this allocator does not own are ignored.
    pub fn release_port(&mut self, port: Port) {
        if self.owned.contains(&port) {
            self.available.insert(port);
        }
    }

    /// Return every port of a sub-allocator created by [`Self::allocate_port_range`].
    pub fn release_port_range(&mut self, range: &PortAllocator) {
        for port in &range.owned {
            self.release_port(*port);
        }
    }

    fn contiguous_run(&self, n: usize) -> Option<Vec<Port>> {
        if n == 0 {
            return Some(Vec::new());
        }
        let mut run: Vec<Port> = Vec::with_capacity(n);
        for port in &self.available {
            match run.last() {
                Some(last) if last.checked_add(1) == Some(*port) => run.push(*port),
                _ => {
                    run.clear();
                    run.push(*port);
                }
            }
            if run.len() == n {
                return Some(run);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_port_takes_lowest_and_exhausts() {
        let mut pool = PortAllocator::from_ports([4001, 4000]);
        assert_eq!(pool.allocate_port(), Ok(4000));
        assert_eq!(pool.allocate_port(), Ok(4001));
        assert_eq!(
            pool.allocate_port(),
            Err(PortError::NoPortsAvailable {
                requested: 1,
                available: 0
            })
        );
    }

    #[test]
    fn release_restores_pool_exactly() {
        let mut pool = PortAllocator::from_range(5000, 5009).unwrap();
        pool.allocate_port().unwrap();
        let before = pool.clone();

        let range = pool.allocate_port_range(4).unwrap();
        assert_eq!(range.ports(), vec![5001, 5002, 5003, 5004]);
        pool.release_port_range(&range);

        assert_eq!(pool, before);
    }

    #[test]
    fn consecutive_ranges_never_overlap() {
        let mut pool = PortAllocator::from_range(6000, 6011).unwrap();
        let a = pool.allocate_port_range(4).unwrap();
        let b = pool.allocate_port_range(4).unwrap();
        assert!(a.ports().iter().all(|p| !b.ports().contains(p)));
        assert_eq!(pool.available_count(), 4);
    }

    #[test]
    fn range_request_larger_than_pool_fails_without_side_effects() {
        let mut pool = PortAllocator::from_range(7000, 7002).unwrap();
        let before = pool.clone();
        assert_eq!(
            pool.allocate_port_range(4),
            Err(PortError::NoPortsAvailable {
                requested: 4,
                available: 3
            })
        );
        assert_eq!(pool, before);
    }

    #[test]
    fn fragmented_pool_prefers_contiguous_then_falls_back() {
        let mut pool = PortAllocator::from_ports([1, 2, 4, 5, 6, 9]);
        assert_eq!(pool.allocate_port_range(3).unwrap().ports(), vec![4, 5, 6]);
        assert_eq!(pool.allocate_port_range(3).unwrap().ports(), vec![1, 2, 9]);
    }

    #[test]
    fn releasing_foreign_or_free_ports_is_a_noop() {
        let mut pool = PortAllocator::from_range(8000, 8001).unwrap();
        let before = pool.clone();
        pool.release_port(9999);
        pool.release_port(8000);
        assert_eq!(pool, before);
    }

    #[test]
    fn sub_allocator_hands_out_only_its_ports() {
        let mut pool = PortAllocator::from_range(4000, 4007).unwrap();
        let mut range = pool.allocate_port_range(2).unwrap();
        assert_eq!(range.allocate_port(), Ok(4000));
        assert_eq!(range.allocate_port(), Ok(4001));
        assert!(range.allocate_port().is_err());
        range.release_port(4001);
        range.release_port(4000);
        assert_eq!(range.available(), vec![4000, 4001]);
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert_eq!(
            PortAllocator::from_range(10, 1),
            Err(PortError::InvalidRange {
                minimum: 10,
                maximum: 1
            })
        );
    }

    #[test]
    fn zero_sized_range_is_empty() {
        let mut pool = PortAllocator::from_range(1, 2).unwrap();
        let range = pool.allocate_port_range(0).unwrap();
        assert!(range.is_empty());
        assert_eq!(pool.available_count(), 2);
    }
}
