//! The bounded FIFO of frames awaiting path resolution.

use std::collections::VecDeque;

use hwmp_core::{IfaceId, MeshAddress};

use crate::plugin::{MeshFrame, RouteReply};

/// A frame parked while discovery for its destination runs.
pub struct QueuedPacket {
    pub frame: MeshFrame,
    pub src: MeshAddress,
    pub dst: MeshAddress,
    pub protocol: u16,
    pub in_iface: IfaceId,
    pub reply: RouteReply,
}

/// FIFO bounded by the configured queue size, indexed by destination on
/// dequeue.
pub struct PendingQueue {
    packets: VecDeque<QueuedPacket>,
    capacity: usize,
}

impl PendingQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            packets: VecDeque::new(),
            capacity,
        }
    }

    /// Append a packet, or hand it back when the queue is full.
    pub fn enqueue(&mut self, packet: QueuedPacket) -> Result<(), QueuedPacket> {
        if self.packets.len() >= self.capacity {
            return Err(packet);
        }
        self.packets.push_back(packet);
        Ok(())
    }

    /// Remove and return the oldest packet destined to `dst`.
    pub fn dequeue_first_for(&mut self, dst: MeshAddress) -> Option<QueuedPacket> {
        let index = self.packets.iter().position(|p| p.dst == dst)?;
        self.packets.remove(index)
    }

    /// Remove and return the oldest packet regardless of destination.
    pub fn dequeue_first(&mut self) -> Option<QueuedPacket> {
        self.packets.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.packets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(seed: u8) -> MeshAddress {
        MeshAddress::new([seed, 0, 0, 0, 0, seed])
    }

    fn packet(dst: MeshAddress, marker: u8) -> QueuedPacket {
        QueuedPacket {
            frame: MeshFrame::from_upper(vec![marker]),
            src: addr(1),
            dst,
            protocol: 0x0800,
            in_iface: IfaceId(0),
            reply: Box::new(|_, _, _, _, _, _| {}),
        }
    }

    #[test]
    fn fifo_order_per_destination() {
        let mut queue = PendingQueue::new(8);
        queue.enqueue(packet(addr(2), 1)).ok().unwrap();
        queue.enqueue(packet(addr(3), 2)).ok().unwrap();
        queue.enqueue(packet(addr(2), 3)).ok().unwrap();

        let first = queue.dequeue_first_for(addr(2)).unwrap();
        assert_eq!(first.frame.payload, vec![1]);
        let second = queue.dequeue_first_for(addr(2)).unwrap();
        assert_eq!(second.frame.payload, vec![3]);
        assert!(queue.dequeue_first_for(addr(2)).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn dequeue_first_ignores_destination() {
        let mut queue = PendingQueue::new(8);
        queue.enqueue(packet(addr(2), 1)).ok().unwrap();
        queue.enqueue(packet(addr(3), 2)).ok().unwrap();
        assert_eq!(queue.dequeue_first().unwrap().frame.payload, vec![1]);
        assert_eq!(queue.dequeue_first().unwrap().frame.payload, vec![2]);
        assert!(queue.dequeue_first().is_none());
    }

    #[test]
    fn rejects_at_capacity() {
        let mut queue = PendingQueue::new(2);
        assert!(queue.enqueue(packet(addr(2), 1)).is_ok());
        assert!(queue.enqueue(packet(addr(2), 2)).is_ok());
        let rejected = queue.enqueue(packet(addr(2), 3)).unwrap_err();
        assert_eq!(rejected.frame.payload, vec![3]);
        assert_eq!(queue.len(), 2);

        // Draining one frees a slot.
        queue.dequeue_first();
        assert!(queue.enqueue(packet(addr(2), 4)).is_ok());
    }
}
