//! Bounded moving average queues used by the restart heuristic.

/// Ring buffer keeping the sum of the last `max_size` pushed values.
///
/// The average is only meaningful once the queue is full, which is reported by
/// [`is_valid`](BoundedQueue::is_valid).
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BoundedQueue {
    pub elems: Vec<i64>,
    /// Next write position.
    pub first: usize,
    /// Position of the oldest value once the queue is full.
    pub last: usize,
    pub sum_of_queue: i64,
    pub max_size: usize,
    pub queue_size: usize,
}

impl BoundedQueue {
    /// An empty queue holding up to `max_size` values.
    pub fn new(max_size: usize) -> BoundedQueue {
        assert!(max_size > 0, "bounded queue without capacity");
        BoundedQueue {
            elems: vec![0; max_size],
            first: 0,
            last: 0,
            sum_of_queue: 0,
            max_size,
            queue_size: 0,
        }
    }

    /// Adds a value, evicting the oldest one when full.
    pub fn push(&mut self, value: i64) {
        if self.queue_size == self.max_size {
            debug_assert_eq!(self.first, self.last);
            self.sum_of_queue -= self.elems[self.last];
            self.last += 1;
            if self.last == self.max_size {
                self.last = 0;
            }
        } else {
            self.queue_size += 1;
        }
        self.sum_of_queue += value;
        self.elems[self.first] = value;
        self.first += 1;
        if self.first == self.max_size {
            self.first = 0;
            self.last = 0;
        }
    }

    /// Integer average of the stored values, 0 for an empty queue.
    pub fn average(&self) -> i64 {
        if self.queue_size == 0 {
            0
        } else {
            self.sum_of_queue / self.queue_size as i64
        }
    }

    pub fn is_valid(&self) -> bool {
        self.queue_size == self.max_size
    }

    /// Empties the queue keeping its capacity.
    pub fn clear(&mut self) {
        self.first = 0;
        self.last = 0;
        self.queue_size = 0;
        self.sum_of_queue = 0;
    }

    /// Whether the positions and size are within the capacity.
    pub(crate) fn is_consistent(&self) -> bool {
        self.elems.len() == self.max_size
            && self.queue_size <= self.max_size
            && (self.max_size == 0 || (self.first < self.max_size && self.last < self.max_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moving_average() {
        let mut queue = BoundedQueue::new(3);
        queue.push(3);
        queue.push(6);
        assert!(!queue.is_valid());
        assert_eq!(queue.average(), 4);

        queue.push(9);
        assert!(queue.is_valid());
        assert_eq!(queue.average(), 6);

        queue.push(12);
        assert_eq!(queue.sum_of_queue, 27);
        assert_eq!(queue.average(), 9);
        assert!(queue.is_consistent());

        queue.clear();
        assert_eq!(queue.average(), 0);
        assert!(!queue.is_valid());
    }
}
