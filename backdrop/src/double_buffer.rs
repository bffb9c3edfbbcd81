/// Two equally-sized slots with a read/write role that flips on `swap`.
///
/// Passes sample only the read slot and render only into the write slot, so a
/// pass never reads what it is writing. After a pass, `swap` turns its output
/// into the next pass's input without copying.
#[derive(Debug)]
pub struct DoubleBuffer<T> {
    slots: [T; 2],
    read_index: usize,
}

impl<T> DoubleBuffer<T> {
    pub fn new(front: T, back: T) -> Self {
        Self {
            slots: [front, back],
            read_index: 0,
        }
    }

    pub fn from_fn(mut make: impl FnMut(usize) -> T) -> Self {
        Self::new(make(0), make(1))
    }

    pub fn read(&self) -> &T {
        &self.slots[self.read_index]
    }

    pub fn write(&self) -> &T {
        &self.slots[1 - self.read_index]
    }

    pub fn write_mut(&mut self) -> &mut T {
        &mut self.slots[1 - self.read_index]
    }

    /// Borrow the read slot and the write slot at the same time.
    pub fn split_mut(&mut self) -> (&T, &mut T) {
        let [first, second] = &mut self.slots;
        if self.read_index == 0 {
            (first, second)
        } else {
            (second, first)
        }
    }

    /// The slot at `index`, regardless of its current role.
    pub fn slot(&self, index: usize) -> &T {
        &self.slots[index]
    }

    pub fn read_index(&self) -> usize {
        self.read_index
    }

    pub fn swap(&mut self) {
        self.read_index = 1 - self.read_index;
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn double_swap_restores_roles() {
        let mut buffer = DoubleBuffer::new("front", "back");
        buffer.swap();
        buffer.swap();

        assert_eq!(*buffer.read(), "front");
        assert_eq!(*buffer.write(), "back");
        assert_eq!(buffer.read_index(), 0);
    }

    #[test]
    fn swap_promotes_write_to_read() {
        let mut buffer = DoubleBuffer::from_fn(|_| 0);
        *buffer.write_mut() = 7;
        buffer.swap();

        assert_eq!(*buffer.read(), 7);
        assert_eq!(*buffer.write(), 0);
    }

    #[test]
    fn split_follows_the_read_index() {
        let mut buffer = DoubleBuffer::new(1, 2);
        buffer.swap();

        let (read, write) = buffer.split_mut();
        assert_eq!(*read, 2);
        *write += 10;

        assert_eq!(*buffer.write(), 11);
    }
}
