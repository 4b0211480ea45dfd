//! Value buffers behind a [`MaterialVariable`](crate::data::material_variable::MaterialVariable).
//!
//! A variable owns one buffer for the global array and one per partial array.
//! Migrations between them are scattered slot copies, so besides slice access
//! the only operation a backend provides is [`Storage::copy_slots`].

use core::fmt::{self, Debug};

/// Contiguous, indexable storage for `V`.
pub trait Storage<V>: Debug {
    /// Buffer of `len` copies of `fill`.
    fn filled(len: usize, fill: V) -> Self
    where
        V: Clone;

    /// Current length in elements.
    fn len(&self) -> usize;

    /// Whether the buffer is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grow or shrink to `new_len`; new slots hold `fill`.
    fn resize(&mut self, new_len: usize, fill: V)
    where
        V: Clone;

    /// Entire read-only buffer.
    fn as_slice(&self) -> &[V];

    /// Entire mutable buffer.
    fn as_mut_slice(&mut self) -> &mut [V];

    /// Copy `src[from]` into `self[to]` for every `(from, to)` pair.
    ///
    /// # Errors
    /// The first pair out of bounds on either side; nothing is copied then.
    fn copy_slots<I>(&mut self, src: &[V], pairs: I) -> Result<(), (usize, usize)>
    where
        V: Clone,
        I: IntoIterator<Item = (usize, usize)>,
        I::IntoIter: Clone,
    {
        let pairs = pairs.into_iter();
        let dst = self.as_mut_slice();
        if let Some(bad) = pairs
            .clone()
            .find(|&(from, to)| from >= src.len() || to >= dst.len())
        {
            return Err(bad);
        }
        for (from, to) in pairs {
            dst[to].clone_from(&src[from]);
        }
        Ok(())
    }
}

/// `Vec`-backed storage (default).
#[derive(Clone)]
pub struct VecStorage<V>(pub(crate) Vec<V>);

impl<V> Debug for VecStorage<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VecStorage[{}]", self.0.len())
    }
}

impl<V> Storage<V> for VecStorage<V> {
    fn filled(len: usize, fill: V) -> Self
    where
        V: Clone,
    {
        Self(vec![fill; len])
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn resize(&mut self, new_len: usize, fill: V)
    where
        V: Clone,
    {
        self.0.resize(new_len, fill);
    }

    fn as_slice(&self) -> &[V] {
        &self.0
    }

    fn as_mut_slice(&mut self) -> &mut [V] {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_keeps_prefix() {
        let mut s = VecStorage::filled(2, 1.0f64);
        s.as_mut_slice()[1] = 5.0;
        s.resize(4, 0.0);
        assert_eq!(s.as_slice(), &[1.0, 5.0, 0.0, 0.0]);
        assert!(!s.is_empty());
    }

    #[test]
    fn copy_slots_scatters_values() {
        let mut s = VecStorage::filled(4, 0i32);
        assert_eq!(s.copy_slots(&[7, 9], [(0, 3), (1, 0)]), Ok(()));
        assert_eq!(s.as_slice(), &[9, 0, 0, 7]);
        assert_eq!(format!("{s:?}"), "VecStorage[4]");
    }

    #[test]
    fn copy_slots_rejects_out_of_bounds_before_copying() {
        let mut s = VecStorage::filled(4, 0i32);
        assert_eq!(s.copy_slots(&[7, 9], [(0, 3), (2, 1)]), Err((2, 1)));
        assert_eq!(s.copy_slots(&[7, 9], [(1, 0), (0, 8)]), Err((0, 8)));
        assert_eq!(s.as_slice(), &[0, 0, 0, 0]);
    }
}
