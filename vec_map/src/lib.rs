/*!
 VecDict is a niche container inspired by LLVM's [IndexedMap], for mapping keys that fit a small
 dense integer range to some other type. It is a vector of optional slots addressed through the
 [`NumericIndex`] of the key.

 Token generation
 ----------------

 Most of the time the key is just a wrapper over `usize` (a token handed out when the value was
 pushed). Macros from the `vec_map-derive` crate implement the traits for such wrappers (they
 require the `macro_attr!` helper).

 ```ignore
 use vec_map_derive::{NumericIndex, Token};

 macro_attr! {
     #[derive(Token!, NumericIndex!, Clone, Copy)]
     struct ImageToken(usize);
 }
 ```

 [IndexedMap]: https://llvm.org/doxygen/IndexedMap_8h_source.html
*/

use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

mod tok_iter;

pub use tok_iter::{TokIter, TokIterMut, Token};

pub trait NumericIndex {
    fn get_numeric_index(&self) -> usize;
}

#[derive(Clone, Debug)]
pub struct VecDict<K, V>
where
    K: NumericIndex,
{
    vector: Vec<Option<V>>,
    phantom: PhantomData<K>,
}

impl<K, V> VecDict<K, V>
where
    K: NumericIndex,
{
    /// Creates a dictionary with `size` empty slots.
    pub fn new(size: usize) -> Self {
        let mut vector = Vec::new();
        vector.resize_with(size, || None);
        VecDict {
            vector,
            phantom: PhantomData,
        }
    }

    pub fn clear(&mut self) {
        let size = self.vector.len();
        self.vector.clear();
        self.vector.resize_with(size, || None);
    }

    /// Number of slots, occupied or not.
    pub fn len(&self) -> usize {
        self.vector.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vector.is_empty()
    }

    /// Number of occupied slots.
    pub fn count(&self) -> usize {
        self.vector.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn resize(&mut self, size: usize) {
        self.vector.resize_with(size, || None);
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        match self.vector.get(key.get_numeric_index()) {
            Some(Some(v)) => Some(v),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        match self.vector.get_mut(key.get_numeric_index()) {
            Some(Some(v)) => Some(v),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Stores `value` under `key`, growing the dictionary when the key lies past its end.
    /// Returns the value previously stored under the key.
    pub fn insert(&mut self, key: &K, value: V) -> Option<V> {
        let index = key.get_numeric_index();
        if index >= self.vector.len() {
            self.resize(index + 1);
        }
        self.vector[index].replace(value)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.vector
            .get_mut(key.get_numeric_index())
            .and_then(Option::take)
    }

    /// Appends `value` in a fresh slot and hands out the token for it.
    pub fn push(&mut self, value: V) -> K
    where
        K: Token,
    {
        let index = self.vector.len();
        self.vector.push(Some(value));
        K::from_numeric_index(index)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.vector.iter().filter_map(Option::as_ref)
    }
}

impl<K, V> Index<&K> for VecDict<K, V>
where
    K: NumericIndex,
{
    type Output = V;

    fn index(&self, key: &K) -> &Self::Output {
        match self.get(key) {
            Some(value) => value,
            None => panic!("VecDict has no value under index {}", key.get_numeric_index()),
        }
    }
}

impl<K, V> IndexMut<&K> for VecDict<K, V>
where
    K: NumericIndex,
{
    fn index_mut(&mut self, key: &K) -> &mut Self::Output {
        let index = key.get_numeric_index();
        match self.get_mut(key) {
            Some(value) => value,
            None => panic!("VecDict has no value under index {}", index),
        }
    }
}

/* Values are stored under consecutive tokens, starting from zero. */
impl<K, V> FromIterator<V> for VecDict<K, V>
where
    K: NumericIndex,
{
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        VecDict {
            vector: iter.into_iter().map(Some).collect(),
            phantom: PhantomData,
        }
    }
}
