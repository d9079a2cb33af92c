/*!
 `VecDict` does not store the keys (only the values), however, if the key is a simple wrapper
 over `usize` (a Token), it can be reconstructed from the slot index and iterated over.
*/

use crate::{NumericIndex, VecDict};
use std::iter::{Enumerate, FilterMap};
use std::marker::PhantomData;
use std::slice::Iter as SliceIter;
use std::slice::IterMut as SliceIterMut;

pub trait Token {
    fn from_numeric_index(index: usize) -> Self;
}

type Occupied<'a, V> = fn((usize, &'a Option<V>)) -> Option<(usize, &'a V)>;
type OccupiedMut<'a, V> = fn((usize, &'a mut Option<V>)) -> Option<(usize, &'a mut V)>;

fn occupied<V>((index, slot): (usize, &Option<V>)) -> Option<(usize, &V)> {
    slot.as_ref().map(|value| (index, value))
}

fn occupied_mut<V>((index, slot): (usize, &mut Option<V>)) -> Option<(usize, &mut V)> {
    slot.as_mut().map(|value| (index, value))
}

pub struct TokIter<'a, K, V>
where
    K: 'a + Token + NumericIndex,
    V: 'a,
{
    iter: FilterMap<Enumerate<SliceIter<'a, Option<V>>>, Occupied<'a, V>>,
    phantom: PhantomData<K>,
}

pub struct TokIterMut<'a, K, V>
where
    K: 'a + Token + NumericIndex,
    V: 'a,
{
    iter: FilterMap<Enumerate<SliceIterMut<'a, Option<V>>>, OccupiedMut<'a, V>>,
    phantom: PhantomData<K>,
}

impl<'a, K, V> Iterator for TokIter<'a, K, V>
where
    K: 'a + Token + NumericIndex,
    V: 'a,
{
    type Item = (K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.iter
            .next()
            .map(|(index, value)| (K::from_numeric_index(index), value))
    }
}

impl<'a, K, V> Iterator for TokIterMut<'a, K, V>
where
    K: 'a + Token + NumericIndex,
    V: 'a,
{
    type Item = (K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        self.iter
            .next()
            .map(|(index, value)| (K::from_numeric_index(index), value))
    }
}

impl<K, V> VecDict<K, V>
where
    K: NumericIndex,
{
    /// Iterates over occupied slots together with their reconstructed tokens.
    pub fn tok_iter(&self) -> TokIter<K, V>
    where
        K: Token,
    {
        TokIter {
            iter: self.vector.iter().enumerate().filter_map(occupied as Occupied<'_, V>),
            phantom: PhantomData,
        }
    }

    pub fn tok_iter_mut(&mut self) -> TokIterMut<K, V>
    where
        K: Token,
    {
        TokIterMut {
            iter: self
                .vector
                .iter_mut()
                .enumerate()
                .filter_map(occupied_mut as OccupiedMut<'_, V>),
            phantom: PhantomData,
        }
    }
}
