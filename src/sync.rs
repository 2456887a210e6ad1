// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// A generic read/write lock wrapping a value, built from the bit-packed
// `RwLock` primitive and the RAII-guard pattern. Gives the storage engine
// concurrent readers with an exclusive writer without pulling in a second
// lock implementation alongside the one already in this crate.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};

use crate::rw_lock::RwLock;

/// A value protected by a spin-based read/write lock.
pub struct RwSpinLock<T> {
    lock: RwLock,
    data: UnsafeCell<T>,
}

impl<T> RwSpinLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            lock: RwLock::new(),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquire a shared (read) guard.
    pub fn read(&self) -> ReadGuard<'_, T> {
        self.lock.lock_shared();
        ReadGuard { owner: self }
    }

    /// Acquire an exclusive (write) guard.
    pub fn write(&self) -> WriteGuard<'_, T> {
        self.lock.lock();
        WriteGuard { owner: self }
    }
}

unsafe impl<T: Send> Send for RwSpinLock<T> {}
unsafe impl<T: Send> Sync for RwSpinLock<T> {}

pub struct ReadGuard<'a, T> {
    owner: &'a RwSpinLock<T>,
}

impl<'a, T> Deref for ReadGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.owner.data.get() }
    }
}

impl<'a, T> Drop for ReadGuard<'a, T> {
    fn drop(&mut self) {
        self.owner.lock.unlock_shared();
    }
}

pub struct WriteGuard<'a, T> {
    owner: &'a RwSpinLock<T>,
}

impl<'a, T> Deref for WriteGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.owner.data.get() }
    }
}

impl<'a, T> DerefMut for WriteGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.owner.data.get() }
    }
}

impl<'a, T> Drop for WriteGuard<'a, T> {
    fn drop(&mut self) {
        self.owner.lock.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn exclusive_writers_serialize() {
        let lock = Arc::new(RwSpinLock::new(0u64));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lock = Arc::clone(&lock);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        *lock.write() += 1;
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*lock.read(), 4000);
    }

    #[test]
    fn concurrent_readers_see_consistent_value() {
        let lock = RwSpinLock::new(42u64);
        let a = lock.read();
        let b = lock.read();
        assert_eq!(*a, 42);
        assert_eq!(*b, 42);
    }
}
