//! Backing storage for hardware memories, shared by the simulator and
//! host-side memory models. Dense storage allocates the whole array;
//! sparse storage allocates only touched words and synthesises untouched
//! ones from the background-initialisation policy.

use fnv::FnvHashMap;

use crate::ir::node::MemoryInit;
use crate::logic::VBits;

/// Dense above this many bits would hurt; switch to sparse.
const DENSE_LIMIT_BITS: usize = 1 << 22;

pub enum MemoryStorage {
    Dense {
        word_width: usize,
        value: Vec<bool>,
        defined: Vec<bool>,
    },
    Sparse {
        word_width: usize,
        words: FnvHashMap<u64, VBits>,
        init: MemoryInit,
    },
}

impl MemoryStorage {
    pub fn new(depth: usize, word_width: usize, init: MemoryInit) -> Self {
        let total = depth * word_width;
        if total <= DENSE_LIMIT_BITS {
            let mut value = vec![false; total];
            let defined = match init {
                MemoryInit::Undefined => vec![false; total],
                MemoryInit::Zero => vec![true; total],
                MemoryInit::Random { seed } => {
                    for (i, v) in value.iter_mut().enumerate() {
                        *v = background_bit(seed, i as u64);
                    }
                    vec![true; total]
                }
            };
            MemoryStorage::Dense {
                word_width,
                value,
                defined,
            }
        } else {
            MemoryStorage::Sparse {
                word_width,
                words: FnvHashMap::default(),
                init,
            }
        }
    }

    pub fn word_width(&self) -> usize {
        match self {
            MemoryStorage::Dense { word_width, .. } | MemoryStorage::Sparse { word_width, .. } => {
                *word_width
            }
        }
    }

    pub fn read_word(&self, addr: u64) -> VBits {
        match self {
            MemoryStorage::Dense {
                word_width,
                value,
                defined,
            } => {
                let base = addr as usize * word_width;
                VBits {
                    value: value[base..base + word_width].to_vec(),
                    defined: defined[base..base + word_width].to_vec(),
                }
            }
            MemoryStorage::Sparse {
                word_width,
                words,
                init,
            } => words
                .get(&addr)
                .cloned()
                .unwrap_or_else(|| background_word(*init, *word_width, addr)),
        }
    }

    pub fn write_word(&mut self, addr: u64, data: &VBits) {
        match self {
            MemoryStorage::Dense {
                word_width,
                value,
                defined,
            } => {
                let base = addr as usize * *word_width;
                value[base..base + *word_width].copy_from_slice(&data.value);
                defined[base..base + *word_width].copy_from_slice(&data.defined);
            }
            MemoryStorage::Sparse { words, .. } => {
                words.insert(addr, data.clone());
            }
        }
    }

    /// Marks the entire contents undefined; used when a write lands at
    /// an undefined address.
    pub fn poison(&mut self) {
        match self {
            MemoryStorage::Dense { defined, .. } => defined.fill(false),
            MemoryStorage::Sparse { words, init, .. } => {
                words.clear();
                *init = MemoryInit::Undefined;
            }
        }
    }
}

fn background_word(init: MemoryInit, word_width: usize, addr: u64) -> VBits {
    match init {
        MemoryInit::Undefined => VBits::undef(word_width),
        MemoryInit::Zero => VBits::zero(word_width),
        MemoryInit::Random { seed } => {
            let mut out = VBits::zero(word_width);
            for i in 0..word_width {
                out.value[i] = background_bit(seed, addr * word_width as u64 + i as u64);
            }
            out
        }
    }
}

/// Deterministic per-bit background noise; splitmix-style scramble so
/// the same seed reproduces the same contents.
fn background_bit(seed: u64, index: u64) -> bool {
    let mut z = seed ^ index.wrapping_mul(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    (z ^ (z >> 31)) & 1 != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_round_trip() {
        let mut m = MemoryStorage::new(16, 8, MemoryInit::Zero);
        assert_eq!(m.read_word(3).as_u128(), Some(0));
        m.write_word(3, &VBits::from_u128(0xAB, 8));
        assert_eq!(m.read_word(3).as_u128(), Some(0xAB));
        assert_eq!(m.read_word(4).as_u128(), Some(0));
    }

    #[test]
    fn undefined_background() {
        let m = MemoryStorage::new(4, 8, MemoryInit::Undefined);
        assert!(m.read_word(0).is_fully_undefined());
    }

    #[test]
    fn sparse_background_is_reproducible() {
        let big = 1 << 20;
        let m = MemoryStorage::new(big, 32, MemoryInit::Random { seed: 7 });
        assert!(matches!(m, MemoryStorage::Sparse { .. }));
        let a = m.read_word(12345);
        let b = m.read_word(12345);
        assert_eq!(a, b);
        assert!(a.is_fully_defined());
    }

    #[test]
    fn poison_clears_definedness() {
        let mut m = MemoryStorage::new(8, 4, MemoryInit::Zero);
        m.write_word(1, &VBits::from_u128(5, 4));
        m.poison();
        assert!(m.read_word(1).is_fully_undefined());
    }
}
