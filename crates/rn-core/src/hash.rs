//! Open-addressing hash containers keyed by `i64`.
//!
//! The map parser holds one entry per referenced map node id (millions for a
//! city extract) and the spatial grid one entry per occupied cell, so both
//! containers store keys unboxed in flat arrays.  Linear probing over a
//! power-of-two table; slots are mixed with the 64-bit golden-ratio
//! multiplier.  The table doubles once it is 70 % full.
//!
//! `i64::MIN` marks an empty slot.  A real `i64::MIN` key is still supported:
//! it is kept out of the table in a dedicated side slot.

const EMPTY: i64 = i64::MIN;

/// 64-bit fractional golden-ratio constant.
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;

const MIN_CAPACITY: usize = 16;

#[inline]
fn mix(key: i64) -> usize {
    let z = (key as u64).wrapping_mul(MIXING_CONSTANT);
    (z ^ (z >> 32)) as usize
}

#[inline]
fn table_capacity(requested: usize) -> usize {
    requested.max(MIN_CAPACITY).next_power_of_two()
}

#[inline]
fn resize_threshold(capacity: usize) -> usize {
    capacity * 7 / 10
}

// ── LongSet ───────────────────────────────────────────────────────────────────

/// Set of `i64` values.
#[derive(Clone, Debug)]
pub struct LongSet {
    table:     Vec<i64>,
    len:       usize,
    resize_at: usize,
    has_empty_key: bool,
}

impl LongSet {
    pub fn new() -> Self {
        Self::with_capacity(MIN_CAPACITY)
    }

    /// Pre-size the table to at least `capacity` slots (rounded up to a
    /// power of two).  Note this is a slot count, not an element count.
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = table_capacity(capacity);
        Self {
            table:     vec![EMPTY; cap],
            len:       0,
            resize_at: resize_threshold(cap),
            has_empty_key: false,
        }
    }

    pub fn len(&self) -> usize {
        self.len + usize::from(self.has_empty_key)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: i64) -> bool {
        if key == EMPTY {
            return self.has_empty_key;
        }
        let mask = self.table.len() - 1;
        let mut idx = mix(key) & mask;
        loop {
            match self.table[idx] {
                EMPTY => return false,
                cur if cur == key => return true,
                _ => idx = (idx + 1) & mask,
            }
        }
    }

    /// Insert `key`.  Returns `true` if it was not already present.
    pub fn insert(&mut self, key: i64) -> bool {
        if key == EMPTY {
            let added = !self.has_empty_key;
            self.has_empty_key = true;
            return added;
        }
        if self.len >= self.resize_at {
            self.rehash(self.table.len() << 1);
        }
        let mask = self.table.len() - 1;
        let mut idx = mix(key) & mask;
        loop {
            match self.table[idx] {
                EMPTY => {
                    self.table[idx] = key;
                    self.len += 1;
                    return true;
                }
                cur if cur == key => return false,
                _ => idx = (idx + 1) & mask,
            }
        }
    }

    /// Iterate over all stored keys in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        let side = self.has_empty_key.then_some(EMPTY);
        self.table.iter().copied().filter(|&k| k != EMPTY).chain(side)
    }

    fn rehash(&mut self, new_cap: usize) {
        let old = std::mem::replace(&mut self.table, vec![EMPTY; new_cap]);
        self.resize_at = resize_threshold(new_cap);
        self.len = 0;
        for k in old.into_iter().filter(|&k| k != EMPTY) {
            self.insert(k);
        }
    }
}

impl Default for LongSet {
    fn default() -> Self {
        Self::new()
    }
}

impl Extend<i64> for LongSet {
    fn extend<I: IntoIterator<Item = i64>>(&mut self, iter: I) {
        for k in iter {
            self.insert(k);
        }
    }
}

// ── LongIntMap ────────────────────────────────────────────────────────────────

/// Map from `i64` to `u32`.
#[derive(Clone, Debug)]
pub struct LongIntMap {
    keys:      Vec<i64>,
    values:    Vec<u32>,
    len:       usize,
    resize_at: usize,
    empty_key_value: Option<u32>,
}

impl LongIntMap {
    pub fn new() -> Self {
        Self::with_capacity(MIN_CAPACITY)
    }

    /// Pre-size the table to at least `capacity` slots.
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = table_capacity(capacity);
        Self {
            keys:      vec![EMPTY; cap],
            values:    vec![0; cap],
            len:       0,
            resize_at: resize_threshold(cap),
            empty_key_value: None,
        }
    }

    pub fn len(&self) -> usize {
        self.len + usize::from(self.empty_key_value.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: i64) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: i64) -> Option<u32> {
        if key == EMPTY {
            return self.empty_key_value;
        }
        let mask = self.keys.len() - 1;
        let mut idx = mix(key) & mask;
        loop {
            match self.keys[idx] {
                EMPTY => return None,
                cur if cur == key => return Some(self.values[idx]),
                _ => idx = (idx + 1) & mask,
            }
        }
    }

    /// Insert or overwrite.  Returns the previous value, if any.
    pub fn insert(&mut self, key: i64, value: u32) -> Option<u32> {
        if key == EMPTY {
            return self.empty_key_value.replace(value);
        }
        if self.len >= self.resize_at {
            self.rehash(self.keys.len() << 1);
        }
        let mask = self.keys.len() - 1;
        let mut idx = mix(key) & mask;
        loop {
            match self.keys[idx] {
                EMPTY => {
                    self.keys[idx] = key;
                    self.values[idx] = value;
                    self.len += 1;
                    return None;
                }
                cur if cur == key => {
                    return Some(std::mem::replace(&mut self.values[idx], value));
                }
                _ => idx = (idx + 1) & mask,
            }
        }
    }

    fn rehash(&mut self, new_cap: usize) {
        let old_keys = std::mem::replace(&mut self.keys, vec![EMPTY; new_cap]);
        let old_vals = std::mem::replace(&mut self.values, vec![0; new_cap]);
        self.resize_at = resize_threshold(new_cap);
        self.len = 0;
        for (k, v) in old_keys.into_iter().zip(old_vals) {
            if k != EMPTY {
                self.insert(k, v);
            }
        }
    }
}

impl Default for LongIntMap {
    fn default() -> Self {
        Self::new()
    }
}
