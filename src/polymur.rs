//! PolymurHash, and the `Hasher`/`BuildHasher` adapters the table hashes keys with.
//!
//! Polymur is a universal hash built on polynomial evaluation modulo the
//! Mersenne prime 2^61-1. It is fast and well distributed, but it is not a
//! cryptographic hash.

use core::hash::{BuildHasher, Hasher};

/// Keyed byte hasher. The key powers are derived once from a seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PolymurHash {
    k: u64,
    k2: u64,
    k7: u64,
    s: u64,
}

impl PolymurHash {
    pub fn new(seed: u128) -> Self {
        let k_seed = seed as u64;
        let s_seed = (seed >> 64) as u64;
        Self::from_u64x2_seed(k_seed, s_seed)
    }

    pub fn from_u64_seed(seed: u64) -> Self {
        let k_seed = Self::mix(seed.wrapping_add(POLYMUR_ARBITRARY3));
        let s_seed = Self::mix(seed.wrapping_add(POLYMUR_ARBITRARY4));
        Self::from_u64x2_seed(k_seed, s_seed)
    }

    pub fn from_u64x2_seed(mut k_seed: u64, s_seed: u64) -> Self {
        let s = s_seed ^ POLYMUR_ARBITRARY1;
        let pow37 = pow37_table();

        loop {
            k_seed = k_seed.wrapping_add(POLYMUR_ARBITRARY2);
            let e = (k_seed >> 3) | 1;
            if !is_generator_exponent(e) {
                continue;
            }
            let k = extrared611(pow37_exp(&pow37, e));
            let k2 = extrared611(red611(mul128(k, k)));
            let k3 = red611(mul128(k, k2));
            let k4 = red611(mul128(k2, k2));
            let k7 = extrared611(red611(mul128(k3, k4)));
            if k7 < (1_u64 << 60) - (1_u64 << 56) {
                return Self { k, k2, k7, s };
            }
        }
    }

    /// Hashes `buf`, starting the polynomial accumulator at `tweak`.
    ///
    /// A tweak of `0` gives the same result as [`PolymurHash::hash`].
    pub fn hash_with_tweak(&self, buf: impl AsRef<[u8]>, tweak: u64) -> u64 {
        let h = self.poly1611(buf.as_ref(), tweak);
        Self::mix(h).wrapping_add(self.s)
    }

    pub fn hash(&self, buf: impl AsRef<[u8]>) -> u64 {
        self.hash_with_tweak(buf, 0)
    }

    fn poly1611(&self, buf: &[u8], tweak: u64) -> u64 {
        if buf.len() <= 7 {
            return tweak.wrapping_add(self.poly_short(buf));
        }

        let k3 = red611(mul128(self.k, self.k2));
        let k4 = red611(mul128(self.k2, self.k2));
        let mut acc = tweak;
        let mut buf = buf;
        if buf.len() >= 50 {
            let (h, rest) = self.poly_long(buf, k3, k4);
            acc = acc.wrapping_add(h);
            buf = rest;
        }
        if buf.len() >= 8 {
            return acc.wrapping_add(self.poly_medium(buf, k3, k4));
        }
        acc.wrapping_add(self.poly_short(buf))
    }

    // 0..=7 bytes
    #[inline(always)]
    fn poly_short(&self, buf: &[u8]) -> u64 {
        red611(mul128(
            self.k.wrapping_add(le_u64_0_8(buf)),
            self.k2.wrapping_add(buf.len() as u64),
        ))
    }

    // 8..=49 bytes
    fn poly_medium(&self, buf: &[u8], k3: u64, k4: u64) -> u64 {
        let len = buf.len();
        let m0 = le_u56(buf, 0);
        let m1 = le_u56(buf, (len - 7) / 2);
        let m2 = le_u64(buf, len - 8) >> 8;
        let t0 = mul128(self.k2 + m0, self.k7.wrapping_add(m1));
        let t1 = mul128(self.k + m2, k3.wrapping_add(len as u64));
        if len <= 21 {
            return red611(t0.wrapping_add(t1));
        }

        let m3 = le_u56(buf, 7);
        let m4 = le_u56(buf, 14);
        let m5 = le_u56(buf, len - 21);
        let m6 = le_u56(buf, len - 14);
        let t2 = mul128(self.k2 + m3, self.k7 + m4);
        let t3 = mul128(red611(t0) + m5, k4 + m6);
        red611(t1.wrapping_add(t2).wrapping_add(t3))
    }

    // Consumes 49-byte blocks while at least 50 bytes remain; returns the
    // block digest and the unconsumed tail.
    fn poly_long<'a>(&self, mut buf: &'a [u8], k3: u64, k4: u64) -> (u64, &'a [u8]) {
        let k5 = extrared611(red611(mul128(self.k, k4)));
        let k6 = extrared611(red611(mul128(self.k2, k4)));
        let k3 = extrared611(k3);
        let k4 = extrared611(k4);
        let mut h: u64 = 0;
        while buf.len() >= 50 {
            let m: [u64; 7] = core::array::from_fn(|i| le_u56(buf, 7 * i));
            let t0 = mul128(self.k + m[0], k6 + m[1]);
            let t1 = mul128(self.k2 + m[2], k5 + m[3]);
            let t2 = mul128(k3 + m[4], k4 + m[5]);
            let t3 = mul128(h + m[6], self.k7);
            h = red611(t0.wrapping_add(t1).wrapping_add(t2).wrapping_add(t3));
            buf = &buf[49..];
        }
        let k14 = red611(mul128(self.k7, self.k7));
        let hk14 = red611(mul128(extrared611(h), k14));
        (extrared611(hk14), buf)
    }

    #[inline(always)]
    fn mix(mut x: u64) -> u64 {
        x ^= x >> 32;
        x = x.wrapping_mul(0xe9846af9b1a615d);
        x ^= x >> 32;
        x = x.wrapping_mul(0xe9846af9b1a615d);
        x ^= x >> 28;
        x
    }
}

/// Streaming `Hasher` over [`PolymurHash`].
///
/// Every `write` is hashed with the running state as its tweak, so the
/// result depends on the chunks and their order.
#[derive(Clone, Copy, Debug)]
pub struct PolymurHasher {
    hash: PolymurHash,
    state: u64,
}

impl PolymurHasher {
    pub fn new(hash: PolymurHash) -> Self {
        Self { hash, state: 0 }
    }
}

impl Default for PolymurHasher {
    fn default() -> Self {
        PolymurState::default().build_hasher()
    }
}

impl Hasher for PolymurHasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        self.state = self.hash.hash_with_tweak(bytes, self.state);
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.state
    }
}

/// `BuildHasher` producing [`PolymurHasher`]s that all share one key.
///
/// Two states built from the same seed hash every key identically, which
/// keeps bucket placement reproducible across runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PolymurState {
    hash: PolymurHash,
}

impl PolymurState {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            hash: PolymurHash::from_u64_seed(seed),
        }
    }
}

impl Default for PolymurState {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl BuildHasher for PolymurState {
    type Hasher = PolymurHasher;

    fn build_hasher(&self) -> PolymurHasher {
        PolymurHasher::new(self.hash)
    }
}

const POLYMUR_P611: u64 = 0x1fffffffffffffff;
const POLYMUR_ARBITRARY1: u64 = 0x6a09e667f3bcc908;
const POLYMUR_ARBITRARY2: u64 = 0xbb67ae8584caa73b;
const POLYMUR_ARBITRARY3: u64 = 0x3c6ef372fe94f82b;
const POLYMUR_ARBITRARY4: u64 = 0xa54ff53a5f1d36f1;

// 37^(2^i) mod 2^61-1 for i < 32, and the same sequence from 37^(2^32) in the upper half.
fn pow37_table() -> [u64; 64] {
    let mut pow37 = [0u64; 64];
    pow37[0] = 37;
    pow37[32] = 559096694736811184;
    for i in 0..31 {
        pow37[i + 1] = extrared611(red611(mul128(pow37[i], pow37[i])));
        pow37[i + 33] = extrared611(red611(mul128(pow37[i + 32], pow37[i + 32])));
    }
    pow37
}

// e must be coprime with the order of the multiplicative group.
fn is_generator_exponent(e: u64) -> bool {
    e % 3 != 0
        && ((e % 5) & (e % 7)) != 0
        && ((e % 11) & (e % 13) & (e % 31)) != 0
        && ((e % 41) & (e % 61) & (e % 151) & (e % 331) & (e % 1321)) != 0
}

fn pow37_exp(pow37: &[u64; 64], mut e: u64) -> u64 {
    let (mut ka, mut kb): (u64, u64) = (1, 1);
    let mut i: usize = 0;
    while e > 0 {
        if (e & 1) != 0 {
            ka = extrared611(red611(mul128(ka, pow37[i])));
        }
        if (e & 2) != 0 {
            kb = extrared611(red611(mul128(kb, pow37[i + 1])));
        }
        e >>= 2;
        i += 2;
    }
    extrared611(red611(mul128(ka, kb)))
}

#[inline(always)]
fn mul128(a: u64, b: u64) -> u128 {
    (a as u128) * (b as u128)
}

#[inline(always)]
fn red611(x: u128) -> u64 {
    ((x as u64) & POLYMUR_P611) + ((x >> 61) as u64)
}

#[inline(always)]
fn extrared611(x: u64) -> u64 {
    (x & POLYMUR_P611) + (x >> 61)
}

#[inline(always)]
fn le_u64(buf: &[u8], at: usize) -> u64 {
    let mut tmp = [0u8; 8];
    tmp.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(tmp)
}

#[inline(always)]
fn le_u56(buf: &[u8], at: usize) -> u64 {
    le_u64(buf, at) & 0x00ffffffffffffff
}

#[inline(always)]
fn le_u64_0_8(buf: &[u8]) -> u64 {
    let len = buf.len();
    if len < 4 {
        if len == 0 {
            return 0;
        }
        let mut v = buf[0] as u64;
        v |= (buf[len / 2] as u64) << (8 * (len / 2));
        v |= (buf[len - 1] as u64) << (8 * (len - 1));
        return v;
    }

    let mut tmp = [0u8; 4];
    tmp.copy_from_slice(&buf[0..4]);
    let lo = u32::from_le_bytes(tmp) as u64;
    tmp.copy_from_slice(&buf[len - 4..][..4]);
    let hi = u32::from_le_bytes(tmp) as u64;

    lo | (hi << (8 * (len - 4)))
}
