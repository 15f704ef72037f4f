//! # Simplex Noise
//!
//! Deterministic 2D and 3D simplex noise plus the seed derivations used by
//! carvers and decorators.
//!
//! ## Determinism Guarantee
//!
//! Given the same `WorldSeed`, every function here produces exactly the
//! same values on any platform and any thread. The shadow cache relies on
//! this: a chunk generated speculatively must match one generated on
//! demand, block for block.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// World seed for deterministic generation.
///
/// All procedural generation derives from this seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorldSeed(u64);

impl WorldSeed {
    /// Creates a new world seed.
    #[inline]
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Returns the raw seed value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Derives a sub-seed for a specific purpose (e.g., biome generation).
    #[inline]
    #[must_use]
    pub const fn derive(self, purpose: u64) -> Self {
        // FNV-1a style mixing
        let mut hash = self.0;
        hash ^= purpose;
        hash = hash.wrapping_mul(0x517c_c1b7_2722_0a95);
        hash ^= hash >> 32;
        Self(hash)
    }

    /// Seed for a large feature (cave system, canyon) originating in chunk
    /// `(chunk_x, chunk_z)`. `salt` separates carvers in the same chunk.
    ///
    /// Depends only on the arguments, so every chunk that a feature reaches
    /// re-derives the same feature.
    #[must_use]
    pub fn large_feature_seed(self, salt: u64, chunk_x: i32, chunk_z: i32) -> u64 {
        let base = self.0.wrapping_add(salt);
        let mut rng = ChaCha8Rng::seed_from_u64(base);
        let a = rng.next_u64() | 1;
        let b = rng.next_u64() | 1;
        (i64::from(chunk_x) as u64).wrapping_mul(a) ^ (i64::from(chunk_z) as u64).wrapping_mul(b) ^ base
    }

    /// Seed for decorating the region whose minimum corner is `(block_x, block_z)`.
    #[must_use]
    pub fn decoration_seed(self, block_x: i32, block_z: i32) -> u64 {
        let mut rng = ChaCha8Rng::seed_from_u64(self.0);
        let a = rng.next_u64() | 1;
        let b = rng.next_u64() | 1;
        (i64::from(block_x) as u64).wrapping_mul(a).wrapping_add((i64::from(block_z) as u64).wrapping_mul(b))
            ^ self.0
    }
}

impl Default for WorldSeed {
    fn default() -> Self {
        Self(0xDEAD_BEEF_CAFE_BABE)
    }
}

/// Pre-computed permutation table for noise.
struct PermutationTable {
    /// 512-entry permutation table (256 entries, doubled for overflow handling).
    perm: [u8; 512],
}

impl PermutationTable {
    /// 12 gradients for 2D simplex.
    const GRAD2: [[i8; 2]; 12] = [
        [1, 0], [1, 1], [0, 1], [-1, 1],
        [-1, 0], [-1, -1], [0, -1], [1, -1],
        [1, 0], [0, 1], [-1, 0], [0, -1],
    ];

    /// Cube edge midpoints for 3D simplex.
    const GRAD3: [[i8; 3]; 12] = [
        [1, 1, 0], [-1, 1, 0], [1, -1, 0], [-1, -1, 0],
        [1, 0, 1], [-1, 0, 1], [1, 0, -1], [-1, 0, -1],
        [0, 1, 1], [0, -1, 1], [0, 1, -1], [0, -1, -1],
    ];

    fn new(seed: WorldSeed) -> Self {
        let mut perm = [0u8; 512];

        for (i, slot) in perm.iter_mut().take(256).enumerate() {
            *slot = i as u8;
        }

        // Fisher-Yates with xorshift64
        let mut rng_state = seed.value() | 1;
        for i in (1..256).rev() {
            rng_state ^= rng_state << 13;
            rng_state ^= rng_state >> 7;
            rng_state ^= rng_state << 17;

            let j = (rng_state as usize) % (i + 1);
            perm.swap(i, j);
        }

        for i in 0..256 {
            perm[256 + i] = perm[i];
        }

        Self { perm }
    }

    #[inline]
    fn get(&self, index: usize) -> usize {
        self.perm[index & 511] as usize
    }
}

/// Simplex noise generator.
///
/// Produces smooth, continuous noise values in the range [-1, 1].
///
/// # Example
///
/// ```rust,ignore
/// let noise = SimplexNoise::new(WorldSeed::new(42));
///
/// let value = noise.sample(100.5, 200.3);
/// let density = noise.octaved3d(x, y, z, 4, 0.5, 2.0);
/// ```
pub struct SimplexNoise {
    perm_table: PermutationTable,
}

impl SimplexNoise {
    /// Skewing factor for 2D simplex grid.
    const F2: f64 = 0.366_025_403_784_439; // (sqrt(3) - 1) / 2
    /// Unskewing factor for 2D simplex grid.
    const G2: f64 = 0.211_324_865_405_187; // (3 - sqrt(3)) / 6
    /// Skewing factor for 3D simplex grid.
    const F3: f64 = 1.0 / 3.0;
    /// Unskewing factor for 3D simplex grid.
    const G3: f64 = 1.0 / 6.0;

    /// Creates a new simplex noise generator from a seed.
    #[must_use]
    pub fn new(seed: WorldSeed) -> Self {
        Self {
            perm_table: PermutationTable::new(seed),
        }
    }

    /// Samples 2D simplex noise at the given coordinates.
    ///
    /// # Returns
    ///
    /// A value in the range [-1, 1].
    #[must_use]
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let skew = (x + y) * Self::F2;
        let i = fast_floor(x + skew);
        let j = fast_floor(y + skew);

        let unskew = f64::from(i + j) * Self::G2;
        let x0 = x - (f64::from(i) - unskew);
        let y0 = y - (f64::from(j) - unskew);

        let (i1, j1) = if x0 > y0 { (1, 0) } else { (0, 1) };

        let x1 = x0 - f64::from(i1 as u8) + Self::G2;
        let y1 = y0 - f64::from(j1 as u8) + Self::G2;
        let x2 = x0 - 1.0 + 2.0 * Self::G2;
        let y2 = y0 - 1.0 + 2.0 * Self::G2;

        let ii = (i & 255) as usize;
        let jj = (j & 255) as usize;
        let p = &self.perm_table;

        let gi0 = p.get(ii + p.get(jj));
        let gi1 = p.get(ii + i1 + p.get(jj + j1));
        let gi2 = p.get(ii + 1 + p.get(jj + 1));

        let n0 = Self::contribution2(x0, y0, gi0);
        let n1 = Self::contribution2(x1, y1, gi1);
        let n2 = Self::contribution2(x2, y2, gi2);

        70.0 * (n0 + n1 + n2)
    }

    #[inline]
    fn contribution2(x: f64, y: f64, hash: usize) -> f64 {
        let t = 0.5 - x * x - y * y;
        if t < 0.0 {
            0.0
        } else {
            let grad = PermutationTable::GRAD2[hash % 12];
            let t2 = t * t;
            t2 * t2 * (x * f64::from(grad[0]) + y * f64::from(grad[1]))
        }
    }

    /// Samples 3D simplex noise.
    ///
    /// # Returns
    ///
    /// A value in the range [-1, 1].
    #[must_use]
    pub fn sample3(&self, x: f64, y: f64, z: f64) -> f64 {
        let skew = (x + y + z) * Self::F3;
        let i = fast_floor(x + skew);
        let j = fast_floor(y + skew);
        let k = fast_floor(z + skew);

        let unskew = f64::from(i + j + k) * Self::G3;
        let x0 = x - (f64::from(i) - unskew);
        let y0 = y - (f64::from(j) - unskew);
        let z0 = z - (f64::from(k) - unskew);

        // Which of the six tetrahedra we are in.
        let (i1, j1, k1, i2, j2, k2) = if x0 >= y0 {
            if y0 >= z0 {
                (1, 0, 0, 1, 1, 0)
            } else if x0 >= z0 {
                (1, 0, 0, 1, 0, 1)
            } else {
                (0, 0, 1, 1, 0, 1)
            }
        } else if y0 < z0 {
            (0, 0, 1, 0, 1, 1)
        } else if x0 < z0 {
            (0, 1, 0, 0, 1, 1)
        } else {
            (0, 1, 0, 1, 1, 0)
        };

        let offset = |v0: f64, a: usize, scale: f64| v0 - a as f64 + scale * Self::G3;
        let (x1, y1, z1) = (offset(x0, i1, 1.0), offset(y0, j1, 1.0), offset(z0, k1, 1.0));
        let (x2, y2, z2) = (offset(x0, i2, 2.0), offset(y0, j2, 2.0), offset(z0, k2, 2.0));
        let (x3, y3, z3) = (offset(x0, 1, 3.0), offset(y0, 1, 3.0), offset(z0, 1, 3.0));

        let ii = (i & 255) as usize;
        let jj = (j & 255) as usize;
        let kk = (k & 255) as usize;
        let p = &self.perm_table;

        let gi0 = p.get(ii + p.get(jj + p.get(kk)));
        let gi1 = p.get(ii + i1 + p.get(jj + j1 + p.get(kk + k1)));
        let gi2 = p.get(ii + i2 + p.get(jj + j2 + p.get(kk + k2)));
        let gi3 = p.get(ii + 1 + p.get(jj + 1 + p.get(kk + 1)));

        let n0 = Self::contribution3(x0, y0, z0, gi0);
        let n1 = Self::contribution3(x1, y1, z1, gi1);
        let n2 = Self::contribution3(x2, y2, z2, gi2);
        let n3 = Self::contribution3(x3, y3, z3, gi3);

        32.0 * (n0 + n1 + n2 + n3)
    }

    #[inline]
    fn contribution3(x: f64, y: f64, z: f64, hash: usize) -> f64 {
        let t = 0.6 - x * x - y * y - z * z;
        if t < 0.0 {
            0.0
        } else {
            let g = PermutationTable::GRAD3[hash % 12];
            let t2 = t * t;
            t2 * t2 * (x * f64::from(g[0]) + y * f64::from(g[1]) + z * f64::from(g[2]))
        }
    }

    /// Generates octaved (fractal) 2D noise.
    ///
    /// # Arguments
    ///
    /// * `x`, `y` - Coordinates
    /// * `octaves` - Number of noise layers (typically 4-8)
    /// * `persistence` - Amplitude decay per octave (typically 0.5)
    /// * `lacunarity` - Frequency increase per octave (typically 2.0)
    ///
    /// # Returns
    ///
    /// A value roughly in the range [-1, 1].
    #[must_use]
    pub fn octaved(&self, x: f64, y: f64, octaves: u32, persistence: f64, lacunarity: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut max_amplitude = 0.0;

        for _ in 0..octaves {
            total += self.sample(x * frequency, y * frequency) * amplitude;
            max_amplitude += amplitude;
            amplitude *= persistence;
            frequency *= lacunarity;
        }

        total / max_amplitude
    }

    /// Generates octaved 3D noise. Same parameters as [`Self::octaved`].
    #[must_use]
    pub fn octaved3d(
        &self,
        x: f64,
        y: f64,
        z: f64,
        octaves: u32,
        persistence: f64,
        lacunarity: f64,
    ) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut max_amplitude = 0.0;

        for _ in 0..octaves {
            total += self.sample3(x * frequency, y * frequency, z * frequency) * amplitude;
            max_amplitude += amplitude;
            amplitude *= persistence;
            frequency *= lacunarity;
        }

        total / max_amplitude
    }

    /// Generates ridged noise (good for mountains).
    #[must_use]
    pub fn ridged(&self, x: f64, y: f64, octaves: u32, persistence: f64, lacunarity: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut max_amplitude = 0.0;

        for _ in 0..octaves {
            let noise = self.sample(x * frequency, y * frequency);
            let ridge = 1.0 - noise.abs();
            total += ridge * ridge * amplitude;
            max_amplitude += amplitude;
            amplitude *= persistence;
            frequency *= lacunarity;
        }

        total / max_amplitude
    }
}

/// Fast floor function.
#[inline]
fn fast_floor(x: f64) -> i32 {
    let xi = x as i32;
    if x < f64::from(xi) { xi - 1 } else { xi }
}

/// Linear interpolation.
#[inline]
#[must_use]
pub fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

/// Bilinear interpolation over a unit square.
#[inline]
#[must_use]
pub fn lerp2(tx: f64, ty: f64, v00: f64, v10: f64, v01: f64, v11: f64) -> f64 {
    lerp(ty, lerp(tx, v00, v10), lerp(tx, v01, v11))
}
