//! # Carvers
//!
//! Caves and canyons are worm-shaped tunnels that start in one chunk and
//! wander up to 8 chunks away. To carve chunk C, every chunk N within 8
//! chunks of C re-derives the tunnels that start in N and carves the part
//! that falls inside C. The tunnel for (N, carver index) depends only on
//! the world seed, so every chunk agrees on it.
//!
//! The carving mask records carved voxels. A voxel whose mask bit is
//! already set is skipped, so overlapping tunnels and repeated passes
//! leave the chunk unchanged.

use std::f64::consts::PI;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use strata_core::{ChunkCoord, MaterialArena, MaterialId, CHUNK_SIZE};

use crate::chunk::ChunkBuffer;
use crate::error::TerrainResult;
use crate::noise::WorldSeed;

/// Chunks searched in each direction for tunnel origins.
pub const CARVER_RANGE: i32 = 8;

/// Shared inputs of a carving pass.
pub struct CarveContext<'a> {
    /// World seed.
    pub seed: WorldSeed,
    /// Material lookup for carvability.
    pub arena: &'a MaterialArena,
    /// Never carved.
    pub bedrock: MaterialId,
    /// Fills carved space below `lava_level`.
    pub lava: MaterialId,
    /// Carved voxels below this Y become lava.
    pub lava_level: i32,
    /// Height of the chunk.
    pub height: i32,
}

impl CarveContext<'_> {
    /// Carves one voxel of `buffer` at local coordinates if it is solid,
    /// not bedrock, and not carved before.
    pub fn carve_voxel(&self, buffer: &mut ChunkBuffer, x: usize, y: usize, z: usize) -> bool {
        let current = buffer.get(x, y, z);
        if current == self.bedrock || !self.arena.kind(current).solid {
            return false;
        }
        if !buffer.mask_mut().set(x, y, z) {
            return false;
        }
        let fill = if (y as i32) < self.lava_level {
            self.lava
        } else {
            MaterialId::AIR
        };
        buffer.set(x, y, z, fill);
        true
    }
}

/// A tunnel generator.
pub trait Carver: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Decides from the origin chunk's RNG whether tunnels start there.
    fn is_start_chunk(&self, rng: &mut ChaCha8Rng) -> bool;

    /// Carves the tunnels starting in `origin` into `buffer`.
    ///
    /// # Errors
    ///
    /// External carvers may fail; built-in carvers never do.
    fn carve(
        &self,
        ctx: &CarveContext<'_>,
        rng: &mut ChaCha8Rng,
        origin: ChunkCoord,
        buffer: &mut ChunkBuffer,
    ) -> TerrainResult<()>;
}

/// Runs `carvers` for every origin chunk around the buffer's chunk.
///
/// Each carver comes with its index in the biome's carver list, and each
/// (origin, index) pair gets its own seed. Skipping a carver therefore
/// leaves the seeds of the others unchanged.
///
/// # Errors
///
/// Returns the first carver failure.
pub fn carve_neighbourhood(
    ctx: &CarveContext<'_>,
    carvers: &[(usize, &dyn Carver)],
    buffer: &mut ChunkBuffer,
) -> TerrainResult<()> {
    let center = buffer.coord();
    for dx in -CARVER_RANGE..=CARVER_RANGE {
        for dz in -CARVER_RANGE..=CARVER_RANGE {
            let origin = center.offset(dx, dz);
            for &(index, carver) in carvers {
                let seed = ctx.seed.large_feature_seed(index as u64, origin.x, origin.z);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                if carver.is_start_chunk(&mut rng) {
                    carver.carve(ctx, &mut rng, origin, buffer)?;
                }
            }
        }
    }
    Ok(())
}

/// Carves an ellipsoid centred at world `(cx, cy, cz)`, clipped to the buffer.
fn carve_ellipsoid(
    ctx: &CarveContext<'_>,
    buffer: &mut ChunkBuffer,
    center: (f64, f64, f64),
    horizontal: f64,
    vertical: f64,
) {
    let origin_x = buffer.coord().world_x();
    let origin_z = buffer.coord().world_z();
    let (cx, cy, cz) = center;

    let side = CHUNK_SIZE as i32 - 1;
    let min_x = ((cx - horizontal).floor() as i32 - origin_x).max(0);
    let max_x = ((cx + horizontal).ceil() as i32 - origin_x).min(side);
    let min_z = ((cz - horizontal).floor() as i32 - origin_z).max(0);
    let max_z = ((cz + horizontal).ceil() as i32 - origin_z).min(side);
    let min_y = ((cy - vertical).floor() as i32).max(1);
    let max_y = ((cy + vertical).ceil() as i32).min(ctx.height - 1);
    if min_x > max_x || min_z > max_z || min_y > max_y {
        return;
    }

    for lx in min_x..=max_x {
        let dx = (f64::from(lx + origin_x) + 0.5 - cx) / horizontal;
        for lz in min_z..=max_z {
            let dz = (f64::from(lz + origin_z) + 0.5 - cz) / horizontal;
            if dx * dx + dz * dz >= 1.0 {
                continue;
            }
            for y in min_y..=max_y {
                let dy = (f64::from(y) + 0.5 - cy) / vertical;
                if dx * dx + dy * dy + dz * dz < 1.0 {
                    ctx.carve_voxel(buffer, lx as usize, y as usize, lz as usize);
                }
            }
        }
    }
}

/// Parameters of one wandering tunnel.
struct Tunnel {
    start: (f64, f64, f64),
    yaw: f64,
    pitch: f64,
    width: f64,
    length: usize,
    vertical_scale: f64,
    pitch_damping: f64,
}

impl Tunnel {
    fn run(&self, ctx: &CarveContext<'_>, rng: &mut ChaCha8Rng, buffer: &mut ChunkBuffer) {
        let (mut x, mut y, mut z) = self.start;
        let (mut yaw, mut pitch) = (self.yaw, self.pitch);
        let (mut yaw_drift, mut pitch_drift) = (0.0f64, 0.0f64);
        let center_x = f64::from(buffer.coord().world_x()) + 8.0;
        let center_z = f64::from(buffer.coord().world_z()) + 8.0;

        for step in 0..self.length {
            let progress = step as f64 / self.length as f64;
            let horizontal = 1.5 + (progress * PI).sin() * self.width;
            let vertical = horizontal * self.vertical_scale;

            x += yaw.cos() * pitch.cos();
            y += pitch.sin();
            z += yaw.sin() * pitch.cos();

            pitch *= self.pitch_damping;
            pitch += pitch_drift * 0.1;
            yaw += yaw_drift * 0.1;
            pitch_drift = pitch_drift * 0.9 + (rng.gen::<f64>() - rng.gen::<f64>()) * rng.gen::<f64>() * 2.0;
            yaw_drift = yaw_drift * 0.75 + (rng.gen::<f64>() - rng.gen::<f64>()) * rng.gen::<f64>() * 4.0;

            // Skip steps that cannot reach this chunk.
            let reach = horizontal + 16.0;
            if (x - center_x).abs() > reach || (z - center_z).abs() > reach {
                continue;
            }
            carve_ellipsoid(ctx, buffer, (x, y, z), horizontal, vertical);
        }
    }
}

/// Wandering cave tunnels, one to four per start chunk.
#[derive(Clone, Copy, Debug)]
pub struct CaveCarver {
    /// Chance that a chunk starts caves.
    pub probability: f64,
    /// Highest start Y.
    pub max_start_y: i32,
}

impl Default for CaveCarver {
    fn default() -> Self {
        Self {
            probability: 0.142_857_15,
            max_start_y: 120,
        }
    }
}

impl Carver for CaveCarver {
    fn name(&self) -> &str {
        "cave"
    }

    fn is_start_chunk(&self, rng: &mut ChaCha8Rng) -> bool {
        rng.gen::<f64>() < self.probability
    }

    fn carve(
        &self,
        ctx: &CarveContext<'_>,
        rng: &mut ChaCha8Rng,
        origin: ChunkCoord,
        buffer: &mut ChunkBuffer,
    ) -> TerrainResult<()> {
        let tunnels = rng.gen_range(1..=4);
        let top = self.max_start_y.min(ctx.height - 8).max(9);
        for _ in 0..tunnels {
            let start = (
                f64::from(origin.world_x() + rng.gen_range(0..16)),
                f64::from(rng.gen_range(8..top)),
                f64::from(origin.world_z() + rng.gen_range(0..16)),
            );
            let tunnel = Tunnel {
                start,
                yaw: rng.gen::<f64>() * PI * 2.0,
                pitch: (rng.gen::<f64>() - 0.5) / 4.0,
                width: rng.gen::<f64>() * 2.0 + rng.gen::<f64>(),
                length: 112 - rng.gen_range(0..28),
                vertical_scale: 1.0,
                pitch_damping: 0.7,
            };
            tunnel.run(ctx, rng, buffer);
        }
        Ok(())
    }
}

/// Long, tall, narrow ravines.
#[derive(Clone, Copy, Debug)]
pub struct CanyonCarver {
    /// Chance that a chunk starts a canyon.
    pub probability: f64,
}

impl Default for CanyonCarver {
    fn default() -> Self {
        Self { probability: 0.02 }
    }
}

impl Carver for CanyonCarver {
    fn name(&self) -> &str {
        "canyon"
    }

    fn is_start_chunk(&self, rng: &mut ChaCha8Rng) -> bool {
        rng.gen::<f64>() < self.probability
    }

    fn carve(
        &self,
        ctx: &CarveContext<'_>,
        rng: &mut ChaCha8Rng,
        origin: ChunkCoord,
        buffer: &mut ChunkBuffer,
    ) -> TerrainResult<()> {
        let top = (ctx.height - 16).max(21);
        let tunnel = Tunnel {
            start: (
                f64::from(origin.world_x() + rng.gen_range(0..16)),
                f64::from(rng.gen_range(20..top)),
                f64::from(origin.world_z() + rng.gen_range(0..16)),
            ),
            yaw: rng.gen::<f64>() * PI * 2.0,
            pitch: (rng.gen::<f64>() - 0.5) / 4.0,
            width: (rng.gen::<f64>() * 2.0 + rng.gen::<f64>()) * 2.0,
            length: 112 - rng.gen_range(0..28),
            vertical_scale: 3.0,
            pitch_damping: 0.7,
        };
        tunnel.run(ctx, rng, buffer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{Material, MaterialKind};

    struct Fixture {
        arena: MaterialArena,
        stone: MaterialId,
        bedrock: MaterialId,
        lava: MaterialId,
    }

    impl Fixture {
        fn new() -> Self {
            let arena = MaterialArena::new();
            let stone = arena.intern(Material::new("minecraft:stone", MaterialKind::SOLID)).unwrap();
            let bedrock = arena.intern(Material::new("minecraft:bedrock", MaterialKind::SOLID)).unwrap();
            let lava = arena.intern(Material::new("minecraft:lava", MaterialKind::LIQUID)).unwrap();
            Self {
                arena,
                stone,
                bedrock,
                lava,
            }
        }

        fn ctx(&self, seed: u64) -> CarveContext<'_> {
            CarveContext {
                seed: WorldSeed::new(seed),
                arena: &self.arena,
                bedrock: self.bedrock,
                lava: self.lava,
                lava_level: 10,
                height: 128,
            }
        }

        fn solid_chunk(&self, coord: ChunkCoord) -> ChunkBuffer {
            let mut buffer = ChunkBuffer::new(coord, 128);
            for x in 0..16 {
                for z in 0..16 {
                    buffer.set(x, 0, z, self.bedrock);
                    for y in 1..100 {
                        buffer.set(x, y, z, self.stone);
                    }
                }
            }
            buffer
        }
    }

    /// Carves a fixed sphere in the origin chunk.
    struct Always;

    impl Carver for Always {
        fn name(&self) -> &str {
            "always"
        }
        fn is_start_chunk(&self, _rng: &mut ChaCha8Rng) -> bool {
            true
        }
        fn carve(
            &self,
            ctx: &CarveContext<'_>,
            _rng: &mut ChaCha8Rng,
            origin: ChunkCoord,
            buffer: &mut ChunkBuffer,
        ) -> TerrainResult<()> {
            if origin == buffer.coord() {
                let c = (f64::from(origin.world_x()) + 8.0, 5.0, f64::from(origin.world_z()) + 8.0);
                carve_ellipsoid(ctx, buffer, c, 4.0, 4.0);
            }
            Ok(())
        }
    }

    #[test]
    fn test_carving_is_idempotent() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(42);
        let caves = CaveCarver {
            probability: 1.0,
            ..CaveCarver::default()
        };
        let canyons = CanyonCarver::default();
        let carvers: [(usize, &dyn Carver); 2] = [(0, &caves as &dyn Carver), (1, &canyons as &dyn Carver)];

        let mut buffer = fixture.solid_chunk(ChunkCoord::new(0, 0));
        carve_neighbourhood(&ctx, &carvers, &mut buffer).unwrap();
        let once = buffer.clone();
        assert!(once.mask().count() > 0, "a certain cave start must carve something");

        carve_neighbourhood(&ctx, &carvers, &mut buffer).unwrap();
        assert_eq!(buffer, once);
    }

    #[test]
    fn test_carving_is_deterministic() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(7);
        let caves = CaveCarver::default();
        let carvers: [(usize, &dyn Carver); 1] = [(0, &caves as &dyn Carver)];

        let mut a = fixture.solid_chunk(ChunkCoord::new(3, -2));
        let mut b = fixture.solid_chunk(ChunkCoord::new(3, -2));
        carve_neighbourhood(&ctx, &carvers, &mut a).unwrap();
        carve_neighbourhood(&ctx, &carvers, &mut b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bedrock_survives_and_lava_fills_low_voxels() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(1);
        let carvers: [(usize, &dyn Carver); 1] = [(0, &Always as &dyn Carver)];
        let mut buffer = fixture.solid_chunk(ChunkCoord::new(0, 0));
        carve_neighbourhood(&ctx, &carvers, &mut buffer).unwrap();

        assert_eq!(buffer.get(8, 0, 8), fixture.bedrock);
        assert_eq!(buffer.get(8, 5, 8), fixture.lava);
        assert!(buffer.mask().contains(8, 5, 8));
        assert_eq!(buffer.get(0, 5, 0), fixture.stone);
    }
}
