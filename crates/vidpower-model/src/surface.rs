//! Raw Pixel Surfaces and Pooling
//!
//! A [`Surface`] is an exclusive lease on compositor-importable pixel storage.
//! Whoever holds the lease may write it; dropping the lease hands the storage
//! back to its [`SurfacePool`].
//!
//! # Strategies
//!
//! - **Direct**: a fixed set of surfaces is allocated once and reused. A
//!   surface is never handed out again while a lease on it is alive, so the
//!   decoder can never overwrite a frame the compositor is still showing.
//! - **Recreated**: every acquire allocates fresh storage. The number of live
//!   surfaces is bounded so a slow consumer cannot grow memory without limit.
//!
//! # Usage
//!
//! ```rust
//! use vidpower_model::{Buffering, PixelFormat, SurfacePool};
//!
//! let pool = SurfacePool::new(Buffering::Direct, 2, PixelFormat::Yuv422, (4, 4));
//!
//! let mut first = pool.acquire().expect("surface");
//! first.write(|bytes| bytes.fill(0x80));
//!
//! let second = pool.acquire().expect("surface");
//! assert_ne!(first.id(), second.id());
//!
//! // Both surfaces are leased, the pool is exhausted until one is dropped
//! assert!(pool.acquire().is_err());
//! drop(first);
//! assert!(pool.acquire().is_ok());
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::config::Buffering;
use crate::error::{ModelError, Result};
use crate::format::PixelFormat;

/// Identifier of a surface, unique within its pool
pub type SurfaceId = u64;

/// Backing storage of a surface
struct SurfaceStorage {
    id: SurfaceId,
    format: PixelFormat,
    size: (u32, u32),
    data: RwLock<Vec<u8>>,
}

/// Exclusive lease on a pixel surface
///
/// Not `Clone`: exactly one owner at a time. Ownership moves from the
/// decoder to the presenter together with the frame that carries it.
pub struct Surface {
    storage: Arc<SurfaceStorage>,
    pool: Weak<PoolShared>,
}

impl Surface {
    /// Surface identifier
    pub fn id(&self) -> SurfaceId {
        self.storage.id
    }

    /// Pixel format of the storage
    pub fn format(&self) -> PixelFormat {
        self.storage.format
    }

    /// Surface dimensions (width, height)
    pub fn size(&self) -> (u32, u32) {
        self.storage.size
    }

    /// Byte length of the storage
    pub fn len(&self) -> usize {
        self.storage.data.read().len()
    }

    /// Check if the storage is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write into the surface
    pub fn write<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut data = self.storage.data.write();
        f(&mut data)
    }

    /// Read the surface contents
    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let data = self.storage.data.read();
        f(&data)
    }

    /// Copy of the surface contents
    pub fn snapshot(&self) -> Vec<u8> {
        self.storage.data.read().clone()
    }
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("id", &self.storage.id)
            .field("format", &self.storage.format)
            .field("size", &self.storage.size)
            .finish_non_exhaustive()
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            pool.release(Arc::clone(&self.storage));
        }
    }
}

/// Pool statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Surfaces allocated
    pub allocations: u64,

    /// Acquires served by reusing a released surface
    pub reuses: u64,

    /// Acquires refused because the pool was exhausted
    pub exhausted: u64,

    /// Leases currently alive
    pub live: usize,

    /// Most leases alive at once
    pub peak_live: usize,
}

struct PoolState {
    free: Vec<Arc<SurfaceStorage>>,
    stats: PoolStats,
}

struct PoolShared {
    buffering: Buffering,
    capacity: usize,
    format: PixelFormat,
    size: (u32, u32),
    next_id: AtomicU64,
    state: Mutex<PoolState>,
}

impl PoolShared {
    fn release(&self, storage: Arc<SurfaceStorage>) {
        let mut state = self.state.lock();
        state.stats.live = state.stats.live.saturating_sub(1);
        match self.buffering {
            Buffering::Direct => {
                trace!("Surface {} returned to pool", storage.id);
                state.free.push(storage);
            }
            Buffering::Recreated => {
                trace!("Surface {} released", storage.id);
            }
        }
    }

    fn allocate(&self) -> Arc<SurfaceStorage> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let len = self.format.frame_size(self.size.0, self.size.1);
        Arc::new(SurfaceStorage {
            id,
            format: self.format,
            size: self.size,
            data: RwLock::new(vec![0; len]),
        })
    }
}

/// Pool of raw surfaces
///
/// Cloning the pool yields another handle to the same surfaces.
#[derive(Clone)]
pub struct SurfacePool {
    shared: Arc<PoolShared>,
}

impl SurfacePool {
    /// Create a pool
    ///
    /// # Arguments
    ///
    /// * `buffering` - Reuse strategy
    /// * `capacity` - Direct: number of surfaces; Recreated: live surface bound
    /// * `format` - Pixel format of every surface
    /// * `size` - Surface dimensions (width, height)
    pub fn new(buffering: Buffering, capacity: usize, format: PixelFormat, size: (u32, u32)) -> Self {
        debug!(
            "Creating {:?} surface pool: capacity {}, {:?} {}x{}",
            buffering, capacity, format, size.0, size.1
        );
        Self {
            shared: Arc::new(PoolShared {
                buffering,
                capacity,
                format,
                size,
                next_id: AtomicU64::new(0),
                state: Mutex::new(PoolState {
                    free: Vec::with_capacity(capacity),
                    stats: PoolStats::default(),
                }),
            }),
        }
    }

    /// Pool of `count` reusable surfaces
    pub fn direct(count: usize, format: PixelFormat, size: (u32, u32)) -> Self {
        Self::new(Buffering::Direct, count, format, size)
    }

    /// Pool allocating a fresh surface per lease, at most `max_in_flight` alive
    pub fn recreated(max_in_flight: usize, format: PixelFormat, size: (u32, u32)) -> Self {
        Self::new(Buffering::Recreated, max_in_flight, format, size)
    }

    /// Lease a surface
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::PoolExhausted`] when `capacity` leases are alive.
    pub fn acquire(&self) -> Result<Surface> {
        let shared = &self.shared;
        let mut state = shared.state.lock();

        if state.stats.live >= shared.capacity {
            state.stats.exhausted += 1;
            return Err(ModelError::PoolExhausted {
                capacity: shared.capacity,
            });
        }

        let storage = match state.free.pop() {
            Some(storage) => {
                state.stats.reuses += 1;
                storage
            }
            None => {
                state.stats.allocations += 1;
                shared.allocate()
            }
        };

        state.stats.live += 1;
        state.stats.peak_live = state.stats.peak_live.max(state.stats.live);

        Ok(Surface {
            storage,
            pool: Arc::downgrade(shared),
        })
    }

    /// Reuse strategy of this pool
    pub fn buffering(&self) -> Buffering {
        self.shared.buffering
    }

    /// Capacity (Direct) or live bound (Recreated)
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Pixel format of the pooled surfaces
    pub fn format(&self) -> PixelFormat {
        self.shared.format
    }

    /// Number of leases currently alive
    pub fn live(&self) -> usize {
        self.shared.state.lock().stats.live
    }

    /// Snapshot of pool statistics
    pub fn stats(&self) -> PoolStats {
        self.shared.state.lock().stats.clone()
    }
}

impl fmt::Debug for SurfacePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfacePool")
            .field("buffering", &self.shared.buffering)
            .field("capacity", &self.shared.capacity)
            .field("format", &self.shared.format)
            .finish_non_exhaustive()
    }
}
