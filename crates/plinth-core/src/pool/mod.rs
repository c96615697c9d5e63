//! Fixed-size-class free-list allocator.
//!
//! Pools hand out byte cells of one fixed size. Cells are carved from
//! page-sized blocks that live for the rest of the process; a released cell
//! goes back on its pool's free list and is never returned to the OS.
//!
//! A process may instead route all pool traffic through an externally
//! supplied allocate/release pair. The choice is made exactly once: the
//! first allocation fixes the mode to pooled, after which an override can
//! no longer be installed.


use crate::error::{ErrorOrigin, InternalError};
use std::{
    fmt,
    ops::{Deref, DerefMut},
    sync::{Mutex, MutexGuard, OnceLock, PoisonError},
};

///
/// CONSTANTS
///

/// Size of one growth block.
pub const PAGE_SIZE: usize = 4096;

/// Cell size of the statement-text pool.
pub const STATEMENT_CELL_SIZE: usize = 16 * 1024;

/// Cell size of the column-fetch pool; also the first-attempt fetch length.
pub const FETCH_CELL_SIZE: usize = 64;

/// Backing storage for compiled statement and view-expression text.
pub static STATEMENT_POOL: Pool = Pool::new(STATEMENT_CELL_SIZE);

/// Backing storage for first-attempt variable-length column fetches.
pub static FETCH_POOL: Pool = Pool::new(FETCH_CELL_SIZE);

static MODE: OnceLock<AllocatorMode> = OnceLock::new();

///
/// AllocatorOverride
///
/// Externally supplied allocate/release pair replacing every pool.
/// `allocate` receives the requested cell size and must return a buffer of
/// at least that length, or `None` when memory is exhausted.
///

#[derive(Clone, Copy)]
pub struct AllocatorOverride {
    pub allocate: fn(usize) -> Option<Box<[u8]>>,
    pub release: fn(Box<[u8]>),
}

impl fmt::Debug for AllocatorOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AllocatorOverride")
    }
}

///
/// AllocatorMode
///

#[derive(Debug)]
enum AllocatorMode {
    Pooled,
    Override(AllocatorOverride),
}

/// Install the process-wide allocator override.
///
/// Must run before the first pool allocation; fails if any pool has already
/// been used or an override is already installed.
pub fn install_override(hooks: AllocatorOverride) -> Result<(), InternalError> {
    let mut installed = false;
    MODE.get_or_init(|| {
        installed = true;
        AllocatorMode::Override(hooks)
    });

    if installed {
        Ok(())
    } else {
        Err(InternalError::invariant(
            ErrorOrigin::Pool,
            "allocator mode already resolved; override must be installed before first use",
        ))
    }
}

/// True when an allocator override owns all pool traffic.
#[must_use]
pub fn is_overridden() -> bool {
    matches!(mode(), AllocatorMode::Override(_))
}

fn mode() -> &'static AllocatorMode {
    MODE.get_or_init(|| AllocatorMode::Pooled)
}

///
/// Pool
///
/// Lock-guarded free list of fixed-size cells.
///

pub struct Pool {
    cell_size: usize,
    state: Mutex<PoolState>,
}

struct PoolState {
    free: Vec<&'static mut [u8]>,
    blocks: usize,
    cells: usize,
}

impl Pool {
    /// Create an empty pool; no memory is reserved until the first allocation.
    #[must_use]
    pub const fn new(cell_size: usize) -> Self {
        Self {
            cell_size,
            state: Mutex::new(PoolState {
                free: Vec::new(),
                blocks: 0,
                cells: 0,
            }),
        }
    }

    #[must_use]
    pub const fn cell_size(&self) -> usize {
        self.cell_size
    }

    /// Take one cell. Contents are whatever the previous owner left behind.
    pub fn allocate(&'static self) -> Option<PoolCell> {
        if self.cell_size == 0 {
            return None;
        }

        match mode() {
            AllocatorMode::Override(hooks) => {
                let bytes = (hooks.allocate)(self.cell_size)?;
                if bytes.len() < self.cell_size {
                    (hooks.release)(bytes);
                    return None;
                }

                Some(PoolCell {
                    storage: Some(CellStorage::External(bytes)),
                    pool: self,
                })
            }
            AllocatorMode::Pooled => {
                let mut state = self.lock();
                if state.free.is_empty() && !self.grow(&mut state) {
                    return None;
                }
                let bytes = state.free.pop()?;

                Some(PoolCell {
                    storage: Some(CellStorage::Pooled(bytes)),
                    pool: self,
                })
            }
        }
    }

    /// Take one cell with every byte cleared.
    pub fn allocate_zeroed(&'static self) -> Option<PoolCell> {
        let mut cell = self.allocate()?;
        cell.fill(0);

        Some(cell)
    }

    /// Return a cell to its free list. Equivalent to dropping it.
    pub fn release(&self, cell: PoolCell) {
        drop(cell);
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let state = self.lock();

        PoolStats {
            cell_size: self.cell_size,
            blocks: state.blocks,
            cells: state.cells,
            free: state.free.len(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    const fn block_len(&self) -> usize {
        if self.cell_size >= PAGE_SIZE {
            self.cell_size
        } else {
            PAGE_SIZE - PAGE_SIZE % self.cell_size
        }
    }

    // Grow by one block. Returns false when memory is exhausted.
    fn grow(&self, state: &mut PoolState) -> bool {
        let block_len = self.block_len();
        let cells = block_len / self.cell_size;

        if state.free.try_reserve(cells).is_err() {
            return false;
        }
        let mut block = Vec::new();
        if block.try_reserve_exact(block_len).is_err() {
            return false;
        }
        block.resize(block_len, 0u8);

        let block: &'static mut [u8] = Box::leak(block.into_boxed_slice());
        state.free.extend(block.chunks_exact_mut(self.cell_size));
        state.blocks += 1;
        state.cells += cells;

        tracing::trace!(
            cell_size = self.cell_size,
            blocks = state.blocks,
            "pool grew by one block"
        );

        true
    }

    fn give_back(&self, storage: CellStorage) {
        match storage {
            CellStorage::Pooled(bytes) => self.lock().free.push(bytes),
            CellStorage::External(bytes) => {
                if let AllocatorMode::Override(hooks) = mode() {
                    (hooks.release)(bytes);
                }
            }
        }
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("cell_size", &self.cell_size)
            .finish_non_exhaustive()
    }
}

///
/// PoolStats
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PoolStats {
    pub cell_size: usize,
    pub blocks: usize,
    pub cells: usize,
    pub free: usize,
}

///
/// PoolCell
///
/// One fixed-size cell. Dropping it returns the cell to its pool.
///

pub struct PoolCell {
    storage: Option<CellStorage>,
    pool: &'static Pool,
}

enum CellStorage {
    Pooled(&'static mut [u8]),
    External(Box<[u8]>),
}

impl PoolCell {
    #[must_use]
    pub const fn pool(&self) -> &'static Pool {
        self.pool
    }
}

impl Deref for PoolCell {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match &self.storage {
            Some(CellStorage::Pooled(bytes)) => bytes,
            Some(CellStorage::External(bytes)) => &bytes[..self.pool.cell_size],
            None => &[],
        }
    }
}

impl DerefMut for PoolCell {
    fn deref_mut(&mut self) -> &mut [u8] {
        let len = self.pool.cell_size;
        match &mut self.storage {
            Some(CellStorage::Pooled(bytes)) => bytes,
            Some(CellStorage::External(bytes)) => &mut bytes[..len],
            None => &mut [],
        }
    }
}

impl Drop for PoolCell {
    fn drop(&mut self) {
        if let Some(storage) = self.storage.take() {
            self.pool.give_back(storage);
        }
    }
}

impl fmt::Debug for PoolCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolCell")
            .field("cell_size", &self.pool.cell_size)
            .finish_non_exhaustive()
    }
}
