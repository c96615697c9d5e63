use crate::{
    error::InternalError,
    pool::{PoolCell, STATEMENT_POOL},
};
use std::fmt::{self, Write as _};

///
/// StatementBuffer
///
/// Bounded text buffer backed by one statement-pool cell. Compilers write
/// statements and view expressions here; running out of room is a
/// compilation failure rather than a reallocation.
///

pub struct StatementBuffer {
    cell: PoolCell,
    len: usize,
}

impl StatementBuffer {
    pub fn new() -> Result<Self, InternalError> {
        let cell = STATEMENT_POOL
            .allocate()
            .ok_or_else(|| InternalError::compile("statement buffer pool exhausted"))?;

        Ok(Self { cell, len: 0 })
    }

    pub fn push(&mut self, text: &str) -> Result<(), InternalError> {
        let end = self.len + text.len();
        if end > self.cell.len() {
            return Err(InternalError::compile(format!(
                "statement exceeds {} bytes",
                self.cell.len()
            )));
        }
        self.cell[self.len..end].copy_from_slice(text.as_bytes());
        self.len = end;

        Ok(())
    }

    pub fn push_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<(), InternalError> {
        let capacity = self.cell.len();
        self.write_fmt(args).map_err(|_| {
            InternalError::compile(format!("statement exceeds {capacity} bytes"))
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        // Only whole `&str` slices are ever copied in.
        std::str::from_utf8(&self.cell[..self.len]).unwrap_or_default()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Write for StatementBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push(s).map_err(|_| fmt::Error)
    }
}

impl fmt::Debug for StatementBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StatementBuffer").field(&self.as_str()).finish()
    }
}

impl fmt::Display for StatementBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
