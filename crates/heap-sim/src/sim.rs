//! Script execution against a [`Heap`].

use std::{collections::BTreeMap, io};

use page_heap::{BackingStore as _, Heap, HeapPtr, LayoutError, PAGE_SIZE, PagedBuffer};
use snafu::{OptionExt as _, ResultExt as _, Snafu, ensure};

use crate::script::{Command, Line};

#[derive(Debug, Snafu)]
pub(crate) enum SimError {
    #[snafu(display("line {line}: no live allocation named `{name}`"))]
    UnknownName { line: usize, name: String },
    #[snafu(display("line {line}: `{name}` is still allocated"))]
    DuplicateName { line: usize, name: String },
    #[snafu(display(
        "line {line}: `{name}` holds {found:#04x} at offset {offset}, expected {expected:#04x}"
    ))]
    Mismatch {
        line: usize,
        name: String,
        offset: usize,
        expected: u8,
        found: u8,
    },
    #[snafu(display("line {line}: free list damaged"))]
    Corrupted { line: usize, source: LayoutError },
    #[snafu(display("failed to write output"))]
    Output { source: io::Error },
}

/// A heap together with the names bound to its live allocations.
///
/// Every pointer the simulator frees comes from its own name table and is
/// removed from it first, so a script cannot free a block twice.
#[derive(Debug)]
pub(crate) struct Simulator {
    heap: Heap<PagedBuffer>,
    live: BTreeMap<String, HeapPtr>,
}

impl Simulator {
    pub(crate) fn new(store: PagedBuffer) -> Self {
        Self {
            heap: Heap::new(store),
            live: BTreeMap::new(),
        }
    }

    /// Runs every line in order, writing one result line per command.
    pub(crate) fn run<W>(&mut self, lines: &[Line], out: &mut W) -> Result<(), SimError>
    where
        W: io::Write,
    {
        for line in lines {
            self.execute(line, out)?;
        }
        Ok(())
    }

    /// Runs a single command and checks the free list afterwards.
    pub(crate) fn execute<W>(&mut self, line: &Line, out: &mut W) -> Result<(), SimError>
    where
        W: io::Write,
    {
        let number = line.number;
        match &line.command {
            Command::Alloc { name, bytes } => {
                ensure!(
                    !self.live.contains_key(name),
                    DuplicateNameSnafu { line: number, name }
                );
                match self.heap.try_allocate(*bytes) {
                    Ok(ptr) => {
                        writeln!(out, "alloc {name} {bytes} -> {ptr}").context(OutputSnafu)?;
                        self.live.insert(name.clone(), ptr);
                    }
                    Err(err) => {
                        writeln!(out, "alloc {name} {bytes} -> null ({err})")
                            .context(OutputSnafu)?;
                    }
                }
            }
            Command::Free { name: None } => {
                // SAFETY: freeing null is always allowed.
                unsafe {
                    self.heap.free(None);
                }
                writeln!(out, "free null").context(OutputSnafu)?;
            }
            Command::Free { name: Some(name) } => {
                let ptr = self
                    .live
                    .remove(name)
                    .context(UnknownNameSnafu { line: number, name })?;
                // SAFETY: `ptr` was allocated by this heap and has just left
                // the live table, so it is freed exactly once.
                unsafe {
                    self.heap.free(Some(ptr));
                }
                writeln!(out, "free {name} ({ptr})").context(OutputSnafu)?;
            }
            Command::Fill { name, byte } => {
                let ptr = self.lookup(number, name)?;
                self.heap.payload_mut(ptr).fill(*byte);
                writeln!(out, "fill {name} {byte:#04x}").context(OutputSnafu)?;
            }
            Command::Check { name, byte } => {
                let ptr = self.lookup(number, name)?;
                let payload = self.heap.payload(ptr);
                if let Some(offset) = payload.iter().position(|b| b != byte) {
                    return MismatchSnafu {
                        line: number,
                        name,
                        offset,
                        expected: *byte,
                        found: payload[offset],
                    }
                    .fail();
                }
                writeln!(out, "check {name} {byte:#04x} ok").context(OutputSnafu)?;
            }
            Command::Report => {
                let free = self.heap.free_total();
                let len = self.heap.store().len();
                writeln!(
                    out,
                    "free {free} bytes in {} blocks, store {len} bytes ({} pages)",
                    self.heap.free_blocks().count(),
                    len.div_ceil(PAGE_SIZE),
                )
                .context(OutputSnafu)?;
            }
            Command::Blocks => {
                self.heap.ensure_initialized();
                writeln!(out, "blocks").context(OutputSnafu)?;
                for block in self.heap.free_blocks() {
                    writeln!(out, "  {:#x}..{:#x} {}", block.addr, block.end(), block.size)
                        .context(OutputSnafu)?;
                }
            }
        }

        self.heap
            .validate()
            .context(CorruptedSnafu { line: number })
    }

    fn lookup(&self, line: usize, name: &str) -> Result<HeapPtr, SimError> {
        self.live
            .get(name)
            .copied()
            .context(UnknownNameSnafu { line, name })
    }
}
