use std::sync::atomic::{AtomicU64, Ordering};

use rill_core::EngineError;
use wasmtime::{Instance, Store, TypedFunc, WasmParams, WasmResults};

use crate::exports::EngineExports;
use crate::sandbox::SandboxState;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Text,
    Bytes,
}

/// A buffer living in engine memory, owned by the host.
///
/// Move-only: [`ForeignMemory::release`] consumes it, so a handle cannot be
/// released twice or read after release. [`ForeignBuffer::transfer`] hands
/// ownership to the engine instead. Dropping one any other way leaks engine
/// memory and trips a debug assertion.
#[must_use = "foreign buffers must be released or transferred"]
#[derive(Debug)]
pub struct ForeignBuffer {
    raw: i32,
    kind: BufferKind,
    instance: u64,
}

impl ForeignBuffer {
    /// Engine-side handle, for passing as a call argument.
    pub fn raw(&self) -> i32 {
        self.raw
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// Give the buffer to the engine, which becomes responsible for freeing
    /// it. Returns the handle to pass along.
    pub fn transfer(self) -> i32 {
        self.disarm()
    }

    fn disarm(self) -> i32 {
        let raw = self.raw;
        std::mem::forget(self);
        raw
    }
}

impl Drop for ForeignBuffer {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        tracing::error!(
            handle = self.raw,
            kind = ?self.kind,
            "Foreign buffer dropped without release; engine memory leaked"
        );
        debug_assert!(false, "foreign buffer {} dropped without release", self.raw);
    }
}

/// Host side of one engine instance's linear memory.
///
/// Owns the `Store`, so everything that touches the instance goes through
/// here, one call at a time.
pub struct ForeignMemory {
    store: Store<SandboxState>,
    instance: Instance,
    exports: EngineExports,
    fuel_per_call: Option<u64>,
    id: u64,
}

impl ForeignMemory {
    pub(crate) fn new(
        store: Store<SandboxState>,
        instance: Instance,
        exports: EngineExports,
        fuel_per_call: Option<u64>,
    ) -> Self {
        Self {
            store,
            instance,
            exports,
            fuel_per_call,
            id: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn exports(&self) -> &EngineExports {
        &self.exports
    }

    /// Copy `text` into a fresh text buffer of exactly its length.
    pub fn allocate_text(&mut self, text: &str) -> Result<ForeignBuffer, EngineError> {
        self.allocate(BufferKind::Text, text.as_bytes())
    }

    /// Copy `bytes` into a fresh binary buffer of exactly their length.
    pub fn allocate_bytes(&mut self, bytes: &[u8]) -> Result<ForeignBuffer, EngineError> {
        self.allocate(BufferKind::Bytes, bytes)
    }

    /// Decode a buffer as UTF-8. Does not release it.
    pub fn read_text(&mut self, buffer: &ForeignBuffer) -> Result<String, EngineError> {
        let bytes = self.read_bytes(buffer)?;
        String::from_utf8(bytes).map_err(|_| EngineError::InvalidText { call: "read_text" })
    }

    /// Copy a buffer's contents out. Does not release it.
    pub fn read_bytes(&mut self, buffer: &ForeignBuffer) -> Result<Vec<u8>, EngineError> {
        self.check_owner(buffer, "read_bytes")?;
        let (ptr, len) = self.region(buffer.raw)?;
        let mut out = vec![0u8; len];
        self.exports
            .memory
            .read(&self.store, ptr, &mut out)
            .map_err(|e| EngineError::Memory {
                call: "read_bytes",
                reason: format!("{len} bytes at {ptr}: {e}"),
            })?;
        Ok(out)
    }

    /// Free a buffer. Consumes it, so this happens at most once.
    pub fn release(&mut self, buffer: ForeignBuffer) -> Result<(), EngineError> {
        let owned = self.check_owner(&buffer, "buffer_free");
        let raw = buffer.disarm();
        owned?;
        self.call("buffer_free", |e| &e.buffer_free, raw)
    }

    /// Allocate a text argument, run `f` with it, and release it on every
    /// exit path.
    pub fn with_text<T>(
        &mut self,
        text: &str,
        f: impl FnOnce(&mut Self, &ForeignBuffer) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let buffer = self.allocate_text(text)?;
        self.scoped(buffer, f)
    }

    /// Allocate a binary argument, run `f` with it, and release it on every
    /// exit path.
    pub fn with_bytes<T>(
        &mut self,
        bytes: &[u8],
        f: impl FnOnce(&mut Self, &ForeignBuffer) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let buffer = self.allocate_bytes(bytes)?;
        self.scoped(buffer, f)
    }

    /// Take ownership of a text buffer the engine returned, read it and
    /// release it. `0` is the null sentinel.
    pub fn take_text(&mut self, raw: i32) -> Result<Option<String>, EngineError> {
        match self.adopt(raw, BufferKind::Text) {
            Some(buffer) => self.scoped(buffer, |m, b| m.read_text(b)).map(Some),
            None => Ok(None),
        }
    }

    /// Take ownership of a binary buffer the engine returned, copy it out and
    /// release it.
    pub fn take_bytes(&mut self, raw: i32) -> Result<Option<Vec<u8>>, EngineError> {
        match self.adopt(raw, BufferKind::Bytes) {
            Some(buffer) => self.scoped(buffer, |m, b| m.read_bytes(b)).map(Some),
            None => Ok(None),
        }
    }

    /// Call a nullary `() -> i32` export, such as an engine statistics
    /// counter.
    pub fn probe(&mut self, name: &'static str) -> Result<i32, EngineError> {
        let func = self
            .instance
            .get_typed_func::<(), i32>(&mut self.store, name)
            .map_err(|_| EngineError::Unsupported(name))?;
        self.refuel(name)?;
        func.call(&mut self.store, ())
            .map_err(|e| EngineError::Trap {
                call: name,
                reason: format!("{e:#}"),
            })
    }

    /// Call a required export picked out of the export table.
    pub(crate) fn call<P, R>(
        &mut self,
        name: &'static str,
        select: impl FnOnce(&EngineExports) -> &TypedFunc<P, R>,
        args: P,
    ) -> Result<R, EngineError>
    where
        P: WasmParams,
        R: WasmResults,
    {
        self.refuel(name)?;
        let func = select(&self.exports);
        func.call(&mut self.store, args)
            .map_err(|e| EngineError::Trap {
                call: name,
                reason: format!("{e:#}"),
            })
    }

    /// Call an optional export, if the engine has it.
    pub(crate) fn call_hook<P, R>(
        &mut self,
        name: &'static str,
        select: impl FnOnce(&EngineExports) -> Option<&TypedFunc<P, R>>,
        args: P,
    ) -> Result<R, EngineError>
    where
        P: WasmParams,
        R: WasmResults,
    {
        self.refuel(name)?;
        let func = select(&self.exports).ok_or(EngineError::Unsupported(name))?;
        func.call(&mut self.store, args)
            .map_err(|e| EngineError::Trap {
                call: name,
                reason: format!("{e:#}"),
            })
    }

    fn refuel(&mut self, name: &'static str) -> Result<(), EngineError> {
        if let Some(fuel) = self.fuel_per_call {
            self.store.set_fuel(fuel).map_err(|e| EngineError::Trap {
                call: name,
                reason: format!("cannot set fuel: {e}"),
            })?;
        }
        Ok(())
    }

    fn allocate(&mut self, kind: BufferKind, bytes: &[u8]) -> Result<ForeignBuffer, EngineError> {
        let call = match kind {
            BufferKind::Text => "text_alloc",
            BufferKind::Bytes => "bytes_alloc",
        };
        let len = i32::try_from(bytes.len()).map_err(|_| EngineError::Memory {
            call,
            reason: format!("{} bytes exceed the engine's address space", bytes.len()),
        })?;

        let raw = match kind {
            BufferKind::Text => self.call(call, |e| &e.text_alloc, len)?,
            BufferKind::Bytes => self.call(call, |e| &e.bytes_alloc, len)?,
        };
        let buffer = self.adopt(raw, kind).ok_or(EngineError::Memory {
            call,
            reason: "allocator returned null".into(),
        })?;

        match self.write(&buffer, bytes) {
            Ok(()) => Ok(buffer),
            Err(err) => {
                if let Err(release_err) = self.release(buffer) {
                    tracing::warn!(error = %release_err, "Failed to release buffer after write error");
                }
                Err(err)
            }
        }
    }

    fn write(&mut self, buffer: &ForeignBuffer, bytes: &[u8]) -> Result<(), EngineError> {
        let (ptr, len) = self.region(buffer.raw)?;
        if len != bytes.len() {
            return Err(EngineError::Memory {
                call: "write",
                reason: format!("asked for {} bytes, engine allocated {len}", bytes.len()),
            });
        }
        self.exports
            .memory
            .write(&mut self.store, ptr, bytes)
            .map_err(|e| EngineError::Memory {
                call: "write",
                reason: format!("{len} bytes at {ptr}: {e}"),
            })
    }

    /// Data address and length of a buffer, as reported by the engine.
    fn region(&mut self, raw: i32) -> Result<(usize, usize), EngineError> {
        let ptr = self.call("buffer_ptr", |e| &e.buffer_ptr, raw)?;
        let len = self.call("buffer_len", |e| &e.buffer_len, raw)?;
        let len = usize::try_from(len).map_err(|_| EngineError::Memory {
            call: "buffer_len",
            reason: format!("negative length {len} for handle {raw}"),
        })?;
        // Wasm32 addresses are unsigned.
        Ok((ptr as u32 as usize, len))
    }

    fn adopt(&self, raw: i32, kind: BufferKind) -> Option<ForeignBuffer> {
        (raw != 0).then(|| ForeignBuffer {
            raw,
            kind,
            instance: self.id,
        })
    }

    /// Release `buffer` after `f`, whatever `f` returned. `f`'s error wins.
    fn scoped<T>(
        &mut self,
        buffer: ForeignBuffer,
        f: impl FnOnce(&mut Self, &ForeignBuffer) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let result = f(self, &buffer);
        let released = self.release(buffer);
        let value = result?;
        released?;
        Ok(value)
    }

    fn check_owner(&self, buffer: &ForeignBuffer, call: &'static str) -> Result<(), EngineError> {
        if buffer.instance == self.id {
            Ok(())
        } else {
            Err(EngineError::Memory {
                call,
                reason: format!("handle {} belongs to another engine instance", buffer.raw),
            })
        }
    }
}
