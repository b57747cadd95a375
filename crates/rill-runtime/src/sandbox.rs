use wasmtime_wasi::WasiCtxBuilder;
use wasmtime_wasi::preview1::WasiP1Ctx;

/// Per-session store data.
///
/// Engines are I/O-free, but ones built for `wasm32-wasip1` still import a
/// handful of WASI functions (clocks, random, `fd_write` for panics). They
/// get a deny-default context:
/// - No filesystem preopens
/// - No host environment variables or arguments
/// - No stdin/stdout; stderr optionally inherited so engine panics are visible
pub struct SandboxState {
    wasi: WasiP1Ctx,
}

impl SandboxState {
    pub fn new(forward_stderr: bool) -> Self {
        let mut builder = WasiCtxBuilder::new();
        if forward_stderr {
            builder.inherit_stderr();
        }
        Self {
            wasi: builder.build_p1(),
        }
    }

    pub(crate) fn wasi_mut(&mut self) -> &mut WasiP1Ctx {
        &mut self.wasi
    }
}

impl Default for SandboxState {
    fn default() -> Self {
        Self::new(true)
    }
}
