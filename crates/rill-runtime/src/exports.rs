use wasmtime::{Instance, Memory, Store, TypedFunc, WasmParams, WasmResults};

use crate::error::RuntimeError;
use crate::sandbox::SandboxState;

/// Version of the engine ABI this host speaks.
pub const ABI_VERSION: i32 = 1;

/// Typed view of everything the host calls on an engine instance.
///
/// Handles are `i32` with `0` as the null sentinel; action ids travel as
/// `i64`.
pub struct EngineExports {
    pub memory: Memory,
    pub abi_version: TypedFunc<(), i32>,
    pub text_alloc: TypedFunc<i32, i32>,
    pub bytes_alloc: TypedFunc<i32, i32>,
    pub buffer_ptr: TypedFunc<i32, i32>,
    pub buffer_len: TypedFunc<i32, i32>,
    pub buffer_free: TypedFunc<i32, ()>,
    pub player_new: TypedFunc<i32, i32>,
    pub player_free: TypedFunc<i32, ()>,
    pub player_start: TypedFunc<(i32, i32), i32>,
    pub deliver_fetch_result: TypedFunc<(i32, i64, i32), i32>,
    pub deliver_fetch_failure: Option<TypedFunc<(i32, i64, i32), i32>>,
    /// `(player, action_id, elapsed_ms)`
    pub deliver_fetch_timing: Option<TypedFunc<(i32, i64, i64), i32>>,
    pub deliver_timeout: TypedFunc<(i32, i64), i32>,
    pub next_action: TypedFunc<i32, i32>,
    pub next_segment: TypedFunc<i32, i32>,
}

impl EngineExports {
    pub fn resolve(
        instance: &Instance,
        store: &mut Store<SandboxState>,
    ) -> Result<Self, RuntimeError> {
        let memory = instance
            .get_memory(&mut *store, "memory")
            .ok_or(RuntimeError::MissingExport("memory"))?;

        Ok(Self {
            memory,
            abi_version: required(instance, store, "abi_version")?,
            text_alloc: required(instance, store, "text_alloc")?,
            bytes_alloc: required(instance, store, "bytes_alloc")?,
            buffer_ptr: required(instance, store, "buffer_ptr")?,
            buffer_len: required(instance, store, "buffer_len")?,
            buffer_free: required(instance, store, "buffer_free")?,
            player_new: required(instance, store, "player_new")?,
            player_free: required(instance, store, "player_free")?,
            player_start: required(instance, store, "player_start")?,
            deliver_fetch_result: required(instance, store, "player_deliver_fetch_result")?,
            deliver_fetch_failure: optional(instance, store, "player_deliver_fetch_failure")?,
            deliver_fetch_timing: optional(instance, store, "player_deliver_fetch_timing")?,
            deliver_timeout: required(instance, store, "player_deliver_timeout")?,
            next_action: required(instance, store, "player_next_action")?,
            next_segment: required(instance, store, "player_next_segment")?,
        })
    }
}

fn required<P, R>(
    instance: &Instance,
    store: &mut Store<SandboxState>,
    name: &'static str,
) -> Result<TypedFunc<P, R>, RuntimeError>
where
    P: WasmParams,
    R: WasmResults,
{
    optional(instance, store, name)?.ok_or(RuntimeError::MissingExport(name))
}

/// A missing export is `None`; a present one with the wrong type is an error.
fn optional<P, R>(
    instance: &Instance,
    store: &mut Store<SandboxState>,
    name: &'static str,
) -> Result<Option<TypedFunc<P, R>>, RuntimeError>
where
    P: WasmParams,
    R: WasmResults,
{
    let Some(func) = instance.get_func(&mut *store, name) else {
        return Ok(None);
    };
    func.typed::<P, R>(&*store)
        .map(Some)
        .map_err(|e| RuntimeError::ExportSignature {
            name,
            reason: e.to_string(),
        })
}
