// Browser builds run on the wasm shim; everything else on tokio proper.

#[cfg(not(target_family = "wasm"))]
pub(crate) use ::tokio;
#[cfg(target_family = "wasm")]
pub(crate) use tokio_with_wasm::alias as tokio;

#[cfg(not(target_family = "wasm"))]
pub(crate) use ::tokio::time::sleep;
#[cfg(target_family = "wasm")]
pub(crate) use wasmtimer::tokio::sleep;
