use serde::de::DeserializeOwned;
use serde::Serialize;

/// A typed request bound to one remote method.
///
/// Implementors name the method and carry the params; the associated types
/// fix what a reply decodes into. Send with
/// [`RpcClient::send`](crate::RpcClient::send).
///
/// # Example
///
/// ```
/// use ipc_rpc::RpcRequest;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize)]
/// struct AddRequest { a: i32, b: i32 }
///
/// #[derive(Deserialize)]
/// struct AddError { reason: String }
///
/// impl RpcRequest for AddRequest {
///     type Params = Self;
///     type Success = i32;
///     type Error = AddError;
///
///     fn method(&self) -> &str { "math/add" }
///     fn params(&self) -> &Self { self }
/// }
/// ```
pub trait RpcRequest {
    type Params: Serialize + ?Sized;
    type Success: DeserializeOwned;
    type Error: DeserializeOwned;

    /// Name of the remote method. Must not be empty.
    fn method(&self) -> &str;

    fn params(&self) -> &Self::Params;
}
