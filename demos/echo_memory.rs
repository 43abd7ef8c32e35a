use ipc_rpc::{
    ClientBuilder, DispatcherBuilder, MemoryTransport, Outcome, Result, RpcRequest, TransportPtr,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct AddRequest {
    a: i32,
    b: i32,
}

#[derive(Debug, Serialize, Deserialize)]
struct AddResponse {
    sum: i32,
}

impl RpcRequest for AddRequest {
    type Params = Self;
    type Success = AddResponse;
    type Error = String;

    fn method(&self) -> &str {
        "math/add"
    }

    fn params(&self) -> &Self {
        self
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (client_end, server_end) = MemoryTransport::pair("client", "server");

    let dispatcher = DispatcherBuilder::new()
        .register("echo", |text: String| async move { Ok::<_, String>(text) })
        .register("math/add", |req: AddRequest| async move {
            Ok::<_, String>(AddResponse { sum: req.a + req.b })
        })
        .on_transport_event(|event| println!("server saw transport event: {event}"))
        .build()?;

    let server_transport: TransportPtr = server_end;
    dispatcher.attach(&server_transport)?;

    let client = ClientBuilder::new(client_end.clone()).build()?;

    let echoed: Outcome<String, String> = client.call("echo", "hello over ipc").await?;
    println!("echo -> {echoed:?}");

    match client.send(&AddRequest { a: 20, b: 3 }).await? {
        Outcome::Success(resp) => println!("20 + 3 = {}", resp.sum),
        Outcome::Error(reason) => println!("math/add failed: {reason}"),
    }

    match client.call::<_, String, String>("math/pow", &(2, 8)).await {
        Ok(outcome) => println!("math/pow -> {outcome:?}"),
        Err(e) => println!("math/pow -> {e}"),
    }

    client_end.announce_termination();
    server_transport.cancel().await?;
    Ok(())
}
