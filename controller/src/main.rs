mod api;
mod control_client;
mod dispatcher;
mod error;
mod host;
mod link;
mod push;
mod reconcile;
mod scheduler;
mod store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
