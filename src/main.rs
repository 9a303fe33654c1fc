/*!
 * Coop Demo - Main Entry Point
 *
 * Runs a line echo service over an in-memory duplex:
 * - The server half echoes each line back upper-cased
 * - Client tasks share the connection through a lock
 * - A barrier releases the clients together
 */

use coop_sync::stream::duplex;
use coop_sync::{init_tracing, scoped, Barrier, Cx, Lock, Stream, StreamConfig};
use futures::StreamExt;
use miette::{IntoDiagnostic, Result};
use std::sync::Arc;
use tracing::{info, warn};

const CLIENTS: usize = 3;

fn stream_config() -> Result<StreamConfig> {
    let config = StreamConfig::default();
    match std::env::var("COOP_STREAM_LIMIT") {
        Ok(raw) => {
            let limit = raw.parse::<usize>().into_diagnostic()?;
            let config = config.with_limit(limit);
            config.validate()?;
            Ok(config)
        }
        Err(_) => Ok(config),
    }
}

async fn serve(stream: Stream) -> Result<usize> {
    let cx = Cx::new();
    let mut served = 0;
    let mut lines = Box::pin(stream.lines(&cx));
    while let Some(line) = lines.next().await {
        let line = line?;
        stream.write(line.to_ascii_uppercase())?.await?;
        served += 1;
    }
    drop(lines);
    stream.close()?;
    Ok(served)
}

async fn client(
    id: usize,
    stream: Stream,
    lock: Arc<Lock>,
    barrier: Arc<Barrier>,
) -> Result<String> {
    let cx = Cx::new();
    barrier.wait(&cx).await?;

    let _guard = scoped(lock.as_ref(), &cx).await?;
    stream.write(format!("hello from client {}\n", id))?.await?;
    let reply = stream.read_line(&cx).await?;
    Ok(String::from_utf8_lossy(&reply).trim_end().to_string())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();

    let config = stream_config()?;
    info!(limit = config.limit, "Coop demo starting");

    let (client_end, server_end) = duplex(config, &tokio::runtime::Handle::current())?;
    let server = tokio::spawn(serve(server_end));

    let lock = Arc::new(Lock::new());
    let barrier = Arc::new(Barrier::new(CLIENTS)?);
    let clients: Vec<_> = (0..CLIENTS)
        .map(|id| {
            tokio::spawn(client(
                id,
                client_end.clone(),
                Arc::clone(&lock),
                Arc::clone(&barrier),
            ))
        })
        .collect();

    for handle in clients {
        match handle.await.into_diagnostic()? {
            Ok(reply) => info!(%reply, "Client finished"),
            Err(e) => warn!(error = %e, "Client failed"),
        }
    }

    client_end.write_eof()?;
    let served = server.await.into_diagnostic()??;
    client_end.close()?;
    client_end.wait_closed(&Cx::new()).await?;

    let stats = serde_json::to_string(&client_end.stats()).into_diagnostic()?;
    info!(served, %stats, "Coop demo finished");
    Ok(())
}
