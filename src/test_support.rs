//! Helpers shared by the in-crate test modules.

use tokio::net::TcpListener;

/// An upstream that accepts connections and never writes a byte back.
/// Returns its base URL; the listener lives for the rest of the runtime.
pub async fn silent_upstream() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}
