// Operator command channel
//
// Accepts one connection at a time, decodes the ASCII frame stream, and
// publishes each good frame into the shared command cell. The last valid
// frame stays in effect until a new one replaces it; connection loss
// publishes the neutral frame and the listener waits for the next operator.

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::messages::{ControlFrame, FrameDecoder};

/// Serve operator connections for the life of the process. Returns only
/// when the actuation loop (the sole receiver) has gone away.
pub async fn serve(listener: TcpListener, tx: watch::Sender<ControlFrame>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Accept failed: {}", e);
                continue;
            }
        };
        info!("Operator connected from {}", peer);

        match read_frames(stream, &tx).await {
            Ok(()) => info!("Operator disconnected"),
            Err(e) => warn!("Operator link lost: {}", e),
        }

        // Explicit reset: stop the base, hold the turret, wait for the next
        // operator. The actuators must never be left mid-motion indefinitely.
        if tx.send(ControlFrame::NEUTRAL).is_err() {
            return;
        }
        info!("Commands reset to neutral, listening for a new connection");
    }
}

async fn read_frames(
    mut stream: TcpStream,
    tx: &watch::Sender<ControlFrame>,
) -> std::io::Result<()> {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 256];

    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        for frame in decoder.feed(&buf[..n]) {
            if tx.send(frame).is_err() {
                // Receiver gone means the runtime is shutting down.
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    async fn start_server() -> (std::net::SocketAddr, watch::Receiver<ControlFrame>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = watch::channel(ControlFrame::NEUTRAL);
        tokio::spawn(serve(listener, tx));
        (addr, rx)
    }

    #[tokio::test]
    async fn test_good_frames_reach_the_cell() {
        let (addr, mut rx) = start_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"+0.50 -0.25 1 +3.00 -1.50*").await.unwrap();
        client.flush().await.unwrap();

        let frame = timeout(WAIT, rx.wait_for(|f| *f != ControlFrame::NEUTRAL))
            .await
            .unwrap()
            .unwrap()
            .clone();
        assert_eq!(frame.drive_x, 0.5);
        assert_eq!(frame.drive_y, -0.25);
        assert!(frame.autopilot);
    }

    #[tokio::test]
    async fn test_malformed_frames_do_not_stall_the_channel() {
        let (addr, mut rx) = start_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"+0.1 +0.2 0 +1*garbage*+0.3 -0.3 1 +0.0 +0.0*")
            .await
            .unwrap();
        client.flush().await.unwrap();

        let frame = timeout(WAIT, rx.wait_for(|f| f.drive_y == -0.3))
            .await
            .unwrap()
            .unwrap()
            .clone();
        assert!(frame.autopilot);
    }

    #[tokio::test]
    async fn test_split_frame_across_reads() {
        let (addr, mut rx) = start_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"+0.1 +0.2 0 +1.0 +").await.unwrap();
        client.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.write_all(b"2.0*").await.unwrap();
        client.flush().await.unwrap();

        let frame = timeout(WAIT, rx.wait_for(|f| *f != ControlFrame::NEUTRAL))
            .await
            .unwrap()
            .unwrap()
            .clone();
        assert_eq!(frame.turret_dy, 2.0);
    }

    #[tokio::test]
    async fn test_disconnect_resets_to_neutral() {
        let (addr, mut rx) = start_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"+1.00 +0.00 0 +0.0 +0.0*").await.unwrap();
        client.flush().await.unwrap();
        timeout(WAIT, rx.wait_for(|f| f.drive_x == 1.0))
            .await
            .unwrap()
            .unwrap();

        drop(client);
        timeout(WAIT, rx.wait_for(|f| *f == ControlFrame::NEUTRAL))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_reconnect_after_disconnect() {
        let (addr, mut rx) = start_server().await;

        let mut first = TcpStream::connect(addr).await.unwrap();
        first.write_all(b"+0.10 +0.00 0 +0.0 +0.0*").await.unwrap();
        first.flush().await.unwrap();
        timeout(WAIT, rx.wait_for(|f| f.drive_x == 0.1))
            .await
            .unwrap()
            .unwrap();
        drop(first);

        timeout(WAIT, rx.wait_for(|f| *f == ControlFrame::NEUTRAL))
            .await
            .unwrap()
            .unwrap();

        let mut second = TcpStream::connect(addr).await.unwrap();
        second.write_all(b"-0.40 +0.00 0 +0.0 +0.0*").await.unwrap();
        second.flush().await.unwrap();
        timeout(WAIT, rx.wait_for(|f| f.drive_x == -0.4))
            .await
            .unwrap()
            .unwrap();
    }
}
