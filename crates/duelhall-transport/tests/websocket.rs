//! Integration tests for the WebSocket transport against a real client.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;
    use std::time::Duration;

    use duelhall_transport::{Connection, Transport, WebSocketTransport};
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn connect_client(addr: &str) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        ws
    }

    /// Binds on an ephemeral port and returns the transport with its address.
    async fn bind_ephemeral() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr").to_string();
        (transport, addr)
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (mut transport, addr) = bind_ephemeral().await;
        let server = tokio::spawn(async move { transport.accept().await.expect("accept") });

        let mut client = connect_client(&addr).await;
        let conn = server.await.expect("task should complete");
        assert!(conn.id().into_inner() > 0);

        conn.send(b"hello from server").await.expect("send");
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"hello from server");

        client
            .send(Message::Binary(b"hello from client".to_vec().into()))
            .await
            .unwrap();
        let received = conn.recv().await.expect("recv").expect("data");
        assert_eq!(received, b"hello from client");

        conn.close().await.expect("close");
    }

    #[tokio::test]
    async fn test_websocket_text_frames_are_delivered_as_bytes() {
        let (mut transport, addr) = bind_ephemeral().await;
        let server = tokio::spawn(async move { transport.accept().await.expect("accept") });

        let mut client = connect_client(&addr).await;
        let conn = server.await.unwrap();

        client.send(Message::Text("{\"a\":1}".into())).await.unwrap();
        let received = conn.recv().await.unwrap().unwrap();
        assert_eq!(received, b"{\"a\":1}");
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (mut transport, addr) = bind_ephemeral().await;
        let server = tokio::spawn(async move { transport.accept().await.expect("accept") });

        let mut client = connect_client(&addr).await;
        let conn = server.await.unwrap();

        client.send(Message::Close(None)).await.unwrap();
        let result = conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_send_while_recv_is_pending() {
        // A reader parked in recv() must not block a concurrent writer.
        let (mut transport, addr) = bind_ephemeral().await;
        let server = tokio::spawn(async move { transport.accept().await.expect("accept") });

        let mut client = connect_client(&addr).await;
        let conn = Arc::new(server.await.unwrap());

        let reader = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(2), conn.send(b"broadcast"))
            .await
            .expect("send must not wait for recv")
            .expect("send");
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"broadcast");

        client.send(Message::Binary(b"done".to_vec().into())).await.unwrap();
        let got = reader.await.unwrap().unwrap().unwrap();
        assert_eq!(got, b"done");
    }

    #[tokio::test]
    async fn test_connection_ids_are_unique() {
        let (mut transport, addr) = bind_ephemeral().await;
        let server = tokio::spawn(async move {
            let a = transport.accept().await.expect("accept a");
            let b = transport.accept().await.expect("accept b");
            (a, b)
        });

        let _c1 = connect_client(&addr).await;
        let _c2 = connect_client(&addr).await;
        let (a, b) = server.await.unwrap();
        assert_ne!(a.id(), b.id());
    }
}
