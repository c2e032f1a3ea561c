//! Network simulation sanity checks using turmoil.
//!
//! These exercise turmoil's own TCP/UDP simulation, independent of any one
//! production transport implementation, so a future transport change can't
//! silently come to depend on network behavior turmoil doesn't provide.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use turmoil::net::{TcpListener, TcpStream, UdpSocket};

#[test]
fn tcp_echo_works() {
    let mut sim = turmoil::Builder::new().build();

    sim.host("server", || async {
        let listener = TcpListener::bind("0.0.0.0:30501").await?;
        let (mut stream, _) = listener.accept().await?;

        let mut buf = [0u8; 32];
        let n = stream.read(&mut buf).await?;
        stream.write_all(&buf[..n]).await?;

        Ok(())
    });

    sim.client("client", async {
        let mut stream = TcpStream::connect("server:30501").await?;
        stream.write_all(b"ping").await?;

        let mut buf = [0u8; 32];
        let n = stream.read(&mut buf).await?;
        assert_eq!(&buf[..n], b"ping");
        Ok(())
    });

    sim.run().expect("simulation failed");
}

#[test]
fn multiple_applications_attach_through_one_reliable_endpoint() {
    let mut sim = turmoil::Builder::new().build();

    sim.host("daemon", || async {
        let listener = TcpListener::bind("0.0.0.0:30501").await?;
        for _ in 0..3 {
            let (mut stream, _) = listener.accept().await?;
            let mut buf = [0u8; 32];
            let n = stream.read(&mut buf).await?;
            stream.write_all(&buf[..n]).await?;
        }
        Ok(())
    });

    for i in 0..3 {
        let name = format!("app{i}");
        let msg = format!("hello-{i}");
        sim.client(name, async move {
            let mut stream = TcpStream::connect("daemon:30501").await?;
            stream.write_all(msg.as_bytes()).await?;
            let mut buf = [0u8; 32];
            let n = stream.read(&mut buf).await?;
            assert_eq!(&buf[..n], msg.as_bytes());
            Ok(())
        });
    }

    sim.run().expect("simulation failed");
}

#[test]
fn udp_datagrams_round_trip() {
    let mut sim = turmoil::Builder::new().build();

    sim.host("daemon", || async {
        let socket = UdpSocket::bind("0.0.0.0:30501").await?;
        let mut buf = [0u8; 32];
        for _ in 0..3 {
            let (n, from) = socket.recv_from(&mut buf).await?;
            socket.send_to(&buf[..n], from).await?;
        }
        Ok(())
    });

    sim.client("client", async {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect("daemon:30501").await?;
        for i in 0..3u8 {
            socket.send_to(&[i], "daemon:30501").await?;
        }
        let mut seen = std::collections::HashSet::new();
        let mut buf = [0u8; 32];
        for _ in 0..3 {
            let (n, _) = socket.recv_from(&mut buf).await?;
            seen.insert(buf[..n].to_vec());
        }
        assert_eq!(seen.len(), 3, "all three echoed datagrams must arrive, in whatever order");
        Ok(())
    });

    sim.run().expect("simulation failed");
}
