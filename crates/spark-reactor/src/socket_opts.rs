//! Applies spec §6's per-connection socket options. Grounded in
//! `spark-transport-tcp::channel::TcpSocketConfig`'s use of `socket2` to
//! reach options `std::net::TcpStream` doesn't expose directly (`SO_LINGER`
//! there, the full §6 set here).

use mio::net::TcpStream;
use socket2::SockRef;
use spark_core::config::SocketOptions;
use std::io;

/// Applies every option except `TCP_NODELAY`. Safe to call as soon as a
/// socket exists, connected or not.
pub fn apply_base_options(socket: &TcpStream, opts: &SocketOptions) -> io::Result<()> {
    let sock_ref = SockRef::from(socket);
    if opts.so_reuseaddr {
        sock_ref.set_reuse_address(true)?;
    }
    if let Some(size) = opts.so_sndbuf {
        sock_ref.set_send_buffer_size(size as usize)?;
    }
    if let Some(size) = opts.so_rcvbuf {
        sock_ref.set_recv_buffer_size(size as usize)?;
    }
    sock_ref.set_keepalive(opts.so_keepalive)?;
    if let Some(tos) = opts.ip_tos {
        sock_ref.set_tos(tos)?;
    }
    Ok(())
}

/// `TCP_NODELAY` specifically: for accepted (server-side) sockets this can
/// be applied right away, but for client-initiated sockets it must wait
/// until `finish_connect()` succeeds — some platforms reject the option
/// while a connect is still in flight.
pub fn apply_tcp_nodelay(socket: &TcpStream, opts: &SocketOptions) -> io::Result<()> {
    socket.set_nodelay(opts.tcp_nodelay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mio::net::TcpListener;
    use spark_core::config::SocketOptions;

    #[test]
    fn applies_without_error_on_accepted_socket() {
        let listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let _client = std::net::TcpStream::connect(addr).unwrap();
        // Give the kernel a moment to complete the loopback handshake.
        std::thread::sleep(std::time::Duration::from_millis(20));
        let (accepted, _) = listener.accept().unwrap();
        let opts = SocketOptions::default();
        apply_base_options(&accepted, &opts).unwrap();
        apply_tcp_nodelay(&accepted, &opts).unwrap();
    }
}
