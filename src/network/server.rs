use log::{debug, error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Duration, sleep};

use crate::core::ChordNode;
use crate::core::node::stop_requested;
use crate::core::protocol::{Frame, Request};
use crate::network::Transport;
use crate::utils::{DhtError, Result};

/// Accepts peer connections and answers their calls until the node stops
pub struct RpcServer;

impl RpcServer {
    pub fn spawn(node: Arc<ChordNode>, listener: TcpListener) {
        tokio::spawn(async move {
            let mut shutdown = node.shutdown_signal();
            info!("RPC server for {} started", node.addr());

            loop {
                tokio::select! {
                    accepted = listener.accept() => match accepted {
                        Ok((stream, addr)) => {
                            debug!("New connection from: {}", addr);
                            let node = node.clone();
                            tokio::spawn(async move {
                                if let Err(e) = Self::serve_connection(node, stream, addr).await {
                                    debug!("Connection from {} closed: {}", addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            sleep(Duration::from_millis(100)).await;
                        }
                    },
                    _ = stop_requested(&mut shutdown) => break,
                }
            }

            // dropping the listener refuses further dials
            info!("RPC server for {} stopped", node.addr());
        });
    }

    async fn serve_connection(
        node: Arc<ChordNode>,
        mut stream: TcpStream,
        addr: SocketAddr,
    ) -> Result<()> {
        let mut shutdown = node.shutdown_signal();
        if node.is_stopped() {
            return Ok(());
        }

        loop {
            let served = async {
                let Frame { id, body } = Transport::receive_frame::<Frame<Request>>(&mut stream).await?;
                debug!("{} <- {}: {}", node.addr(), addr, body.name());
                let response = node.handle_request(body).await;
                Transport::send_frame(&mut stream, &Frame { id, body: response }).await?;
                node.metrics().record_request_served().await;
                Ok::<(), DhtError>(())
            };

            tokio::select! {
                result = served => result?,
                _ = stop_requested(&mut shutdown) => return Ok(()),
            }
        }
    }
}
