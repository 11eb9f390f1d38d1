//! Demo backend: answers every connection with a small HTML page.
//!
//! Run a few of these next to the balancer's default roster:
//! `dummy-backend --port 9500 --port 9501 --port 9502`

use std::net::{Ipv4Addr, SocketAddr};
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rand::Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use tcp_balancer::lifecycle::wait_for_signal;
use tcp_balancer::observability::logging;

#[derive(Parser, Debug)]
#[command(name = "dummy-backend")]
#[command(about = "Demo HTTP backend for the TCP balancer", long_about = None)]
struct Cli {
    /// Port to serve on. Repeat to serve several.
    #[arg(short, long = "port", default_values_t = [9500u16, 9501, 9502])]
    ports: Vec<u16>,

    /// Minimum simulated processing delay.
    #[arg(long, default_value_t = 50)]
    min_delay_ms: u64,

    /// Maximum simulated processing delay.
    #[arg(long, default_value_t = 150)]
    max_delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging("info");

    let delay = cli.min_delay_ms..=cli.max_delay_ms.max(cli.min_delay_ms);

    for port in cli.ports {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(address = %addr, "Dummy backend listening");
        tokio::spawn(serve(listener, port, delay.clone()));
    }

    wait_for_signal().await;
    Ok(())
}

async fn serve(listener: TcpListener, port: u16, delay: RangeInclusive<u64>) {
    let served = Arc::new(AtomicU64::new(0));

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let count = served.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::debug!(port, peer = %peer, total = count, "Connection accepted");
                tokio::spawn(respond(stream, port, count, delay.clone()));
            }
            Err(e) => {
                tracing::error!(port, error = %e, "Accept error");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

async fn respond(mut stream: TcpStream, port: u16, count: u64, delay: RangeInclusive<u64>) {
    let mut buf = [0u8; 1024];
    match stream.read(&mut buf).await {
        Ok(n) if n > 0 => {
            let text = String::from_utf8_lossy(&buf[..n]);
            let first_line = text.lines().next().unwrap_or_default();
            tracing::info!(port, request = %first_line, "Received request");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::debug!(port, error = %e, "Read failed");
            return;
        }
    }

    let wait = rand::thread_rng().gen_range(delay);
    tokio::time::sleep(Duration::from_millis(wait)).await;

    let body = format!(
        "<html><body><h1>Hello from dummy backend on port {port}</h1>\
         <p>Request #{count}, served after {wait} ms.</p></body></html>"
    );
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );

    if let Err(e) = stream.write_all(response.as_bytes()).await {
        tracing::debug!(port, error = %e, "Write failed");
        return;
    }
    let _ = stream.shutdown().await;
}
