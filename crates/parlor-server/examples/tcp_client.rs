//! Interactive demo client.
//!
//! ```bash
//! cargo run -p parlor-server                      # terminal 1
//! cargo run -p parlor-server --example tcp_client # terminal 2
//! ```
//!
//! Commands: `create`, `join <room-id>`, `leave`, `spin`, `beat`, `quit`.
//! Server pushes (GameStart/GameSync/GameEnd) are printed as they arrive.

use std::{env, error::Error, io::Write};

use parlor_proto::{MsgId, Packet, payloads};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let addr = env::var("PARLOR_CLIENT_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    println!("Connecting to {addr}...");
    let stream = TcpStream::connect(&addr).await?;
    println!("Connected. Commands: create | join <room-id> | leave | spin | beat | quit\n");

    let (mut read_half, mut write_half) = stream.into_split();

    // Print server pushes as they arrive.
    tokio::spawn(async move {
        loop {
            let mut header = [0u8; Packet::HEADER_LEN];
            if read_half.read_exact(&mut header).await.is_err() {
                println!("\nserver closed the connection");
                std::process::exit(0);
            }
            let (msg_id, length) = Packet::read_header(header);
            let mut payload = vec![0u8; length as usize];
            if length > 0 && read_half.read_exact(&mut payload).await.is_err() {
                println!("\nserver closed mid-frame");
                std::process::exit(0);
            }

            let name = MsgId::from_u16(msg_id)
                .map_or_else(|| format!("#{msg_id}"), |id| format!("{id}"));
            println!("<< {} {}", name, String::from_utf8_lossy(&payload));
            print!(">> ");
            let _ = std::io::stdout().flush();
        }
    });

    let stdin = std::io::stdin();
    loop {
        print!(">> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let mut parts = line.trim().split_whitespace();

        let (msg_id, payload): (MsgId, Vec<u8>) = match parts.next() {
            Some("create") => (MsgId::CreateRoom, Vec::new()),
            Some("join") => {
                let Some(room_id) = parts.next() else {
                    eprintln!("usage: join <room-id>");
                    continue;
                };
                let body =
                    payloads::to_bytes(&payloads::RoomId { room_id: room_id.to_string() })?;
                (MsgId::JoinRoom, body)
            }
            Some("leave") => (MsgId::LeaveRoom, Vec::new()),
            Some("spin") => {
                (MsgId::PlayerAction, payloads::to_bytes(&payloads::ActionEnvelope {
                    kind: "spin".to_string(),
                })?)
            }
            Some("beat") => (MsgId::Heartbeat, Vec::new()),
            Some("quit") | Some("exit") => break,
            Some(other) => {
                eprintln!("unknown command: {other}");
                continue;
            }
            None => continue,
        };

        let packet = Packet::new(msg_id, payload)?;
        write_half.write_all(&packet.to_bytes()).await?;
    }

    Ok(())
}
