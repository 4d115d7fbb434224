//! relaykit Probe Client
//!
//! Connects to a relaykit server and prints the frames it receives.

use std::io::{BufReader, ErrorKind};
use std::net::TcpStream;

use clap::Parser;
use relaykit::protocol::{read_frame, PacketCodec, StringLookup};
use relaykit::RelayError;

/// relaykit probe
#[derive(Parser, Debug)]
#[command(name = "relaykit-probe")]
#[command(about = "Print frames sent by a relaykit server")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:3802")]
    server: String,

    /// Stop after this many frames (0 = until disconnected)
    #[arg(short, long, default_value = "0")]
    count: usize,

    /// Maximum packet size the server uses
    #[arg(long, default_value = "4096")]
    max_packet_size: usize,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> relaykit::Result<()> {
    let stream = TcpStream::connect(&args.server)?;
    let mut reader = BufReader::new(stream);
    let codec = PacketCodec::new(args.max_packet_size);
    let mut strings = StringLookup::new();

    let mut received = 0usize;
    while args.count == 0 || received < args.count {
        let payload = match read_frame(&mut reader) {
            Ok(p) => p,
            Err(RelayError::Io(ref e)) if e.kind() == ErrorKind::UnexpectedEof => {
                println!("server closed the connection");
                break;
            }
            Err(e) => return Err(e),
        };
        received += 1;

        match codec.decode(&payload, &mut strings) {
            Ok(message) => println!("[{}] {} {:?}", received, message.kind, message.fields),
            Err(e) => println!("[{}] {} bytes, undecodable: {}", received, payload.len(), e),
        }
    }

    Ok(())
}
