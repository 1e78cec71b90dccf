//! Simple test client for the share daemon.
//!
//! Run with: cargo run --example test_client [socket-path]
//!
//! Read-only walk through the protocol:
//! 1. system.ping - Health check
//! 2. service.list - Managed services
//! 3. shares.render - Preview an smb.conf without applying it
//! 4. service.status - State of every service
//! 5. snapshot.list - Backup history for smb
//! 6. Unknown command and unknown service rejection

use serde_json::json;
use tokio::net::UnixStream;

use share_daemon::protocol::{call, Request, Response};

const DEFAULT_SOCKET: &str = "/run/share-daemon/daemon.sock";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let socket = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_SOCKET.to_string());

    println!("=== Share Daemon Test Client ({}) ===\n", socket);
    let mut stream = UnixStream::connect(&socket).await?;

    println!("Test 1: system.ping");
    let response = call(&mut stream, &Request::new("system.ping")).await?;
    print_response(&response)?;

    println!("Test 2: service.list");
    let response = call(&mut stream, &Request::new("service.list")).await?;
    print_response(&response)?;

    println!("Test 3: shares.render");
    let render = Request::new("shares.render")
        .with_param("service", "smb")
        .with_param(
            "specs",
            json!([
                {"name": "docs", "path": "/srv/docs", "read_only": true, "comment": "Team documents"},
                {"name": "scratch", "path": "/srv/scratch", "allowed_networks": ["192.168.1.0/24"]}
            ]),
        )
        .with_param("options", json!({"workgroup": "WORKGROUP"}))
        .with_param("validate", false);
    let response = call(&mut stream, &render).await?;
    match response.data.as_ref().and_then(|d| d["content"].as_str()) {
        Some(content) => println!("{}\n", content),
        None => print_response(&response)?,
    }

    for service in ["smb", "nfs", "ftp", "nginx"] {
        println!("Test 4: service.status ({})", service);
        let request = Request::new("service.status").with_param("service", service);
        let response = call(&mut stream, &request).await?;
        print_response(&response)?;
    }

    println!("Test 5: snapshot.list (smb)");
    let request = Request::new("snapshot.list").with_param("service", "smb");
    let response = call(&mut stream, &request).await?;
    print_response(&response)?;

    println!("Test 6: unknown command (should fail)");
    let response = call(&mut stream, &Request::new("system.reboot")).await?;
    print_response(&response)?;

    println!("Test 7: unknown service (should fail)");
    let request = Request::new("service.status").with_param("service", "afp");
    let response = call(&mut stream, &request).await?;
    print_response(&response)?;

    println!("=== Done ===");
    Ok(())
}

fn print_response(response: &Response) -> Result<(), serde_json::Error> {
    println!("Response: {}\n", serde_json::to_string_pretty(response)?);
    Ok(())
}
