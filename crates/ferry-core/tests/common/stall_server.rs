//! Server that accepts connections, reads the request, and never answers.
//!
//! Stands in for an object store that hangs mid-upload.

#![allow(dead_code)]

use std::io::Read;
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

/// Starts the server in a background thread; returns its base URL.
/// Each connection is held open for `hold` before being dropped.
pub fn start(hold: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            thread::spawn(move || {
                let mut stream = stream;
                let _ = stream.set_read_timeout(Some(hold));
                let mut buf = [0u8; 8192];
                // Swallow whatever the client sends, reply with nothing.
                while let Ok(n) = stream.read(&mut buf) {
                    if n == 0 {
                        break;
                    }
                }
                thread::sleep(hold);
            });
        }
    });
    format!("http://127.0.0.1:{}/", port)
}
