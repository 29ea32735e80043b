/*!
 * Shared Test Support
 * Recording transport proving that denied targets are never dialed
 */

// Each integration binary uses a different subset of this module
#![allow(dead_code)]

use scriptbox::{Conn, Transport};
use std::io::{Cursor, Read, Write};
use std::sync::{Arc, Mutex};

/// Canned HTTP response served by the mock transport
pub const CANNED_RESPONSE: &str = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok";

struct MockConn {
    response: Cursor<Vec<u8>>,
}

impl Read for MockConn {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.response.read(buf)
    }
}

impl Write for MockConn {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Transport that records every dial and serves a canned response
#[derive(Clone, Default)]
pub struct MockTransport {
    dials: Arc<Mutex<Vec<(String, u16)>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dial_count(&self) -> usize {
        self.dials.lock().unwrap().len()
    }

    pub fn dials(&self) -> Vec<(String, u16)> {
        self.dials.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    fn connect(&self, host: &str, port: u16) -> std::io::Result<Box<dyn Conn>> {
        self.dials.lock().unwrap().push((host.to_string(), port));
        Ok(Box::new(MockConn {
            response: Cursor::new(CANNED_RESPONSE.as_bytes().to_vec()),
        }))
    }
}

/// Test logger init, safe to call from every test
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
