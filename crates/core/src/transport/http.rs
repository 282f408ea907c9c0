//! MJPEG-over-HTTP preview of the latest frame.
//!
//! ```text
//! GET /             -> HTML page embedding /video_feed
//! GET /video_feed   -> multipart/x-mixed-replace; boundary=frame
//! GET /snapshot.jpg -> current frame as a single JPEG
//! ```
//!
//! Each connection gets its own thread. The feed re-sends the current
//! frame at a fixed cadence until the client goes away or the server stops.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{ParseErrorKind, Result, StreamError};
use crate::session::Shutdown;
use crate::slot::FrameSource;

pub const BOUNDARY: &str = "frame";
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(100);
const JPEG_QUALITY: u8 = 85;
const ACCEPT_POLL: Duration = Duration::from_millis(50);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// Longest request head (request line plus headers) accepted.
pub const MAX_HEAD_BYTES: usize = 8 * 1024;

/// A parsed HTTP request head. Only the request line and headers are read.
#[derive(Debug)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut lines = raw.lines();

        let request_line = lines.next().ok_or(StreamError::Parse {
            kind: ParseErrorKind::EmptyRequest,
        })?;

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        let &[method, target, version] = parts.as_slice() else {
            return Err(StreamError::Parse {
                kind: ParseErrorKind::InvalidRequestLine,
            });
        };

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            let (name, value) = line.split_once(':').ok_or(StreamError::Parse {
                kind: ParseErrorKind::InvalidHeader,
            })?;
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        let path = target.split('?').next().unwrap_or(target).to_string();

        Ok(Self {
            method: method.to_string(),
            path,
            version: version.to_string(),
            headers,
        })
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Preview server settings.
#[derive(Debug, Clone)]
pub struct PreviewConfig {
    pub bind_addr: String,
    /// Delay between parts on `/video_feed`.
    pub frame_interval: Duration,
    /// Size advertised on the `<img>` tag of the index page.
    pub width: u32,
    pub height: u32,
    /// Socket read/write timeout for each client.
    pub request_timeout: Duration,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            frame_interval: DEFAULT_FRAME_INTERVAL,
            width: crate::config::DEFAULT_WIDTH,
            height: crate::config::DEFAULT_HEIGHT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// HTTP server streaming frames from a [`FrameSource`].
pub struct PreviewServer {
    local_addr: SocketAddr,
    shutdown: Shutdown,
    handle: Option<JoinHandle<()>>,
}

impl PreviewServer {
    pub fn start(config: PreviewConfig, source: Arc<dyn FrameSource>) -> Result<Self> {
        let listener =
            TcpListener::bind(&config.bind_addr).map_err(|source| StreamError::Bind {
                addr: config.bind_addr.clone(),
                source,
            })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let shutdown = Shutdown::new();
        let signal = shutdown.clone();
        let config = Arc::new(config);

        tracing::info!(addr = %local_addr, "preview server listening");

        let handle = thread::Builder::new()
            .name("camstream-http".into())
            .spawn(move || accept_loop(listener, source, config, signal))?;

        Ok(Self {
            local_addr,
            shutdown,
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting; open feeds end at their next frame.
    pub fn stop(&mut self) {
        self.shutdown.trigger();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::warn!("preview accept loop panicked");
        }
        tracing::info!("preview server stopped");
    }
}

impl Drop for PreviewServer {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

/// Non-blocking accept loop, parked on the shutdown signal between accepts.
fn accept_loop(
    listener: TcpListener,
    source: Arc<dyn FrameSource>,
    config: Arc<PreviewConfig>,
    shutdown: Shutdown,
) {
    while !shutdown.is_triggered() {
        match listener.accept() {
            Ok((stream, _)) => {
                if stream.set_nonblocking(false).is_err()
                    || stream.set_read_timeout(Some(config.request_timeout)).is_err()
                    || stream.set_write_timeout(Some(config.request_timeout)).is_err()
                {
                    continue;
                }
                let source = source.clone();
                let config = config.clone();
                let shutdown = shutdown.clone();
                thread::spawn(move || Connection::handle(stream, source, config, shutdown));
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                shutdown.wait_timeout(ACCEPT_POLL);
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept error");
                shutdown.wait_timeout(ACCEPT_POLL);
            }
        }
    }
    tracing::debug!("preview accept loop exited");
}

/// One HTTP client.
struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    peer_addr: SocketAddr,
}

impl Connection {
    fn handle(
        stream: TcpStream,
        source: Arc<dyn FrameSource>,
        config: Arc<PreviewConfig>,
        shutdown: Shutdown,
    ) {
        let peer_addr = match stream.peer_addr() {
            Ok(addr) => addr,
            Err(_) => return,
        };
        let reader_stream = match stream.try_clone() {
            Ok(s) => s,
            Err(_) => return,
        };

        let mut conn = Connection {
            reader: BufReader::new(reader_stream),
            writer: stream,
            peer_addr,
        };

        let reason = conn.run(source.as_ref(), &config, &shutdown);
        tracing::debug!(%peer_addr, reason, "preview client done");
    }

    /// Serve a single request. Returns the reason for closing.
    fn run(
        &mut self,
        source: &dyn FrameSource,
        config: &PreviewConfig,
        shutdown: &Shutdown,
    ) -> &'static str {
        let mut head = String::new();
        loop {
            let remaining = MAX_HEAD_BYTES.saturating_sub(head.len());
            if remaining == 0 {
                tracing::warn!(peer = %self.peer_addr, "request head too large");
                let _ = self.respond(400, "Bad Request", "text/plain", b"request too large");
                return "request too large";
            }

            let mut line = String::new();
            match (&mut self.reader).take(remaining as u64).read_line(&mut line) {
                Ok(0) => return "connection closed by client",
                Ok(_) => {
                    let blank = line == "\r\n" || line == "\n";
                    head.push_str(&line);
                    if blank {
                        break;
                    }
                }
                Err(ref e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    return "request timed out";
                }
                Err(_) => return "read error",
            }
        }

        let request = match HttpRequest::parse(&head) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(peer = %self.peer_addr, error = %e, "parse error");
                let _ = self.respond(400, "Bad Request", "text/plain", b"bad request");
                return "bad request";
            }
        };

        tracing::debug!(peer = %self.peer_addr, method = %request.method, path = %request.path, "request");

        if request.method != "GET" {
            let _ = self.respond(405, "Method Not Allowed", "text/plain", b"GET only");
            return "method not allowed";
        }

        let result = match request.path.as_str() {
            "/" => self.respond(200, "OK", "text/html; charset=utf-8", index_page(config).as_bytes()),
            "/snapshot.jpg" => match source.latest().to_jpeg(JPEG_QUALITY) {
                Ok(jpeg) => self.respond(200, "OK", "image/jpeg", &jpeg),
                Err(e) => {
                    tracing::warn!(error = %e, "snapshot encode failed");
                    self.respond(500, "Internal Server Error", "text/plain", b"encode failed")
                }
            },
            "/video_feed" => return self.stream_feed(source, config.frame_interval, shutdown),
            _ => self.respond(404, "Not Found", "text/plain", b"not found"),
        };

        match result {
            Ok(()) => "response sent",
            Err(_) => "write error",
        }
    }

    fn respond(
        &mut self,
        status: u16,
        reason: &str,
        content_type: &str,
        body: &[u8],
    ) -> std::io::Result<()> {
        let head = format!(
            "HTTP/1.1 {status} {reason}\r\n\
             Content-Type: {content_type}\r\n\
             Content-Length: {len}\r\n\
             Connection: close\r\n\
             \r\n",
            len = body.len()
        );
        self.writer.write_all(head.as_bytes())?;
        self.writer.write_all(body)?;
        self.writer.flush()
    }

    fn stream_feed(
        &mut self,
        source: &dyn FrameSource,
        interval: Duration,
        shutdown: &Shutdown,
    ) -> &'static str {
        let head = format!(
            "HTTP/1.1 200 OK\r\n\
             Content-Type: multipart/x-mixed-replace; boundary={BOUNDARY}\r\n\
             Cache-Control: no-cache, no-store, must-revalidate\r\n\
             Pragma: no-cache\r\n\
             Connection: close\r\n\
             \r\n"
        );
        if self.writer.write_all(head.as_bytes()).is_err() {
            return "write error";
        }

        let mut sent: u64 = 0;
        loop {
            match source.latest().to_jpeg(JPEG_QUALITY) {
                Ok(jpeg) => {
                    if self.writer.write_all(&multipart_part(&jpeg)).is_err() {
                        tracing::debug!(peer = %self.peer_addr, sent, "feed client gone");
                        return "write error";
                    }
                    sent += 1;
                }
                Err(e) => tracing::warn!(error = %e, "feed encode failed"),
            }
            if shutdown.wait_timeout(interval) {
                return "server shutting down";
            }
        }
    }
}

/// One part of the multipart feed.
pub fn multipart_part(jpeg: &[u8]) -> Vec<u8> {
    let head = format!(
        "--{BOUNDARY}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        jpeg.len()
    );
    let mut part = Vec::with_capacity(head.len() + jpeg.len() + 2);
    part.extend_from_slice(head.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    part
}

fn index_page(config: &PreviewConfig) -> String {
    format!(
        "<!doctype html>\n<title>Cam Stream</title>\n<h1>Cam Stream</h1>\n\
         <img src=\"/video_feed\" width=\"{}\" height=\"{}\">\n",
        config.width, config.height
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_get_request() {
        let req = HttpRequest::parse("GET /video_feed?x=1 HTTP/1.1\r\nHost: cam\r\n\r\n").unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/video_feed");
        assert_eq!(req.version, "HTTP/1.1");
        assert_eq!(req.header("host"), Some("cam"));
    }

    #[test]
    fn parse_rejects_bad_request_line() {
        let err = HttpRequest::parse("GET\r\n\r\n").unwrap_err();
        assert!(matches!(
            err,
            StreamError::Parse {
                kind: ParseErrorKind::InvalidRequestLine
            }
        ));
    }

    #[test]
    fn parse_rejects_header_without_colon() {
        assert!(HttpRequest::parse("GET / HTTP/1.1\r\nbroken\r\n\r\n").is_err());
    }

    #[test]
    fn parse_rejects_empty() {
        assert!(matches!(
            HttpRequest::parse(""),
            Err(StreamError::Parse {
                kind: ParseErrorKind::EmptyRequest
            })
        ));
    }

    #[test]
    fn part_layout() {
        let part = multipart_part(b"\xff\xd8\xff\xd9");
        let expected = b"--frame\r\nContent-Type: image/jpeg\r\nContent-Length: 4\r\n\r\n\xff\xd8\xff\xd9\r\n";
        assert_eq!(part, expected);
    }

    #[test]
    fn index_embeds_feed_at_configured_size() {
        let page = index_page(&PreviewConfig {
            width: 320,
            height: 240,
            ..PreviewConfig::default()
        });
        assert!(page.contains("src=\"/video_feed\""));
        assert!(page.contains("width=\"320\" height=\"240\""));
    }
}
