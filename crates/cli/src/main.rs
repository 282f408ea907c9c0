use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use camstream::{
    KeepaliveTarget, LivenessMonitor, PreviewConfig, PreviewServer, StreamConfig, StreamReceiver,
};
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "camstream",
    about = "Receive a UDP MJPEG camera stream and serve it over HTTP"
)]
struct Args {
    /// Camera IP or host name
    #[arg(long, default_value = camstream::config::DEFAULT_CAMERA_HOST)]
    camera_host: String,

    /// Camera stream port
    #[arg(long, default_value_t = 8080)]
    camera_port: u16,

    /// Keepalive endpoint as PORT:PAYLOAD (repeatable, replaces the defaults)
    #[arg(long = "keepalive", value_parser = parse_keepalive)]
    keepalive: Vec<KeepaliveTarget>,

    /// Seconds without a frame before the stream is restarted
    #[arg(long, default_value = "2", value_parser = parse_seconds)]
    timeout: Duration,

    /// Seconds between liveness checks
    #[arg(long, default_value = "2", value_parser = parse_seconds)]
    poll: Duration,

    /// Placeholder width
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Placeholder height
    #[arg(long, default_value_t = 480)]
    height: u32,

    /// HTTP preview bind address (host:port)
    #[arg(long, default_value = "0.0.0.0:5000")]
    http: String,

    /// Do not start the HTTP preview
    #[arg(long)]
    no_http: bool,
}

fn parse_keepalive(value: &str) -> Result<KeepaliveTarget, String> {
    KeepaliveTarget::parse(value).ok_or_else(|| format!("expected PORT:PAYLOAD, got {value:?}"))
}

/// Finite seconds, at least 50 ms.
fn parse_seconds(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|_| format!("expected seconds, got {value:?}"))?;
    if !secs.is_finite() {
        return Err(format!("seconds must be finite, got {value:?}"));
    }
    Duration::try_from_secs_f64(secs.max(0.05)).map_err(|e| format!("{value:?}: {e}"))
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut config = StreamConfig::new(&args.camera_host, args.camera_port);
    if !args.keepalive.is_empty() {
        config.keepalive = args.keepalive;
    }
    config.frame_timeout = args.timeout;
    config.poll_interval = args.poll;
    config.width = args.width;
    config.height = args.height;

    let receiver = match StreamReceiver::new(config) {
        Ok(receiver) => Arc::new(receiver),
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return;
        }
    };

    // Log every diagnostic event on its own thread; the channel closes with the receiver.
    let events = receiver.subscribe();
    thread::spawn(move || {
        for event in events {
            tracing::debug!(?event, "stream event");
        }
    });

    let port = match receiver.start() {
        Ok(port) => port,
        Err(e) => {
            eprintln!("Failed to start receiver: {}", e);
            return;
        }
    };

    let mut monitor = match LivenessMonitor::spawn(receiver.clone()) {
        Ok(monitor) => monitor,
        Err(e) => {
            eprintln!("Failed to start liveness monitor: {}", e);
            receiver.stop();
            return;
        }
    };

    let mut preview = None;
    if !args.no_http {
        let preview_config = PreviewConfig {
            bind_addr: args.http.clone(),
            width: args.width,
            height: args.height,
            ..PreviewConfig::default()
        };
        match PreviewServer::start(preview_config, receiver.clone()) {
            Ok(server) => preview = Some(server),
            Err(e) => eprintln!("Preview server disabled: {}", e),
        }
    }

    println!(
        "Receiving {}:{} on UDP port {}, press Enter to stop",
        args.camera_host, args.camera_port, port
    );
    let mut input = String::new();
    if let Err(e) = io::stdin().read_line(&mut input) {
        tracing::warn!(error = %e, "stdin closed");
    }

    if let Some(mut server) = preview {
        server.stop();
    }
    monitor.stop();
    receiver.stop();

    let stats = receiver.stats();
    println!(
        "frames decoded: {}, dropped: {}, decode failures: {}, restarts: {}",
        stats.frames_decoded, stats.frames_dropped, stats.decode_failures, stats.restarts
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_flag_accepts_fractions() {
        assert_eq!(parse_seconds("1.5"), Ok(Duration::from_millis(1500)));
        assert_eq!(parse_seconds("0"), Ok(Duration::from_millis(50)));
    }

    #[test]
    fn seconds_flag_rejects_non_finite() {
        assert!(parse_seconds("inf").is_err());
        assert!(parse_seconds("NaN").is_err());
        assert!(parse_seconds("1e400").is_err());
        assert!(parse_seconds("soon").is_err());
    }

    #[test]
    fn args_parse_with_defaults() {
        let args = Args::try_parse_from(["camstream", "--timeout", "3"]).unwrap();
        assert_eq!(args.timeout, Duration::from_secs(3));
        assert_eq!(args.poll, Duration::from_secs(2));
        assert!(Args::try_parse_from(["camstream", "--poll", "inf"]).is_err());
    }
}
