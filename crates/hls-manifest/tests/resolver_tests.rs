use hls_manifest::{
    HttpManifestResolver, ManifestError, ManifestSource, ResolverConfig, SelectionPolicy,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const MASTER: &str = r#"#EXTM3U
#EXT-X-VERSION:3
#EXT-X-STREAM-INF:BANDWIDTH=1566000,RESOLUTION=720x404,CODECS="avc1.4d401e,mp4a.40.2"
chunklist_b1566000.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=498000,RESOLUTION=384x216,CODECS="avc1.42c015,mp4a.40.2"
chunklist_b498000.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=767000,RESOLUTION=384x216,CODECS="avc1.42c015,mp4a.40.2"
chunklist_b767000.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=1053000,RESOLUTION=512x288,CODECS="avc1.4d4015,mp4a.40.2"
chunklist_b1053000.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2884000,RESOLUTION=1280x720,CODECS="avc1.4d401f,mp4a.40.2"
chunklist_b2884000.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=5470000,RESOLUTION=1920x1080,CODECS="avc1.640028,mp4a.40.2"
chunklist_b5470000.m3u8
"#;

const MEDIA_ONLY: &str = "#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXTINF:6.0,\nseg0.ts\n";

/// Serves a fixed set of paths over plain HTTP/1.1, one request per connection.
async fn spawn_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let mut read = 0;
                loop {
                    let n = socket.read(&mut buf[read..]).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    read += n;
                    if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") || read == buf.len() {
                        break;
                    }
                }
                let request = String::from_utf8_lossy(&buf[..read]);
                let path = request
                    .lines()
                    .next()
                    .and_then(|line| line.split_whitespace().nth(1))
                    .unwrap_or("/")
                    .to_string();

                let (status, body) = match path.as_str() {
                    "/live/master.m3u8" => ("200 OK", MASTER),
                    "/live/media.m3u8" => ("200 OK", MEDIA_ONLY),
                    _ => ("404 Not Found", "not found"),
                };
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/vnd.apple.mpegurl\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

fn resolver() -> HttpManifestResolver {
    HttpManifestResolver::new(ResolverConfig {
        timeout: Duration::from_secs(5),
        ..ResolverConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_resolves_and_selects_from_served_manifest() {
    let addr = spawn_server().await;
    let url = format!("http://{addr}/live/master.m3u8");

    let manifest = resolver().resolve(&url).await.unwrap();
    assert_eq!(manifest.len(), 6);
    assert_eq!(manifest.base_url().as_str(), format!("http://{addr}/live/"));

    let highest = manifest.select(SelectionPolicy::HighestResolution).unwrap();
    assert_eq!((highest.width, highest.height), (1920, 1080));
    assert_eq!(highest.bandwidth, 5_470_000);
    assert_eq!(
        highest.uri,
        format!("http://{addr}/live/chunklist_b5470000.m3u8")
    );

    let lowest = manifest.select(SelectionPolicy::LowestResolution).unwrap();
    assert_eq!((lowest.width, lowest.height, lowest.bandwidth), (384, 216, 498_000));

    let by_bw = manifest.select(SelectionPolicy::HighestBandwidth).unwrap();
    assert_eq!(by_bw.bandwidth, 5_470_000);

    let exact = manifest.by_exact_resolution(720, 404).unwrap();
    assert_eq!(exact.bandwidth, 1_566_000);
    assert!(manifest.by_exact_resolution(640, 480).is_none());
}

#[tokio::test]
async fn test_non_success_status_is_fetch_error() {
    let addr = spawn_server().await;
    let err = resolver()
        .resolve(&format!("http://{addr}/live/missing.m3u8"))
        .await
        .unwrap_err();
    assert!(err.is_fetch(), "{err}");
    assert!(matches!(err, ManifestError::HttpStatus { status: 404, .. }));
}

#[tokio::test]
async fn test_media_playlist_is_parse_error() {
    let addr = spawn_server().await;
    let err = resolver()
        .resolve(&format!("http://{addr}/live/media.m3u8"))
        .await
        .unwrap_err();
    assert!(err.is_parse(), "{err}");
}

#[tokio::test]
async fn test_unreachable_host_is_fetch_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = resolver()
        .resolve(&format!("http://{addr}/live/master.m3u8"))
        .await
        .unwrap_err();
    assert!(err.is_fetch(), "{err}");
    assert!(err.is_retryable());
}
