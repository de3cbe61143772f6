//! Pipe stdin to stdout through one of the transfer modes.
//!
//! ```sh
//! printf '4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n' | RUST_LOG=debug cargo run -p example -- decode
//! printf 'Wikipedia' | cargo run -p example -- encode 4
//! cargo run -p example -- relay < input > output
//! ```
use ferry::body::{ChunkedEncoder, Coding};
use ferry::{Config, LineReader, Transfer};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let mode = args.next().unwrap_or_default();

    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let result = match mode.as_str() {
        "decode" => decode(token).await,
        "encode" => {
            let chunk_size = args.next().and_then(|e| e.parse().ok()).unwrap_or(1024);
            encode(chunk_size).await
        }
        "relay" => relay(token).await,
        _ => {
            eprintln!("usage: example <decode | encode [chunk-size] | relay>");
            std::process::exit(2);
        }
    };

    if let Err(err) = result {
        log::error!("{mode} failed: {err}");
        std::process::exit(1);
    }
}

async fn decode(token: CancellationToken) -> Result<(), ferry::Error> {
    let mut reader = LineReader::with_config(tokio::io::stdin(), &Config::default());
    let mut stdout = tokio::io::stdout();
    let mut observed = 0usize;
    let mut observer = |bytes: &[u8]| observed += bytes.len();

    let decoded = Transfer::new()
        .observe(&mut observer)
        .cancel_on(token)
        .copy_body(&mut reader, &mut stdout, Coding::Chunked)
        .await?;

    log::info!("decoded {decoded} bytes, observed {observed}");
    Ok(())
}

async fn encode(chunk_size: usize) -> Result<(), ferry::Error> {
    let mut stdin = tokio::io::stdin();
    let mut encoder = ChunkedEncoder::new(tokio::io::stdout());
    let mut chunk = vec![0u8; chunk_size.max(1)];

    loop {
        let read = stdin.read(&mut chunk).await.map_err(ferry::Error::Read)?;
        if read == 0 {
            break;
        }
        encoder.write_chunk(&chunk[..read]).await?;
    }

    encoder.finish().await
}

async fn relay(token: CancellationToken) -> Result<(), ferry::Error> {
    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();

    let relayed = Transfer::new()
        .cancel_on(token)
        .relay(&mut stdin, &mut stdout, Config::default().get_buffer_size())
        .await?;

    log::info!("relayed {relayed} bytes");
    Ok(())
}
