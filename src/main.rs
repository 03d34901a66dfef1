use log_tail::tail_file;
use std::env;
use std::process;
use tokio_stream::StreamExt;
use tracing_subscriber::{EnvFilter, fmt};

fn init_logging() {
    let filter = EnvFilter::try_from_env("LOG_TAIL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();

    let args: Vec<String> = env::args().collect();

    if args.len() != 2 {
        eprintln!("Usage: {} <file_path>", args[0]);
        process::exit(1);
    }

    let file_path = &args[1];
    let mut tail = tail_file(file_path);

    let handle = tail.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.close();
        }
    });

    while let Some(line_result) = tail.next().await {
        match line_result {
            Ok(line) => println!("{}", line),
            Err(e) => {
                eprintln!("Error tailing {}: {}", file_path, e);
                process::exit(1);
            }
        }
    }
}
