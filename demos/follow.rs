use log_tail::{Tail, TailConfig};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::time::Duration;
use tokio_stream::StreamExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("app.log");
    fs::write(&path, "2023-01-01 10:00:00 INFO Starting application\n")?;

    let config = TailConfig::default()
        .with_backoff(Duration::from_millis(100), Duration::from_secs(2));
    let mut tail = Tail::start_with_config(&path, config);

    let writer_path = path.clone();
    tokio::spawn(async move {
        let append = |text: &str| -> std::io::Result<()> {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&writer_path)?;
            file.write_all(text.as_bytes())
        };

        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = append("2023-01-01 10:00:01 INFO Loading configuration\n");
        let _ = append("2023-01-01 10:00:02 WARN Half a line");

        // Rotate: the unterminated line above is still delivered.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = fs::rename(&writer_path, writer_path.with_extension("log.1"));
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = append("2023-01-01 10:00:03 INFO Writing to a fresh file\n");
    });

    println!("Watching {} - press Ctrl-C to stop", path.display());
    let mut count = 0;
    while let Some(line) = tail.next().await {
        println!("[{}] {}", count + 1, line?);
        count += 1;
        if count >= 4 {
            tail.close();
        }
    }

    Ok(())
}
