//! Poll a BUC and print results as they arrive.
//!
//! Demonstrates subscribing to the result stream instead of handling results
//! in the callback. Each second the example queues a temperature, forward
//! power and fault read, then prints whatever arrives on the subscription.
//!
//! # Usage
//!
//! ```sh
//! cargo run -p buclib --example monitor_results -- 192.168.1.50 5353
//! ```

use std::time::Duration;

use buclib::BucBuilder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "192.168.1.50".to_string());
    let port: u16 = args.next().map(|p| p.parse()).transpose()?.unwrap_or(5353);

    println!("Connecting to {host}:{port}...");

    let driver = BucBuilder::new().build(|_, _| {});
    let mut results = driver.subscribe();
    driver.select_network(&host, port).await?;

    println!("Connected. Polling for 30 seconds...\n");
    println!("{:<10} {:<22} Result", "Elapsed", "Command");
    println!("{:-<10} {:-<22} {:-<30}", "", "", "");

    let start = tokio::time::Instant::now();
    let deadline = start + Duration::from_secs(30);
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => break,
            _ = ticker.tick() => {
                driver.get_temperature();
                driver.get_power();
                driver.get_all_faults();
            }
            received = results.recv() => match received {
                Ok(result) => {
                    let elapsed = start.elapsed();
                    println!(
                        "{:>6}.{:03}s {:<22} {}",
                        elapsed.as_secs(),
                        elapsed.subsec_millis(),
                        result.kind,
                        result.text
                    );
                }
                Err(e) => {
                    println!("subscription ended: {e}");
                    break;
                }
            },
        }
    }

    driver.wait_idle().await;
    driver.disconnect().await?;
    Ok(())
}
