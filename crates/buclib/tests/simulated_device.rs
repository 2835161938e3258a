//! Facade-level tests against a simulated device.

use std::sync::{Arc, Mutex};

use buclib::{BucBuilder, BucDriver, CommandKind, CommandResult, TransportKind};
use buclib_test_harness::{SampleResponses, SimulatedTransport};

type Results = Arc<Mutex<Vec<(String, CommandKind)>>>;

fn simulated_driver(responses: SampleResponses) -> (BucDriver, Results) {
    let responses = Arc::new(responses);
    let results: Results = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&results);
    let driver = BucBuilder::new()
        .network_transport(Box::new(SimulatedTransport::new(
            "network",
            Arc::clone(&responses),
        )))
        .serial_transport(Box::new(SimulatedTransport::new("serial", responses)))
        .build(move |text, kind| sink.lock().unwrap().push((text, kind)));
    (driver, results)
}

#[tokio::test]
async fn every_command_over_serial() {
    let (driver, results) = simulated_driver(SampleResponses::builtin());
    driver.select_serial(1).await.unwrap();
    assert_eq!(driver.communication_type(), TransportKind::Serial);

    driver.get_temperature();
    driver.mute();
    driver.unmute();
    driver.get_mute_state();
    driver.get_attenuation();
    driver.set_attenuation(20);
    driver.get_serial_number();
    driver.get_power();
    driver.get_all_faults();
    driver.wait_idle().await;

    let delivered = results.lock().unwrap().clone();
    let kinds: Vec<CommandKind> = delivered.iter().map(|(_, k)| *k).collect();
    assert_eq!(kinds, CommandKind::ALL);
    let texts: Vec<&str> = delivered.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(
        texts,
        [
            "32",
            "ok",
            "ok",
            "1 (Muted)",
            "12",
            "ok",
            "123456",
            "+18.5",
            "ok mute 0 overTemp 0 pll 0",
        ]
    );
}

#[tokio::test]
async fn custom_responses_and_subscription() {
    let mut responses = SampleResponses::builtin();
    responses.insert(CommandKind::GetSerialNumber, "\r\nerr \"Invalid Command\"\r\n");
    responses.insert(CommandKind::GetAttenuation, "");
    let (driver, _results) = simulated_driver(responses);
    let mut rx = driver.subscribe();
    driver.select_network("127.0.0.1", 5353).await.unwrap();

    driver.get_serial_number();
    driver.get_attenuation();

    assert_eq!(
        rx.recv().await.unwrap(),
        CommandResult {
            kind: CommandKind::GetSerialNumber,
            text: "err \"Invalid Command\"".into(),
        }
    );
    assert_eq!(
        rx.recv().await.unwrap(),
        CommandResult {
            kind: CommandKind::GetAttenuation,
            text: "Unexpected error: response string is null or empty".into(),
        }
    );
}

#[tokio::test]
async fn missing_sample_becomes_error_result() {
    let (driver, results) = simulated_driver(SampleResponses::new());
    driver.select_network("127.0.0.1", 5353).await.unwrap();

    driver.get_all_faults();
    driver.wait_idle().await;

    assert_eq!(
        results.lock().unwrap().clone(),
        [(
            "Error: protocol error: no sample response for GetStatusOfAllFaults".to_string(),
            CommandKind::GetStatusOfAllFaults
        )]
    );
}
