use std::sync::Arc;

use callroute::{
    CallHandle, CallState, MockCalls, MockDriver, OutputRequest, PortKind, RouteChangeReason,
    RouteEngineBuilder, RouteEvent,
};

#[tokio::main]
async fn main() -> callroute::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let driver = MockDriver::new();
    let calls = MockCalls::new();
    let engine = RouteEngineBuilder::new()
        .preferred_sample_rate(16_000)
        .start(Arc::new(driver.clone()), Arc::new(calls.clone()))
        .await;

    // Print every status batch
    let mut events = engine.subscribe();
    tokio::spawn(async move {
        while let Ok(status) = events.recv().await {
            println!("  Status: {status:?}");
        }
    });

    let call = CallHandle(1);
    let streaming = CallState::StreamsRunning {
        video_enabled: false,
    };

    println!("Incoming call rings...");
    calls.set_call(call, CallState::IncomingReceived.phase());
    engine
        .dispatch(RouteEvent::CallState(CallState::IncomingReceived))
        .await?;

    println!("Call answered, media flowing...");
    calls.set_call(call, streaming.phase());
    engine.dispatch(RouteEvent::CallState(streaming)).await?;

    println!("User taps the speaker button...");
    engine.request_output(OutputRequest::Speaker).await?;

    println!("Bluetooth headset connects...");
    driver.connect_bluetooth(PortKind::BluetoothA2DP);
    engine
        .dispatch(RouteEvent::RouteChanged(
            RouteChangeReason::NewDeviceAvailable,
        ))
        .await?;

    println!("Bluetooth headset goes away...");
    let previous_output = driver.disconnect_bluetooth();
    engine
        .dispatch(RouteEvent::RouteChanged(
            RouteChangeReason::OldDeviceUnavailable { previous_output },
        ))
        .await?;

    println!("Call ends.");
    calls.clear();
    engine.dispatch(RouteEvent::CallState(CallState::End)).await?;

    println!("\nFinal status: {:?}", engine.status());
    println!("Driver calls: {:#?}", driver.calls());
    engine.close().await?;

    Ok(())
}
